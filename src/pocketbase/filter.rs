//! Builder for PocketBase filter expressions.
//!
//! Values coming from a request are always rendered as quoted literals so a
//! search box can never change the shape of the expression.

/// Renders `value` as a single-quoted PocketBase literal.
///
/// Quotes are backslash-escaped. Backslashes are dropped: a trailing one would
/// otherwise swallow the closing quote.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => {}
            '\'' => out.push_str("\\'"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Field names and sort expressions come from code or are checked against
/// this whitelist before they reach PocketBase.
pub fn is_safe_sort(sort: &str) -> bool {
    !sort.is_empty()
        && sort
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ',' | '+' | '-' | '@'))
}

#[derive(Debug, Default, Clone)]
pub struct Filter {
    clauses: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: &str) -> Self {
        self.clauses.push(format!("{field} = {}", quote(value)));
        self
    }

    pub fn like(mut self, field: &str, value: &str) -> Self {
        self.clauses.push(format!("{field} ~ {}", quote(value)));
        self
    }

    pub fn gte(mut self, field: &str, value: &str) -> Self {
        self.clauses.push(format!("{field} >= {}", quote(value)));
        self
    }

    pub fn lte(mut self, field: &str, value: &str) -> Self {
        self.clauses.push(format!("{field} <= {}", quote(value)));
        self
    }

    pub fn is_blank(mut self, field: &str) -> Self {
        self.clauses.push(format!("{field} = ''"));
        self
    }

    pub fn is_set(mut self, field: &str) -> Self {
        self.clauses.push(format!("{field} != ''"));
        self
    }

    /// `(a ~ 'v' || b ~ 'v')`; used for free-text search.
    pub fn any_like(mut self, fields: &[&str], value: &str) -> Self {
        if fields.is_empty() {
            return self;
        }
        let literal = quote(value);
        let alternatives: Vec<String> = fields
            .iter()
            .map(|field| format!("{field} ~ {literal}"))
            .collect();
        self.clauses.push(format!("({})", alternatives.join(" || ")));
        self
    }

    /// Adds the alternatives as one parenthesised `||` group.
    pub fn any_of(mut self, alternatives: Vec<Filter>) -> Self {
        let parts: Vec<String> = alternatives.into_iter().filter_map(Filter::build).collect();
        if !parts.is_empty() {
            self.clauses.push(format!("({})", parts.join(" || ")));
        }
        self
    }

    pub fn build(self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(self.clauses.join(" && "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(quote("O'Neil"), r"'O\'Neil'");
        assert_eq!(quote("x' || id != '"), r"'x\' || id != \''");
    }

    #[test]
    fn backslashes_are_dropped() {
        assert_eq!(quote(r"abc\"), "'abc'");
        assert_eq!(quote(r"a\'b"), r"'a\'b'");
    }

    #[test]
    fn clauses_join_with_and() {
        let filter = Filter::new()
            .eq("estado", "en-curso")
            .gte("fecha", "2026-01-01")
            .build();
        assert_eq!(
            filter.as_deref(),
            Some("estado = 'en-curso' && fecha >= '2026-01-01'")
        );
    }

    #[test]
    fn search_groups_alternatives() {
        let filter = Filter::new()
            .any_like(&["nombre", "email"], "ana")
            .build();
        assert_eq!(filter.as_deref(), Some("(nombre ~ 'ana' || email ~ 'ana')"));
    }

    #[test]
    fn empty_filter_builds_nothing() {
        assert!(Filter::new().build().is_none());
        assert!(Filter::new().any_like(&[], "x").build().is_none());
    }

    #[test]
    fn sort_whitelist() {
        assert!(is_safe_sort("-fecha,nombre"));
        assert!(is_safe_sort("@random"));
        assert!(!is_safe_sort("nombre'"));
        assert!(!is_safe_sort("nombre desc"));
        assert!(!is_safe_sort(""));
    }
}
