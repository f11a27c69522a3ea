/// Lowercases `input` and drops Spanish diacritics along with whitespace,
/// `-` and `_`, so "Primera Comunión" and "primera-comunion" compare equal.
pub fn fold_key(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .filter_map(|c| match c {
            'á' | 'à' | 'â' | 'ä' => Some('a'),
            'é' | 'è' | 'ê' | 'ë' => Some('e'),
            'í' | 'ì' | 'î' | 'ï' => Some('i'),
            'ó' | 'ò' | 'ô' | 'ö' => Some('o'),
            'ú' | 'ù' | 'û' | 'ü' => Some('u'),
            'ñ' => Some('n'),
            c if c.is_whitespace() || c == '-' || c == '_' => None,
            c => Some(c),
        })
        .collect()
}

/// `Some(trimmed)` when the value has visible content.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
