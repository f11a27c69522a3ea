//! Accounting records and the balance/report aggregation over them.
//!
//! Amounts are summed in integer cents so totals are exact, and nothing here
//! ever adds pesos to dollars: every balance belongs to one currency.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Resource, end_of_day, param, require, require_if_present, trim};
use crate::error::AppError;
use crate::pocketbase::Filter;
use crate::pocketbase::fields::{empty_as_none, lenient, number};

macro_rules! select_enum {
    ($name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::Validation(format!(
                        "{} must be one of {}, got '{}'",
                        $field,
                        [$($text),+].join(", "),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

select_enum!(TipoMovimiento, "type" { Cobro => "cobro", Pago => "pago" });
select_enum!(Moneda, "moneda" { Ars => "ars", Usd => "usd" });
select_enum!(Especie, "especie" { Efectivo => "efectivo", Transferencia => "transferencia" });
select_enum!(Categoria, "categoria" { Evento => "evento", Oficina => "oficina" });

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Movimiento {
    pub id: String,
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub tipo: Option<TipoMovimiento>,
    #[serde(deserialize_with = "lenient")]
    pub moneda: Option<Moneda>,
    #[serde(deserialize_with = "lenient")]
    pub especie: Option<Especie>,
    #[serde(deserialize_with = "lenient")]
    pub categoria: Option<Categoria>,
    #[serde(rename = "montoEspera", deserialize_with = "number")]
    pub monto_espera: Option<f64>,
    #[serde(
        rename = "dolarEsperado",
        deserialize_with = "number",
        skip_serializing_if = "Option::is_none"
    )]
    pub dolar_esperado: Option<f64>,
    #[serde(rename = "fechaEspera", deserialize_with = "empty_as_none")]
    pub fecha_espera: Option<String>,
    #[serde(rename = "fechaEfectuado", deserialize_with = "empty_as_none")]
    pub fecha_efectuado: Option<String>,
    pub descripcion: String,
    pub evento_id: String,
    pub created: String,
    pub updated: String,
}

impl Movimiento {
    /// Expected amount: `montoEspera`, else the legacy `dolarEsperado`.
    pub fn monto(&self) -> Option<f64> {
        self.monto_espera.or(self.dolar_esperado)
    }

    pub fn pendiente(&self) -> bool {
        self.fecha_efectuado.is_none()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MovimientoInput {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moneda: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub especie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    #[serde(rename = "montoEspera", skip_serializing_if = "Option::is_none")]
    pub monto_espera: Option<f64>,
    #[serde(rename = "fechaEspera", skip_serializing_if = "Option::is_none")]
    pub fecha_espera: Option<String>,
    #[serde(rename = "fechaEfectuado", skip_serializing_if = "Option::is_none")]
    pub fecha_efectuado: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evento_id: Option<String>,
}

/// Replaces a select value with its canonical spelling.
fn canonical<T: FromStr<Err = AppError> + fmt::Display>(
    value: &mut Option<String>,
) -> Result<(), AppError> {
    if let Some(raw) = value.as_mut() {
        *raw = raw.parse::<T>()?.to_string();
    }
    Ok(())
}

/// Largest amount accepted on input, in currency units.
pub const MAX_MONTO: f64 = 1e12;

fn check_monto(monto: Option<f64>) -> Result<(), AppError> {
    match monto {
        Some(m) if !m.is_finite() || m <= 0.0 => Err(AppError::Validation(
            "montoEspera must be a positive amount".into(),
        )),
        Some(m) if m > MAX_MONTO => Err(AppError::Validation(format!(
            "montoEspera must not exceed {MAX_MONTO}"
        ))),
        _ => Ok(()),
    }
}

impl MovimientoInput {
    fn canonicalize(&mut self) -> Result<(), AppError> {
        canonical::<TipoMovimiento>(&mut self.tipo)?;
        canonical::<Moneda>(&mut self.moneda)?;
        canonical::<Especie>(&mut self.especie)?;
        canonical::<Categoria>(&mut self.categoria)?;
        check_monto(self.monto_espera)?;
        trim(&mut self.fecha_efectuado);
        trim(&mut self.evento_id);
        Ok(())
    }
}

pub struct Contabilidad;

impl Resource for Contabilidad {
    const COLLECTION: &'static str = "contabilidad";
    const LABEL: &'static str = "movimiento";
    const SEARCH_FIELDS: &'static [&'static str] = &["descripcion"];
    const DEFAULT_SORT: &'static str = "-fechaEspera";

    type Record = Movimiento;
    type Input = MovimientoInput;

    fn validate_new(input: &mut MovimientoInput) -> Result<(), AppError> {
        require("type", &mut input.tipo)?;
        require("moneda", &mut input.moneda)?;
        if input.monto_espera.is_none() {
            return Err(AppError::required("montoEspera"));
        }
        require("fechaEspera", &mut input.fecha_espera)?;
        input.canonicalize()
    }

    fn validate_patch(input: &mut MovimientoInput) -> Result<(), AppError> {
        require_if_present("type", &mut input.tipo)?;
        require_if_present("moneda", &mut input.moneda)?;
        require_if_present("fechaEspera", &mut input.fecha_espera)?;
        input.canonicalize()
    }

    fn filters(params: &HashMap<String, String>, mut filter: Filter) -> Result<Filter, AppError> {
        if let Some(tipo) = param(params, "type") {
            filter = filter.eq("type", tipo.parse::<TipoMovimiento>()?.as_str());
        }
        if let Some(moneda) = param(params, "moneda") {
            filter = filter.eq("moneda", moneda.parse::<Moneda>()?.as_str());
        }
        if let Some(especie) = param(params, "especie") {
            filter = filter.eq("especie", especie.parse::<Especie>()?.as_str());
        }
        if let Some(categoria) = param(params, "categoria") {
            filter = filter.eq("categoria", categoria.parse::<Categoria>()?.as_str());
        }
        match param(params, "estado") {
            Some("pendiente") => filter = filter.is_blank("fechaEfectuado"),
            Some("efectuado") => filter = filter.is_set("fechaEfectuado"),
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "estado must be pendiente or efectuado, got '{other}'"
                )));
            }
            None => {}
        }
        if let Some(evento) = param(params, "evento_id") {
            filter = filter.eq("evento_id", evento);
        }
        if let Some(desde) = param(params, "desde") {
            filter = filter.gte("fechaEspera", desde);
        }
        if let Some(hasta) = param(params, "hasta") {
            filter = filter.lte("fechaEspera", &end_of_day(hasta));
        }
        Ok(filter)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Balance {
    pub cobros: usize,
    pub pagos: usize,
    pub total_cobros: f64,
    pub total_pagos: f64,
    pub balance: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    cobros: usize,
    pagos: usize,
    cobros_cents: i128,
    pagos_cents: i128,
}

/// Stored records are not bounded, so the conversion and the sums saturate
/// instead of overflowing.
fn to_cents(amount: Option<f64>) -> i128 {
    match amount {
        Some(a) if a.is_finite() => (a * 100.0).round() as i128,
        _ => 0,
    }
}

fn from_cents(cents: i128) -> f64 {
    cents as f64 / 100.0
}

impl Tally {
    fn add(&mut self, tipo: TipoMovimiento, monto: Option<f64>) {
        match tipo {
            TipoMovimiento::Cobro => {
                self.cobros += 1;
                self.cobros_cents = self.cobros_cents.saturating_add(to_cents(monto));
            }
            TipoMovimiento::Pago => {
                self.pagos += 1;
                self.pagos_cents = self.pagos_cents.saturating_add(to_cents(monto));
            }
        }
    }

    fn finish(self) -> Balance {
        Balance {
            cobros: self.cobros,
            pagos: self.pagos,
            total_cobros: from_cents(self.cobros_cents),
            total_pagos: from_cents(self.pagos_cents),
            balance: from_cents(self.cobros_cents.saturating_sub(self.pagos_cents)),
        }
    }
}

/// Income/expense counts and totals for records the caller has already
/// narrowed to one currency. Records without a type are ignored.
pub fn balance<'a, I>(movimientos: I) -> Balance
where
    I: IntoIterator<Item = &'a Movimiento>,
{
    let mut tally = Tally::default();
    for movimiento in movimientos {
        if let Some(tipo) = movimiento.tipo {
            tally.add(tipo, movimiento.monto());
        }
    }
    tally.finish()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceMoneda {
    pub moneda: Moneda,
    #[serde(flatten)]
    pub balance: Balance,
}

/// One balance per currency present, in a stable order.
pub fn balances_por_moneda(movimientos: &[Movimiento]) -> Vec<BalanceMoneda> {
    let mut groups: BTreeMap<Moneda, Vec<&Movimiento>> = BTreeMap::new();
    for movimiento in movimientos {
        if let Some(moneda) = movimiento.moneda {
            groups.entry(moneda).or_default().push(movimiento);
        }
    }
    groups
        .into_iter()
        .map(|(moneda, group)| BalanceMoneda {
            moneda,
            balance: balance(group),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceCategoria {
    pub categoria: Option<Categoria>,
    #[serde(flatten)]
    pub balance: Balance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReporteMoneda {
    pub moneda: Moneda,
    pub total: Balance,
    pub pendiente: Balance,
    pub efectuado: Balance,
    pub por_categoria: Vec<BalanceCategoria>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reporte {
    pub monedas: Vec<ReporteMoneda>,
    /// Records skipped for lacking a valid currency or type.
    pub descartados: usize,
}

#[derive(Default)]
struct MonedaTallies {
    total: Tally,
    pendiente: Tally,
    efectuado: Tally,
    por_categoria: BTreeMap<Option<Categoria>, Tally>,
}

pub fn reporte(movimientos: &[Movimiento]) -> Reporte {
    let mut by_moneda: BTreeMap<Moneda, MonedaTallies> = BTreeMap::new();
    let mut descartados = 0;

    for movimiento in movimientos {
        let (Some(moneda), Some(tipo)) = (movimiento.moneda, movimiento.tipo) else {
            descartados += 1;
            continue;
        };
        let monto = movimiento.monto();
        let tallies = by_moneda.entry(moneda).or_default();
        tallies.total.add(tipo, monto);
        if movimiento.pendiente() {
            tallies.pendiente.add(tipo, monto);
        } else {
            tallies.efectuado.add(tipo, monto);
        }
        tallies
            .por_categoria
            .entry(movimiento.categoria)
            .or_default()
            .add(tipo, monto);
    }

    let monedas = by_moneda
        .into_iter()
        .map(|(moneda, tallies)| ReporteMoneda {
            moneda,
            total: tallies.total.finish(),
            pendiente: tallies.pendiente.finish(),
            efectuado: tallies.efectuado.finish(),
            por_categoria: tallies
                .por_categoria
                .into_iter()
                .map(|(categoria, tally)| BalanceCategoria {
                    categoria,
                    balance: tally.finish(),
                })
                .collect(),
        })
        .collect();

    Reporte {
        monedas,
        descartados,
    }
}
