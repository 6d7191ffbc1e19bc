use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::Serialize;

use super::domain::{Barcode, Estado, Package, Tipo};
use super::store::{Direction, Filter, PackageQuery, TimeField};

/// Calendar month `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a YYYY-MM month")]
pub struct PeriodError(pub String);

impl Period {
    /// Parses a `YYYY-MM` selector.
    pub fn from_month(selector: &str) -> Result<Self, PeriodError> {
        let invalid = || PeriodError(selector.to_string());
        let (year, month) = selector.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        Self::starting(first).ok_or_else(invalid)
    }

    /// Month that contains `instant`.
    pub fn containing(instant: DateTime<Utc>) -> Self {
        let first = NaiveDate::from_ymd_opt(instant.year(), instant.month(), 1)
            .unwrap_or(NaiveDate::MIN);
        Self::starting(first).unwrap_or(Self {
            start: instant,
            end: instant,
        })
    }

    fn starting(first: NaiveDate) -> Option<Self> {
        let next = first.checked_add_months(Months::new(1))?;
        Some(Self {
            start: first.and_hms_opt(0, 0, 0)?.and_utc(),
            end: next.and_hms_opt(0, 0, 0)?.and_utc(),
        })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// `YYYY-MM` label of the month.
    pub fn label(&self) -> String {
        self.start.format("%Y-%m").to_string()
    }

    pub(crate) fn query(&self, field: TimeField) -> PackageQuery {
        PackageQuery::new()
            .filter(Filter::Within {
                field,
                start: self.start,
                end: self.end,
            })
            .order_by(field, Direction::Ascending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub tipo: Tipo,
    pub tipo_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispositionCount {
    pub estado: Estado,
    pub estado_label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeCounts {
    pub by_type: Vec<TypeCount>,
    pub total: usize,
}

impl IntakeCounts {
    pub fn count(&self, tipo: Tipo) -> usize {
        self.by_type
            .iter()
            .find(|entry| entry.tipo == tipo)
            .map_or(0, |entry| entry.count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub by_disposition: Vec<DispositionCount>,
    pub total: usize,
}

impl OutcomeCounts {
    pub fn count(&self, estado: Estado) -> usize {
        self.by_disposition
            .iter()
            .find(|entry| entry.estado == estado)
            .map_or(0, |entry| entry.count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyReport {
    pub month: String,
    pub period: Period,
    pub intake: IntakeCounts,
    pub outcomes: OutcomeCounts,
    /// Records carrying both `entregadoAt` and `devueltoAt`.
    pub anomalies: Vec<Barcode>,
}

/// Builds the report from the three period queries: intakes, deliveries and
/// returns. Rows outside the period are ignored.
pub fn aggregate(
    period: Period,
    ingresados: &[Package],
    entregados: &[Package],
    devueltos: &[Package],
) -> MonthlyReport {
    let by_type: Vec<TypeCount> = Tipo::ALL
        .into_iter()
        .map(|tipo| TypeCount {
            tipo,
            tipo_label: tipo.label(),
            count: ingresados
                .iter()
                .filter(|package| package.tipo == tipo && period.contains(package.fecha_ingreso))
                .count(),
        })
        .collect();
    let intake_total = by_type.iter().map(|entry| entry.count).sum();

    let delivered = entregados
        .iter()
        .filter(|package| package.entregado_at.is_some_and(|at| period.contains(at)))
        .count();
    let returned = devueltos
        .iter()
        .filter(|package| package.devuelto_at.is_some_and(|at| period.contains(at)))
        .count();

    let by_disposition = vec![
        DispositionCount {
            estado: Estado::Entregado,
            estado_label: Estado::Entregado.label(),
            count: delivered,
        },
        DispositionCount {
            estado: Estado::Devuelto,
            estado_label: Estado::Devuelto.label(),
            count: returned,
        },
    ];

    let anomalies: BTreeSet<Barcode> = entregados
        .iter()
        .chain(devueltos)
        .filter(|package| package.has_conflicting_outcomes())
        .map(|package| package.barcode.clone())
        .collect();

    MonthlyReport {
        month: period.label(),
        period,
        intake: IntakeCounts {
            by_type,
            total: intake_total,
        },
        outcomes: OutcomeCounts {
            by_disposition,
            total: delivered + returned,
        },
        anomalies: anomalies.into_iter().collect(),
    }
}
