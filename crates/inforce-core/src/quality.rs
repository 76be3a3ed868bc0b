//! Quality signals for an extracted ledger grid.
//!
//! Every signal lies in [0, 1]. Cells that do not parse are "no value":
//! they are excluded from counts, never coerced to zero.

use serde::{Deserialize, Serialize};

use crate::mapping::{CanonicalField, ColumnMap, FIELD_COUNT, clean_number};

/// Quality signals of one candidate table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub header_strength: f64,
    pub shape_fit: f64,
    pub recon_success: f64,
    pub rows_parsed_pct: f64,
}

/// The structural sub-checks behind `shape_fit`; `None` when not applicable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeChecks {
    pub year_increments: Option<f64>,
    pub surrender_trend: Option<f64>,
    pub net_within_cash: Option<f64>,
}

impl ShapeChecks {
    /// Mean of the applicable checks, 0.0 when none apply.
    pub fn score(&self) -> f64 {
        let checks: Vec<f64> = [self.year_increments, self.surrender_trend, self.net_within_cash]
            .into_iter()
            .flatten()
            .collect();
        if checks.is_empty() {
            0.0
        } else {
            checks.iter().sum::<f64>() / checks.len() as f64
        }
    }
}

/// Outcome of the net surrender value identity over all rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub evaluated: usize,
    pub passed: usize,
    /// Root-mean-square residual, `None` when no row was evaluable.
    pub rmse: Option<f64>,
}

impl Reconciliation {
    pub fn score(&self) -> f64 {
        if self.evaluated == 0 {
            0.0
        } else {
            self.passed as f64 / self.evaluated as f64
        }
    }

    pub fn failed(&self) -> usize {
        self.evaluated - self.passed
    }
}

/// All signals for one grid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityReport {
    pub metrics: QualityMetrics,
    pub shape: ShapeChecks,
    pub reconciliation: Reconciliation,
    pub year_sequence_ok: bool,
}

/// Score the data rows (header excluded) of a mapped grid.
pub fn assess(rows: &[Vec<String>], columns: &ColumnMap, tolerance: f64) -> QualityReport {
    let shape = shape_checks(rows, columns);
    let reconciliation = reconcile(rows, columns, tolerance);
    QualityReport {
        metrics: QualityMetrics {
            header_strength: header_strength(columns),
            shape_fit: shape.score(),
            recon_success: reconciliation.score(),
            rows_parsed_pct: rows_parsed_pct(rows, columns),
        },
        shape,
        reconciliation,
        year_sequence_ok: year_sequence_ok(rows, columns),
    }
}

/// Mapped fields over the size of the canonical taxonomy.
pub fn header_strength(columns: &ColumnMap) -> f64 {
    columns.len() as f64 / FIELD_COUNT as f64
}

fn value(row: &[String], columns: &ColumnMap, field: CanonicalField) -> Option<f64> {
    columns
        .get(field)
        .and_then(|c| row.get(c))
        .and_then(|cell| clean_number(cell))
}

/// Parsed values of one column, in row order.
pub fn column_values(rows: &[Vec<String>], columns: &ColumnMap, field: CanonicalField) -> Vec<f64> {
    rows.iter()
        .filter_map(|row| value(row, columns, field))
        .collect()
}

fn fraction(hits: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| hits as f64 / total as f64)
}

pub fn shape_checks(rows: &[Vec<String>], columns: &ColumnMap) -> ShapeChecks {
    let years = column_values(rows, columns, CanonicalField::Year);
    let year_increments = fraction(
        years.windows(2).filter(|w| w[1] - w[0] == 1.0).count(),
        years.len().saturating_sub(1),
    );

    let charges = column_values(rows, columns, CanonicalField::SurrenderCharge);
    // A trend needs at least two parsed charges.
    let surrender_trend = match charges.as_slice() {
        [] | [_] => None,
        [.., last] if *last == 0.0 => Some(1.0),
        _ => fraction(
            charges.windows(2).filter(|w| w[1] <= w[0]).count(),
            charges.len() - 1,
        ),
    };

    let pairs: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|row| {
            Some((
                value(row, columns, CanonicalField::NetSurrenderValue)?,
                value(row, columns, CanonicalField::CashValue)?,
            ))
        })
        .collect();
    let net_within_cash = fraction(pairs.iter().filter(|(nsv, cv)| nsv <= cv).count(), pairs.len());

    ShapeChecks {
        year_increments,
        surrender_trend,
        net_within_cash,
    }
}

/// Check `nsv == cv - sc - loan - interest` within `tolerance * |nsv|`.
///
/// Needs net surrender value, cash value and surrender charge columns;
/// loan balance and loan interest count as zero when absent or blank.
pub fn reconcile(rows: &[Vec<String>], columns: &ColumnMap, tolerance: f64) -> Reconciliation {
    let required = [
        CanonicalField::NetSurrenderValue,
        CanonicalField::CashValue,
        CanonicalField::SurrenderCharge,
    ];
    if !required.iter().all(|f| columns.contains(*f)) {
        return Reconciliation::default();
    }

    let mut evaluated = 0;
    let mut passed = 0;
    let mut squared = 0.0;
    for row in rows {
        let (Some(nsv), Some(cv), Some(sc)) = (
            value(row, columns, CanonicalField::NetSurrenderValue),
            value(row, columns, CanonicalField::CashValue),
            value(row, columns, CanonicalField::SurrenderCharge),
        ) else {
            continue;
        };
        let loan = value(row, columns, CanonicalField::LoanBalance).unwrap_or(0.0);
        let interest = value(row, columns, CanonicalField::LoanInterest).unwrap_or(0.0);

        let residual = nsv - (cv - sc - loan - interest);
        evaluated += 1;
        squared += residual * residual;
        if residual.abs() <= tolerance * nsv.abs() {
            passed += 1;
        }
    }

    Reconciliation {
        evaluated,
        passed,
        rmse: (evaluated > 0).then(|| (squared / evaluated as f64).sqrt()),
    }
}

/// Share of data rows carrying a parsed year (when mapped) and at least
/// one other parsed mapped value.
pub fn rows_parsed_pct(rows: &[Vec<String>], columns: &ColumnMap) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let has_year = columns.contains(CanonicalField::Year);
    let parsed = rows
        .iter()
        .filter(|row| {
            let year_ok = !has_year || value(row, columns, CanonicalField::Year).is_some();
            let other_ok = columns
                .iter()
                .filter(|(f, _)| *f != CanonicalField::Year)
                .any(|(f, _)| value(row, columns, f).is_some());
            year_ok && other_ok
        })
        .count();
    parsed as f64 / rows.len() as f64
}

/// At least two years parse and each steps by exactly one.
pub fn year_sequence_ok(rows: &[Vec<String>], columns: &ColumnMap) -> bool {
    let years = column_values(rows, columns, CanonicalField::Year);
    years.len() >= 2 && years.windows(2).all(|w| w[1] - w[0] == 1.0)
}
