//! Rule-based extraction of narrative illustration fields.

pub mod amounts;
pub mod patterns;
pub mod policy;
pub mod rates;

pub use amounts::{FaceAmountExtractor, LoanBalanceExtractor};
pub use policy::{AgeExtractor, AgeKind, DeathBenefitExtractor};
pub use rates::{CreditingRateExtractor, LoanInterestExtractor};

use tracing::debug;

use crate::error::Issue;
use crate::mapping::CanonicalField;
use crate::models::result::{Fields, ValueWithMeta};
use crate::quality::column_values;
use crate::table::ExtractedTable;

/// Confidence of a value found next to its label.
pub const LABELLED_CONFIDENCE: f64 = 0.95;

/// Confidence of a value read from the ledger table instead of the text.
pub const LEDGER_CONFIDENCE: f64 = 0.70;

pub const LEDGER_SOURCE: &str = "ledger";

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Extraction context with confidence scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f64,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source line that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f64, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}

impl From<ExtractionMatch<f64>> for ValueWithMeta {
    fn from(m: ExtractionMatch<f64>) -> Self {
        ValueWithMeta {
            value: m.value,
            source: m.source,
            confidence: m.confidence,
        }
    }
}

/// The trimmed line of `text` holding byte range `start..end`.
pub(crate) fn source_line(text: &str, start: usize, end: usize) -> &str {
    let from = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let to = text[end..].find('\n').map_or(text.len(), |i| end + i);
    text[from..to].trim()
}

/// Fields found in the document text, plus notes for the missing ones.
#[derive(Debug, Clone, Default)]
pub struct FieldReport {
    pub fields: Fields,
    pub issues: Vec<Issue>,
}

/// Extract every narrative field from `text`, falling back to the selected
/// ledger table for loan balance and current age.
pub fn extract_fields(text: &str, table: Option<&ExtractedTable>) -> FieldReport {
    let mut fields = Fields {
        crediting_rate: CreditingRateExtractor::new().extract(text).map(Into::into),
        loan_balance_today: LoanBalanceExtractor::new().extract(text).map(Into::into),
        loan_interest_today: LoanInterestExtractor::new().extract(text).map(Into::into),
        death_benefit_pattern: DeathBenefitExtractor::new().extract(text).map(|m| m.value),
        face_amount_structure: FaceAmountExtractor::new().extract(text).map(|m| m.value),
        age_at_issue: AgeExtractor::new(AgeKind::Issue).extract(text).map(|m| m.value),
        current_age: AgeExtractor::new(AgeKind::Current).extract(text).map(|m| m.value),
    };

    if let Some(table) = table {
        let rows = table.data_rows();
        if fields.loan_balance_today.is_none() {
            fields.loan_balance_today = column_values(rows, &table.columns, CanonicalField::LoanBalance)
                .first()
                .map(|value| ValueWithMeta {
                    value: *value,
                    source: LEDGER_SOURCE.to_string(),
                    confidence: LEDGER_CONFIDENCE,
                });
        }
        if fields.current_age.is_none() {
            fields.current_age = column_values(rows, &table.columns, CanonicalField::Age)
                .first()
                .map(|age| age.round() as i32);
        }
    }

    let missing = [
        ("crediting_rate", fields.crediting_rate.is_none()),
        ("loan_balance_today", fields.loan_balance_today.is_none()),
        ("loan_interest_today", fields.loan_interest_today.is_none()),
        ("death_benefit_pattern", fields.death_benefit_pattern.is_none()),
        ("face_amount_structure", fields.face_amount_structure.is_none()),
        ("age_at_issue", fields.age_at_issue.is_none()),
        ("current_age", fields.current_age.is_none()),
    ];
    let issues: Vec<Issue> = missing
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| Issue::FieldNotFound(name))
        .collect();
    debug!("Narrative fields: {} missing", issues.len());

    FieldReport { fields, issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ColumnMapper;
    use crate::quality::QualityMetrics;
    use crate::table::StrategyKind;
    use pretty_assertions::assert_eq;

    const NARRATIVE: &str = "\
IN FORCE LEDGER
Using 4.74% illustrated crediting rate and current charges
Death Benefit Option: Increasing
Specified Amount: $750,000
Issue Age: 60   Current Age: 62
Current Loan $136,713.00
Variable Loan interest is charged at an initial illustrated annual rate of 4.25%.";

    fn ledger(header: &[&str], rows: &[&[&str]]) -> ExtractedTable {
        let mut grid = vec![header.iter().map(|c| c.to_string()).collect::<Vec<_>>()];
        grid.extend(rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()));
        let columns = ColumnMapper::default().map_header(&grid[0]).columns;
        ExtractedTable {
            page: 0,
            strategy: StrategyKind::Stream,
            grid,
            columns,
            metrics: QualityMetrics::default(),
            score: 0.0,
        }
    }

    #[test]
    fn test_all_fields_from_text() {
        let report = extract_fields(NARRATIVE, None);
        let fields = report.fields;

        let rate = fields.crediting_rate.unwrap();
        assert_eq!(rate.value, 4.74);
        assert_eq!(rate.confidence, LABELLED_CONFIDENCE);
        assert_eq!(rate.source, "Using 4.74% illustrated crediting rate and current charges");

        assert_eq!(fields.loan_balance_today.unwrap().value, 136713.0);
        assert_eq!(fields.loan_interest_today.unwrap().value, 4.25);
        assert_eq!(fields.death_benefit_pattern.as_deref(), Some("Increasing"));
        assert_eq!(fields.face_amount_structure.as_deref(), Some("Specified Amount $750,000"));
        assert_eq!(fields.age_at_issue, Some(60));
        assert_eq!(fields.current_age, Some(62));
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_ledger_fallbacks() {
        let table = ledger(
            &["Year", "Age", "Loan Balance", "Cash Value"],
            &[&["2025", "61", "", "100"], &["2026", "62", "5,000", "120"]],
        );
        let report = extract_fields("nothing useful", Some(&table));

        let loan = report.fields.loan_balance_today.unwrap();
        assert_eq!(loan.value, 5000.0);
        assert_eq!(loan.source, LEDGER_SOURCE);
        assert_eq!(loan.confidence, LEDGER_CONFIDENCE);
        assert_eq!(report.fields.current_age, Some(61));
    }

    #[test]
    fn test_missing_fields_are_noted_not_invented() {
        let report = extract_fields("", None);
        assert_eq!(report.fields, Fields::default());
        assert_eq!(report.issues.len(), 7);
        assert!(report.issues.contains(&Issue::FieldNotFound("crediting_rate")));
    }

    #[test]
    fn test_source_line() {
        let text = "first\n  second line  \nthird";
        let start = text.find("second").unwrap();
        assert_eq!(source_line(text, start, start + 6), "second line");
        assert_eq!(source_line(text, 0, 5), "first");
    }
}
