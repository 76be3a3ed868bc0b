//! Analysis output returned to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mapping::CanonicalField;
use crate::quality::QualityMetrics;
use crate::snips::ProofSnip;
use crate::table::{StrategyAttempt, StrategyKind};

/// A numeric field with where it came from and how sure we are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueWithMeta {
    pub value: f64,

    /// Source line of the match, or `ledger` for table fallbacks.
    pub source: String,

    /// Confidence score (0.0 - 1.0).
    pub confidence: f64,
}

/// Narrative policy fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crediting_rate: Option<ValueWithMeta>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_balance_today: Option<ValueWithMeta>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_interest_today: Option<ValueWithMeta>,

    /// Level, Increasing or Return of Premium.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_benefit_pattern: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_amount_structure: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_at_issue: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_age: Option<i32>,
}

/// One point of a by-year series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearValue {
    pub year: i32,
    pub value: f64,
}

/// Ledger columns keyed by policy year, in row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub planned_premiums_by_year: Vec<YearValue>,
    pub cash_value_by_year: Vec<YearValue>,
    pub surrender_charge_by_year: Vec<YearValue>,
    pub net_surrender_value_by_year: Vec<YearValue>,
}

impl Series {
    pub fn is_empty(&self) -> bool {
        self.planned_premiums_by_year.is_empty()
            && self.cash_value_by_year.is_empty()
            && self.surrender_charge_by_year.is_empty()
            && self.net_surrender_value_by_year.is_empty()
    }

    /// Merge the four series into one row per year:
    /// premium, cash value, surrender charge, net surrender value.
    pub fn by_year(&self) -> BTreeMap<i32, [Option<f64>; 4]> {
        let mut rows: BTreeMap<i32, [Option<f64>; 4]> = BTreeMap::new();
        let columns = [
            &self.planned_premiums_by_year,
            &self.cash_value_by_year,
            &self.surrender_charge_by_year,
            &self.net_surrender_value_by_year,
        ];
        for (slot, series) in columns.iter().enumerate() {
            for point in series.iter() {
                rows.entry(point.year).or_default()[slot] = Some(point.value);
            }
        }
        rows
    }
}

/// Internal consistency checks of the selected table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Verifications {
    pub net_sv_identity_rmse: Option<f64>,
    pub year_sequence_ok: bool,
    pub rows_parsed_pct: f64,
}

/// A mapped column of the selected table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MappedColumn {
    pub field: CanonicalField,
    pub column: usize,
    pub score: f64,
}

/// Where the selected table came from and how it scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub page: usize,
    pub strategy: StrategyKind,
    pub rows: usize,
    pub columns: Vec<MappedColumn>,
    pub metrics: QualityMetrics,
}

/// Result of analyzing one illustration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub decision_ready: bool,
    pub needs_manual_review: bool,
    pub confidence_overall: f64,
    pub fields: Fields,
    pub series: Series,
    pub verifications: Verifications,
    pub proof_snips: Vec<ProofSnip>,

    /// Redacted copy of the analyzed PDF.
    #[serde(with = "base64_bytes")]
    pub redacted_document: Vec<u8>,

    pub notes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableSummary>,

    /// Every strategy invocation, in order.
    pub attempts: Vec<StrategyAttempt>,

    /// Whether the OCR preflight replaced the input.
    pub ocr_applied: bool,
}

/// Serde adapter storing bytes as standard base64 text.
pub mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_binary_members_are_base64() {
        let result = AnalysisResult {
            redacted_document: b"%PDF".to_vec(),
            proof_snips: vec![ProofSnip {
                label: "first_year_row".to_string(),
                page: 2,
                rect: crate::geometry::Rect::new(0.0, 0.0, 1.0, 1.0),
                image: vec![0x89, b'P', b'N', b'G'],
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["redacted_document"], "JVBERg==");
        assert_eq!(json["proof_snips"][0]["image"], "iVBORw==");

        let back: AnalysisResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let json = serde_json::to_value(Fields {
            current_age: Some(61),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"current_age": 61}));
    }

    #[test]
    fn test_series_by_year() {
        let series = Series {
            cash_value_by_year: vec![
                YearValue { year: 2026, value: 120.0 },
                YearValue { year: 2025, value: 100.0 },
            ],
            net_surrender_value_by_year: vec![YearValue { year: 2025, value: 90.0 }],
            ..Default::default()
        };
        let rows = series.by_year();
        assert_eq!(rows.keys().copied().collect::<Vec<_>>(), vec![2025, 2026]);
        assert_eq!(rows[&2025], [None, Some(100.0), None, Some(90.0)]);
        assert!(!series.is_empty());
    }
}
