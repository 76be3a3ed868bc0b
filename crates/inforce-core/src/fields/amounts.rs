//! Currency fields: current loan balance and face amount structure.

use super::patterns::{FACE_AMOUNT, LOAN_BALANCE};
use super::{ExtractionMatch, FieldExtractor, LABELLED_CONFIDENCE, source_line};
use crate::mapping::clean_number;

/// Outstanding policy loan today.
#[derive(Debug, Default)]
pub struct LoanBalanceExtractor;

impl LoanBalanceExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for LoanBalanceExtractor {
    type Output = ExtractionMatch<f64>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        LOAN_BALANCE
            .captures_iter(text)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let value = clean_number(caps.get(1)?.as_str())?;
                (value >= 0.0).then(|| {
                    ExtractionMatch::new(
                        value,
                        LABELLED_CONFIDENCE,
                        source_line(text, full.start(), full.end()),
                    )
                    .with_position(full.start(), full.end())
                })
            })
            .collect()
    }
}

/// "Specified Amount $750,000" style description of the face amount.
#[derive(Debug, Default)]
pub struct FaceAmountExtractor;

impl FaceAmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn title_case(words: &str) -> String {
    words
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

impl FieldExtractor for FaceAmountExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        FACE_AMOUNT
            .captures_iter(text)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let kind = title_case(caps.get(1)?.as_str());
                let amount = caps.get(2)?.as_str().trim_end_matches(',');
                clean_number(amount)?;
                Some(
                    ExtractionMatch::new(
                        format!("{} Amount ${}", kind, amount),
                        LABELLED_CONFIDENCE,
                        source_line(text, full.start(), full.end()),
                    )
                    .with_position(full.start(), full.end()),
                )
            })
            .collect()
    }
}
