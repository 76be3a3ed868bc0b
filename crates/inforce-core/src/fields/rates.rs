//! Percentage fields: crediting rate and loan interest rate.

use regex::Regex;

use super::patterns::{CREDITING_RATE_AFTER, CREDITING_RATE_BEFORE, LOAN_INTEREST};
use super::{ExtractionMatch, FieldExtractor, LABELLED_CONFIDENCE, source_line};

/// Percent values captured by any of `patterns`, in text order.
fn percent_matches(text: &str, patterns: &[&Regex]) -> Vec<ExtractionMatch<f64>> {
    let mut results: Vec<ExtractionMatch<f64>> = Vec::new();
    for pattern in patterns {
        for caps in pattern.captures_iter(text) {
            let (Some(full), Some(rate)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Ok(value) = rate.as_str().parse::<f64>() else {
                continue;
            };
            if !(0.0..=30.0).contains(&value) {
                continue;
            }
            results.push(
                ExtractionMatch::new(
                    value,
                    LABELLED_CONFIDENCE,
                    source_line(text, full.start(), full.end()),
                )
                .with_position(full.start(), full.end()),
            );
        }
    }
    results.sort_by_key(|m| m.position);
    results.dedup_by(|a, b| a.value == b.value && a.source == b.source);
    results
}

/// Illustrated crediting rate, in percent.
#[derive(Debug, Default)]
pub struct CreditingRateExtractor;

impl CreditingRateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for CreditingRateExtractor {
    type Output = ExtractionMatch<f64>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        percent_matches(text, &[&*CREDITING_RATE_BEFORE, &*CREDITING_RATE_AFTER])
    }
}

/// Policy loan interest rate, in percent.
#[derive(Debug, Default)]
pub struct LoanInterestExtractor;

impl LoanInterestExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for LoanInterestExtractor {
    type Output = ExtractionMatch<f64>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        percent_matches(text, &[&*LOAN_INTEREST])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crediting_rate_either_side_of_label() {
        let extractor = CreditingRateExtractor::new();
        assert_eq!(
            extractor.extract("Using 4.74% illustrated crediting rate").unwrap().value,
            4.74
        );
        assert_eq!(
            extractor.extract("Current crediting rate: 5.25%").unwrap().value,
            5.25
        );
        assert!(extractor.extract("Guaranteed rate 2%").is_none());
    }

    #[test]
    fn test_same_statement_found_once() {
        let text = "Assumes 4.5% crediting rate.\nThe crediting rate 4.5% is not guaranteed.";
        let all = CreditingRateExtractor::new().extract_all(text);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].source, "Assumes 4.5% crediting rate.");
    }

    #[test]
    fn test_loan_interest() {
        let text = "Variable Loan interest is charged at an initial illustrated annual rate of 4.25%.";
        let m = LoanInterestExtractor::new().extract(text).unwrap();
        assert_eq!(m.value, 4.25);
        assert_eq!(m.source, text);
        assert!(LoanInterestExtractor::new().extract("Loan interest: see contract").is_none());
    }
}
