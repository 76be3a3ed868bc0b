//! Pattern-based entity recognizer for illustration documents.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use super::recognizer::{EntityCategory, EntityRecognizer, EntitySpan};
use crate::error::PiiError;

lazy_static! {
    pub static ref EMAIL: Regex = Regex::new(
        r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b"
    ).unwrap();

    // NANP: optional +1, area code with or without parentheses
    pub static ref PHONE: Regex = Regex::new(
        r"(?:\+?1[\s.-]?)?(?:\(\d{3}\)\s?|\b\d{3}[\s.-])\d{3}[\s.-]\d{4}\b"
    ).unwrap();

    pub static ref CARD_CANDIDATE: Regex = Regex::new(
        r"\b\d(?:[ -]?\d){12,18}\b"
    ).unwrap();

    pub static ref SSN: Regex = Regex::new(
        r"\b(\d{3})-(\d{2})-(\d{4})\b"
    ).unwrap();

    pub static ref IPV4: Regex = Regex::new(
        r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b"
    ).unwrap();

    // "Insured: Jane Q Public", "Prepared for: JANE PUBLIC"
    pub static ref LABELLED_NAME: Regex = Regex::new(
        r"(?i:\b(?:insured|prepared\s+for|prepared\s+by|policy\s*owner|owner|annuitant|beneficiary|agent|producer|presented\s+by|name))[ \t]*:[ \t]*([A-Z][A-Za-z'.-]*(?:[ \t]+[A-Z][A-Za-z'.-]*){1,3})"
    ).unwrap();

    // A line holding only two to four upper-case words
    pub static ref CAPS_NAME_LINE: Regex = Regex::new(
        r"(?m)^[ \t]*([A-Z][A-Z'.-]+(?:[ \t]+[A-Z][A-Z'.-]*){1,3})[ \t]*$"
    ).unwrap();

    pub static ref STREET_ADDRESS: Regex = Regex::new(
        r"\b\d{1,6}[ \t]+(?:[A-Z][A-Za-z0-9.'-]*[ \t]+){1,4}(?i:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|court|ct|way|place|pl|terrace|circle|cir|parkway|pkwy|highway|hwy)\b\.?"
    ).unwrap();

    pub static ref CITY_STATE_ZIP: Regex = Regex::new(
        r"\b[A-Z][A-Za-z.'-]*(?:[ \t]+[A-Z][A-Za-z.'-]*){0,3},[ \t]*[A-Z]{2}[ \t]+\d{5}(?:-\d{4})?\b"
    ).unwrap();

    pub static ref NRP: Regex = Regex::new(
        r"(?i)\b(?:american|canadian|mexican|chinese|japanese|korean|filipino|vietnamese|indian|hispanic|latino|latina|african|asian|european|christian|catholic|protestant|jewish|muslim|hindu|buddhist|sikh|mormon|democrat|democratic|republican|libertarian)\b"
    ).unwrap();
}

/// Upper-case words that appear on illustration title lines, never in names.
const NAME_STOPWORDS: &[&str] = &[
    "ACCOUNT", "ACCUMULATION", "ADDITIONAL", "AGE", "AND", "ANNUAL", "ASSUMED", "BASIC",
    "BENEFIT", "BENEFITS", "CASH", "CHARGE", "CHARGES", "COMPANY", "COVERAGE", "CURRENT",
    "DATE", "DEATH", "END", "FOR", "FORCE", "GUARANTEED", "ILLUSTRATION", "IN", "INDEXED",
    "INFORCE", "INSURANCE", "INSURED", "INTEREST", "LEDGER", "LIFE", "LOAN", "NET", "NOT",
    "NOTES", "OF", "PAGE", "PLAN", "POLICY", "PREMIUM", "PREMIUMS", "RATE", "REPORT", "RIDER",
    "SCHEDULE", "STATEMENT", "SUMMARY", "SURRENDER", "TABLE", "TERM", "THE", "TOTAL",
    "UNIVERSAL", "VALUE", "VALUES", "VARIABLE", "WHOLE", "YEAR", "YEARS",
];

/// Regex and checksum recognizer covering every [`EntityCategory`].
#[derive(Debug, Default)]
pub struct PatternRecognizer;

impl PatternRecognizer {
    /// Compile the pattern set.
    pub fn new() -> Self {
        lazy_static::initialize(&EMAIL);
        lazy_static::initialize(&PHONE);
        lazy_static::initialize(&CARD_CANDIDATE);
        lazy_static::initialize(&SSN);
        lazy_static::initialize(&IPV4);
        lazy_static::initialize(&LABELLED_NAME);
        lazy_static::initialize(&CAPS_NAME_LINE);
        lazy_static::initialize(&STREET_ADDRESS);
        lazy_static::initialize(&CITY_STATE_ZIP);
        lazy_static::initialize(&NRP);
        Self
    }
}

impl EntityRecognizer for PatternRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, PiiError> {
        let mut spans = Vec::new();
        let mut push = |start: usize, end: usize, category: EntityCategory, score: f64| {
            spans.push(EntitySpan {
                start,
                end,
                category,
                score,
            });
        };

        for m in EMAIL.find_iter(text) {
            push(m.start(), m.end(), EntityCategory::EmailAddress, 1.0);
        }
        for m in PHONE.find_iter(text) {
            push(m.start(), m.end(), EntityCategory::PhoneNumber, 0.75);
        }
        for m in CARD_CANDIDATE.find_iter(text) {
            if luhn_valid(m.as_str()) {
                push(m.start(), m.end(), EntityCategory::CreditCard, 1.0);
            }
        }
        for caps in SSN.captures_iter(text) {
            if ssn_plausible(&caps[1], &caps[2], &caps[3]) {
                if let Some(m) = caps.get(0) {
                    push(m.start(), m.end(), EntityCategory::UsSsn, 0.85);
                }
            }
        }
        for m in IPV4.find_iter(text) {
            push(m.start(), m.end(), EntityCategory::IpAddress, 0.6);
        }
        for caps in LABELLED_NAME.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                push(m.start(), m.end(), EntityCategory::Person, 0.85);
            }
        }
        for caps in CAPS_NAME_LINE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                if is_name_like(m.as_str()) {
                    push(m.start(), m.end(), EntityCategory::Person, 0.6);
                }
            }
        }
        for m in STREET_ADDRESS.find_iter(text) {
            push(m.start(), m.end(), EntityCategory::Location, 0.7);
        }
        for m in CITY_STATE_ZIP.find_iter(text) {
            push(m.start(), m.end(), EntityCategory::Location, 0.7);
        }
        for m in NRP.find_iter(text) {
            push(m.start(), m.end(), EntityCategory::Nrp, 0.5);
        }

        spans.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
        spans.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.category == b.category);
        trace!("Recognized {} entities", spans.len());
        Ok(spans)
    }
}

fn is_name_like(line: &str) -> bool {
    line.split_whitespace().all(|word| {
        let bare = word.trim_matches(|c: char| !c.is_ascii_alphabetic());
        bare.len() >= 2 && !NAME_STOPWORDS.contains(&bare)
    })
}

/// Luhn checksum over the digits of `candidate` (13 - 19 digits).
pub fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                *d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Area, group and serial ranges never issued by the SSA are rejected.
fn ssn_plausible(area: &str, group: &str, serial: &str) -> bool {
    area != "000" && area != "666" && !area.starts_with('9') && group != "00" && serial != "0000"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(text: &str, category: EntityCategory) -> Vec<String> {
        PatternRecognizer::new()
            .recognize(text)
            .unwrap()
            .into_iter()
            .filter(|s| s.category == category)
            .map(|s| text[s.start..s.end].to_string())
            .collect()
    }

    #[test]
    fn test_caps_name_line() {
        let text = "IN FORCE LEDGER\nSANDRA SUMIKO ARIYAMA\nPolicy Year 2025";
        assert_eq!(found(text, EntityCategory::Person), vec!["SANDRA SUMIKO ARIYAMA"]);
    }

    #[test]
    fn test_labelled_name() {
        let text = "Prepared for: Phil Guerrero\nInsured: SANDRA ARIYAMA, Age 60";
        assert_eq!(
            found(text, EntityCategory::Person),
            vec!["Phil Guerrero", "SANDRA ARIYAMA"]
        );
    }

    #[test]
    fn test_contacts() {
        let text = "Call (555) 123-4567 or 555.987.6543, mail agent@example.com from 10.0.0.12";
        assert_eq!(
            found(text, EntityCategory::PhoneNumber),
            vec!["(555) 123-4567", "555.987.6543"]
        );
        assert_eq!(found(text, EntityCategory::EmailAddress), vec!["agent@example.com"]);
        assert_eq!(found(text, EntityCategory::IpAddress), vec!["10.0.0.12"]);
    }

    #[test]
    fn test_ssn_and_card() {
        let text = "SSN 123-45-6789, bad 000-12-3456, card 4111 1111 1111 1111, other 4111 1111 1111 1112";
        assert_eq!(found(text, EntityCategory::UsSsn), vec!["123-45-6789"]);
        assert_eq!(found(text, EntityCategory::CreditCard), vec!["4111 1111 1111 1111"]);
    }

    #[test]
    fn test_locations() {
        let text = "1544 Sprucewood Court\nMorris, IL 60450";
        assert_eq!(
            found(text, EntityCategory::Location),
            vec!["1544 Sprucewood Court", "Morris, IL 60450"]
        );
    }

    #[test]
    fn test_ledger_lines_are_not_names() {
        let text = "CASH VALUE\nNET SURRENDER VALUE\n2025 1,000 900";
        assert!(found(text, EntityCategory::Person).is_empty());
        assert!(found(text, EntityCategory::PhoneNumber).is_empty());
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4111111111111111"));
        assert!(luhn_valid("5500-0000-0000-0004"));
        assert!(!luhn_valid("4111111111111112"));
        assert!(!luhn_valid("1234"));
    }
}
