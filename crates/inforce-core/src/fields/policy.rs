//! Policy descriptors: death benefit pattern and insured ages.

use regex::Regex;

use super::patterns::{CURRENT_AGE, DEATH_BENEFIT_LABELLED, DEATH_BENEFIT_PLAIN, ISSUE_AGE};
use super::{ExtractionMatch, FieldExtractor, LABELLED_CONFIDENCE, source_line};

/// Normalize an option word ("B", "option 2", "increasing") to a pattern name.
fn benefit_pattern(raw: &str) -> Option<&'static str> {
    let raw = raw.to_ascii_lowercase();
    let key = raw.trim_start_matches("option").trim();
    match key {
        "level" | "a" | "1" => Some("Level"),
        "increasing" | "b" | "2" => Some("Increasing"),
        "c" | "3" => Some("Return of Premium"),
        _ if key.starts_with("return") => Some("Return of Premium"),
        _ => None,
    }
}

/// Level, increasing or return-of-premium death benefit.
#[derive(Debug, Default)]
pub struct DeathBenefitExtractor;

impl DeathBenefitExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for DeathBenefitExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();
        for (pattern, confidence) in [
            (&*DEATH_BENEFIT_LABELLED, LABELLED_CONFIDENCE),
            (&*DEATH_BENEFIT_PLAIN, 0.8),
        ] {
            for caps in pattern.captures_iter(text) {
                let (Some(full), Some(value)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                if let Some(name) = benefit_pattern(value.as_str()) {
                    results.push(
                        ExtractionMatch::new(
                            name.to_string(),
                            confidence,
                            source_line(text, full.start(), full.end()),
                        )
                        .with_position(full.start(), full.end()),
                    );
                }
            }
        }
        results
    }
}

/// Which age an [`AgeExtractor`] looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeKind {
    Issue,
    Current,
}

/// Insured age at issue or today.
#[derive(Debug)]
pub struct AgeExtractor {
    kind: AgeKind,
}

impl AgeExtractor {
    pub fn new(kind: AgeKind) -> Self {
        Self { kind }
    }

    fn pattern(&self) -> &'static Regex {
        match self.kind {
            AgeKind::Issue => &ISSUE_AGE,
            AgeKind::Current => &CURRENT_AGE,
        }
    }
}

impl FieldExtractor for AgeExtractor {
    type Output = ExtractionMatch<i32>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        self.pattern()
            .captures_iter(text)
            .filter_map(|caps| {
                let full = caps.get(0)?;
                let age: i32 = caps.get(1)?.as_str().parse().ok()?;
                (0..=120).contains(&age).then(|| {
                    ExtractionMatch::new(
                        age,
                        LABELLED_CONFIDENCE,
                        source_line(text, full.start(), full.end()),
                    )
                    .with_position(full.start(), full.end())
                })
            })
            .collect()
    }
}
