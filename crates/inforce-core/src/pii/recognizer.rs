//! Entity recognition interface.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PiiError;

/// Categories of personally identifying text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityCategory {
    Person,
    PhoneNumber,
    EmailAddress,
    CreditCard,
    UsSsn,
    IpAddress,
    /// Nationality, religious or political group.
    Nrp,
    Location,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 8] = [
        EntityCategory::Person,
        EntityCategory::PhoneNumber,
        EntityCategory::EmailAddress,
        EntityCategory::CreditCard,
        EntityCategory::UsSsn,
        EntityCategory::IpAddress,
        EntityCategory::Nrp,
        EntityCategory::Location,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityCategory::Person => "PERSON",
            EntityCategory::PhoneNumber => "PHONE_NUMBER",
            EntityCategory::EmailAddress => "EMAIL_ADDRESS",
            EntityCategory::CreditCard => "CREDIT_CARD",
            EntityCategory::UsSsn => "US_SSN",
            EntityCategory::IpAddress => "IP_ADDRESS",
            EntityCategory::Nrp => "NRP",
            EntityCategory::Location => "LOCATION",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected entity: byte offsets into the analyzed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
    pub category: EntityCategory,
    pub score: f64,
}

impl EntitySpan {
    /// The covered slice of `text`, if the offsets are valid for it.
    pub fn slice<'t>(&self, text: &'t str) -> Option<&'t str> {
        text.get(self.start..self.end)
    }
}

/// A named-entity recognition engine.
///
/// Built once at start-up and shared read-only afterwards.
pub trait EntityRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, PiiError>;
}
