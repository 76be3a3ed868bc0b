//! Identifying-information detection and redaction.

mod locator;
mod patterns;
mod recognizer;
mod redactor;

pub use locator::{PageRedaction, PiiLocation, PiiLocator, PiiSpan};
pub use patterns::{PatternRecognizer, luhn_valid};
pub use recognizer::{EntityCategory, EntityRecognizer, EntitySpan};
pub use redactor::{Redaction, Redactor, page_strings};
