//! Regex patterns for illustration narrative fields.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "Using 4.74% illustrated crediting rate", "crediting rate of 4.74%"
    pub static ref CREDITING_RATE_BEFORE: Regex = Regex::new(
        r"(?i)(\d{1,2}(?:\.\d{1,3})?)\s*%[^\n%]{0,60}?\bcrediting\s+rate"
    ).unwrap();

    pub static ref CREDITING_RATE_AFTER: Regex = Regex::new(
        r"(?i)\bcrediting\s+rate\b[^\n\d%]{0,40}?(\d{1,2}(?:\.\d{1,3})?)\s*%"
    ).unwrap();

    // "Current Loan $136,713.00", "Outstanding Policy Loan Balance: 12,000"
    pub static ref LOAN_BALANCE: Regex = Regex::new(
        r"(?i)\b(?:current|outstanding)\s+(?:policy\s+)?loans?(?:\s+balance)?\s*[:=-]?\s*\$?\s*(\d[\d,]*(?:\.\d{2})?)"
    ).unwrap();

    // "Loan interest is charged at an initial illustrated annual rate of 4.25%"
    pub static ref LOAN_INTEREST: Regex = Regex::new(
        r"(?i)\bloan\s+interest\b[^\n%]{0,80}?(\d{1,2}(?:\.\d{1,3})?)\s*%"
    ).unwrap();

    pub static ref DEATH_BENEFIT_LABELLED: Regex = Regex::new(
        r"(?i)\bdeath\s+benefit\s+(?:option|pattern|type)\s*:?\s*(level|increasing|return\s+of\s+premium|option\s+[a-c1-3]\b|[a-c1-3]\b)"
    ).unwrap();

    pub static ref DEATH_BENEFIT_PLAIN: Regex = Regex::new(
        r"(?i)\b(level|increasing)\s+death\s+benefit\b"
    ).unwrap();

    // "Specified Amount: $750,000", "Face Amount $500,000"
    pub static ref FACE_AMOUNT: Regex = Regex::new(
        r"(?i)\b(specified|specify|face|initial\s+face)\s+amount\b\s*:?\s*\$\s*(\d[\d,]*)"
    ).unwrap();

    pub static ref ISSUE_AGE: Regex = Regex::new(
        r"(?i)\b(?:issue\s+age|age\s+at\s+issue)\s*:?\s*(\d{1,3})\b"
    ).unwrap();

    pub static ref CURRENT_AGE: Regex = Regex::new(
        r"(?i)\b(?:current|attained)\s+age\s*:?\s*(\d{1,3})\b"
    ).unwrap();
}
