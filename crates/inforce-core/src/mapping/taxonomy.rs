//! The closed set of canonical ledger columns and their known header spellings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of canonical fields.
pub const FIELD_COUNT: usize = 10;

/// A semantic ledger column that vendor headers are mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Year,
    Age,
    Premium,
    DeathBenefit,
    CashValue,
    SurrenderCharge,
    NetSurrenderValue,
    LoanBalance,
    LoanInterest,
    Withdrawals,
}

impl CanonicalField {
    /// Every field, in slot order.
    pub const ALL: [CanonicalField; FIELD_COUNT] = [
        CanonicalField::Year,
        CanonicalField::Age,
        CanonicalField::Premium,
        CanonicalField::DeathBenefit,
        CanonicalField::CashValue,
        CanonicalField::SurrenderCharge,
        CanonicalField::NetSurrenderValue,
        CanonicalField::LoanBalance,
        CanonicalField::LoanInterest,
        CanonicalField::Withdrawals,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Year => "year",
            CanonicalField::Age => "age",
            CanonicalField::Premium => "premium",
            CanonicalField::DeathBenefit => "death_benefit",
            CanonicalField::CashValue => "cash_value",
            CanonicalField::SurrenderCharge => "surrender_charge",
            CanonicalField::NetSurrenderValue => "net_surrender_value",
            CanonicalField::LoanBalance => "loan_balance",
            CanonicalField::LoanInterest => "loan_interest",
            CanonicalField::Withdrawals => "withdrawals",
        }
    }

    /// Header spellings seen in carrier illustrations, most specific first.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            CanonicalField::Year => &["Policy Year", "Year", "Yr"],
            CanonicalField::Age => &["Age", "Insured Age", "Attained Age"],
            CanonicalField::Premium => &[
                "Planned Premium",
                "Scheduled Premium",
                "Annual Outlay",
                "Modal Premium",
                "Premium Outlay",
            ],
            CanonicalField::DeathBenefit => &["Death Benefit", "Face Amount", "Specified Amount"],
            CanonicalField::CashValue => &[
                "Account Value",
                "Accumulation Value",
                "Cash Value",
                "Policy Value",
            ],
            CanonicalField::SurrenderCharge => &[
                "Surrender Charge",
                "Surr Chg",
                "Surrender Fee",
                "Surrender Penalty",
            ],
            CanonicalField::NetSurrenderValue => &[
                "Net Cash Surrender Value",
                "Net Surrender Value",
                "Net CSV",
                "Net SV",
            ],
            CanonicalField::LoanBalance => &[
                "Policy Indebtedness",
                "Outstanding Loan",
                "Policy Loan",
                "Loan Balance",
                "Policy Debt",
            ],
            CanonicalField::LoanInterest => &["Accrued Loan Interest", "Loan Interest"],
            CanonicalField::Withdrawals => &["Withdrawal", "Loan/Withdrawal", "Distribution"],
        }
    }

    /// The canonical name in header form ("net surrender value").
    pub fn header_form(self) -> String {
        self.name().replace('_', " ")
    }

    /// Slot of this field in fixed-size lookup tables.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A mapped column and the similarity that won it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnMatch {
    pub column: usize,
    pub score: f64,
}

/// Canonical field to column index, one slot per field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    slots: [Option<ColumnMatch>; FIELD_COUNT],
}

impl ColumnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.slots[field.index()].map(|m| m.column)
    }

    pub fn get_match(&self, field: CanonicalField) -> Option<ColumnMatch> {
        self.slots[field.index()]
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.slots[field.index()].is_some()
    }

    pub fn insert(&mut self, field: CanonicalField, m: ColumnMatch) -> Option<ColumnMatch> {
        self.slots[field.index()].replace(m)
    }

    pub fn remove(&mut self, field: CanonicalField) -> Option<ColumnMatch> {
        self.slots[field.index()].take()
    }

    /// Number of mapped fields.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mapped fields in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, ColumnMatch)> + '_ {
        CanonicalField::ALL
            .iter()
            .zip(self.slots.iter())
            .filter_map(|(f, s)| s.map(|m| (*f, m)))
    }
}
