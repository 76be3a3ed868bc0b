//! Ledger cell parsing.

/// Parse a ledger cell into a number.
///
/// Thousands separators, currency symbols and whitespace are ignored,
/// `(1,234)` is negative and a `2025-26` style year range yields its first
/// year. Cells without a usable number give `None`, never zero.
pub fn clean_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut s: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£') && !c.is_whitespace())
        .collect();

    if let Some((head, _)) = s.split_once('-') {
        if head.len() == 4 && head.chars().all(|c| c.is_ascii_digit()) {
            s = head.to_string();
        }
    }

    if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        s = format!("-{}", inner);
    }

    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a cell as a whole calendar or policy year.
pub fn clean_year(cell: &str) -> Option<i32> {
    let value = clean_number(cell)?;
    if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return None;
    }
    Some(value as i32)
}
