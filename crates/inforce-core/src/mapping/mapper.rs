//! Header row to canonical field mapping.

use tracing::{debug, trace};

use super::similarity::{normalize, partial_ratio};
use super::taxonomy::{CanonicalField, ColumnMap, ColumnMatch};

/// Result of mapping one header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMapping {
    pub columns: ColumnMap,
    /// Fields that cleared the threshold but lost their column to a
    /// stronger field.
    pub ambiguous: Vec<CanonicalField>,
}

/// Maps vendor header cells onto [`CanonicalField`]s by fuzzy similarity.
#[derive(Debug, Clone)]
pub struct ColumnMapper {
    min_similarity: f64,
}

impl Default for ColumnMapper {
    fn default() -> Self {
        Self::new(70.0)
    }
}

impl ColumnMapper {
    pub fn new(min_similarity: f64) -> Self {
        Self { min_similarity }
    }

    /// Best (score, column) for `field`; equal scores go to the later column.
    pub fn best_column(&self, field: CanonicalField, header: &[String]) -> Option<ColumnMatch> {
        let cells: Vec<String> = header.iter().map(|c| normalize(c)).collect();
        let mut candidates: Vec<String> = field.synonyms().iter().map(|s| normalize(s)).collect();
        candidates.push(field.header_form());

        let mut best: Option<ColumnMatch> = None;
        for (column, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            for synonym in &candidates {
                let score = partial_ratio(synonym, cell);
                if best.is_none_or(|b| score >= b.score) {
                    best = Some(ColumnMatch { column, score });
                }
            }
        }
        best
    }

    /// Map a header row. A column feeds at most one field; when two fields
    /// claim the same column, the higher score keeps it.
    pub fn map_header(&self, header: &[String]) -> ColumnMapping {
        let mut claims: Vec<(CanonicalField, ColumnMatch)> = CanonicalField::ALL
            .iter()
            .filter_map(|f| {
                let m = self.best_column(*f, header)?;
                trace!("{} -> column {} ({:.1})", f, m.column, m.score);
                (m.score >= self.min_similarity).then_some((*f, m))
            })
            .collect();

        // Strongest claims first; field order settles equal scores.
        claims.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then(a.0.cmp(&b.0)));

        let mut mapping = ColumnMapping::default();
        let mut taken: Vec<usize> = Vec::new();
        for (field, m) in claims {
            if taken.contains(&m.column) {
                debug!("{} lost column {} to a stronger match", field, m.column);
                mapping.ambiguous.push(field);
            } else {
                taken.push(m.column);
                mapping.columns.insert(field, m);
            }
        }
        mapping.ambiguous.sort();
        mapping
    }
}
