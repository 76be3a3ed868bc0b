//! Blending quality signals into one gating confidence.

use serde::{Deserialize, Serialize};

use crate::quality::QualityMetrics;

/// Blend weights as whole percentages, so their sum is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendWeights {
    pub header_strength: u32,
    pub shape_fit: u32,
    pub recon_success: u32,
    pub rows_parsed: u32,
}

/// 0.20 header, 0.25 shape, 0.35 reconciliation, 0.20 rows parsed.
pub const DEFAULT_WEIGHTS: BlendWeights = BlendWeights {
    header_strength: 20,
    shape_fit: 25,
    recon_success: 35,
    rows_parsed: 20,
};

impl BlendWeights {
    pub fn total(&self) -> u32 {
        self.header_strength + self.shape_fit + self.recon_success + self.rows_parsed
    }

    /// Weighted sum of the metrics, clamped to [0, 1].
    pub fn blend(&self, m: &QualityMetrics) -> f64 {
        let sum = self.header_strength as f64 * m.header_strength
            + self.shape_fit as f64 * m.shape_fit
            + self.recon_success as f64 * m.recon_success
            + self.rows_parsed as f64 * m.rows_parsed_pct;
        (sum / 100.0).clamp(0.0, 1.0)
    }
}

impl Default for BlendWeights {
    fn default() -> Self {
        DEFAULT_WEIGHTS
    }
}

/// Overall confidence and the gating decision derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub confidence: f64,
    pub decision_ready: bool,
    pub needs_manual_review: bool,
}

impl ConfidenceResult {
    pub fn new(confidence: f64, threshold: f64) -> Self {
        let decision_ready = confidence >= threshold;
        Self {
            confidence,
            decision_ready,
            needs_manual_review: !decision_ready,
        }
    }

    /// Zero confidence, always routed to review.
    pub fn none() -> Self {
        Self {
            confidence: 0.0,
            decision_ready: false,
            needs_manual_review: true,
        }
    }
}

/// Applies the blend and the decision threshold.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceBlender {
    weights: BlendWeights,
    threshold: f64,
}

impl ConfidenceBlender {
    pub fn new(threshold: f64) -> Self {
        Self {
            weights: DEFAULT_WEIGHTS,
            threshold,
        }
    }

    pub fn weights(&self) -> BlendWeights {
        self.weights
    }

    pub fn score(&self, metrics: &QualityMetrics) -> f64 {
        self.weights.blend(metrics)
    }

    pub fn evaluate(&self, metrics: &QualityMetrics) -> ConfidenceResult {
        ConfidenceResult::new(self.score(metrics), self.threshold)
    }
}
