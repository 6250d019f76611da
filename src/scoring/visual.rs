use serde::{Deserialize, Serialize};

use crate::dom::dom_model::Rect;

/// Tolerances for the visual lens. All distances are in layout units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualTolerances {
    /// Boxes whose tops differ by at most this much share a row.
    pub row_tolerance: f64,
    /// Largest gap between consecutive rows that still reads as one form.
    pub max_row_gap: f64,
    /// Largest difference between the biggest and smallest row gap.
    pub gap_spread: f64,
    pub left_edge_tolerance: f64,
    /// Share of fields that must start at a common left edge.
    pub left_alignment_share: f64,
    /// Largest (widest - narrowest) / widest ratio.
    pub width_spread: f64,
}

impl Default for VisualTolerances {
    fn default() -> Self {
        Self {
            row_tolerance: 4.0,
            max_row_gap: 80.0,
            gap_spread: 16.0,
            left_edge_tolerance: 4.0,
            left_alignment_share: 0.6,
            width_spread: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VisualSignals {
    pub consistent_spacing: bool,
    pub left_aligned: bool,
    pub similar_widths: bool,
}

impl VisualSignals {
    pub fn any(&self) -> bool {
        self.consistent_spacing || self.left_aligned || self.similar_widths
    }
}

pub fn analyze(rects: &[Rect], tol: &VisualTolerances) -> VisualSignals {
    VisualSignals {
        consistent_spacing: consistent_spacing(rects, tol),
        left_aligned: left_aligned(rects, tol),
        similar_widths: similar_widths(rects, tol),
    }
}

/// Rows stacked with non-overlapping, evenly sized gaps.
pub fn consistent_spacing(rects: &[Rect], tol: &VisualTolerances) -> bool {
    let rows = group_rows(rects, tol.row_tolerance);
    if rows.len() < 2 {
        return false;
    }

    let gaps: Vec<f64> = rows.windows(2).map(|w| w[1].0 - w[0].1).collect();
    let min = gaps.iter().copied().fold(f64::INFINITY, f64::min);
    let max = gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    min >= -tol.row_tolerance && max <= tol.max_row_gap && (max - min) <= tol.gap_spread
}

pub fn left_aligned(rects: &[Rect], tol: &VisualTolerances) -> bool {
    if rects.len() < 2 {
        return false;
    }

    let best = rects
        .iter()
        .map(|r| {
            rects
                .iter()
                .filter(|o| (o.x - r.x).abs() <= tol.left_edge_tolerance)
                .count()
        })
        .max()
        .unwrap_or(0);

    best as f64 / rects.len() as f64 >= tol.left_alignment_share
}

pub fn similar_widths(rects: &[Rect], tol: &VisualTolerances) -> bool {
    if rects.len() < 2 {
        return false;
    }

    let max = rects.iter().map(|r| r.width).fold(f64::NEG_INFINITY, f64::max);
    let min = rects.iter().map(|r| r.width).fold(f64::INFINITY, f64::min);
    max > 0.0 && (max - min) / max <= tol.width_spread
}

/// (top, bottom) of each row, top to bottom.
fn group_rows(rects: &[Rect], tolerance: f64) -> Vec<(f64, f64)> {
    let mut sorted: Vec<&Rect> = rects.iter().collect();
    sorted.sort_by(|a, b| a.y.total_cmp(&b.y));

    let mut rows: Vec<(f64, f64)> = Vec::new();
    for rect in sorted {
        match rows.last_mut() {
            Some(row) if (rect.y - row.0).abs() <= tolerance => row.1 = row.1.max(rect.bottom()),
            _ => rows.push((rect.y, rect.bottom())),
        }
    }
    rows
}
