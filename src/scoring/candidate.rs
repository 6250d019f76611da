use std::collections::HashMap;

use serde::Serialize;

use crate::dom::document::ElementRef;

/// An element hypothesized to be a form-like region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateContainer {
    pub element: ElementRef,
    pub score: f64,
    pub field_count: usize,
    /// Which rules contributed, in the order they fired.
    pub reasons: Vec<String>,
    /// Native `form` or `role=form`. Implicit containers need more fields.
    pub explicit: bool,
    /// Nesting depth within its document; outer containers win ties.
    #[serde(skip)]
    pub depth: usize,
}

impl CandidateContainer {
    /// Fold `other` (same element) into `self`: keep the higher score,
    /// append reasons not already present.
    pub fn absorb(&mut self, other: CandidateContainer) {
        if other.score > self.score {
            self.score = other.score;
        }
        self.field_count = self.field_count.max(other.field_count);
        self.explicit |= other.explicit;
        for reason in other.reasons {
            if !self.reasons.contains(&reason) {
                self.reasons.push(reason);
            }
        }
    }
}

/// Deduplicate by element identity (max score, concatenated reasons) and
/// order by score, outer containers first on ties.
pub fn merge_by_element(candidates: impl IntoIterator<Item = CandidateContainer>) -> Vec<CandidateContainer> {
    let mut order: Vec<ElementRef> = Vec::new();
    let mut merged: HashMap<ElementRef, CandidateContainer> = HashMap::new();

    for candidate in candidates {
        match merged.get_mut(&candidate.element) {
            Some(existing) => existing.absorb(candidate),
            None => {
                order.push(candidate.element);
                merged.insert(candidate.element, candidate);
            }
        }
    }

    let mut out: Vec<CandidateContainer> = order
        .into_iter()
        .filter_map(|e| merged.remove(&e))
        .collect();
    sort_by_rank(&mut out);
    out
}

pub fn sort_by_rank(candidates: &mut [CandidateContainer]) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.depth.cmp(&b.depth))
            .then(a.element.cmp(&b.element))
    });
}

pub fn mean_score(candidates: &[CandidateContainer]) -> f64 {
    if candidates.is_empty() {
        return 0.0;
    }
    candidates.iter().map(|c| c.score).sum::<f64>() / candidates.len() as f64
}
