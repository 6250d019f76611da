use serde::{Deserialize, Serialize};

use crate::scoring::visual::VisualSignals;

/// Heuristic family a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lens {
    /// Applies under every lens (field count, native form, submit, sparsity).
    Structural,
    Semantic,
    Behavioral,
    Visual,
}

/// Tunable magnitudes for the scoring rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub native_form: f64,
    pub semantic: f64,
    pub per_field: f64,
    pub field_cap: f64,
    pub per_interactive: f64,
    pub interactive_cap: f64,
    pub submit_control: f64,
    pub visual_spacing: f64,
    pub visual_alignment: f64,
    pub visual_width: f64,
    pub sparse_penalty: f64,
    /// Containers with more than this many descendants per field are sparse.
    pub sparse_ratio: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            native_form: 40.0,
            semantic: 20.0,
            per_field: 15.0,
            field_cap: 45.0,
            per_interactive: 5.0,
            interactive_cap: 30.0,
            submit_control: 10.0,
            visual_spacing: 10.0,
            visual_alignment: 10.0,
            visual_width: 10.0,
            sparse_penalty: 10.0,
            sparse_ratio: 40,
        }
    }
}

/// Everything the rules look at, measured once per candidate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CandidateFeatures {
    pub native_form: bool,
    pub semantic: bool,
    pub explicit: bool,
    /// Visible field descendants.
    pub field_count: usize,
    /// Visible fields plus visible buttons/submit controls.
    pub interactive_count: usize,
    pub has_submit: bool,
    pub descendant_count: usize,
    /// More than `sparse_ratio` descendants per visible field.
    pub sparse: bool,
    pub visual: VisualSignals,
}

/// One declarative scoring rule: when `applies`, add `weight`.
pub struct ScoringRule {
    pub reason: &'static str,
    pub lens: Lens,
    pub applies: fn(&CandidateFeatures) -> bool,
    pub weight: fn(&CandidateFeatures, &ScoringWeights) -> f64,
}

impl std::fmt::Debug for ScoringRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringRule")
            .field("reason", &self.reason)
            .field("lens", &self.lens)
            .finish()
    }
}

pub fn default_rules() -> Vec<ScoringRule> {
    vec![
        ScoringRule {
            reason: "native-form",
            lens: Lens::Structural,
            applies: |f| f.native_form,
            weight: |_, w| w.native_form,
        },
        ScoringRule {
            reason: "field-count",
            lens: Lens::Structural,
            applies: |f| f.field_count > 0,
            weight: |f, w| (f.field_count as f64 * w.per_field).min(w.field_cap),
        },
        ScoringRule {
            reason: "submit-control",
            lens: Lens::Structural,
            applies: |f| f.has_submit,
            weight: |_, w| w.submit_control,
        },
        ScoringRule {
            reason: "sparse-container",
            lens: Lens::Structural,
            applies: |f| f.sparse,
            weight: |_, w| -w.sparse_penalty,
        },
        ScoringRule {
            reason: "semantic-role",
            lens: Lens::Semantic,
            applies: |f| f.semantic,
            weight: |_, w| w.semantic,
        },
        ScoringRule {
            reason: "interactive-density",
            lens: Lens::Behavioral,
            applies: |f| f.interactive_count >= 2,
            weight: |f, w| (f.interactive_count as f64 * w.per_interactive).min(w.interactive_cap),
        },
        ScoringRule {
            reason: "visual-spacing",
            lens: Lens::Visual,
            applies: |f| f.visual.consistent_spacing,
            weight: |_, w| w.visual_spacing,
        },
        ScoringRule {
            reason: "visual-alignment",
            lens: Lens::Visual,
            applies: |f| f.visual.left_aligned,
            weight: |_, w| w.visual_alignment,
        },
        ScoringRule {
            reason: "visual-width",
            lens: Lens::Visual,
            applies: |f| f.visual.similar_widths,
            weight: |_, w| w.visual_width,
        },
    ]
}

/// Sum the rules selected by `include`, returning the score and the reasons
/// of every rule that fired.
pub fn evaluate(
    rules: &[ScoringRule],
    features: &CandidateFeatures,
    weights: &ScoringWeights,
    include: impl Fn(Lens) -> bool,
) -> (f64, Vec<String>) {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    for rule in rules.iter().filter(|r| include(r.lens)) {
        if (rule.applies)(features) {
            score += (rule.weight)(features, weights);
            reasons.push(rule.reason.to_string());
        }
    }

    (score, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(reason: &str) -> ScoringRule {
        default_rules()
            .into_iter()
            .find(|r| r.reason == reason)
            .unwrap()
    }

    #[test]
    fn field_count_bonus_is_capped() {
        let w = ScoringWeights::default();
        let r = rule("field-count");
        let few = CandidateFeatures { field_count: 2, ..Default::default() };
        let many = CandidateFeatures { field_count: 9, ..Default::default() };
        assert_eq!((r.weight)(&few, &w), 30.0);
        assert_eq!((r.weight)(&many, &w), 45.0);
    }

    #[test]
    fn interactive_density_needs_two_elements() {
        let w = ScoringWeights::default();
        let r = rule("interactive-density");
        let one = CandidateFeatures { interactive_count: 1, ..Default::default() };
        let lots = CandidateFeatures { interactive_count: 12, ..Default::default() };
        assert!(!(r.applies)(&one));
        assert!((r.applies)(&lots));
        assert_eq!((r.weight)(&lots, &w), 30.0);
    }

    #[test]
    fn sparse_containers_are_penalized() {
        let w = ScoringWeights::default();
        let r = rule("sparse-container");
        let sparse = CandidateFeatures { field_count: 2, sparse: true, ..Default::default() };
        assert!((r.applies)(&sparse));
        assert_eq!((r.weight)(&sparse, &w), -10.0);
    }

    #[test]
    fn evaluate_filters_by_lens() {
        let rules = default_rules();
        let w = ScoringWeights::default();
        let features = CandidateFeatures {
            semantic: true,
            field_count: 2,
            interactive_count: 3,
            ..Default::default()
        };

        let (all, reasons) = evaluate(&rules, &features, &w, |_| true);
        assert_eq!(all, 20.0 + 30.0 + 15.0);
        assert_eq!(reasons, vec!["field-count", "semantic-role", "interactive-density"]);

        let (semantic_only, _) =
            evaluate(&rules, &features, &w, |l| matches!(l, Lens::Structural | Lens::Semantic));
        assert_eq!(semantic_only, 50.0);
    }
}
