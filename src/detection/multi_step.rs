use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dom::document::{Document, NodeId};
use crate::dom::elements::all_fields;
use crate::dom::selector::{Selector, SelectorError};
use crate::scoring::candidate::CandidateContainer;

const NAVIGATION: &str = "[class*=step-nav i], [class*=wizard-nav i], [class*=stepper-nav i], \
    [data-step-nav], [data-action=next], [data-action=prev], [data-action=back], \
    button[class*=next i], button[class*=prev i], [aria-label*='next step' i]";
const STEP_CONTENT: &str = "[data-step], [data-step-index], [class*=step-content i], \
    [class*=wizard-step i], [class*=form-step i], [class*=step-pane i], fieldset[class*=step i]";
const WIZARD: &str = "[class*=wizard i], [class*=multi-step i], [class*=multistep i], \
    [class*=stepper i], [data-wizard], [data-multi-step]";
const PROGRESS: &str = "[role=progressbar], progress, [class*=progress i], [class*=step-indicator i], \
    [class*=steps-bar i], [aria-current=step]";

const VOCABULARY: &[&str] = &["wizard", "multi-step", "multistep", "stepper", "steps", "step-form", "onboarding"];

/// Weights for the multi-step container likelihood.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiStepWeights {
    pub form_semantics: f64,
    pub vocabulary: f64,
    pub navigation: f64,
    pub progress: f64,
    pub distinct_steps: f64,
    pub per_field: f64,
    pub field_cap: f64,
    pub small_penalty: f64,
    pub min_width: f64,
    pub min_height: f64,
    pub floor: f64,
    pub ancestor_depth: usize,
    /// Same retention minimums as scored containers: form-semantic
    /// elements need this many fields...
    pub min_explicit_fields: usize,
    /// ...and every other element this many.
    pub min_implicit_fields: usize,
}

impl Default for MultiStepWeights {
    fn default() -> Self {
        Self {
            form_semantics: 20.0,
            vocabulary: 15.0,
            navigation: 15.0,
            progress: 10.0,
            distinct_steps: 20.0,
            per_field: 3.0,
            field_cap: 15.0,
            small_penalty: 20.0,
            min_width: 150.0,
            min_height: 80.0,
            floor: 30.0,
            ancestor_depth: 8,
            min_explicit_fields: 1,
            min_implicit_fields: 2,
        }
    }
}

struct Probes {
    navigation: Selector,
    step: Selector,
    wizard: Selector,
    progress: Selector,
}

impl Probes {
    fn compile() -> Result<Self, SelectorError> {
        Ok(Self {
            navigation: Selector::parse(NAVIGATION)?,
            step: Selector::parse(STEP_CONTENT)?,
            wizard: Selector::parse(WIZARD)?,
            progress: Selector::parse(PROGRESS)?,
        })
    }
}

/// Finds wizard-style forms whose steps may not all be present or visible yet.
pub struct MultiStepDetector {
    weights: MultiStepWeights,
    probes: Option<Probes>,
}

impl MultiStepDetector {
    pub fn new(weights: MultiStepWeights) -> Self {
        let probes = match Probes::compile() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "multi-step selectors rejected; detector disabled");
                None
            }
        };
        Self { weights, probes }
    }

    pub fn detect(&self, doc: &Document) -> Vec<CandidateContainer> {
        let Some(probes) = &self.probes else {
            return Vec::new();
        };

        let seeds: Vec<NodeId> = doc
            .node_ids()
            .filter(|n| {
                probes.navigation.matches(doc, *n)
                    || probes.step.matches(doc, *n)
                    || probes.wizard.matches(doc, *n)
                    || probes.progress.matches(doc, *n)
            })
            .collect();

        let mut best: BTreeMap<NodeId, CandidateContainer> = BTreeMap::new();
        for seed in seeds {
            let Some(candidate) = self.best_ancestor(doc, probes, seed) else {
                continue;
            };
            best.entry(candidate.element.node).or_insert(candidate);
        }

        let out: Vec<CandidateContainer> = best.into_values().collect();
        debug!(doc = doc.id().0, found = out.len(), "multi-step detection");
        out
    }

    fn best_ancestor(&self, doc: &Document, probes: &Probes, seed: NodeId) -> Option<CandidateContainer> {
        std::iter::once(seed)
            .chain(doc.ancestors(seed))
            .take(self.weights.ancestor_depth + 1)
            .take_while(|n| !matches!(doc.tag(*n), "html" | "body"))
            .map(|n| self.score(doc, probes, n))
            .filter(|c| c.score >= self.weights.floor && c.field_count >= self.min_fields(c.explicit))
            // Highest score; the outer one on ties.
            .fold(None, |acc: Option<CandidateContainer>, c| match acc {
                Some(a) if a.score > c.score => Some(a),
                _ => Some(c),
            })
    }

    fn min_fields(&self, explicit: bool) -> usize {
        if explicit {
            self.weights.min_explicit_fields
        } else {
            self.weights.min_implicit_fields
        }
    }

    fn score(&self, doc: &Document, probes: &Probes, node: NodeId) -> CandidateContainer {
        let w = &self.weights;
        let mut score = 0.0;
        let mut reasons = Vec::new();
        let mut add = |weight: f64, reason: &str| {
            score += weight;
            reasons.push(reason.to_string());
        };

        let role_form = doc.attr(node, "role").is_some_and(|r| r.eq_ignore_ascii_case("form"));
        if doc.tag(node) == "form" || role_form {
            add(w.form_semantics, "multi-step:form-semantics");
        }
        if has_step_vocabulary(doc, node) {
            add(w.vocabulary, "multi-step:vocabulary");
        }

        let descendants = doc.descendants(node);
        if descendants.iter().any(|d| probes.navigation.matches(doc, *d)) {
            add(w.navigation, "multi-step:navigation");
        }
        if descendants.iter().any(|d| probes.progress.matches(doc, *d)) {
            add(w.progress, "multi-step:progress");
        }

        let steps: Vec<NodeId> = descendants
            .iter()
            .copied()
            .filter(|d| probes.step.matches(doc, *d))
            .collect();
        let distinct = steps
            .iter()
            .filter(|s| !steps.iter().any(|o| o != *s && doc.contains(*o, **s)))
            .count();
        if distinct >= 2 {
            add(w.distinct_steps, "multi-step:distinct-steps");
        }

        let fields = all_fields(doc, node).len();
        if fields > 0 {
            add((fields as f64 * w.per_field).min(w.field_cap), "multi-step:fields");
        }

        if doc
            .rect(node)
            .is_some_and(|r| r.width < w.min_width || r.height < w.min_height)
        {
            add(-w.small_penalty, "multi-step:too-small");
        }

        CandidateContainer {
            element: doc.element(node),
            score,
            field_count: fields,
            reasons,
            explicit: doc.tag(node) == "form" || role_form,
            depth: doc.depth(node),
        }
    }
}

impl Default for MultiStepDetector {
    fn default() -> Self {
        Self::new(MultiStepWeights::default())
    }
}

fn has_step_vocabulary(doc: &Document, node: NodeId) -> bool {
    let Some(n) = doc.node(node) else {
        return false;
    };
    if n.attributes
        .keys()
        .any(|k| matches!(k.as_str(), "data-wizard" | "data-multi-step" | "data-steps"))
    {
        return true;
    }
    ["class", "id"]
        .iter()
        .filter_map(|a| doc.attr(node, a))
        .map(str::to_ascii_lowercase)
        .any(|v| VOCABULARY.iter().any(|word| v.contains(word)))
}
