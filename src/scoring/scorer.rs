use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dom::document::{Document, NodeId};
use crate::dom::elements::{is_field_element, is_interactive_element, is_submit_control, is_visible};
use crate::scoring::candidate::{CandidateContainer, merge_by_element, sort_by_rank};
use crate::scoring::rules::{CandidateFeatures, Lens, ScoringRule, ScoringWeights, default_rules, evaluate};
use crate::scoring::visual::{VisualTolerances, analyze};

/// Words in class/id/name/test-id tokens that mark a region as a form.
const FORM_VOCABULARY: &[&str] = &[
    "form",
    "signup",
    "signin",
    "login",
    "register",
    "registration",
    "checkout",
    "contact",
    "subscribe",
    "newsletter",
    "survey",
    "questionnaire",
    "booking",
    "enquiry",
    "inquiry",
];

/// Attributes searched for form vocabulary.
const VOCABULARY_ATTRS: &[&str] = &["class", "id", "name", "data-testid", "data-test", "aria-label"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub visual: VisualTolerances,
    /// Pass thresholds are fractions; the minimum score is `threshold * score_scale`.
    pub score_scale: f64,
    pub primary_limit: usize,
    pub scan_limit: usize,
    pub min_explicit_fields: usize,
    pub min_implicit_fields: usize,
    /// How far above each field to look for implicit containers.
    pub implicit_ancestor_depth: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            visual: VisualTolerances::default(),
            score_scale: 100.0,
            primary_limit: 10,
            scan_limit: 20,
            min_explicit_fields: 1,
            min_implicit_fields: 2,
            implicit_ancestor_depth: 6,
        }
    }
}

/// Seam between the orchestrator and candidate scoring.
pub trait CandidateScorer: Send + Sync {
    /// Primary single-pass scorer: every rule additive, top `primary_limit`.
    fn score(&self, doc: &Document, threshold: f64) -> Vec<CandidateContainer>;

    /// Broader multi-lens scan, top `scan_limit`.
    fn scan(&self, doc: &Document, threshold: f64) -> Vec<CandidateContainer>;
}

/// Rule-based scorer over the semantic, behavioral and visual lenses.
pub struct HeuristicScorer {
    config: ScoringConfig,
    rules: Vec<ScoringRule>,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl HeuristicScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            rules: default_rules(),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn rules(&self) -> &[ScoringRule] {
        &self.rules
    }

    /// Measure the features of one element.
    pub fn features(&self, doc: &Document, node: NodeId) -> CandidateFeatures {
        let descendants = doc.descendants(node);
        let visible_fields: Vec<NodeId> = descendants
            .iter()
            .copied()
            .filter(|n| is_field_element(doc, *n) && is_visible(doc, *n))
            .collect();
        let interactive_count = descendants
            .iter()
            .filter(|n| is_interactive_element(doc, **n) && is_visible(doc, **n))
            .count();
        let has_submit = descendants
            .iter()
            .any(|n| is_submit_control(doc, *n) && is_visible(doc, *n));

        let rects: Vec<_> = visible_fields.iter().filter_map(|n| doc.rect(*n)).collect();
        let native_form = doc.tag(node) == "form";
        let role = doc.attr(node, "role").map(str::to_ascii_lowercase);
        let role_form = role.as_deref() == Some("form");

        CandidateFeatures {
            native_form,
            semantic: role_form || role.as_deref() == Some("search") || has_form_vocabulary(doc, node),
            explicit: native_form || role_form,
            field_count: visible_fields.len(),
            interactive_count,
            has_submit,
            descendant_count: descendants.len(),
            sparse: descendants.len() > self.config.weights.sparse_ratio * visible_fields.len().max(1),
            visual: analyze(&rects, &self.config.visual),
        }
    }

    /// Score `node` using the rules whose lens passes `include`.
    pub fn score_element(
        &self,
        doc: &Document,
        node: NodeId,
        include: impl Fn(Lens) -> bool,
    ) -> CandidateContainer {
        let features = self.features(doc, node);
        let (score, reasons) = evaluate(&self.rules, &features, &self.config.weights, include);
        CandidateContainer {
            element: doc.element(node),
            score,
            field_count: features.field_count,
            reasons,
            explicit: features.explicit,
            depth: doc.depth(node),
        }
    }

    fn retained(&self, candidate: &CandidateContainer, threshold: f64) -> bool {
        let min_fields = if candidate.explicit {
            self.config.min_explicit_fields
        } else {
            self.config.min_implicit_fields
        };
        candidate.field_count >= min_fields && candidate.score >= threshold * self.config.score_scale
    }

    fn finish(&self, mut candidates: Vec<CandidateContainer>, threshold: f64, limit: usize) -> Vec<CandidateContainer> {
        candidates.retain(|c| self.retained(c, threshold));
        sort_by_rank(&mut candidates);
        candidates.truncate(limit);
        candidates
    }

    /// Native forms, `role=form|search`, and vocabulary-tagged regions.
    pub fn semantic_candidates(&self, doc: &Document) -> BTreeSet<NodeId> {
        doc.node_ids()
            .filter(|n| !is_document_shell(doc, *n))
            .filter(|n| {
                doc.tag(*n) == "form"
                    || doc
                        .attr(*n, "role")
                        .is_some_and(|r| matches!(r.to_ascii_lowercase().as_str(), "form" | "search"))
                    || has_form_vocabulary(doc, *n)
            })
            .filter(|n| !is_field_element(doc, *n))
            .collect()
    }

    /// Ancestors of visible interactive elements, up to the configured depth.
    pub fn behavioral_candidates(&self, doc: &Document) -> BTreeSet<NodeId> {
        let mut out = BTreeSet::new();
        for node in doc.node_ids() {
            if !is_interactive_element(doc, node) || !is_visible(doc, node) {
                continue;
            }
            for ancestor in doc
                .ancestors(node)
                .take(self.config.implicit_ancestor_depth)
                .take_while(|a| !is_document_shell(doc, *a))
            {
                out.insert(ancestor);
            }
        }
        out
    }

    /// Behavioral candidates whose fields show at least one layout regularity.
    pub fn visual_candidates(&self, doc: &Document) -> BTreeSet<NodeId> {
        self.behavioral_candidates(doc)
            .into_iter()
            .filter(|n| {
                let rects: Vec<_> = doc
                    .descendants(*n)
                    .into_iter()
                    .filter(|d| is_field_element(doc, *d) && is_visible(doc, *d))
                    .filter_map(|d| doc.rect(d))
                    .collect();
                analyze(&rects, &self.config.visual).any()
            })
            .collect()
    }
}

impl CandidateScorer for HeuristicScorer {
    fn score(&self, doc: &Document, threshold: f64) -> Vec<CandidateContainer> {
        let mut nodes = self.semantic_candidates(doc);
        nodes.extend(self.behavioral_candidates(doc));

        let candidates = nodes
            .into_iter()
            .map(|n| self.score_element(doc, n, |_| true))
            .collect();
        let out = self.finish(candidates, threshold, self.config.primary_limit);
        debug!(doc = doc.id().0, threshold, found = out.len(), "primary scoring");
        out
    }

    fn scan(&self, doc: &Document, threshold: f64) -> Vec<CandidateContainer> {
        let lenses = [
            (Lens::Semantic, self.semantic_candidates(doc)),
            (Lens::Behavioral, self.behavioral_candidates(doc)),
            (Lens::Visual, self.visual_candidates(doc)),
        ];

        let mut all = Vec::new();
        for (lens, nodes) in lenses {
            for node in nodes {
                all.push(self.score_element(doc, node, |l| l == Lens::Structural || l == lens));
            }
        }

        let out = self.finish(merge_by_element(all), threshold, self.config.scan_limit);
        debug!(doc = doc.id().0, threshold, found = out.len(), "multi-lens scan");
        out
    }
}

fn is_document_shell(doc: &Document, node: NodeId) -> bool {
    matches!(doc.tag(node), "html" | "body" | "head")
}

/// Form vocabulary in identifying attributes, or a `data-form*` attribute.
pub fn has_form_vocabulary(doc: &Document, node: NodeId) -> bool {
    let Some(n) = doc.node(node) else {
        return false;
    };
    // Markers this crate writes itself are not evidence.
    if n.attributes.keys().any(|k| {
        k.starts_with("data-form") && !k.starts_with("data-form-field") && !k.starts_with("data-form-detect")
    }) {
        return true;
    }

    VOCABULARY_ATTRS
        .iter()
        .filter_map(|a| doc.attr(node, a))
        .flat_map(tokens)
        .any(|token| {
            FORM_VOCABULARY.contains(&token.as_str())
                || (token.starts_with("form") && !token.starts_with("format"))
        })
}

/// Lowercase alphanumeric tokens, also splitting camelCase.
fn tokens(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in value.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_split_separators_and_camel_case() {
        assert_eq!(tokens("signup-form wide"), vec!["signup", "form", "wide"]);
        assert_eq!(tokens("contactForm"), vec!["contact", "form"]);
        assert_eq!(tokens("platform_v2"), vec!["platform", "v2"]);
    }
}
