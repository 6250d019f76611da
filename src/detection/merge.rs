use std::collections::HashSet;

use crate::dom::document::NodeId;
use crate::dom::elements::all_fields;
use crate::dom::traversal::Page;
use crate::scoring::candidate::{CandidateContainer, merge_by_element};

/// Combine progressive-pass and multi-step results into the final list.
///
/// Deduplicates by element, then selects greedily in rank order: a candidate
/// nested in a selected one is dropped, and one that wraps selected
/// candidates is kept only if it adds fields they do not cover. Kept
/// wrappers replace what they wrap.
pub fn merge_results(page: &Page, candidates: impl IntoIterator<Item = CandidateContainer>) -> Vec<CandidateContainer> {
    let mut selected: Vec<CandidateContainer> = Vec::new();

    for candidate in merge_by_element(candidates) {
        let Some(doc) = page.document(candidate.element.doc) else {
            continue;
        };
        let node = candidate.element.node;
        let same_doc = |c: &&CandidateContainer| c.element.doc == candidate.element.doc;

        if selected.iter().filter(same_doc).any(|s| doc.contains(s.element.node, node)) {
            continue;
        }

        let wrapped: Vec<NodeId> = selected
            .iter()
            .filter(same_doc)
            .filter(|s| doc.contains(node, s.element.node))
            .map(|s| s.element.node)
            .collect();
        if !wrapped.is_empty() {
            let covered: HashSet<NodeId> = wrapped.iter().flat_map(|w| all_fields(doc, *w)).collect();
            if all_fields(doc, node).iter().all(|f| covered.contains(f)) {
                continue;
            }
        }

        selected.push(candidate);
    }

    let outermost: Vec<bool> = selected
        .iter()
        .map(|c| {
            !selected.iter().any(|o| {
                o.element != c.element
                    && o.element.doc == c.element.doc
                    && page
                        .document(c.element.doc)
                        .is_some_and(|doc| doc.contains(o.element.node, c.element.node))
            })
        })
        .collect();

    selected
        .into_iter()
        .zip(outermost)
        .filter_map(|(c, keep)| keep.then_some(c))
        .collect()
}
