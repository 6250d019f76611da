use crate::dom::document::{Document, NodeId};

/// ARIA roles that make an arbitrary element behave like a form field.
pub const FIELD_ROLES: &[&str] = &[
    "textbox",
    "searchbox",
    "combobox",
    "listbox",
    "checkbox",
    "radio",
    "switch",
    "spinbutton",
    "slider",
];

/// Is this element a fillable field (the unit counted by scoring)?
pub fn is_field_element(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        "input" => is_fillable_input_type(input_type(doc, node).as_deref()),
        "select" | "textarea" => true,
        _ => {
            is_content_editable(doc, node)
                || doc
                    .attr(node, "role")
                    .is_some_and(|r| FIELD_ROLES.contains(&r.to_ascii_lowercase().as_str()))
        }
    }
}

/// Fields plus controls that act on them (buttons, submit inputs).
pub fn is_interactive_element(doc: &Document, node: NodeId) -> bool {
    if is_field_element(doc, node) {
        return true;
    }
    if doc.has_attr(node, "disabled") {
        return false;
    }

    match doc.tag(node) {
        "button" => true,
        "input" => matches!(
            input_type(doc, node).as_deref(),
            Some("submit" | "button" | "reset" | "image")
        ),
        _ => doc.attr(node, "role").is_some_and(|r| r.eq_ignore_ascii_case("button")),
    }
}

/// Buttons that submit or advance a form.
pub fn is_submit_control(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        "button" => !matches!(
            doc.attr(node, "type").map(str::to_ascii_lowercase).as_deref(),
            Some("button" | "reset")
        ) || label_suggests_submit(&doc.text_content(node)),
        "input" => matches!(input_type(doc, node).as_deref(), Some("submit" | "image")),
        _ => {
            doc.attr(node, "role").is_some_and(|r| r.eq_ignore_ascii_case("button"))
                && label_suggests_submit(&doc.text_content(node))
        }
    }
}

fn label_suggests_submit(label: &str) -> bool {
    let keywords = ["submit", "save", "sign", "login", "log in", "continue", "next", "send", "register"];
    let lower = label.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Lowercased `type` of an `<input>`; `None` when absent.
pub fn input_type(doc: &Document, node: NodeId) -> Option<String> {
    doc.attr(node, "type").map(|t| t.trim().to_ascii_lowercase())
}

fn is_fillable_input_type(t: Option<&str>) -> bool {
    match t {
        // Explicit non-fields
        Some("submit") | Some("button") | Some("reset") | Some("image") | Some("hidden") => false,
        // Everything else, including unknown types, renders as a text-like box
        _ => true,
    }
}

pub fn is_content_editable(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, "contenteditable")
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "" | "true" | "plaintext-only"))
}

pub fn is_frame_host(doc: &Document, node: NodeId) -> bool {
    matches!(doc.tag(node), "iframe" | "frame" | "object" | "embed")
}

/// Visible layout according to the snapshot.
///
/// Hidden if the element or an ancestor is flagged hidden, if it has a
/// zero-sized box, or if its box lies fully outside the viewport. A visually
/// hidden checkbox or radio still counts when a label pointing at it is visible.
pub fn is_visible(doc: &Document, node: NodeId) -> bool {
    if is_rendered(doc, node) {
        return true;
    }

    if matches!(input_type(doc, node).as_deref(), Some("checkbox" | "radio"))
        && !hidden_by_tree(doc, node)
    {
        return associated_labels(doc, node)
            .into_iter()
            .any(|label| is_rendered(doc, label));
    }

    false
}

fn is_rendered(doc: &Document, node: NodeId) -> bool {
    if hidden_by_tree(doc, node) {
        return false;
    }
    match doc.rect(node) {
        Some(rect) => !rect.is_empty() && !rect.is_outside(doc.viewport()),
        None => true,
    }
}

fn hidden_by_tree(doc: &Document, node: NodeId) -> bool {
    std::iter::once(node)
        .chain(doc.ancestors(node))
        .any(|n| doc.node(n).is_some_and(|n| n.hidden))
}

/// `<label for=id>` elements plus any wrapping `<label>`.
pub fn associated_labels(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let mut labels: Vec<NodeId> = doc
        .ancestors(node)
        .filter(|a| doc.tag(*a) == "label")
        .collect();

    if let Some(id) = doc.attr(node, "id") {
        labels.extend(
            doc.node_ids()
                .filter(|n| doc.tag(*n) == "label" && doc.attr(*n, "for") == Some(id)),
        );
    }

    labels
}

/// Visible field descendants of `container`.
pub fn visible_fields(doc: &Document, container: NodeId) -> Vec<NodeId> {
    doc.descendants(container)
        .into_iter()
        .filter(|n| is_field_element(doc, *n) && is_visible(doc, *n))
        .collect()
}

pub fn all_fields(doc: &Document, container: NodeId) -> Vec<NodeId> {
    doc.descendants(container)
        .into_iter()
        .filter(|n| is_field_element(doc, *n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::document::DocumentId;
    use crate::dom::dom_model::{DocumentSnapshot, NodeSnapshot};

    fn build(root: NodeSnapshot) -> Document {
        Document::from_snapshot(DocumentId(0), DocumentSnapshot::new("https://a.test/", root))
    }

    #[test]
    fn classifies_inputs_like_a_form_would() {
        let doc = build(
            NodeSnapshot::element("body").with_children([
                NodeSnapshot::element("input"),
                NodeSnapshot::element("input").with_attr("type", "hidden"),
                NodeSnapshot::element("input").with_attr("type", "submit"),
                NodeSnapshot::element("div").with_attr("contenteditable", "true"),
                NodeSnapshot::element("div").with_attr("role", "combobox"),
                NodeSnapshot::element("button").with_text("Go"),
            ]),
        );

        let fields: Vec<bool> = (1..=6).map(|i| is_field_element(&doc, NodeId(i))).collect();
        assert_eq!(fields, vec![true, false, false, true, true, false]);
        assert!(is_interactive_element(&doc, NodeId(3)));
        assert!(is_interactive_element(&doc, NodeId(6)));
        assert!(!is_interactive_element(&doc, NodeId(2)));
    }

    #[test]
    fn visibility_respects_layout_and_labels() {
        let doc = build(
            NodeSnapshot::element("body").with_children([
                NodeSnapshot::element("input").with_rect(0.0, 0.0, 0.0, 0.0),
                NodeSnapshot::element("input").with_rect(-500.0, 10.0, 100.0, 20.0),
                NodeSnapshot::element("input").with_rect(10.0, 2000.0, 100.0, 20.0),
                NodeSnapshot::element("div")
                    .hidden()
                    .with_child(NodeSnapshot::element("input")),
                NodeSnapshot::element("label")
                    .with_rect(10.0, 10.0, 80.0, 20.0)
                    .with_child(
                        NodeSnapshot::element("input")
                            .with_attr("type", "checkbox")
                            .with_rect(0.0, 0.0, 0.0, 0.0),
                    ),
            ]),
        );

        assert!(!is_visible(&doc, NodeId(1)), "zero-sized");
        assert!(!is_visible(&doc, NodeId(2)), "off to the left");
        assert!(is_visible(&doc, NodeId(3)), "below the fold is scrollable");
        assert!(!is_visible(&doc, NodeId(5)), "hidden ancestor");
        assert!(is_visible(&doc, NodeId(7)), "checkbox styled through its label");
    }
}
