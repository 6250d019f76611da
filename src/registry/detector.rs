use tracing::debug;

use crate::dom::document::{Document, NodeId};
use crate::dom::elements::{associated_labels, input_type, is_content_editable, is_field_element, visible_fields};
use crate::dom::selector::quote_attr;
use crate::registry::field::{FIELD_MARKER_ATTR, Field, FieldOption, FieldType, Validation};
use crate::registry::identity::{normalize_label, provisional_field_id, suggest_test_value};

/// A field plus the element it was read from, when the detector knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedField {
    pub field: Field,
    pub node: Option<NodeId>,
}

impl DetectedField {
    pub fn new(field: Field, node: NodeId) -> Self {
        Self { field, node: Some(node) }
    }
}

impl From<Field> for DetectedField {
    /// A field with no known backing element; the registry resolves it.
    fn from(field: Field) -> Self {
        Self { field, node: None }
    }
}

/// Type-specific field extraction, scoped to one container.
///
/// Must be deterministic for a stable document: the registry relies on it
/// for idempotent registration.
pub trait FieldDetector: Send + Sync {
    fn detect_fields(&self, doc: &Document, container: NodeId, container_id: &str) -> Vec<DetectedField>;
}

/// Reads fields straight from the element tree.
#[derive(Debug, Clone, Default)]
pub struct DomFieldDetector;

impl FieldDetector for DomFieldDetector {
    fn detect_fields(&self, doc: &Document, container: NodeId, container_id: &str) -> Vec<DetectedField> {
        let fields: Vec<DetectedField> = visible_fields(doc, container)
            .into_iter()
            .map(|n| DetectedField::new(describe_field(doc, container, container_id, n), n))
            .collect();
        debug!(doc = doc.id().0, container = container.0, container_id, fields = fields.len(), "fields detected");
        fields
    }
}

/// Closed-set type of a field element.
pub fn classify_field(doc: &Document, node: NodeId) -> FieldType {
    match doc.tag(node) {
        "input" => FieldType::from_input_type(input_type(doc, node).as_deref()),
        "select" => FieldType::Select,
        "textarea" => FieldType::Textarea,
        "button" => FieldType::Button,
        "fieldset" => FieldType::Fieldset,
        _ if is_content_editable(doc, node) => FieldType::ContentEditable,
        _ => match doc.attr(node, "role").map(str::to_ascii_lowercase).as_deref() {
            Some("searchbox") => FieldType::Search,
            Some("combobox" | "listbox") => FieldType::Select,
            Some("checkbox" | "switch") => FieldType::Checkbox,
            Some("radio") => FieldType::Radio,
            Some("spinbutton" | "slider") => FieldType::Number,
            _ => FieldType::Text,
        },
    }
}

pub fn describe_field(doc: &Document, container: NodeId, container_id: &str, node: NodeId) -> Field {
    let field_type = classify_field(doc, node);
    let id = doc
        .attr(node, FIELD_MARKER_ATTR)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| provisional_field_id(doc.url(), container_id, node));

    let options = match field_type {
        FieldType::Radio | FieldType::Checkbox => choice_options(doc, container, node, field_type),
        FieldType::Select => select_options(doc, node),
        _ => Vec::new(),
    };

    let mut field = Field::new(&id, field_type).with_options(options);
    field.name = non_empty(doc.attr(node, "name"));
    field.html_id = non_empty(doc.attr(node, "id"));
    field.placeholder = non_empty(doc.attr(node, "placeholder"));
    field.label = field_label(doc, node, field_type);
    field.required = doc.has_attr(node, "required")
        || doc.attr(node, "aria-required").is_some_and(|v| v.eq_ignore_ascii_case("true"));
    field.validation = validation_of(doc, node);
    field.value = current_value(doc, node, field_type, &field.options);
    field.test_value = suggest_test_value(field.label.as_deref(), field_type, &field.options);
    field.selectors = unique_selectors(doc, container, node, field_type);
    field
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Label text without the text of any nested fields (select options etc).
pub fn label_text(doc: &Document, label: NodeId) -> String {
    let mut parts = vec![doc.own_text(label).to_string()];
    let mut stack: Vec<NodeId> = doc.children(label).iter().rev().copied().collect();
    while let Some(next) = stack.pop() {
        if is_field_element(doc, next) {
            continue;
        }
        parts.push(doc.own_text(next).to_string());
        stack.extend(doc.children(next).iter().rev().copied());
    }
    parts.iter().flat_map(|p| p.split_whitespace()).collect::<Vec<_>>().join(" ")
}

fn own_label(doc: &Document, node: NodeId) -> Option<String> {
    if let Some(label) = doc.attr(node, "aria-label").and_then(normalize_label) {
        return Some(label);
    }
    if let Some(ids) = doc.attr(node, "aria-labelledby") {
        let text = ids
            .split_whitespace()
            .filter_map(|id| doc.element_by_id(id))
            .map(|n| doc.text_content(n))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(label) = normalize_label(&text) {
            return Some(label);
        }
    }
    associated_labels(doc, node)
        .into_iter()
        .find_map(|l| normalize_label(&label_text(doc, l)))
}

fn field_label(doc: &Document, node: NodeId, field_type: FieldType) -> Option<String> {
    // Choice groups are named by their fieldset legend or radiogroup.
    if field_type == FieldType::Radio || field_type == FieldType::Checkbox {
        let group_label = doc.ancestors(node).take(4).find_map(|a| {
            if doc.tag(a) == "fieldset" {
                doc.children(a)
                    .iter()
                    .find(|c| doc.tag(**c) == "legend")
                    .and_then(|legend| normalize_label(&doc.text_content(*legend)))
            } else if doc.attr(a, "role").is_some_and(|r| r == "radiogroup" || r == "group") {
                doc.attr(a, "aria-label").and_then(normalize_label)
            } else {
                None
            }
        });
        if group_label.is_some() {
            return group_label;
        }
    }

    own_label(doc, node)
        .or_else(|| doc.attr(node, "placeholder").and_then(normalize_label))
        .or_else(|| doc.attr(node, "title").and_then(normalize_label))
}

/// Every same-name input of the same type inside the container.
fn choice_options(doc: &Document, container: NodeId, node: NodeId, field_type: FieldType) -> Vec<FieldOption> {
    let option_of = |n: NodeId| {
        let value = doc.attr(n, "value").unwrap_or("on");
        let mut option = FieldOption::new(value, own_label(doc, n).as_deref());
        option.selected = doc.has_attr(n, "checked") || doc.attr(n, "aria-checked") == Some("true");
        option
    };

    let Some(name) = doc.attr(node, "name").filter(|n| !n.is_empty()) else {
        return vec![option_of(node)];
    };

    doc.descendants(container)
        .into_iter()
        .filter(|n| {
            doc.tag(*n) == doc.tag(node)
                && doc.attr(*n, "name") == Some(name)
                && classify_field(doc, *n) == field_type
        })
        .map(option_of)
        .collect()
}

fn select_options(doc: &Document, node: NodeId) -> Vec<FieldOption> {
    doc.descendants(node)
        .into_iter()
        .filter(|n| doc.tag(*n) == "option")
        .map(|n| {
            let text = doc.text_content(n);
            let value = doc.attr(n, "value").map(str::to_string).unwrap_or_else(|| text.clone());
            let mut option = FieldOption::new(&value, normalize_label(&text).as_deref());
            option.selected = doc.has_attr(n, "selected");
            option
        })
        .collect()
}

fn validation_of(doc: &Document, node: NodeId) -> Validation {
    let num = |a: &str| doc.attr(node, a).and_then(|v| v.trim().parse::<u32>().ok());
    Validation {
        min_length: num("minlength"),
        max_length: num("maxlength"),
        pattern: non_empty(doc.attr(node, "pattern")),
        min: non_empty(doc.attr(node, "min")),
        max: non_empty(doc.attr(node, "max")),
        step: non_empty(doc.attr(node, "step")),
    }
}

fn current_value(doc: &Document, node: NodeId, field_type: FieldType, options: &[FieldOption]) -> Option<String> {
    match field_type {
        FieldType::Radio | FieldType::Select => options.iter().find(|o| o.selected).map(|o| o.value.clone()),
        FieldType::Checkbox => doc
            .has_attr(node, "checked")
            .then(|| doc.attr(node, "value").unwrap_or("on").to_string()),
        FieldType::Textarea | FieldType::ContentEditable => non_empty(Some(&doc.text_content(node))),
        _ => non_empty(doc.attr(node, "value")),
    }
}

/// Candidate selectors, kept only when they match exactly `node` in `container`.
fn unique_selectors(doc: &Document, container: NodeId, node: NodeId, field_type: FieldType) -> Vec<String> {
    let tag = doc.tag(node);
    let mut candidates = Vec::new();

    if let Some(id) = doc.attr(node, "id").filter(|v| !v.is_empty()) {
        if id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') && !id.starts_with(|c: char| c.is_ascii_digit()) {
            candidates.push(format!("#{id}"));
        } else {
            candidates.push(format!("[id={}]", quote_attr(id)));
        }
    }
    if let Some(name) = doc.attr(node, "name").filter(|v| !v.is_empty()) {
        if matches!(field_type, FieldType::Radio | FieldType::Checkbox) && tag == "input" {
            let value = doc.attr(node, "value").unwrap_or("on");
            candidates.push(format!(
                "input[type={}][name={}][value={}]",
                quote_attr(field_type.as_str()),
                quote_attr(name),
                quote_attr(value)
            ));
        }
        candidates.push(format!("{tag}[name={}]", quote_attr(name)));
    }
    for attr in ["placeholder", "aria-label", "data-testid"] {
        if let Some(value) = doc.attr(node, attr).filter(|v| !v.is_empty()) {
            candidates.push(format!("{tag}[{attr}={}]", quote_attr(value)));
        }
    }

    candidates
        .into_iter()
        .filter(|selector| match doc.query_selector_all(container, selector) {
            Ok(found) => found == [node],
            Err(e) => {
                debug!(selector = %selector, error = %e, "discarding selector");
                false
            }
        })
        .collect()
}
