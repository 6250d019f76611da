use std::collections::HashSet;

use tracing::debug;

use crate::dom::document::{Document, NodeId};
use crate::dom::elements::{is_content_editable, is_field_element, is_visible, visible_fields};
use crate::dom::selector::quote_attr;
use crate::registry::detector::{classify_field, label_text};
use crate::registry::field::{FIELD_MARKER_ATTR, Field, FieldType};
use crate::registry::identity::normalize_label;

/// Everything a strategy may look at.
pub struct ResolveScope<'a> {
    pub doc: &'a Document,
    pub container: NodeId,
}

/// One resolution technique: candidate elements for `field`, best first.
pub struct Strategy {
    pub name: &'static str,
    pub find: fn(&ResolveScope<'_>, &Field) -> Vec<NodeId>,
}

/// Used when a container is registered.
pub const INITIAL_CHAIN: &[Strategy] = &[
    Strategy { name: "marker", find: by_marker },
    Strategy { name: "unique-selector", find: by_first_selector },
    Strategy { name: "name", find: by_name },
    Strategy { name: "id", find: by_html_id },
];

/// Retried for fields whose initial resolution failed.
pub const EXTENDED_CHAIN: &[Strategy] = &[
    Strategy { name: "name", find: by_name },
    Strategy { name: "label", find: by_label },
    Strategy { name: "placeholder", find: by_placeholder },
    Strategy { name: "type", find: by_type },
    Strategy { name: "role", find: by_role },
    Strategy { name: "contenteditable", find: by_content_editable },
];

/// Try each strategy in order; return the first candidate not in `taken`.
pub fn resolve(
    chain: &[Strategy],
    scope: &ResolveScope<'_>,
    field: &Field,
    taken: &HashSet<NodeId>,
) -> Option<NodeId> {
    for strategy in chain {
        if let Some(found) = (strategy.find)(scope, field)
            .into_iter()
            .find(|n| !taken.contains(n))
        {
            debug!(field = %field.id, strategy = strategy.name, node = found.0, "field resolved");
            return Some(found);
        }
    }
    None
}

fn select(scope: &ResolveScope<'_>, selector: &str) -> Vec<NodeId> {
    match scope.doc.query_selector_all(scope.container, selector) {
        Ok(found) => found,
        Err(e) => {
            debug!(selector, error = %e, "selector rejected");
            Vec::new()
        }
    }
}

/// Visible field elements inside the container.
fn fields_in(scope: &ResolveScope<'_>) -> Vec<NodeId> {
    visible_fields(scope.doc, scope.container)
}

/// Visible descendants of the container, fields or not.
fn visible_in(scope: &ResolveScope<'_>) -> Vec<NodeId> {
    scope
        .doc
        .descendants(scope.container)
        .into_iter()
        .filter(|n| is_visible(scope.doc, *n))
        .collect()
}

fn by_marker(scope: &ResolveScope<'_>, field: &Field) -> Vec<NodeId> {
    select(scope, &format!("[{}={}]", FIELD_MARKER_ATTR, quote_attr(&field.id)))
}

fn by_first_selector(scope: &ResolveScope<'_>, field: &Field) -> Vec<NodeId> {
    field
        .selectors
        .first()
        .map(|s| select(scope, s))
        .unwrap_or_default()
}

fn by_name(scope: &ResolveScope<'_>, field: &Field) -> Vec<NodeId> {
    let Some(name) = field.name.as_deref() else {
        return Vec::new();
    };
    fields_in(scope)
        .into_iter()
        .filter(|n| scope.doc.attr(*n, "name") == Some(name))
        .collect()
}

fn by_html_id(scope: &ResolveScope<'_>, field: &Field) -> Vec<NodeId> {
    match (field.html_id.as_deref(), field.name.as_deref()) {
        (Some(id), name) if name != Some(id) => fields_in(scope)
            .into_iter()
            .filter(|n| scope.doc.attr(*n, "id") == Some(id))
            .collect(),
        _ => Vec::new(),
    }
}

/// A label whose text equals or contains the field label; its `for` target,
/// else the first field inside it.
fn by_label(scope: &ResolveScope<'_>, field: &Field) -> Vec<NodeId> {
    let Some(wanted) = field.label.as_deref().map(str::to_lowercase) else {
        return Vec::new();
    };
    let doc = scope.doc;

    visible_in(scope)
        .into_iter()
        .filter(|n| doc.tag(*n) == "label")
        .filter(|l| {
            normalize_label(&label_text(doc, *l))
                .map(|t| t.to_lowercase())
                .is_some_and(|t| t == wanted || t.contains(&wanted))
        })
        .filter_map(|l| {
            doc.attr(l, "for")
                .and_then(|id| doc.element_by_id(id))
                .filter(|target| is_field_element(doc, *target) && is_visible(doc, *target))
                .or_else(|| {
                    doc.descendants(l)
                        .into_iter()
                        .find(|d| is_field_element(doc, *d) && is_visible(doc, *d))
                })
        })
        .collect()
}

fn by_placeholder(scope: &ResolveScope<'_>, field: &Field) -> Vec<NodeId> {
    let Some(placeholder) = field.placeholder.as_deref() else {
        return Vec::new();
    };
    fields_in(scope)
        .into_iter()
        .filter(|n| scope.doc.attr(*n, "placeholder") == Some(placeholder))
        .collect()
}

fn by_type(scope: &ResolveScope<'_>, field: &Field) -> Vec<NodeId> {
    fields_in(scope)
        .into_iter()
        .filter(|n| scope.doc.attr(*n, "role").is_none() && classify_field(scope.doc, *n) == field.field_type)
        .collect()
}

fn by_role(scope: &ResolveScope<'_>, field: &Field) -> Vec<NodeId> {
    let roles: &[&str] = match field.field_type {
        FieldType::Text | FieldType::Email | FieldType::Tel | FieldType::Url | FieldType::Password => &["textbox"],
        FieldType::Textarea | FieldType::ContentEditable => &["textbox"],
        FieldType::Search => &["searchbox", "textbox"],
        FieldType::Select => &["combobox", "listbox"],
        FieldType::Checkbox => &["checkbox", "switch"],
        FieldType::Radio => &["radio"],
        FieldType::Number => &["spinbutton", "slider"],
        _ => return Vec::new(),
    };
    visible_in(scope)
        .into_iter()
        .filter(|n| {
            scope
                .doc
                .attr(*n, "role")
                .is_some_and(|r| roles.contains(&r.to_ascii_lowercase().as_str()))
        })
        .collect()
}

fn by_content_editable(scope: &ResolveScope<'_>, field: &Field) -> Vec<NodeId> {
    if !field.field_type.is_text_like() {
        return Vec::new();
    }
    visible_in(scope)
        .into_iter()
        .filter(|n| is_content_editable(scope.doc, *n))
        .collect()
}
