mod common;

use std::collections::HashSet;

use common::*;
use form_detection::dom::document::{Document, DocumentId, ElementRef, NodeId};
use form_detection::dom::dom_model::NodeSnapshot;
use form_detection::dom::traversal::Page;
use form_detection::registry::detector::{DetectedField, DomFieldDetector, FieldDetector};
use form_detection::registry::field::{FIELD_MARKER_ATTR, Field, FieldType};
use form_detection::registry::unified::{RegistryState, UnifiedFieldRegistry};

fn at(node: usize) -> ElementRef {
    ElementRef::new(DocumentId(0), NodeId(node))
}

/// Wraps the DOM detector and appends fields no element backs.
struct WithExtras(Vec<Field>);

impl FieldDetector for WithExtras {
    fn detect_fields(&self, doc: &Document, container: NodeId, container_id: &str) -> Vec<DetectedField> {
        let mut fields = DomFieldDetector.detect_fields(doc, container, container_id);
        fields.extend(self.0.iter().cloned().map(DetectedField::from));
        fields
    }
}

/// Returns exactly the given fields.
struct Fixed(Vec<Field>);

impl FieldDetector for Fixed {
    fn detect_fields(&self, _doc: &Document, _container: NodeId, _container_id: &str) -> Vec<DetectedField> {
        self.0.iter().cloned().map(DetectedField::from).collect()
    }
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn signup_form_registers_three_fields_and_two_actions() {
    let mut page = page(signup_form());
    let mut registry = UnifiedFieldRegistry::default();

    let info = registry.register_container(&mut page, at(1), "signup");

    assert_eq!(info.field_count, 3);
    assert_eq!(info.resolved_count, 3);
    assert_eq!(info.individual_count, 1);
    assert_eq!(info.group_count, 1);
    assert_eq!(registry.state(), RegistryState::Populated);

    let fields = registry.get_all_fields(None);
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0].label.as_deref(), Some("Email"));

    let buttons = registry.get_field_buttons_data(&page, None);
    assert_eq!(buttons.len(), 2);

    let email = &buttons[0];
    assert_eq!(email.group_id, None);
    assert_eq!(email.field_type, FieldType::Text);
    assert_eq!(email.field.name.as_deref(), Some("email"));
    assert_eq!(email.element, at(3));

    let plan = &buttons[1];
    assert_eq!(plan.group_id.as_deref(), Some("radio-group-plan"));
    assert_eq!(plan.field_type, FieldType::Radio);
    assert_eq!(plan.element, at(4));
    let values: Vec<&str> = plan.field.options.iter().map(|o| o.value.as_str()).collect();
    assert_eq!(values, vec!["a", "b"]);
}

#[test]
fn resolved_elements_carry_the_field_marker() {
    let mut page = page(signup_form());
    let mut registry = UnifiedFieldRegistry::default();
    registry.register_container(&mut page, at(1), "signup");

    for entry in registry.entries() {
        let element = entry.element.unwrap();
        let doc = page.document(element.doc).unwrap();
        assert_eq!(doc.attr(element.node, FIELD_MARKER_ATTR), Some(entry.field.id.as_str()));
        assert!(entry.field.id.starts_with("field-"));
    }
}

#[test]
fn registration_is_idempotent_across_epochs() {
    let mut page = page(signup_form());
    let mut registry = UnifiedFieldRegistry::default();

    registry.register_container(&mut page, at(1), "signup");
    let first = registry.get_all_fields(None);
    let epoch = registry.epoch();

    registry.clear();
    assert_eq!(registry.state(), RegistryState::Empty);
    assert!(registry.get_all_fields(None).is_empty());
    assert_eq!(registry.epoch(), epoch + 1);

    registry.register_container(&mut page, at(1), "signup");
    let second = registry.get_all_fields(None);

    assert_eq!(first, second);
}

#[test]
fn nested_containers_never_share_elements() {
    // body > div.wrapper > [form > [a, b], c]
    let mut page = page(body([el("div").with_attr("class", "wrapper").with_children([
        el("form").with_children([input("text", "a"), input("text", "b")]),
        input("text", "c"),
    ])]));
    let mut registry = UnifiedFieldRegistry::default();

    let outer = registry.register_container(&mut page, at(1), "outer");
    let inner = registry.register_container(&mut page, at(2), "inner");

    assert_eq!(outer.field_count, 3);
    assert_eq!(inner.field_count, 0);
    assert_eq!(inner.skipped_duplicates, 2);

    let resolved = |container: &str| -> HashSet<ElementRef> {
        registry
            .get_container_fields(container)
            .iter()
            .filter_map(|e| e.element)
            .collect()
    };
    assert!(resolved("outer").is_disjoint(&resolved("inner")));
    assert_eq!(registry.get_registered_containers(), vec![at(1), at(2)]);
}

#[test]
fn sibling_containers_register_independently() {
    let mut page = page(body([
        el("form").with_children([input("email", "email"), input("password", "password")]),
        el("form").with_children([input("search", "q")]),
    ]));
    let mut registry = UnifiedFieldRegistry::default();

    let login = registry.register_container(&mut page, at(1), "login");
    let search = registry.register_container(&mut page, at(4), "search");

    assert_eq!(login.resolved_count, 2);
    assert_eq!(search.resolved_count, 1);
    assert_eq!(registry.get_all_fields(Some("search")).len(), 1);
    assert_eq!(registry.get_all_fields(Some("search"))[0].field_type, FieldType::Search);
}

#[test]
fn unannotated_fields_resolve_to_their_own_elements() {
    // body > div > [div(hidden) > input, input, input]
    let mut page = page(body([el("div").with_children([
        el("div").hidden().with_child(el("input")),
        el("input"),
        el("input"),
    ])]));
    let mut registry = UnifiedFieldRegistry::default();

    let info = registry.register_container(&mut page, at(1), "bare");

    assert_eq!(info.field_count, 2);
    assert_eq!(info.resolved_count, 2);
    let elements: Vec<Option<ElementRef>> = registry.entries().iter().map(|e| e.element).collect();
    assert_eq!(elements, vec![Some(at(4)), Some(at(5))]);

    let anchors: Vec<ElementRef> = registry
        .get_field_buttons_data(&page, None)
        .iter()
        .map(|b| b.element)
        .collect();
    assert_eq!(anchors, vec![at(4), at(5)]);
    assert!(page.root().attr(NodeId(3), FIELD_MARKER_ATTR).is_none());
}

#[test]
fn unannotated_fields_are_claimed_by_the_first_container() {
    // body > div.outer > div.inner > [input, input]
    let mut page = page(body([el("div")
        .with_attr("class", "outer")
        .with_child(el("div").with_attr("class", "inner").with_children([el("input"), el("input")]))]));
    let mut registry = UnifiedFieldRegistry::default();

    let inner = registry.register_container(&mut page, at(2), "inner");
    let outer = registry.register_container(&mut page, at(1), "outer");

    assert_eq!(inner.field_count, 2);
    assert_eq!(inner.resolved_count, 2);
    assert_eq!(outer.field_count, 0);
    assert_eq!(outer.skipped_duplicates, 2);
    assert_eq!(registry.entries().len(), 2);
}

// ============================================================================
// Grouping
// ============================================================================

#[test]
fn radio_groups_yield_one_action_whatever_their_size() {
    for members in [1usize, 2, 5] {
        let radios: Vec<NodeSnapshot> = (0..members).map(|i| radio("size", &format!("s{i}"))).collect();
        let mut page = page(body([el("form").with_children(radios)]));
        let mut registry = UnifiedFieldRegistry::default();

        registry.register_container(&mut page, at(1), "sizes");
        let buttons = registry.get_field_buttons_data(&page, None);

        let grouped: Vec<_> = buttons
            .iter()
            .filter(|b| b.group_id.as_deref() == Some("radio-group-size"))
            .collect();
        assert_eq!(grouped.len(), 1, "{members} radios");
        assert_eq!(grouped[0].element, at(2));
        assert_eq!(grouped[0].field.options.len(), members);
        assert_eq!(registry.get_group("radio-group-size").unwrap().members.len(), members);
    }
}

#[test]
fn lone_checkbox_stays_individual_but_sets_are_grouped() {
    let mut page = page(body([el("form").with_children([
        input("checkbox", "terms"),
        input("checkbox", "topics").with_attr("value", "news"),
        input("checkbox", "topics").with_attr("value", "offers"),
    ])]));
    let mut registry = UnifiedFieldRegistry::default();
    registry.register_container(&mut page, at(1), "prefs");

    let buttons = registry.get_field_buttons_data(&page, None);

    assert_eq!(buttons.len(), 2);
    assert_eq!(buttons[0].group_id, None);
    assert_eq!(buttons[0].field.name.as_deref(), Some("terms"));
    assert_eq!(buttons[1].group_id.as_deref(), Some("checkbox-group-topics"));
    assert_eq!(registry.groups().count(), 1);
}

// ============================================================================
// Resolution failures
// ============================================================================

#[test]
fn unresolved_fields_are_counted_but_not_actionable() {
    let ghost = Field::new("field-ghost", FieldType::Select).with_name("ghost");
    let mut page = page(signup_form());
    let mut registry = UnifiedFieldRegistry::new(Box::new(WithExtras(vec![ghost])));

    let info = registry.register_container(&mut page, at(1), "signup");

    assert_eq!(info.field_count, 4);
    assert_eq!(info.resolved_count, 3);
    assert!(registry.get_field("field-ghost").unwrap().element.is_none());
    let buttons = registry.get_field_buttons_data(&page, None);
    assert_eq!(buttons.len(), 2);
    assert!(buttons.iter().all(|b| b.field.id != "field-ghost"));
}

#[test]
fn extended_chain_recovers_fields_by_label() {
    let mut page = page(body([el("form").with_child(
        el("label").with_text("Coupon code").with_child(el("input")),
    )]));
    let coupon = Field::new("field-coupon", FieldType::Text).with_label("Coupon code");
    let mut registry = UnifiedFieldRegistry::new(Box::new(Fixed(vec![coupon])));

    let info = registry.register_container(&mut page, at(1), "promo");
    assert_eq!(info.resolved_count, 0);

    let buttons = registry.get_field_buttons_data(&page, None);
    assert_eq!(buttons.len(), 1);
    assert_eq!(buttons[0].element, at(3));
}

#[test]
fn colliding_ids_get_numeric_suffixes() {
    let mut page = page(body([el("form").with_children([input("text", "a"), input("text", "b")])]));
    let fields = vec![
        Field::new("field-dup", FieldType::Text).with_name("a"),
        Field::new("field-dup", FieldType::Text).with_name("b"),
    ];
    let mut registry = UnifiedFieldRegistry::new(Box::new(Fixed(fields)));

    registry.register_container(&mut page, at(1), "dup");

    let ids: Vec<String> = registry.get_all_fields(None).into_iter().map(|f| f.id).collect();
    assert_eq!(ids, vec!["field-dup", "field-dup-2"]);
    assert_eq!(registry.get_field("field-dup-2").unwrap().element, Some(at(3)));
}

#[test]
fn missing_document_registers_nothing() {
    let mut page = Page::load(snapshot("/", el("body")));
    let mut registry = UnifiedFieldRegistry::default();

    let info = registry.register_container(&mut page, ElementRef::new(DocumentId(7), NodeId(0)), "gone");

    assert_eq!(info.field_count, 0);
    assert!(info.element.is_none());
    assert_eq!(registry.state(), RegistryState::Empty);
}
