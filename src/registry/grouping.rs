use std::collections::HashMap;

use serde::Serialize;

use crate::dom::document::ElementRef;
use crate::registry::field::{Field, FieldOption, FieldType};

/// How a registered field is presented to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Grouping {
    Individual,
    Grouped { group_id: String },
}

/// Fields sharing one user-facing action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldGroup {
    pub group_id: String,
    pub group_type: FieldType,
    /// Member field ids in registration order.
    pub members: Vec<String>,
    pub options: Vec<FieldOption>,
    /// Anchor for the group's single action; seeded by the first member.
    pub primary_element: Option<ElementRef>,
}

/// Group id for fields that must be grouped: radios always, checkboxes
/// with more than one option.
pub fn group_key(field: &Field) -> Option<String> {
    let grouped = match field.field_type {
        FieldType::Radio => true,
        FieldType::Checkbox => field.options.len() > 1,
        _ => false,
    };
    if !grouped {
        return None;
    }
    let suffix = field.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&field.id);
    Some(format!("{}-group-{}", field.field_type.as_str(), suffix))
}

/// Groups of one registry epoch, in first-seen order.
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: Vec<FieldGroup>,
    index: HashMap<String, usize>,
}

impl GroupTable {
    /// Add `field` to its group, seeding the group on first sight. Returns the
    /// group id, or `None` if the field stays individual.
    pub fn assign(&mut self, field: &Field, element: Option<ElementRef>) -> Option<String> {
        let key = group_key(field)?;

        match self.index.get(&key) {
            Some(&i) => {
                let group = &mut self.groups[i];
                group.members.push(field.id.clone());
                if field.options.len() > group.options.len() {
                    group.options = field.options.clone();
                }
            }
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push(FieldGroup {
                    group_id: key.clone(),
                    group_type: field.field_type,
                    members: vec![field.id.clone()],
                    options: field.options.clone(),
                    primary_element: element,
                });
            }
        }
        Some(key)
    }

    pub fn get(&self, group_id: &str) -> Option<&FieldGroup> {
        self.index.get(group_id).map(|&i| &self.groups[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.index.clear();
    }
}
