use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dom::document::{ElementRef, NodeId};
use crate::dom::traversal::Page;
use crate::registry::detector::{DetectedField, DomFieldDetector, FieldDetector};
use crate::registry::field::{FIELD_MARKER_ATTR, Field, FieldType};
use crate::registry::grouping::{FieldGroup, GroupTable, Grouping};
use crate::registry::resolver::{EXTENDED_CHAIN, INITIAL_CHAIN, ResolveScope, resolve};

/// Epoch lifecycle: `Empty -> Populating -> Populated -> Empty` (via `clear`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryState {
    Empty,
    Populating,
    Populated,
}

/// A field joined with its container, resolved element and grouping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldEntry {
    pub field: Field,
    pub container: ElementRef,
    pub container_id: String,
    /// `None` when resolution failed; such entries get no action.
    pub element: Option<ElementRef>,
    pub grouping: Grouping,
}

impl FieldEntry {
    pub fn group_id(&self) -> Option<&str> {
        match &self.grouping {
            Grouping::Grouped { group_id } => Some(group_id),
            Grouping::Individual => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub container_id: String,
    pub element: Option<ElementRef>,
    /// Fields registered for this container, resolved or not.
    pub field_count: usize,
    pub individual_count: usize,
    /// Distinct groups this container's fields joined.
    pub group_count: usize,
    pub resolved_count: usize,
    /// Fields whose element an earlier container already claimed.
    pub skipped_duplicates: usize,
}

/// One actionable entry for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldButtonData {
    pub field: Field,
    pub element: ElementRef,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub group_id: Option<String>,
}

#[derive(Debug, Clone)]
struct RegisteredContainer {
    id: String,
    element: ElementRef,
}

/// Single source of truth for field identity within one epoch.
///
/// Caller-owned; registrations take `&mut Page` so claims commit in order.
pub struct UnifiedFieldRegistry {
    detector: Box<dyn FieldDetector>,
    epoch: u64,
    state: RegistryState,
    entries: Vec<FieldEntry>,
    by_id: HashMap<String, usize>,
    containers: Vec<RegisteredContainer>,
    claims: HashMap<ElementRef, String>,
    groups: GroupTable,
}

impl Default for UnifiedFieldRegistry {
    fn default() -> Self {
        Self::new(Box::new(DomFieldDetector))
    }
}

impl UnifiedFieldRegistry {
    pub fn new(detector: Box<dyn FieldDetector>) -> Self {
        Self {
            detector,
            epoch: 0,
            state: RegistryState::Empty,
            entries: Vec::new(),
            by_id: HashMap::new(),
            containers: Vec::new(),
            claims: HashMap::new(),
            groups: GroupTable::default(),
        }
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop every entry, claim and group and start a new epoch. Markers
    /// already written on elements stay, so ids survive re-registration.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_id.clear();
        self.containers.clear();
        self.claims.clear();
        self.groups.clear();
        self.epoch += 1;
        self.state = RegistryState::Empty;
        debug!(epoch = self.epoch, "registry cleared");
    }

    /// Detect, resolve, deduplicate and group the fields of one container.
    pub fn register_container(&mut self, page: &mut Page, container: ElementRef, container_id: &str) -> ContainerInfo {
        let previous = self.state;
        self.state = RegistryState::Populating;

        let mut info = ContainerInfo {
            container_id: container_id.to_string(),
            element: Some(container),
            ..Default::default()
        };

        let resolved: Vec<(Field, Option<NodeId>)> = {
            let Some(doc) = page.document(container.doc) else {
                warn!(%container, container_id, "container document is gone; nothing registered");
                self.state = previous;
                info.element = None;
                return info;
            };

            let scope = ResolveScope { doc, container: container.node };
            let mut taken: HashSet<NodeId> = HashSet::new();
            self.detector
                .detect_fields(doc, container.node, container_id)
                .into_iter()
                .map(|DetectedField { field, node: source }| {
                    // The element the field was read from backs it when no
                    // marker, selector, name or id identifies it.
                    let node = resolve(INITIAL_CHAIN, &scope, &field, &taken)
                        .or_else(|| source.filter(|n| !taken.contains(n)));
                    if let Some(n) = node {
                        taken.insert(n);
                    }
                    (field, node)
                })
                .collect()
        };

        let mut groups_joined: HashSet<String> = HashSet::new();
        for (mut field, node) in resolved {
            let element = node.map(|n| ElementRef::new(container.doc, n));

            if let Some(el) = element {
                if let Some(owner) = self.claims.get(&el) {
                    debug!(field = %field.id, %el, owner = %owner, container_id, "element already claimed; skipped");
                    info.skipped_duplicates += 1;
                    continue;
                }
            } else {
                warn!(field = %field.id, container_id, "field could not be resolved to an element");
            }

            field.id = self.unique_id(&field.id);

            if let Some(el) = element {
                if let Some(doc) = page.document_mut(el.doc) {
                    doc.set_attr(el.node, FIELD_MARKER_ATTR, &field.id);
                }
                self.claims.insert(el, container_id.to_string());
                info.resolved_count += 1;
            }

            let grouping = match self.groups.assign(&field, element) {
                Some(group_id) => {
                    groups_joined.insert(group_id.clone());
                    Grouping::Grouped { group_id }
                }
                None => {
                    info.individual_count += 1;
                    Grouping::Individual
                }
            };

            info.field_count += 1;
            self.by_id.insert(field.id.clone(), self.entries.len());
            self.entries.push(FieldEntry {
                field,
                container,
                container_id: container_id.to_string(),
                element,
                grouping,
            });
        }
        info.group_count = groups_joined.len();

        if !self.containers.iter().any(|c| c.id == container_id) {
            self.containers.push(RegisteredContainer {
                id: container_id.to_string(),
                element: container,
            });
        }
        self.state = RegistryState::Populated;

        info!(
            container_id,
            fields = info.field_count,
            groups = info.group_count,
            resolved = info.resolved_count,
            skipped = info.skipped_duplicates,
            "container registered"
        );
        info
    }

    /// `base`, or `base-2`, `base-3`... if already bound this epoch.
    fn unique_id(&self, base: &str) -> String {
        if !self.by_id.contains_key(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.by_id.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn get_field(&self, id: &str) -> Option<&FieldEntry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    /// Snapshots of every field, optionally for one container.
    pub fn get_all_fields(&self, container_id: Option<&str>) -> Vec<Field> {
        self.entries
            .iter()
            .filter(|e| container_id.is_none_or(|c| e.container_id == c))
            .map(|e| e.field.clone())
            .collect()
    }

    pub fn get_container_fields(&self, container_id: &str) -> Vec<&FieldEntry> {
        self.entries.iter().filter(|e| e.container_id == container_id).collect()
    }

    pub fn get_registered_containers(&self) -> Vec<ElementRef> {
        self.containers.iter().map(|c| c.element).collect()
    }

    pub fn get_group(&self, group_id: &str) -> Option<&FieldGroup> {
        self.groups.get(group_id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &FieldGroup> {
        self.groups.iter()
    }

    /// One actionable entry per individual field and per group.
    ///
    /// Unresolved individual fields are retried with the extended chain,
    /// never taking an element another entry already uses.
    pub fn get_field_buttons_data(&self, page: &Page, container_id: Option<&str>) -> Vec<FieldButtonData> {
        let mut used: HashSet<ElementRef> = self.claims.keys().copied().collect();
        let mut emitted_groups: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        for entry in self
            .entries
            .iter()
            .filter(|e| container_id.is_none_or(|c| e.container_id == c))
        {
            match &entry.grouping {
                Grouping::Individual => {
                    let element = entry.element.or_else(|| self.retry(page, entry, &used));
                    let Some(element) = element else {
                        debug!(field = %entry.field.id, "no element for field; omitted from actions");
                        continue;
                    };
                    used.insert(element);
                    out.push(FieldButtonData {
                        field: entry.field.clone(),
                        element,
                        field_type: entry.field.field_type,
                        group_id: None,
                    });
                }
                Grouping::Grouped { group_id } => {
                    if !emitted_groups.insert(group_id.as_str()) {
                        continue;
                    }
                    let Some(group) = self.groups.get(group_id) else {
                        continue;
                    };

                    let anchor = group
                        .primary_element
                        .or_else(|| {
                            group
                                .members
                                .iter()
                                .filter_map(|id| self.get_field(id))
                                .find_map(|member| member.element)
                        })
                        .or_else(|| self.retry(page, entry, &used));
                    let Some(element) = anchor else {
                        debug!(group = %group_id, "no element for group; omitted from actions");
                        continue;
                    };
                    used.insert(element);

                    let mut field = entry.field.clone();
                    field.options = group.options.clone();
                    out.push(FieldButtonData {
                        field,
                        element,
                        field_type: group.group_type,
                        group_id: Some(group_id.clone()),
                    });
                }
            }
        }
        out
    }

    fn retry(&self, page: &Page, entry: &FieldEntry, used: &HashSet<ElementRef>) -> Option<ElementRef> {
        let doc = page.document(entry.container.doc)?;
        let taken: HashSet<NodeId> = used
            .iter()
            .filter(|e| e.doc == entry.container.doc)
            .map(|e| e.node)
            .collect();
        let scope = ResolveScope {
            doc,
            container: entry.container.node,
        };
        resolve(EXTENDED_CHAIN, &scope, &entry.field, &taken).map(|n| ElementRef::new(doc.id(), n))
    }
}
