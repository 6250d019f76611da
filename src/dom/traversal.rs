use std::collections::HashSet;
use std::mem;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::dom::document::{Document, DocumentId, ElementRef, NodeId};
use crate::dom::dom_model::{DocumentSnapshot, FrameAccess, FrameSnapshot};
use crate::dom::elements::is_frame_host;
use crate::error::DetectionError;
use crate::monitor::subscription::{Sink, Subscribers, Subscription};

/// Marker written on hosts whose nested document cannot be inspected.
pub const INACCESSIBLE_ATTR: &str = "data-form-detect-inaccessible";

/// Nesting limit for frames inside frames.
pub const MAX_FRAME_DEPTH: usize = 10;

/// Shared handle to a live page. Never hold the lock across an `.await`.
pub type SharedPage = Arc<RwLock<Page>>;

#[derive(Debug, Clone, Serialize)]
pub struct InaccessibleFrame {
    pub host: ElementRef,
    pub src: Option<String>,
    pub reason: String,
}

/// Fired when a document is discovered after the initial traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentAdded {
    pub document: DocumentId,
    pub host: ElementRef,
}

/// The root document plus every reachable same-origin nested document.
pub struct Page {
    documents: Vec<Document>,
    depths: Vec<usize>,
    hosts: Vec<Option<ElementRef>>,
    keys: Vec<String>,
    inaccessible: Vec<InaccessibleFrame>,
    visited: HashSet<String>,
    added: Subscribers<DocumentAdded>,
}

impl Page {
    pub fn load(root: DocumentSnapshot) -> Self {
        let mut page = Page {
            documents: Vec::new(),
            depths: Vec::new(),
            hosts: Vec::new(),
            keys: Vec::new(),
            inaccessible: Vec::new(),
            visited: HashSet::new(),
            added: Subscribers::new(),
        };

        let key = address_key(&root.url, None);
        page.visited.insert(key.clone());
        let root_id = page.push_document(root, 0, None, key);
        page.traverse_frames(root_id);
        page
    }

    pub fn from_json(json: &str) -> Result<Self, DetectionError> {
        let snapshot: DocumentSnapshot =
            serde_json::from_str(json).map_err(|source| DetectionError::Snapshot {
                context: "document snapshot".into(),
                source,
            })?;
        Ok(Self::load(snapshot))
    }

    pub fn into_shared(self) -> SharedPage {
        Arc::new(RwLock::new(self))
    }

    pub fn root(&self) -> &Document {
        &self.documents[0]
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.documents.iter().map(Document::id).collect()
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(id.0)
    }

    pub fn document_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.get_mut(id.0)
    }

    pub fn inaccessible(&self) -> &[InaccessibleFrame] {
        &self.inaccessible
    }

    /// Notified for documents found after the initial traversal.
    pub fn on_document_added(&self, sink: Sink<DocumentAdded>) -> Subscription {
        self.added.subscribe(sink)
    }

    /// A frame finished loading (or a new frame element was inserted).
    /// Returns the documents that became reachable through it.
    pub fn attach_frame(&mut self, host: ElementRef, frame: FrameSnapshot) -> Vec<DocumentId> {
        let Some(doc) = self.document_mut(host.doc) else {
            warn!(%host, "frame attached to unknown document");
            return Vec::new();
        };
        doc.set_frame(host.node, frame);

        let before = self.documents.len();
        self.visit_frame(host.doc, host.node);
        self.announce_from(before, host)
    }

    /// Replace a document's content with a fresh snapshot of the same scope
    /// and traverse frames the new content reveals.
    ///
    /// Documents nested under the old content leave the page together with
    /// their visited keys and inaccessible records, so frames the new content
    /// embeds at previously seen addresses are traversed again. Documents
    /// after a removed one are renumbered; `id` itself keeps its number.
    pub fn replace_document(&mut self, id: DocumentId, snapshot: DocumentSnapshot) -> Vec<DocumentId> {
        if id.0 >= self.documents.len() {
            warn!(doc = id.0, "replace requested for unknown document");
            return Vec::new();
        }
        self.drop_nested(id);

        if id.0 == 0 {
            self.keys[0] = address_key(&snapshot.url, None);
        }
        self.documents[id.0] = Document::from_snapshot(id, snapshot);
        self.visited = self.keys.iter().cloned().collect();

        let before = self.documents.len();
        self.traverse_frames(id);
        self.announce_from(before, ElementRef::new(id, NodeId(0)))
    }

    fn announce_from(&self, before: usize, host: ElementRef) -> Vec<DocumentId> {
        let new_docs: Vec<DocumentId> = (before..self.documents.len()).map(DocumentId).collect();
        for document in &new_docs {
            debug!(doc = document.0, "nested document discovered");
            self.added.emit(&DocumentAdded {
                document: *document,
                host,
            });
        }
        new_docs
    }

    fn push_document(
        &mut self,
        snapshot: DocumentSnapshot,
        depth: usize,
        host: Option<ElementRef>,
        key: String,
    ) -> DocumentId {
        let id = DocumentId(self.documents.len());
        self.documents.push(Document::from_snapshot(id, snapshot));
        self.depths.push(depth);
        self.hosts.push(host);
        self.keys.push(key);
        id
    }

    /// Remove every document hosted (directly or transitively) by `id`,
    /// plus the inaccessible records raised while traversing `id`'s content.
    fn drop_nested(&mut self, id: DocumentId) {
        // Hosts always precede the documents they embed.
        let mut stale = vec![false; self.documents.len()];
        for i in (id.0 + 1)..self.documents.len() {
            if let Some(host) = self.hosts[i] {
                stale[i] = host.doc == id || stale[host.doc.0];
            }
        }

        let mut next = 0;
        let remap: Vec<Option<DocumentId>> = stale
            .iter()
            .map(|gone| {
                if *gone {
                    return None;
                }
                next += 1;
                Some(DocumentId(next - 1))
            })
            .collect();
        let moved = |r: ElementRef| remap[r.doc.0].map(|doc| ElementRef::new(doc, r.node));

        self.inaccessible = mem::take(&mut self.inaccessible)
            .into_iter()
            .filter(|frame| frame.host.doc != id)
            .filter_map(|mut frame| {
                frame.host = moved(frame.host)?;
                Some(frame)
            })
            .collect();

        let removed = stale.iter().filter(|gone| **gone).count();
        if removed == 0 {
            return;
        }
        debug!(doc = id.0, removed, "dropping documents nested in replaced content");

        let documents = mem::take(&mut self.documents);
        let depths = mem::take(&mut self.depths);
        let hosts = mem::take(&mut self.hosts);
        let keys = mem::take(&mut self.keys);
        let rows = documents.into_iter().zip(depths).zip(hosts).zip(keys);
        for (i, (((mut doc, depth), host), key)) in rows.enumerate() {
            let Some(new_id) = remap[i] else {
                continue;
            };
            doc.set_id(new_id);
            self.documents.push(doc);
            self.depths.push(depth);
            self.hosts.push(host.and_then(moved));
            self.keys.push(key);
        }
    }

    fn traverse_frames(&mut self, doc_id: DocumentId) {
        let hosts = match self.document(doc_id) {
            Some(doc) => doc.frame_hosts(),
            None => return,
        };
        for host in hosts {
            self.visit_frame(doc_id, host);
        }
    }

    fn visit_frame(&mut self, doc_id: DocumentId, host: NodeId) {
        let depth = self.depths.get(doc_id.0).copied().unwrap_or(0) + 1;
        let Some(parent) = self.document_mut(doc_id) else {
            return;
        };
        if !is_frame_host(parent, host) {
            debug!(doc = doc_id.0, node = host.0, tag = parent.tag(host), "frame on non-frame element");
        }
        let parent_url = parent.url().to_string();
        let Some(frame) = parent.take_frame(host) else {
            return;
        };
        let host_ref = ElementRef::new(doc_id, host);

        let document = match frame.access {
            FrameAccess::Pending => {
                // Put it back so a later `attach_frame` can complete it.
                if let Some(parent) = self.document_mut(doc_id) {
                    parent.set_frame(
                        host,
                        FrameSnapshot {
                            src: frame.src,
                            access: FrameAccess::Pending,
                        },
                    );
                }
                return;
            }
            FrameAccess::Denied { reason } => {
                let reason = reason.unwrap_or_else(|| "access denied".into());
                self.mark_inaccessible(host_ref, frame.src, reason);
                return;
            }
            FrameAccess::Loaded { document } => document,
        };

        if depth > MAX_FRAME_DEPTH {
            warn!(%host_ref, depth, "frame nesting limit reached");
            return;
        }

        let src = frame.src.clone().unwrap_or_else(|| document.url.clone());
        if !is_accessible(&parent_url, &src) {
            self.mark_inaccessible(host_ref, frame.src, "cross-origin".into());
            return;
        }

        let key = address_key(&resolve_src(&parent_url, &src), Some(host_ref));
        if !self.visited.insert(key.clone()) {
            debug!(%host_ref, src = %src, "nested document already visited");
            return;
        }

        let child = self.push_document(*document, depth, Some(host_ref), key);
        self.traverse_frames(child);
    }

    fn mark_inaccessible(&mut self, host: ElementRef, src: Option<String>, reason: String) {
        debug!(%host, src = ?src, reason = %reason, "nested document inaccessible");
        if let Some(doc) = self.document_mut(host.doc) {
            doc.set_attr(host.node, INACCESSIBLE_ATTR, "true");
        }
        self.inaccessible.push(InaccessibleFrame { host, src, reason });
    }
}

/// Schemes whose content inherits the embedding document's origin.
fn is_embedded_scheme(src: &str) -> bool {
    let lower = src.trim().to_ascii_lowercase();
    lower.is_empty()
        || ["about:", "data:", "blob:", "javascript:", "srcdoc"]
            .iter()
            .any(|s| lower.starts_with(s))
}

/// Same origin as the parent, or embedded content.
pub fn is_accessible(parent_url: &str, src: &str) -> bool {
    if is_embedded_scheme(src) {
        return true;
    }

    let parent = match Url::parse(parent_url) {
        Ok(u) => u,
        Err(_) => return false,
    };
    // Relative src resolves against the parent.
    match parent.join(src) {
        Ok(child) => child.origin() == parent.origin(),
        Err(_) => false,
    }
}

/// Absolute form of a frame address; embedded content stays as written.
fn resolve_src(parent_url: &str, src: &str) -> String {
    if is_embedded_scheme(src) {
        return src.to_string();
    }
    Url::parse(parent_url)
        .and_then(|parent| parent.join(src))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| src.trim().to_string())
}

/// Origin + address identity used for the visited set. Embedded documents
/// share an address, so they are keyed by their host element too.
fn address_key(src: &str, host: Option<ElementRef>) -> String {
    if is_embedded_scheme(src) {
        return match host {
            Some(h) => format!("{}@{}", src.trim(), h),
            None => src.trim().to_string(),
        };
    }

    match Url::parse(src) {
        Ok(u) => format!("{}{}", u.origin().ascii_serialization(), u.path()),
        Err(_) => src.trim().to_string(),
    }
}
