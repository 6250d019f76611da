use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Snapshot model produced by the host adapter (one JSON tree per document)
// ============================================================================

/// Serialized view of one live document, as extracted by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub url: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub viewport: Viewport,

    pub root: NodeSnapshot,
}

/// One element of a document snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub tag: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Direct text of the element (not including descendants).
    #[serde(default)]
    pub text: Option<String>,

    /// Layout box in document coordinates. Absent when layout is unknown.
    #[serde(default)]
    pub rect: Option<Rect>,

    /// `display:none` or `visibility:hidden` as computed by the host.
    #[serde(default)]
    pub hidden: bool,

    #[serde(default)]
    pub children: Vec<NodeSnapshot>,

    /// Nested document hosted by `iframe`/`frame`/`object`/`embed`.
    #[serde(default)]
    pub frame: Option<FrameSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSnapshot {
    #[serde(default)]
    pub src: Option<String>,

    #[serde(flatten)]
    pub access: FrameAccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FrameAccess {
    Loaded { document: Box<DocumentSnapshot> },
    Denied {
        #[serde(default)]
        reason: Option<String>,
    },
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Entirely left of, right of, or above the viewport. Content below the
    /// fold is reachable by scrolling and does not count.
    pub fn is_outside(&self, viewport: &Viewport) -> bool {
        self.right() <= 0.0 || self.x >= viewport.width || self.bottom() <= 0.0
    }
}

impl NodeSnapshot {
    pub fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Some(Rect::new(x, y, width, height));
        self
    }

    pub fn with_child(mut self, child: NodeSnapshot) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeSnapshot>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_frame(mut self, frame: FrameSnapshot) -> Self {
        self.frame = Some(frame);
        self
    }
}

impl DocumentSnapshot {
    pub fn new(url: &str, root: NodeSnapshot) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            viewport: Viewport::default(),
            root,
        }
    }
}
