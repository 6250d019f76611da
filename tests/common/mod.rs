#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use form_detection::dom::dom_model::{DocumentSnapshot, FrameAccess, FrameSnapshot, NodeSnapshot};
use form_detection::dom::traversal::Page;
use form_detection::monitor::subscription::Sink;

pub const ORIGIN: &str = "https://shop.test";

pub fn el(tag: &str) -> NodeSnapshot {
    NodeSnapshot::element(tag)
}

pub fn input(input_type: &str, name: &str) -> NodeSnapshot {
    el("input").with_attr("type", input_type).with_attr("name", name)
}

pub fn radio(name: &str, value: &str) -> NodeSnapshot {
    input("radio", name).with_attr("value", value)
}

pub fn body(children: impl IntoIterator<Item = NodeSnapshot>) -> NodeSnapshot {
    el("body").with_children(children)
}

pub fn snapshot(path: &str, root: NodeSnapshot) -> DocumentSnapshot {
    DocumentSnapshot::new(&format!("{ORIGIN}{path}"), root)
}

pub fn page(root: NodeSnapshot) -> Page {
    Page::load(snapshot("/signup", root))
}

/// body > form > [label "Email", input#email, radio plan=a, radio plan=b]
pub fn signup_form() -> NodeSnapshot {
    body([el("form").with_children([
        el("label").with_attr("for", "email").with_text("Email"),
        el("input").with_attr("id", "email").with_attr("name", "email"),
        radio("plan", "a"),
        radio("plan", "b"),
    ])])
}

pub fn frame(src: &str, document: DocumentSnapshot) -> FrameSnapshot {
    FrameSnapshot {
        src: Some(src.to_string()),
        access: FrameAccess::Loaded {
            document: Box::new(document),
        },
    }
}

pub fn denied_frame(src: &str) -> FrameSnapshot {
    FrameSnapshot {
        src: Some(src.to_string()),
        access: FrameAccess::Denied { reason: None },
    }
}

pub fn pending_frame(src: &str) -> FrameSnapshot {
    FrameSnapshot {
        src: Some(src.to_string()),
        access: FrameAccess::Pending,
    }
}

/// Sink that stores every event it receives.
pub fn recorder<T: Clone + Send + 'static>() -> (Sink<T>, Arc<Mutex<Vec<T>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let sink: Sink<T> = Arc::new(move |event: &T| sink_seen.lock().push(event.clone()));
    (sink, seen)
}
