//! The slice of the host document the pipeline is allowed to touch.
//!
//! Implementations wrap a live DOM (or a test double). Element handles are
//! opaque ids; an id for an element that has been removed from the document
//! stays valid as a value but queries on it return `None`/`false`.

use crate::panel::PanelPosition;
use crate::panel::PanelView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// A file built from fetched bytes, handed to a native `<input type=file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub shift: bool,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            shift: false,
        }
    }

    pub fn enter() -> Self {
        Self::new("Enter")
    }

    pub fn is_plain_enter(&self) -> bool {
        self.key == "Enter" && !self.shift
    }

    pub fn is_escape(&self) -> bool {
        self.key == "Escape"
    }
}

/// Synthetic events dispatched with `bubbles: true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntheticEvent {
    /// `change`, used after assigning files.
    Change,
    /// `input`, used after appending text.
    Input,
    KeyDown(KeyPress),
}

pub trait Page: Clone + Send + Sync + 'static {
    /// All connected elements matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Vec<ElementId>;

    fn query_selector(&self, selector: &str) -> Option<ElementId> {
        self.query_selector_all(selector).into_iter().next()
    }

    /// First descendant of `scope` matching `selector`.
    fn query_selector_within(&self, scope: ElementId, selector: &str) -> Option<ElementId>;

    /// Nearest inclusive ancestor of `element` matching `selector`.
    fn closest(&self, element: ElementId, selector: &str) -> Option<ElementId>;

    /// Whether `root` or any of its descendants matches `selector`.
    fn subtree_matches(&self, root: ElementId, selector: &str) -> bool;

    /// Inclusive containment, as `Node.contains`.
    fn contains(&self, ancestor: ElementId, node: ElementId) -> bool;

    fn is_connected(&self, element: ElementId) -> bool;

    /// `value` for form controls, text content for editable elements.
    fn text_value(&self, element: ElementId) -> Option<String>;

    /// Appends to the element's value or text content. Returns `false` when
    /// the element does not hold text.
    fn append_text(&self, element: ElementId, text: &str) -> bool;

    fn bounding_rect(&self, element: ElementId) -> Option<Rect>;

    fn viewport(&self) -> Viewport;

    /// Assigns `files` through the platform's file-list construction. Returns
    /// `false` when the element is not a file input or the host refused.
    fn assign_files(&self, input: ElementId, files: Vec<SyntheticFile>) -> bool;

    fn dispatch(&self, element: ElementId, event: SyntheticEvent);

    fn click(&self, element: ElementId);

    /// Creates a new floating panel element attached to the document body.
    fn mount_panel(&self, view: &PanelView) -> ElementId;

    /// Replaces the contents of a mounted panel.
    fn render_panel(&self, panel: ElementId, view: &PanelView);

    fn position_panel(&self, panel: ElementId, position: &PanelPosition);

    fn remove_element(&self, element: ElementId);
}
