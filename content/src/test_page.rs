//! In-memory [`Page`] used by unit tests.
//!
//! Elements match a selector when it is listed verbatim in the element's
//! selector set; adapters query with fixed strings, so tests register exactly
//! the strings the code under test will ask for.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::page::ElementId;
use crate::page::Page;
use crate::page::Rect;
use crate::page::SyntheticEvent;
use crate::page::SyntheticFile;
use crate::page::Viewport;
use crate::panel::PanelPosition;
use crate::panel::PanelView;

pub const PANEL_SELECTOR: &str = ".smart-sticker-bar";

#[derive(Debug, Clone, PartialEq)]
pub enum PageAction {
    AssignFiles {
        element: ElementId,
        files: Vec<SyntheticFile>,
    },
    Dispatch {
        element: ElementId,
        event: SyntheticEvent,
    },
    Click(ElementId),
}

#[derive(Debug)]
struct TestElement {
    parent: Option<ElementId>,
    selectors: Vec<String>,
    text: Option<String>,
    rect: Rect,
    connected: bool,
}

#[derive(Debug)]
struct PanelRecord {
    view: PanelView,
    position: Option<PanelPosition>,
}

#[derive(Debug)]
struct Inner {
    next_id: u64,
    elements: BTreeMap<ElementId, TestElement>,
    panels: BTreeMap<ElementId, PanelRecord>,
    viewport: Viewport,
    reject_uploads: bool,
    actions: Vec<PageAction>,
}

impl Inner {
    fn is_inclusive_ancestor(&self, ancestor: ElementId, node: ElementId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.elements.get(&id).and_then(|element| element.parent);
        }
        false
    }

    fn matches(&self, id: ElementId, selector: &str) -> bool {
        self.elements.get(&id).is_some_and(|element| {
            element.connected && element.selectors.iter().any(|s| s == selector)
        })
    }
}

#[derive(Debug, Clone)]
pub struct TestPage {
    inner: Arc<Mutex<Inner>>,
}

impl TestPage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 1,
                elements: BTreeMap::new(),
                panels: BTreeMap::new(),
                viewport: Viewport {
                    width: 1280.0,
                    height: 800.0,
                },
                reject_uploads: false,
                actions: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(err) => err.into_inner(),
        }
    }

    pub fn add_element(&self, parent: Option<ElementId>, selectors: &[&str]) -> ElementId {
        let mut inner = self.lock();
        let id = ElementId(inner.next_id);
        inner.next_id += 1;
        inner.elements.insert(
            id,
            TestElement {
                parent,
                selectors: selectors.iter().map(|s| (*s).to_string()).collect(),
                text: None,
                rect: Rect::default(),
                connected: true,
            },
        );
        id
    }

    /// A text-holding element positioned low enough for the panel to open above it.
    pub fn add_input(&self, selectors: &[&str], text: &str) -> ElementId {
        self.add_input_within(None, selectors, text)
    }

    pub fn add_input_within(
        &self,
        parent: Option<ElementId>,
        selectors: &[&str],
        text: &str,
    ) -> ElementId {
        let id = self.add_element(parent, selectors);
        let mut inner = self.lock();
        if let Some(element) = inner.elements.get_mut(&id) {
            element.text = Some(text.to_string());
            element.rect = Rect {
                left: 40.0,
                top: 600.0,
                width: 600.0,
                height: 40.0,
            };
        }
        id
    }

    pub fn set_text(&self, element: ElementId, text: &str) {
        if let Some(element) = self.lock().elements.get_mut(&element) {
            element.text = Some(text.to_string());
        }
    }

    pub fn text(&self, element: ElementId) -> Option<String> {
        self.lock()
            .elements
            .get(&element)
            .and_then(|element| element.text.clone())
    }

    pub fn set_rect(&self, element: ElementId, rect: Rect) {
        if let Some(element) = self.lock().elements.get_mut(&element) {
            element.rect = rect;
        }
    }

    /// Detaches `element` and its whole subtree.
    pub fn remove(&self, element: ElementId) {
        let mut inner = self.lock();
        let subtree: Vec<ElementId> = inner
            .elements
            .keys()
            .copied()
            .filter(|id| inner.is_inclusive_ancestor(element, *id))
            .collect();
        for id in subtree {
            if let Some(element) = inner.elements.get_mut(&id) {
                element.connected = false;
            }
        }
    }

    pub fn reject_uploads(&self) {
        self.lock().reject_uploads = true;
    }

    pub fn actions(&self) -> Vec<PageAction> {
        self.lock().actions.clone()
    }

    pub fn mounted_panels(&self) -> Vec<ElementId> {
        self.lock().panels.keys().copied().collect()
    }

    pub fn panel_view(&self, panel: ElementId) -> Option<PanelView> {
        self.lock().panels.get(&panel).map(|record| record.view.clone())
    }

    pub fn panel_position(&self, panel: ElementId) -> Option<PanelPosition> {
        self.lock().panels.get(&panel).and_then(|record| record.position)
    }
}

impl Page for TestPage {
    fn query_selector_all(&self, selector: &str) -> Vec<ElementId> {
        let inner = self.lock();
        inner
            .elements
            .keys()
            .copied()
            .filter(|id| inner.matches(*id, selector))
            .collect()
    }

    fn query_selector_within(&self, scope: ElementId, selector: &str) -> Option<ElementId> {
        let inner = self.lock();
        inner.elements.keys().copied().find(|id| {
            *id != scope && inner.matches(*id, selector) && inner.is_inclusive_ancestor(scope, *id)
        })
    }

    fn closest(&self, element: ElementId, selector: &str) -> Option<ElementId> {
        let inner = self.lock();
        let mut current = Some(element);
        while let Some(id) = current {
            if inner.matches(id, selector) {
                return Some(id);
            }
            current = inner.elements.get(&id).and_then(|element| element.parent);
        }
        None
    }

    fn subtree_matches(&self, root: ElementId, selector: &str) -> bool {
        let inner = self.lock();
        inner
            .elements
            .keys()
            .any(|id| inner.matches(*id, selector) && inner.is_inclusive_ancestor(root, *id))
    }

    fn contains(&self, ancestor: ElementId, node: ElementId) -> bool {
        self.lock().is_inclusive_ancestor(ancestor, node)
    }

    fn is_connected(&self, element: ElementId) -> bool {
        self.lock()
            .elements
            .get(&element)
            .is_some_and(|element| element.connected)
    }

    fn text_value(&self, element: ElementId) -> Option<String> {
        self.lock()
            .elements
            .get(&element)
            .filter(|element| element.connected)
            .and_then(|element| element.text.clone())
    }

    fn append_text(&self, element: ElementId, text: &str) -> bool {
        let mut inner = self.lock();
        match inner
            .elements
            .get_mut(&element)
            .and_then(|element| element.text.as_mut())
        {
            Some(existing) => {
                existing.push_str(text);
                true
            }
            None => false,
        }
    }

    fn bounding_rect(&self, element: ElementId) -> Option<Rect> {
        self.lock()
            .elements
            .get(&element)
            .filter(|element| element.connected)
            .map(|element| element.rect)
    }

    fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    fn assign_files(&self, input: ElementId, files: Vec<SyntheticFile>) -> bool {
        let mut inner = self.lock();
        if inner.reject_uploads {
            return false;
        }
        inner.actions.push(PageAction::AssignFiles {
            element: input,
            files,
        });
        true
    }

    fn dispatch(&self, element: ElementId, event: SyntheticEvent) {
        self.lock()
            .actions
            .push(PageAction::Dispatch { element, event });
    }

    fn click(&self, element: ElementId) {
        self.lock().actions.push(PageAction::Click(element));
    }

    fn mount_panel(&self, view: &PanelView) -> ElementId {
        let id = self.add_element(None, &[PANEL_SELECTOR]);
        self.lock().panels.insert(
            id,
            PanelRecord {
                view: view.clone(),
                position: None,
            },
        );
        id
    }

    fn render_panel(&self, panel: ElementId, view: &PanelView) {
        if let Some(record) = self.lock().panels.get_mut(&panel) {
            record.view = view.clone();
        }
    }

    fn position_panel(&self, panel: ElementId, position: &PanelPosition) {
        if let Some(record) = self.lock().panels.get_mut(&panel) {
            record.position = Some(*position);
        }
    }

    fn remove_element(&self, element: ElementId) {
        self.remove(element);
        self.lock().panels.remove(&element);
    }
}
