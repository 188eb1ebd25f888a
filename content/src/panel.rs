//! Floating suggestion panel.
//!
//! The controller owns at most one [`PanelSession`]. Every search cycle that
//! reaches the loading state creates a fresh session (new element, new
//! generation number); late events carrying an older generation are ignored.
//!
//! ```text
//! Closed ──begin_loading──▶ Loading ──candidates──▶ Showing ──click/escape/outside──▶ Closed
//!                              │  └──empty result──▶ Closed
//!                              └──search error──▶ Error ──3s──▶ Closed
//! ```

use std::time::Duration;

use derive_more::IsVariant;
use sticker_protocol::media::MediaCandidate;

use crate::adapters::Theme;
use crate::page::ElementId;
use crate::page::Page;
use crate::page::Rect;
use crate::page::Viewport;

pub const GRID_COLUMNS: usize = 2;
pub const PANEL_MAX_WIDTH: f64 = 400.0;
/// Vertical room needed above the input to place the panel there.
pub const MIN_SPACE_ABOVE: f64 = 130.0;
pub const PANEL_GAP: f64 = 10.0;
pub const PANEL_Z_INDEX: u32 = 999_999;
pub const ERROR_DISMISS_DELAY: Duration = Duration::from_secs(3);

const LOADING_MESSAGE: &str = "Searching for stickers...";

#[derive(Debug, Clone, PartialEq, IsVariant)]
pub enum PanelState {
    Loading,
    Showing(Vec<MediaCandidate>),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerticalPlacement {
    /// Distance from the viewport bottom to the panel's bottom edge.
    Above { bottom: f64 },
    /// Distance from the viewport top to the panel's top edge.
    Below { top: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelPosition {
    pub vertical: VerticalPlacement,
    pub left: f64,
    pub width: f64,
    pub z_index: u32,
}

/// Places the panel above the anchor when there is room, below otherwise.
pub fn compute_position(anchor: Rect, viewport: Viewport) -> PanelPosition {
    let vertical = if anchor.top >= MIN_SPACE_ABOVE {
        VerticalPlacement::Above {
            bottom: viewport.height - anchor.top + PANEL_GAP,
        }
    } else {
        VerticalPlacement::Below {
            top: anchor.bottom() + PANEL_GAP,
        }
    };

    PanelPosition {
        vertical,
        left: anchor.left,
        width: anchor.width.min(PANEL_MAX_WIDTH),
        z_index: PANEL_Z_INDEX,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridItem {
    pub index: usize,
    /// Painted in the grid.
    pub preview_src: String,
    /// Inserted when the item is clicked.
    pub full_url: String,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelBody {
    Loading { message: String },
    Error { message: String },
    Grid { columns: usize, items: Vec<GridItem> },
}

/// What the host should render for the current panel session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub generation: u64,
    pub theme: Theme,
    pub body: PanelBody,
}

#[derive(Debug)]
pub struct PanelSession {
    generation: u64,
    element: ElementId,
    anchor: ElementId,
    state: PanelState,
}

impl PanelSession {
    fn view(&self, theme: Theme) -> PanelView {
        let body = match &self.state {
            PanelState::Loading => PanelBody::Loading {
                message: LOADING_MESSAGE.to_string(),
            },
            PanelState::Error(message) => PanelBody::Error {
                message: message.clone(),
            },
            PanelState::Showing(candidates) => PanelBody::Grid {
                columns: GRID_COLUMNS,
                items: candidates
                    .iter()
                    .enumerate()
                    .map(|(index, candidate)| GridItem {
                        index,
                        preview_src: candidate.preview_url.clone(),
                        full_url: candidate.full_url.clone(),
                        alt: candidate.title.clone(),
                    })
                    .collect(),
            },
        };
        PanelView {
            generation: self.generation,
            theme,
            body,
        }
    }
}

#[derive(Debug)]
pub struct SuggestionPanel {
    session: Option<PanelSession>,
    next_generation: u64,
    theme: Theme,
}

impl SuggestionPanel {
    pub fn new(theme: Theme) -> Self {
        Self {
            session: None,
            next_generation: 1,
            theme,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> Option<&PanelState> {
        self.session.as_ref().map(|session| &session.state)
    }

    pub fn generation(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.generation)
    }

    pub fn anchor(&self) -> Option<ElementId> {
        self.session.as_ref().map(|session| session.anchor)
    }

    /// Tears down any existing session and opens a new one in `Loading`.
    pub fn begin_loading<P: Page>(&mut self, page: &P, anchor: ElementId) -> u64 {
        self.close(page);

        let generation = self.next_generation;
        self.next_generation += 1;

        let element = page.mount_panel(&PanelView {
            generation,
            theme: self.theme,
            body: PanelBody::Loading {
                message: LOADING_MESSAGE.to_string(),
            },
        });
        self.session = Some(PanelSession {
            generation,
            element,
            anchor,
            state: PanelState::Loading,
        });
        self.reposition(page);
        generation
    }

    /// Moves a loading session to `Showing`, or closes it for an empty list.
    /// Returns `false` when `generation` is no longer the live session.
    pub fn show_candidates<P: Page>(
        &mut self,
        page: &P,
        generation: u64,
        candidates: Vec<MediaCandidate>,
    ) -> bool {
        if self.generation() != Some(generation) {
            return false;
        }
        if candidates.is_empty() {
            self.close(page);
            return true;
        }
        self.transition(page, PanelState::Showing(candidates));
        true
    }

    /// Moves the live session to `Error`. The caller schedules
    /// [`Self::expire_error`] after [`ERROR_DISMISS_DELAY`].
    pub fn show_error<P: Page>(&mut self, page: &P, generation: u64, message: &str) -> bool {
        if self.generation() != Some(generation) {
            return false;
        }
        self.transition(page, PanelState::Error(message.to_string()));
        true
    }

    /// Closes the panel if it is still showing the error for `generation`.
    pub fn expire_error<P: Page>(&mut self, page: &P, generation: u64) {
        let is_same_error = self
            .session
            .as_ref()
            .is_some_and(|session| session.generation == generation && session.state.is_error());
        if is_same_error {
            self.close(page);
        }
    }

    /// Returns the clicked candidate and closes the panel.
    pub fn select<P: Page>(
        &mut self,
        page: &P,
        generation: u64,
        index: usize,
    ) -> Option<MediaCandidate> {
        let session = self.session.as_ref()?;
        if session.generation != generation {
            return None;
        }
        let PanelState::Showing(candidates) = &session.state else {
            return None;
        };
        let candidate = candidates.get(index).cloned()?;
        self.close(page);
        Some(candidate)
    }

    /// Closes the panel when `target` is outside both the panel and the
    /// active input. Returns whether it closed.
    pub fn close_on_outside_click<P: Page>(
        &mut self,
        page: &P,
        target: ElementId,
        active_input: Option<ElementId>,
    ) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        let inside_panel = page.contains(session.element, target);
        let inside_input = active_input.is_some_and(|input| page.contains(input, target));
        if inside_panel || inside_input {
            return false;
        }
        self.close(page);
        true
    }

    pub fn close<P: Page>(&mut self, page: &P) {
        if let Some(session) = self.session.take() {
            tracing::debug!(generation = session.generation, "closing suggestion panel");
            page.remove_element(session.element);
        }
    }

    /// Recomputes the position from the anchor's current bounding box.
    pub fn reposition<P: Page>(&self, page: &P) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(rect) = page.bounding_rect(session.anchor) else {
            return;
        };
        page.position_panel(session.element, &compute_position(rect, page.viewport()));
    }

    fn transition<P: Page>(&mut self, page: &P, state: PanelState) {
        let theme = self.theme;
        if let Some(session) = self.session.as_mut() {
            session.state = state;
            page.render_panel(session.element, &session.view(theme));
        }
        self.reposition(page);
    }
}
