//! Events driving [`crate::ContentApp`].
//!
//! Host-originated events (DOM mutations, clicks, keys, viewport changes) and
//! completions of the app's own timers and background tasks all flow through
//! one channel, so every state change happens on the app's event loop.

use sticker_media_search::SearchError;
use sticker_protocol::analysis::AnalysisResponse;
use sticker_protocol::media::MediaCandidate;

use crate::insertion::InsertError;
use crate::page::ElementId;
use crate::page::KeyPress;

#[derive(Debug)]
pub enum AppEvent {
    /// Nodes reported by the host's structural-mutation observer.
    NodesAdded(Vec<ElementId>),

    /// The rescan debounce elapsed; attach to any new matching inputs.
    RescanInputs,

    /// A watched input's polled value differs from the last observed one.
    InputChanged { element: ElementId, text: String },

    /// A watched input left the document and its polling stopped.
    InputSessionEnded { element: ElementId },

    /// The typing debounce elapsed with `text` as the latest value.
    TypingSettled { element: ElementId, text: String },

    AnalysisFinished {
        cycle: u64,
        element: ElementId,
        response: AnalysisResponse,
    },

    SearchFinished {
        cycle: u64,
        generation: u64,
        result: Result<Vec<MediaCandidate>, SearchError>,
    },

    /// The error panel for `generation` has been visible long enough.
    ErrorPanelExpired { generation: u64 },

    /// The user picked grid item `index` of panel session `generation`.
    CandidateClicked { generation: u64, index: usize },

    InputClicked { element: ElementId },

    /// A click anywhere in the document.
    DocumentClicked { target: ElementId },

    /// Keydown on the document; `target` is the focused element.
    KeyPressed { target: ElementId, key: KeyPress },

    /// Window resize or scroll in any ancestor scroll container.
    ViewportChanged,

    InsertionFinished {
        url: String,
        result: Result<(), InsertError>,
    },
}
