use serde::Deserialize;
use serde::Serialize;

/// One animated image returned by the search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCandidate {
    /// Full-resolution URL; this is what gets uploaded on insertion.
    pub full_url: String,
    /// Lightweight preview used for painting the suggestion grid.
    pub preview_url: String,
    pub title: String,
}
