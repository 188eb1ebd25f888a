//! Inferred intent for a piece of typed text.
//!
//! The background host produces an [`AnalysisResponse`] for every request, even
//! when the language model is unreachable: in that case `data` is filled from
//! [`fallback_keywords`] and `success` is `false`.

use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

/// Words that carry no search signal even though they pass the length filter.
pub const STOPWORDS: [&str; 10] = [
    "what", "when", "where", "which", "whose", "whom", "this", "that", "these", "those",
];

/// Tokens with this many characters or fewer are dropped by the fallback.
const MAX_DISCARDED_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intensity {
    Low,
    #[default]
    Medium,
    High,
}

impl Intensity {
    fn query_modifier(self) -> &'static str {
        match self {
            Intensity::Low => "slightly ",
            Intensity::Medium => "",
            Intensity::High => "very ",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub sentiment: Sentiment,
    /// Short phrases, most relevant first.
    pub emotions: Vec<String>,
    pub intensity: Intensity,
    pub gif_query: String,
}

impl AnalysisResult {
    /// Builds a result whose query is the space-joined phrase list.
    ///
    /// `sentiment` and `intensity` are not derived from anything yet and stay
    /// at `neutral` / `medium`.
    pub fn from_keywords(keywords: Vec<String>) -> Self {
        let gif_query = keywords.join(" ");
        Self {
            sentiment: Sentiment::Neutral,
            emotions: keywords,
            intensity: Intensity::Medium,
            gif_query,
        }
    }

    pub fn fallback(text: &str) -> Self {
        Self::from_keywords(fallback_keywords(text))
    }

    /// Returns the string to hand to the image search, or `None` when the
    /// analysis produced nothing searchable.
    pub fn search_query(&self) -> Option<String> {
        let query = self.gif_query.trim();
        if !query.is_empty() {
            return Some(query.to_string());
        }

        let emotion = self.emotions.first().map(|e| e.trim())?;
        if emotion.is_empty() {
            return None;
        }
        Some(format!("{}{emotion}", self.intensity.query_modifier()))
    }
}

/// Naive keyword extraction used whenever the language model cannot answer.
pub fn fallback_keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|word| word.chars().count() > MAX_DISCARDED_TOKEN_CHARS)
        .filter(|word| !STOPWORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Response to an `ANALYZE_WITH_OLLAMA` request. `data` is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub data: AnalysisResult,
}

impl AnalysisResponse {
    pub fn ok(data: AnalysisResult) -> Self {
        Self {
            success: true,
            error: None,
            data,
        }
    }

    /// A failed analysis answered from the keyword fallback.
    pub fn fallback(text: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            data: AnalysisResult::fallback(text),
        }
    }
}
