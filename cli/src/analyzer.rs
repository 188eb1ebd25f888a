use async_trait::async_trait;
use sticker_protocol::analysis::AnalysisResponse;
use sticker_protocol::analysis::AnalysisResult;

use crate::ollama::OllamaClient;
use crate::ollama::OllamaError;

/// Turns message text into search phrases. Never fails.
#[async_trait]
pub trait Analyze: Send + Sync {
    async fn analyze(&self, text: &str) -> AnalysisResponse;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCheck {
    pub installed: Vec<String>,
    pub has_configured_model: bool,
}

pub struct IntentAnalyzer {
    client: OllamaClient,
}

impl IntentAnalyzer {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    pub async fn check(&self) -> Result<ModelCheck, OllamaError> {
        let installed = self.client.list_models().await?;
        let has_configured_model = installed
            .iter()
            .any(|name| *name == self.client.config().model);
        Ok(ModelCheck {
            installed,
            has_configured_model,
        })
    }

    async fn try_analyze(&self, text: &str) -> Result<AnalysisResponse, OllamaError> {
        let check = self.check().await?;
        if !check.has_configured_model {
            tracing::warn!(
                model = %self.client.config().model,
                installed = ?check.installed,
                "configured model is not installed; trying anyway"
            );
        }

        let generated = self.client.generate(&build_prompt(text)).await?;
        let phrases = parse_phrases(&generated);
        if phrases.is_empty() {
            tracing::debug!("model produced no phrases; using keyword fallback");
            return Ok(AnalysisResponse::ok(AnalysisResult::fallback(text)));
        }
        Ok(AnalysisResponse::ok(AnalysisResult::from_keywords(phrases)))
    }
}

#[async_trait]
impl Analyze for IntentAnalyzer {
    async fn analyze(&self, text: &str) -> AnalysisResponse {
        match self.try_analyze(text).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(kind = %err.kind(), "analysis failed: {err}");
                AnalysisResponse::fallback(text, format!("Failed to analyze text: {err}"))
            }
        }
    }
}

pub fn build_prompt(text: &str) -> String {
    format!(
        r#"Given the text: "{text}"
Think about what kind of animated GIF would be most appropriate and engaging as a response in a conversation.
Focus on specific actions, emotions, or reactions that would make sense in this context.

Examples of good responses:
- "how are you" -> "waving hello, friendly greeting, happy wave"
- "i love ice cream" -> "eating ice cream, excited food, dessert happy"
- "that's so funny" -> "laughing hard, rolling on floor, funny reaction"
- "good morning" -> "sunrise greeting, morning coffee, waking up happy"
- "congratulations" -> "celebration dance, happy jump, success party"

Extract 2-3 specific words or short phrases that would be good for searching animated GIFs.
Focus on actions and emotions that would make a good animated response.
Just list the words/phrases separated by commas, nothing else."#
    )
}

/// Splits the model's comma-separated answer into trimmed, non-empty phrases.
pub fn parse_phrases(generated: &str) -> Vec<String> {
    generated
        .split(',')
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ollama::OllamaConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sticker_protocol::analysis::Intensity;
    use sticker_protocol::analysis::Sentiment;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    fn analyzer_for(server: &MockServer) -> IntentAnalyzer {
        IntentAnalyzer::new(
            OllamaClient::new(OllamaConfig {
                base_url: server.uri(),
                ..OllamaConfig::default()
            })
            .expect("client"),
        )
    }

    async fn mount_tags(server: &MockServer, models: &[&str]) {
        let models: Vec<_> = models.iter().map(|name| json!({"name": name})).collect();
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": models})))
            .mount(server)
            .await;
    }

    async fn mount_generate(server: &MockServer, response: &str) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": response})))
            .mount(server)
            .await;
    }

    #[test]
    fn parses_comma_separated_phrases() {
        assert_eq!(
            parse_phrases(" celebration dance,happy jump , ,success party\n"),
            vec!["celebration dance", "happy jump", "success party"]
        );
        assert_eq!(parse_phrases(" , ,"), Vec::<String>::new());
    }

    #[test]
    fn prompt_embeds_text_and_examples() {
        let prompt = build_prompt("we won!");
        assert!(prompt.starts_with("Given the text: \"we won!\""));
        assert!(prompt.contains(r#""congratulations" -> "celebration dance, happy jump, success party""#));
    }

    #[tokio::test]
    async fn model_phrases_become_query() {
        let server = MockServer::start().await;
        mount_tags(&server, &["mistral:7b-instruct"]).await;
        mount_generate(&server, "celebration dance, happy jump, success party").await;

        let response = analyzer_for(&server).analyze("congratulations").await;
        assert!(response.success);
        assert_eq!(response.error, None);
        assert_eq!(
            response.data.emotions,
            vec!["celebration dance", "happy jump", "success party"]
        );
        assert_eq!(
            response.data.gif_query,
            "celebration dance happy jump success party"
        );
        assert_eq!(response.data.sentiment, Sentiment::Neutral);
        assert_eq!(response.data.intensity, Intensity::Medium);
    }

    #[tokio::test]
    async fn blank_model_output_uses_keywords_successfully() {
        let server = MockServer::start().await;
        mount_tags(&server, &["mistral:7b-instruct"]).await;
        mount_generate(&server, " , ").await;

        let response = analyzer_for(&server).analyze("Pizza tonight with friends").await;
        assert!(response.success);
        assert_eq!(response.data.emotions, vec!["pizza", "tonight", "with", "friends"]);
    }

    #[tokio::test]
    async fn missing_model_still_generates() {
        let server = MockServer::start().await;
        mount_tags(&server, &["llama3:8b"]).await;
        mount_generate(&server, "waving hello").await;

        let response = analyzer_for(&server).analyze("hey").await;
        assert!(response.success);
        assert_eq!(response.data.gif_query, "waving hello");
    }

    #[tokio::test]
    async fn unreachable_server_falls_back_to_keywords() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let response = analyzer_for(&server).analyze("celebration dance").await;
        assert!(!response.success);
        assert!(
            response
                .error
                .as_deref()
                .is_some_and(|err| err.starts_with("Failed to analyze text:") && err.contains("503"))
        );
        assert_eq!(response.data.emotions, vec!["celebration", "dance"]);
        assert_eq!(response.data.gif_query, "celebration dance");
    }

    #[tokio::test]
    async fn fallback_without_qualifying_tokens_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let response = analyzer_for(&server).analyze("how are you").await;
        assert!(!response.success);
        assert_eq!(response.data.emotions, Vec::<String>::new());
        assert_eq!(response.data.gif_query, "");
    }

    #[tokio::test]
    async fn check_reports_model_presence() {
        let server = MockServer::start().await;
        mount_tags(&server, &["llama3:8b", "mistral:7b-instruct"]).await;

        let check = analyzer_for(&server).check().await.expect("check");
        assert!(check.has_configured_model);
        assert_eq!(check.installed.len(), 2);
    }
}
