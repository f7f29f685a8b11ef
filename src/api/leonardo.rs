use super::{
    ClipProvider, GenerationOutcome, GenerationToken, ProviderEndpoint, ProviderFailure,
    non_empty_str, send_for_json,
};
use crate::clip::ProviderId;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;

const MODEL_ID: &str = "aa77f04e-3eec-4034-9c07-d0f619684628";

pub struct LeonardoProvider {
    id: ProviderId,
    client: Client,
    endpoint: ProviderEndpoint,
}

impl LeonardoProvider {
    pub fn new(id: ProviderId, client: Client, endpoint: ProviderEndpoint) -> Self {
        Self { id, client, endpoint }
    }

    pub fn shared(
        id: ProviderId,
        client: Client,
        endpoint: ProviderEndpoint,
    ) -> Arc<dyn ClipProvider> {
        Arc::new(Self::new(id, client, endpoint))
    }

    fn payload(&self, prompt: &str) -> Value {
        json!({
            "prompt": format!(
                "{}, {}, cinematic, vertical 9:16, no text",
                prompt, self.endpoint.style
            ),
            "modelId": MODEL_ID,
            "width": 576,
            "height": 1024,
            "num_images": 1,
        })
    }
}

pub fn parse_token(body: &Value) -> Option<GenerationToken> {
    non_empty_str(body.get("sdGenerationJob").and_then(|job| job.get("generationId")))
        .map(GenerationToken::Job)
}

#[async_trait]
impl ClipProvider for LeonardoProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(&self, prompt: &str, _clip_id: &str) -> GenerationOutcome {
        let request = self
            .client
            .post(&self.endpoint.url)
            .bearer_auth(&self.endpoint.api_key)
            .json(&self.payload(prompt))
            .timeout(self.endpoint.timeout);

        let body = send_for_json(&self.id, request).await?;
        parse_token(&body).ok_or_else(|| ProviderFailure::missing_token(&self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ErrorKind;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(url: String) -> LeonardoProvider {
        LeonardoProvider::new(
            ProviderId::new("leonardo"),
            Client::new(),
            ProviderEndpoint {
                url,
                api_key: "test-key".to_string(),
                style: "anime_dark".to_string(),
                timeout: Duration::from_secs(5),
            },
        )
    }

    #[test]
    fn parses_generation_job() {
        let body = json!({"sdGenerationJob": {"generationId": "gen-123"}});
        assert_eq!(parse_token(&body), Some(GenerationToken::Job("gen-123".to_string())));
        assert_eq!(parse_token(&json!({"sdGenerationJob": {}})), None);
    }

    #[tokio::test]
    async fn accepted_generation_returns_job_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generations"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"sdGenerationJob": {"generationId": "gen-9"}})),
            )
            .mount(&server)
            .await;

        let outcome = provider(format!("{}/generations", server.uri()))
            .generate("a quiet room", "clip_01")
            .await;
        assert_eq!(outcome, Ok(GenerationToken::Job("gen-9".to_string())));
    }

    #[tokio::test]
    async fn rate_limit_collapses_to_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let failure = provider(server.uri())
            .generate("a quiet room", "clip_01")
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::RateLimitError);
    }

    #[tokio::test]
    async fn malformed_body_is_metadata_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let failure = provider(server.uri())
            .generate("a quiet room", "clip_01")
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::MetadataError);
    }

    #[tokio::test]
    async fn unreachable_endpoint_never_escapes() {
        let outcome = provider("http://127.0.0.1:9/unreachable".to_string())
            .generate("a quiet room", "clip_01")
            .await;
        assert!(outcome.is_err());
    }
}
