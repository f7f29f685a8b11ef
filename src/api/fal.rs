use super::{
    ClipProvider, GenerationOutcome, GenerationToken, ProviderEndpoint, ProviderFailure,
    non_empty_str, send_for_json,
};
use crate::clip::ProviderId;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;

pub struct FalProvider {
    id: ProviderId,
    client: Client,
    endpoint: ProviderEndpoint,
}

impl FalProvider {
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
            "prompt": format!("{}, {}, vertical 9:16, no text", prompt, self.endpoint.style),
            "image_size": "portrait_16_9",
            "num_images": 1,
        })
    }
}

/// Queue request id, or the first image url for synchronous responses.
pub fn parse_token(body: &Value) -> Option<GenerationToken> {
    if let Some(id) = non_empty_str(body.get("request_id")) {
        return Some(GenerationToken::Job(id));
    }
    non_empty_str(
        body.get("images")
            .and_then(|images| images.get(0))
            .and_then(|image| image.get("url")),
    )
    .map(GenerationToken::Url)
}

#[async_trait]
impl ClipProvider for FalProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(&self, prompt: &str, _clip_id: &str) -> GenerationOutcome {
        let request = self
            .client
            .post(&self.endpoint.url)
            .header("Authorization", format!("Key {}", self.endpoint.api_key))
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
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_queue_and_sync_shapes() {
        assert_eq!(
            parse_token(&json!({"request_id": "req-7"})),
            Some(GenerationToken::Job("req-7".to_string()))
        );
        assert_eq!(
            parse_token(&json!({"images": [{"url": "https://fal.media/a.png"}]})),
            Some(GenerationToken::Url("https://fal.media/a.png".to_string()))
        );
        assert_eq!(parse_token(&json!({"images": [{}]})), None);
    }

    #[tokio::test]
    async fn uses_key_auth_scheme() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Key fal-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "req-1"})))
            .mount(&server)
            .await;

        let provider = FalProvider::new(
            ProviderId::new("fal"),
            Client::new(),
            ProviderEndpoint {
                url: server.uri(),
                api_key: "fal-secret".to_string(),
                style: "abstract_metaphor".to_string(),
                timeout: Duration::from_secs(5),
            },
        );

        assert_eq!(
            provider.generate("a city", "clip_02").await,
            Ok(GenerationToken::Job("req-1".to_string()))
        );
    }

    #[tokio::test]
    async fn policy_rejection_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string(r#"{"detail":"NSFW content detected"}"#),
            )
            .mount(&server)
            .await;

        let provider = FalProvider::new(
            ProviderId::new("fal"),
            Client::new(),
            ProviderEndpoint {
                url: server.uri(),
                api_key: "fal-secret".to_string(),
                style: "abstract_metaphor".to_string(),
                timeout: Duration::from_secs(5),
            },
        );

        let failure = provider.generate("explosion", "clip_02").await.unwrap_err();
        assert_eq!(failure.kind, ErrorKind::ContentPolicyError);
    }
}
