use super::{
    ClipProvider, GenerationOutcome, GenerationToken, ProviderEndpoint, ProviderFailure,
    non_empty_str, send_for_json,
};
use crate::clip::ProviderId;
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;

pub struct StabilityProvider {
    id: ProviderId,
    client: Client,
    endpoint: ProviderEndpoint,
}

impl StabilityProvider {
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

    // multipart, unlike the JSON providers
    fn form(&self, prompt: &str) -> Form {
        Form::new()
            .text("prompt", format!("{}, {}, vertical, no text", prompt, self.endpoint.style))
            .text("aspect_ratio", "9:16")
            .text("output_format", "png")
    }
}

pub fn parse_token(body: &Value) -> Option<GenerationToken> {
    non_empty_str(body.get("image"))
        .or_else(|| {
            non_empty_str(
                body.get("artifacts")
                    .and_then(|a| a.get(0))
                    .and_then(|a| a.get("base64")),
            )
        })
        .map(GenerationToken::InlineImage)
}

#[async_trait]
impl ClipProvider for StabilityProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(&self, prompt: &str, _clip_id: &str) -> GenerationOutcome {
        let request = self
            .client
            .post(&self.endpoint.url)
            .bearer_auth(&self.endpoint.api_key)
            .header("Accept", "application/json")
            .multipart(self.form(prompt))
            .timeout(self.endpoint.timeout);

        let body = send_for_json(&self.id, request).await?;
        parse_token(&body).ok_or_else(|| ProviderFailure::missing_token(&self.id))
    }
}
