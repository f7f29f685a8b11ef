use super::{
    ClipProvider, GenerationOutcome, GenerationToken, ProviderEndpoint, ProviderFailure,
    non_empty_str, send_for_json,
};
use crate::clip::ProviderId;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;

const API_VERSION: &str = "2024-11-06";

pub struct RunwayProvider {
    id: ProviderId,
    client: Client,
    endpoint: ProviderEndpoint,
}

impl RunwayProvider {
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
            "model": "gen4_image",
            "promptText": format!("{}, {}, 9:16, no text", prompt, self.endpoint.style),
            "ratio": "9:16",
        })
    }
}

/// Task id when the job is queued, otherwise the first output link.
pub fn parse_token(body: &Value) -> Option<GenerationToken> {
    if let Some(id) = non_empty_str(body.get("id")) {
        return Some(GenerationToken::Job(id));
    }
    non_empty_str(body.get("output").and_then(|out| out.get(0))).map(GenerationToken::Url)
}

#[async_trait]
impl ClipProvider for RunwayProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(&self, prompt: &str, _clip_id: &str) -> GenerationOutcome {
        let request = self
            .client
            .post(&self.endpoint.url)
            .bearer_auth(&self.endpoint.api_key)
            .header("X-Runway-Version", API_VERSION)
            .json(&self.payload(prompt))
            .timeout(self.endpoint.timeout);

        let body = send_for_json(&self.id, request).await?;
        parse_token(&body).ok_or_else(|| ProviderFailure::missing_token(&self.id))
    }
}
