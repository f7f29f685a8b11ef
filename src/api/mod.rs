//! Provider adapters.
//!
//! Every generation service implements [`ClipProvider`]. Transport errors,
//! bad statuses and malformed payloads are folded into a
//! [`ProviderFailure`] value at this boundary; nothing past it has to know
//! which service it is talking to.

pub mod fal;
pub mod leonardo;
pub mod runway;
pub mod stability;

use crate::clip::{ErrorKind, ProviderId};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const POLICY_MARKERS: &[&str] = &["moderation", "policy", "nsfw", "safety", "flagged"];

/// Opaque acceptance signal returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationToken {
    /// Asynchronous job id; the asset is produced later at the provider.
    Job(String),
    /// Direct link to the generated asset.
    Url(String),
    /// Base64-encoded image returned inline.
    InlineImage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ProviderFailure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::TimeoutError
        } else if err.is_decode() {
            ErrorKind::MetadataError
        } else {
            ErrorKind::UnknownError
        };
        Self::new(kind, err.to_string())
    }

    pub fn missing_token(provider: &ProviderId) -> Self {
        Self::new(
            ErrorKind::AssetResolutionError,
            format!("{} accepted the request but returned no asset reference", provider),
        )
    }
}

pub type GenerationOutcome = Result<GenerationToken, ProviderFailure>;

#[async_trait]
pub trait ClipProvider: Send + Sync {
    fn id(&self) -> &ProviderId;

    /// One generation call. Must not panic or error past this boundary.
    async fn generate(&self, prompt: &str, clip_id: &str) -> GenerationOutcome;
}

/// Endpoint, credentials and house style for one provider.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub url: String,
    pub api_key: String,
    pub style: String,
    pub timeout: Duration,
}

pub type ProviderCtor = fn(ProviderId, reqwest::Client, ProviderEndpoint) -> Arc<dyn ClipProvider>;

/// Built-in provider table: rotation order, weight, style and failover target.
pub struct ProviderSpec {
    pub name: &'static str,
    pub url: &'static str,
    pub weight: f64,
    pub style: &'static str,
    pub fallback: &'static str,
    pub api_key_env: &'static str,
    pub ctor: ProviderCtor,
}

pub const BUILTIN_PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "leonardo",
        url: "https://cloud.leonardo.ai/api/rest/v1/generations",
        weight: 0.3,
        style: "anime_dark",
        fallback: "stability",
        api_key_env: "LEONARDO_API_KEY",
        ctor: leonardo::LeonardoProvider::shared,
    },
    ProviderSpec {
        name: "runway",
        url: "https://api.dev.runwayml.com/v1/text_to_image",
        weight: 0.25,
        style: "cinematic_real",
        fallback: "fal",
        api_key_env: "RUNWAY_API_KEY",
        ctor: runway::RunwayProvider::shared,
    },
    ProviderSpec {
        name: "fal",
        url: "https://queue.fal.run/fal-ai/flux/dev",
        weight: 0.25,
        style: "abstract_metaphor",
        fallback: "stability",
        api_key_env: "FAL_API_KEY",
        ctor: fal::FalProvider::shared,
    },
    ProviderSpec {
        name: "stability",
        url: "https://api.stability.ai/v2beta/stable-image/generate/core",
        weight: 0.2,
        style: "hyperreal",
        fallback: "fal",
        api_key_env: "STABILITY_API_KEY",
        ctor: stability::StabilityProvider::shared,
    },
];

pub fn builtin_spec(name: &str) -> Option<&'static ProviderSpec> {
    BUILTIN_PROVIDERS.iter().find(|spec| spec.name == name)
}

pub fn classify_status(status: StatusCode, body: &str) -> ErrorKind {
    let code = status.as_u16();
    if code == 429 {
        return ErrorKind::RateLimitError;
    }
    if code == 408 || code == 504 {
        return ErrorKind::TimeoutError;
    }
    if matches!(code, 400 | 403 | 422) {
        let lower = body.to_lowercase();
        if POLICY_MARKERS.iter().any(|m| lower.contains(m)) {
            return ErrorKind::ContentPolicyError;
        }
    }
    if status.is_client_error() {
        return ErrorKind::MetadataError;
    }
    ErrorKind::UnknownError
}

/// Send a request and return its JSON body, folding every failure mode
/// into a [`ProviderFailure`].
pub(crate) async fn send_for_json(
    provider: &ProviderId,
    request: RequestBuilder,
) -> Result<Value, ProviderFailure> {
    let resp = request
        .send()
        .await
        .map_err(|err| ProviderFailure::from_transport(&err))?;

    let status = resp.status();
    let raw = resp
        .text()
        .await
        .map_err(|err| ProviderFailure::from_transport(&err))?;

    if !status.is_success() {
        let snippet = raw.chars().take(200).collect::<String>();
        return Err(ProviderFailure::new(
            classify_status(status, &raw),
            format!("{} HTTP {}: {}", provider, status.as_u16(), snippet),
        ));
    }

    serde_json::from_str(&raw).map_err(|err| {
        ProviderFailure::new(
            ErrorKind::MetadataError,
            format!("{} returned malformed JSON: {}", provider, err),
        )
    })
}

pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
