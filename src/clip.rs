//! Per-clip data model: requests, prompt lineage and terminal results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const SAFE_PAUSE_SECS: u64 = 120;
const ACCELERATED_PAUSE_SECS: u64 = 30;

/// Name of a generation service, as used in the rotation table and in
/// every exported artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Pacing profile applied between clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingMode {
    #[default]
    Safe,
    Accelerated,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Accelerated => "ACCELERATED",
        }
    }

    /// Blocking pause taken after every clip, whatever its outcome.
    pub fn pause(&self) -> Duration {
        match self {
            Self::Safe => Duration::from_secs(SAFE_PAUSE_SECS),
            Self::Accelerated => Duration::from_secs(ACCELERATED_PAUSE_SECS),
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SAFE" => Ok(Self::Safe),
            "ACCELERATED" => Ok(Self::Accelerated),
            other => Err(format!("unknown operating mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClipStatus {
    Success,
    Recovered,
    Failed,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Recovered => "RECOVERED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    PromptSimplification,
    SemanticProxy,
    OmniDecomposition,
    ProviderFailover,
    Exhausted,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PromptSimplification => "PROMPT_SIMPLIFICATION",
            Self::SemanticProxy => "SEMANTIC_PROXY",
            Self::OmniDecomposition => "OMNI_DECOMPOSITION",
            Self::ProviderFailover => "PROVIDER_FAILOVER",
            Self::Exhausted => "EXHAUSTED",
        }
    }
}

/// Failure taxonomy reported by provider adapters.
///
/// The recovery ladder does not branch on it; it is carried through to the
/// failure log and handed to the escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MetadataError,
    TimeoutError,
    AssetResolutionError,
    RateLimitError,
    ContentPolicyError,
    RepeatFailError,
    UnknownError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MetadataError => "METADATA_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::AssetResolutionError => "ASSET_RESOLUTION_ERROR",
            Self::RateLimitError => "RATE_LIMIT_ERROR",
            Self::ContentPolicyError => "CONTENT_POLICY_ERROR",
            Self::RepeatFailError => "REPEAT_FAIL_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        };
        f.write_str(name)
    }
}

pub fn clip_id_for(ordinal: usize) -> String {
    format!("clip_{:02}", ordinal)
}

/// One unit of work. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRequest {
    ordinal: usize,
    clip_id: String,
    prompt: String,
    provider: ProviderId,
}

impl ClipRequest {
    pub fn new(ordinal: usize, prompt: impl Into<String>, provider: ProviderId) -> Self {
        Self {
            ordinal,
            clip_id: clip_id_for(ordinal),
            prompt: prompt.into(),
            provider,
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn clip_id(&self) -> &str {
        &self.clip_id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }
}

/// Append-only record of the prompt text used at each degradation stage.
///
/// Every slot is write-once: a second write to a populated slot is ignored.
/// `semantic_proxy` is kept in memory only; the exported file carries the
/// four contract fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptLineage {
    original: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    simplified: Option<String>,
    #[serde(skip)]
    semantic_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    decomposed: Option<String>,
    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    final_text: Option<String>,
}

fn fill_once(slot: &mut Option<String>, text: &str) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(text.to_string());
    true
}

impl PromptLineage {
    pub fn new(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            ..Default::default()
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn simplified(&self) -> Option<&str> {
        self.simplified.as_deref()
    }

    pub fn semantic_proxy(&self) -> Option<&str> {
        self.semantic_proxy.as_deref()
    }

    pub fn decomposed(&self) -> Option<&str> {
        self.decomposed.as_deref()
    }

    pub fn final_text(&self) -> Option<&str> {
        self.final_text.as_deref()
    }

    pub fn record_simplified(&mut self, text: &str) -> bool {
        fill_once(&mut self.simplified, text)
    }

    pub fn record_semantic_proxy(&mut self, text: &str) -> bool {
        fill_once(&mut self.semantic_proxy, text)
    }

    pub fn record_decomposed(&mut self, text: &str) -> bool {
        fill_once(&mut self.decomposed, text)
    }

    pub fn record_final(&mut self, text: &str) -> bool {
        fill_once(&mut self.final_text, text)
    }

    /// Number of degradation stages whose text has been recorded, counting
    /// `original` as the first.
    pub fn depth(&self) -> usize {
        1 + [&self.simplified, &self.semantic_proxy, &self.decomposed]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }
}

/// Terminal record for one clip, built once by the recovery controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipResult {
    pub clip_id: String,
    pub ordinal: usize,
    pub status: ClipStatus,
    pub file_path: Option<PathBuf>,
    pub assigned_provider: ProviderId,
    pub provider: ProviderId,
    pub duration: f64,
    pub attempts: u32,
    pub recovery_strategy: Option<RecoveryStrategy>,
    pub error: Option<ErrorKind>,
    pub lineage: PromptLineage,
}

impl ClipResult {
    pub fn is_usable(&self) -> bool {
        self.status != ClipStatus::Failed
    }
}
