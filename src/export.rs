//! Artifact exporter: the four JSON files handed to the assembler.
//!
//! Writes are best-effort. A failed write is logged and reported in the
//! returned [`ExportReport`] but never fails the run.

use crate::clip::{
    ClipResult, ClipStatus, ErrorKind, OperatingMode, PromptLineage, ProviderId, RecoveryStrategy,
};
use crate::generator::RunOutcome;
use crate::pool::ProviderHealth;
use crate::{logok, logw};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const METADATA_FILE: &str = "metadata.json";
pub const PROMPTS_FILE: &str = "prompts.json";
pub const FAILURE_LOG_FILE: &str = "failure_log.json";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub fps: u32,
    pub resolution: String,
    pub duration_per_clip: f64,
    pub total_clips: usize,
    pub successful_clips: usize,
    #[serde(default)]
    pub recovered_clips: usize,
    pub failed_clips: usize,
    pub operating_mode: OperatingMode,
    pub timestamp: String,
    #[serde(default)]
    pub provider_stats: ProviderHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub status: ClipStatus,
    pub error: Option<ErrorKind>,
    pub recovery_strategy: Option<RecoveryStrategy>,
    pub attempts: u32,
    pub provider: ProviderId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub file: String,
    pub duration: f64,
    pub provider: ProviderId,
    pub status: ClipStatus,
}

/// Assembly-facing summary of a run.
///
/// `assembly_ready` is false exactly when `missing_clips` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub clip_order: Vec<ManifestEntry>,
    pub total_duration: f64,
    pub assembly_ready: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_clips: Vec<String>,
}

pub type PromptLog = BTreeMap<String, PromptLineage>;
pub type FailureLog = BTreeMap<String, FailureEntry>;

#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl ExportReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub fn build_metadata(outcome: &RunOutcome) -> RunMetadata {
    let count = |status: ClipStatus| outcome.results.iter().filter(|r| r.status == status).count();
    let failed = count(ClipStatus::Failed);

    RunMetadata {
        run_id: outcome.run_id.clone(),
        fps: outcome.settings.fps,
        resolution: outcome.settings.resolution.clone(),
        duration_per_clip: outcome.settings.duration_per_clip,
        total_clips: outcome.results.len(),
        successful_clips: outcome.results.len() - failed,
        recovered_clips: count(ClipStatus::Recovered),
        failed_clips: failed,
        operating_mode: outcome.settings.mode,
        timestamp: outcome.completed_at.to_rfc3339(),
        provider_stats: outcome.health.clone(),
    }
}

pub fn build_prompt_log(results: &[ClipResult]) -> PromptLog {
    results
        .iter()
        .map(|r| (r.clip_id.clone(), r.lineage.clone()))
        .collect()
}

/// Only clips that needed recovery or failed outright are logged.
pub fn build_failure_log(results: &[ClipResult]) -> FailureLog {
    results
        .iter()
        .filter(|r| r.status != ClipStatus::Success)
        .map(|r| {
            let entry = FailureEntry {
                status: r.status,
                error: r.error,
                recovery_strategy: r.recovery_strategy,
                attempts: r.attempts,
                provider: r.provider.clone(),
            };
            (r.clip_id.clone(), entry)
        })
        .collect()
}

fn manifest_file_ref(result: &ClipResult, run_dir: &Path) -> String {
    result
        .file_path
        .as_deref()
        .and_then(|path| pathdiff::diff_paths(path, run_dir))
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| format!("{}/{}.mp4", crate::init::CLIPS_DIR, result.clip_id))
}

pub fn build_manifest(run_id: &str, results: &[ClipResult], run_dir: &Path) -> RunManifest {
    let clip_order: Vec<ManifestEntry> = results
        .iter()
        .filter(|r| r.is_usable())
        .map(|r| ManifestEntry {
            id: r.clip_id.clone(),
            file: manifest_file_ref(r, run_dir),
            duration: r.duration,
            provider: r.provider.clone(),
            status: r.status,
        })
        .collect();

    let missing_clips: Vec<String> = results
        .iter()
        .filter(|r| !r.is_usable())
        .map(|r| r.clip_id.clone())
        .collect();

    RunManifest {
        run_id: run_id.to_string(),
        total_duration: clip_order.iter().map(|c| c.duration).sum(),
        clip_order,
        assembly_ready: missing_clips.is_empty(),
        missing_clips,
    }
}

pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    text.push('\n');
    fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

async fn write_artifact<T: Serialize>(report: &mut ExportReport, path: PathBuf, value: &T) {
    match write_json(&path, value).await {
        Ok(()) => {
            logok(format!("Wrote {}", path.display()));
            report.written.push(path);
        }
        Err(err) => {
            logw(format!("Artifact write failed: {:#}", err));
            report.failed.push((path, format!("{:#}", err)));
        }
    }
}

/// Write all four artifacts under the run directory.
pub async fn export_run(outcome: &RunOutcome) -> ExportReport {
    let dir = &outcome.output_dir;
    let mut report = ExportReport::default();

    write_artifact(&mut report, dir.join(METADATA_FILE), &build_metadata(outcome)).await;
    write_artifact(&mut report, dir.join(PROMPTS_FILE), &build_prompt_log(&outcome.results)).await;
    write_artifact(
        &mut report,
        dir.join(FAILURE_LOG_FILE),
        &build_failure_log(&outcome.results),
    )
    .await;
    write_artifact(
        &mut report,
        dir.join(MANIFEST_FILE),
        &build_manifest(&outcome.run_id, &outcome.results, dir),
    )
    .await;

    report
}
