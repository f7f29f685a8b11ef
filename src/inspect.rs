//! Read back a finished run and summarise what an assembler would get.

use crate::clip::ClipStatus;
use crate::error::FactoryResult;
use crate::export::{
    FAILURE_LOG_FILE, FailureLog, MANIFEST_FILE, METADATA_FILE, PROMPTS_FILE, PromptLog,
    RunManifest, RunMetadata,
};
use crate::init::CLIPS_DIR;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInspection {
    pub run_id: String,
    pub operating_mode: String,
    pub clips_listed: usize,
    pub prompts_logged: usize,
    /// Stems of `clip_*.mp4` files found under `clips/`, sorted.
    pub clip_files: Vec<String>,
    /// Manifest entries whose file is not on disk.
    pub absent_files: Vec<String>,
    pub missing_clips: Vec<String>,
    pub recovered: usize,
    pub failed: usize,
    pub estimated_duration: f64,
    pub assembly_ready: bool,
    /// False when `assembly_ready` disagrees with `missing_clips`.
    pub consistent: bool,
    pub recommendations: Vec<String>,
}

async fn read_artifact<T: DeserializeOwned>(dir: &Path, name: &str) -> FactoryResult<T> {
    let text = fs::read_to_string(dir.join(name)).await?;
    Ok(serde_json::from_str(&text)?)
}

fn clip_files_on_disk(clips_dir: &Path) -> Vec<String> {
    let mut stems: Vec<String> = WalkDir::new(clips_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.path();
            let is_mp4 = path.extension().and_then(|x| x.to_str()) == Some("mp4");
            let stem = path.file_stem()?.to_str()?;
            (is_mp4 && stem.starts_with("clip_")).then(|| stem.to_string())
        })
        .collect();
    stems.sort();
    stems
}

pub fn length_recommendation(seconds: f64) -> &'static str {
    if seconds < 30.0 {
        "Short video: ideal for YouTube Shorts / TikTok"
    } else if seconds < 60.0 {
        "Standard short: good for Reels / Shorts"
    } else if seconds < 180.0 {
        "Medium video: consider chapter markers"
    } else {
        "Long-form content: add intro/outro and chapters"
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

pub async fn inspect_run(dir: &Path) -> FactoryResult<RunInspection> {
    let metadata: RunMetadata = read_artifact(dir, METADATA_FILE).await?;
    let prompts: PromptLog = read_artifact(dir, PROMPTS_FILE).await?;
    let failures: FailureLog = read_artifact(dir, FAILURE_LOG_FILE).await?;
    let manifest: RunManifest = read_artifact(dir, MANIFEST_FILE).await?;

    let clip_files = clip_files_on_disk(&dir.join(CLIPS_DIR));
    let mut absent_files = Vec::new();
    for clip in &manifest.clip_order {
        if !is_file(&dir.join(&clip.file)).await {
            absent_files.push(clip.file.clone());
        }
    }

    let count = |status: ClipStatus| failures.values().filter(|f| f.status == status).count();
    let recovered = count(ClipStatus::Recovered);
    let failed = count(ClipStatus::Failed);

    let mut recommendations = vec![length_recommendation(manifest.total_duration).to_string()];
    if !manifest.missing_clips.is_empty() {
        recommendations.push(format!(
            "{} clip(s) failed: consider placeholders or a re-run",
            manifest.missing_clips.len()
        ));
    }
    if !absent_files.is_empty() {
        recommendations.push(format!(
            "{} clip file(s) not rendered yet: fetch provider jobs before assembly",
            absent_files.len()
        ));
    }

    Ok(RunInspection {
        run_id: metadata.run_id,
        operating_mode: metadata.operating_mode.to_string(),
        clips_listed: manifest.clip_order.len(),
        prompts_logged: prompts.len(),
        clip_files,
        absent_files,
        consistent: manifest.assembly_ready == manifest.missing_clips.is_empty(),
        missing_clips: manifest.missing_clips,
        recovered,
        failed,
        estimated_duration: manifest.total_duration,
        assembly_ready: manifest.assembly_ready,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactoryError;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        std::fs::write(dir.join(name), serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    fn seed_run(dir: &Path, ready: bool) {
        std::fs::create_dir_all(dir.join("clips")).unwrap();
        std::fs::write(dir.join("clips/clip_01.mp4"), b"x").unwrap();
        std::fs::write(dir.join("clips/clip_01.png"), b"x").unwrap();

        write(dir, METADATA_FILE, json!({
            "run_id": "r1", "fps": 30, "resolution": "1080x1920", "duration_per_clip": 8.0,
            "total_clips": 3, "successful_clips": 2, "failed_clips": 1,
            "operating_mode": "SAFE", "timestamp": "2026-01-01T00:00:00+00:00"
        }));
        write(dir, PROMPTS_FILE, json!({
            "clip_01": {"original": "a"},
            "clip_02": {"original": "b"},
            "clip_03": {"original": "c"}
        }));
        write(dir, FAILURE_LOG_FILE, json!({
            "clip_02": {
                "status": "RECOVERED", "error": null, "recovery_strategy": "SEMANTIC_PROXY",
                "attempts": 3, "provider": "fal"
            },
            "clip_03": {
                "status": "FAILED", "error": "TIMEOUT_ERROR", "recovery_strategy": "EXHAUSTED",
                "attempts": 5, "provider": "fal"
            }
        }));
        write(dir, MANIFEST_FILE, json!({
            "run_id": "r1",
            "clip_order": [
                {
                    "id": "clip_01", "file": "clips/clip_01.mp4", "duration": 8.0,
                    "provider": "fal", "status": "SUCCESS"
                },
                {
                    "id": "clip_02", "file": "clips/clip_02.mp4", "duration": 8.0,
                    "provider": "fal", "status": "RECOVERED"
                }
            ],
            "total_duration": 16.0,
            "assembly_ready": ready,
            "missing_clips": ["clip_03"]
        }));
    }

    #[tokio::test]
    async fn summarises_a_partial_run() {
        let dir = tempfile::tempdir().unwrap();
        seed_run(dir.path(), false);
        let report = inspect_run(dir.path()).await.unwrap();

        assert_eq!(report.run_id, "r1");
        assert_eq!(report.operating_mode, "SAFE");
        assert_eq!(report.clips_listed, 2);
        assert_eq!(report.prompts_logged, 3);
        assert_eq!(report.clip_files, vec!["clip_01"]);
        assert_eq!(report.absent_files, vec!["clips/clip_02.mp4"]);
        assert_eq!(report.missing_clips, vec!["clip_03"]);
        assert_eq!((report.recovered, report.failed), (1, 1));
        assert!(report.consistent);
        assert!(report.recommendations[0].starts_with("Short video"));
        assert_eq!(report.recommendations.len(), 3);
    }

    #[tokio::test]
    async fn flags_inconsistent_manifest() {
        let dir = tempfile::tempdir().unwrap();
        seed_run(dir.path(), true);
        assert!(!inspect_run(dir.path()).await.unwrap().consistent);
    }

    #[tokio::test]
    async fn missing_artifact_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(inspect_run(dir.path()).await, Err(FactoryError::Io(_))));
    }

    #[test]
    fn length_bands() {
        assert!(length_recommendation(29.9).starts_with("Short video"));
        assert!(length_recommendation(30.0).starts_with("Standard short"));
        assert!(length_recommendation(96.0).starts_with("Medium"));
        assert!(length_recommendation(180.0).starts_with("Long-form"));
    }
}
