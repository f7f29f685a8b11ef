//! Turns an accepted generation into files under `clips/`.
//!
//! Inline images and direct links are saved as `<clip_id>.png`; when
//! ffmpeg is present the still is rendered into `<clip_id>.mp4`. Queued
//! provider jobs have nothing to fetch yet and are left alone.

use crate::api::GenerationToken;
use crate::ffmpeg;
use crate::generator::RunSettings;
use crate::logi;
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

pub struct Materializer {
    client: reqwest::Client,
    duration: f64,
    fps: u32,
    resolution: String,
    render_video: bool,
}

impl Materializer {
    pub fn new(client: reqwest::Client, settings: &RunSettings, render_video: bool) -> Self {
        Self {
            client,
            duration: settings.duration_per_clip,
            fps: settings.fps,
            resolution: settings.resolution.clone(),
            render_video,
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send()
            .await
            .with_context(|| format!("Asset download failed: {}", url))?;
        if !resp.status().is_success() {
            anyhow::bail!("Asset download HTTP {} for {}", resp.status().as_u16(), url);
        }
        let bytes = resp.bytes().await.context("Asset body read failed")?;
        Ok(bytes.to_vec())
    }

    /// Returns true when the clip file (or its still, if rendering is off)
    /// now exists on disk.
    pub async fn materialize(&self, token: &GenerationToken, clip_path: &Path) -> Result<bool> {
        let bytes = match token {
            GenerationToken::Job(id) => {
                logi(format!("{} queued at provider as job {}", clip_path.display(), id));
                return Ok(false);
            }
            GenerationToken::Url(url) => self.download(url).await?,
            GenerationToken::InlineImage(data) => decode_inline_image(data)?,
        };

        let still = clip_path.with_extension("png");
        if let Some(parent) = still.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(&still, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", still.display()))?;

        if !self.render_video {
            return Ok(true);
        }
        ffmpeg::ffmpeg_still_to_clip(&still, self.duration, self.fps, &self.resolution, clip_path)
            .await
    }
}

/// Decode a base64 payload, tolerating a `data:` URI prefix.
pub fn decode_inline_image(data: &str) -> Result<Vec<u8>> {
    let payload = match data.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => data,
    };
    STANDARD
        .decode(payload.trim())
        .context("Inline image is not valid base64")
}
