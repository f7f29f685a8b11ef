//! Run coordinator: plans the clip list, drives each clip through the
//! recovery ladder one at a time, paces provider traffic and exports the
//! run artifacts.

use crate::clip::{ClipRequest, ClipResult, ClipStatus, OperatingMode};
use crate::config::Config;
use crate::error::{FactoryError, FactoryResult};
use crate::export::{self, ExportReport};
use crate::init;
use crate::materialize::Materializer;
use crate::pool::{ProviderHealth, ProviderPool};
use crate::recovery::{EscalationPolicy, RecoveryController, UniformEscalation};
use crate::{logi, logok, logw};
use chrono::{DateTime, Local};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

const MAX_RUN_ID_SUFFIX: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub mode: OperatingMode,
    pub output_base: PathBuf,
    pub duration_per_clip: f64,
    pub resolution: String,
    pub fps: u32,
    /// Replaces the mode's pause when set. Zero disables pacing.
    pub pause_override: Option<Duration>,
}

impl RunSettings {
    pub fn from_config(cfg: &Config, mode: OperatingMode) -> Self {
        Self {
            mode,
            output_base: cfg.output_base.clone(),
            duration_per_clip: cfg.duration_per_clip,
            resolution: cfg.resolution.clone(),
            fps: cfg.fps,
            pause_override: None,
        }
    }

    pub fn pause(&self) -> Duration {
        self.pause_override.unwrap_or_else(|| self.mode.pause())
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub output_dir: PathBuf,
    pub settings: RunSettings,
    pub results: Vec<ClipResult>,
    pub health: ProviderHealth,
    pub completed_at: DateTime<Local>,
    pub artifacts: ExportReport,
}

impl RunOutcome {
    fn count(&self, status: ClipStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(ClipStatus::Success)
    }

    pub fn recovered(&self) -> usize {
        self.count(ClipStatus::Recovered)
    }

    pub fn failed(&self) -> usize {
        self.count(ClipStatus::Failed)
    }

    pub fn assembly_ready(&self) -> bool {
        self.failed() == 0
    }
}

/// Timestamped run identifier, e.g. `2026-03-14_091500`.
pub fn new_run_id() -> String {
    Local::now().format("%Y-%m-%d_%H%M%S").to_string()
}

pub struct ClipFactory {
    pool: ProviderPool,
    settings: RunSettings,
    policy: Box<dyn EscalationPolicy>,
    materializer: Option<Materializer>,
    run_id: Option<String>,
}

impl ClipFactory {
    pub fn new(pool: ProviderPool, settings: RunSettings) -> Self {
        Self {
            pool,
            settings,
            policy: Box::new(UniformEscalation),
            materializer: None,
            run_id: None,
        }
    }

    /// Use a fixed run id instead of a fresh timestamp per run. A run whose
    /// directory already exists fails with `RunDirExists`.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_policy(mut self, policy: impl EscalationPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_materializer(mut self, materializer: Materializer) -> Self {
        self.materializer = Some(materializer);
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn pool(&self) -> &ProviderPool {
        &self.pool
    }

    async fn create_run_dir(&self, run_id: &str) -> FactoryResult<(PathBuf, PathBuf)> {
        let output_dir = self.settings.output_base.join(run_id);
        match init::ensure_run_directories(&output_dir).await {
            Ok(clips_dir) => Ok((output_dir, clips_dir)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(FactoryError::RunDirExists(output_dir))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Claim an unused run directory. Timestamp ids that collide within the
    /// same second get a numeric suffix.
    async fn claim_run_dir(&self) -> FactoryResult<(String, PathBuf, PathBuf)> {
        if let Some(run_id) = &self.run_id {
            let (output_dir, clips_dir) = self.create_run_dir(run_id).await?;
            return Ok((run_id.clone(), output_dir, clips_dir));
        }

        let stamp = new_run_id();
        for n in 1..=MAX_RUN_ID_SUFFIX {
            let run_id = if n == 1 {
                stamp.clone()
            } else {
                format!("{}_{}", stamp, n)
            };
            match self.create_run_dir(&run_id).await {
                Ok((output_dir, clips_dir)) => return Ok((run_id, output_dir, clips_dir)),
                Err(FactoryError::RunDirExists(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(FactoryError::RunDirExists(self.settings.output_base.join(stamp)))
    }

    /// One request per prompt, ordinals starting at 1, providers assigned
    /// round-robin.
    pub fn plan(&self, prompts: &[String]) -> Vec<ClipRequest> {
        prompts
            .iter()
            .enumerate()
            .map(|(i, prompt)| {
                let ordinal = i + 1;
                ClipRequest::new(ordinal, prompt.trim(), self.pool.assign(ordinal).clone())
            })
            .collect()
    }

    fn check_prompts(prompts: &[String]) -> FactoryResult<()> {
        if prompts.is_empty() {
            return Err(FactoryError::EmptyPromptList);
        }
        if let Some(i) = prompts.iter().position(|p| p.trim().is_empty()) {
            return Err(FactoryError::BlankPrompt { ordinal: i + 1 });
        }
        Ok(())
    }

    /// Generate every clip in order and write the run artifacts.
    ///
    /// Only precondition failures are errors. Once the first clip starts,
    /// the run always completes with one result per prompt.
    pub async fn run(&self, prompts: &[String]) -> FactoryResult<RunOutcome> {
        Self::check_prompts(prompts)?;

        let (run_id, output_dir, clips_dir) = self.claim_run_dir().await?;
        let requests = self.plan(prompts);
        let total = requests.len();
        let pause = self.settings.pause();

        logi(format!(
            "Run {}: {} clips, {} mode, providers [{}]",
            run_id,
            total,
            self.settings.mode,
            self.pool
                .ids()
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        let controller = RecoveryController::new(
            &self.pool,
            self.policy.as_ref(),
            &clips_dir,
            self.settings.duration_per_clip,
        );

        let mut results = Vec::with_capacity(total);
        let mut health = ProviderHealth::new();

        for request in &requests {
            logi(format!(
                "[{}/{}] {} via {}",
                request.ordinal(),
                total,
                request.clip_id(),
                request.provider()
            ));

            let outcome = controller.run(request).await;
            health = outcome
                .attempts
                .iter()
                .fold(health, |h, a| h.record(&a.provider, a.failure.is_none()));

            let result = outcome.result;
            match result.status {
                ClipStatus::Success => {
                    logok(format!("{} generated by {}", result.clip_id, result.provider))
                }
                ClipStatus::Recovered => logok(format!(
                    "{} recovered by {} on attempt {} ({})",
                    result.clip_id,
                    result.recovery_strategy.map_or("-", |s| s.as_str()),
                    result.attempts,
                    result.provider
                )),
                ClipStatus::Failed => logw(format!(
                    "{} failed after {} attempts: {}",
                    result.clip_id,
                    result.attempts,
                    result.error.map_or_else(|| "-".to_string(), |e| e.to_string())
                )),
            }

            if let (Some(materializer), Some(token), Some(path)) =
                (&self.materializer, outcome.token.as_ref(), result.file_path.as_deref())
            {
                match materializer.materialize(token, path).await {
                    Ok(true) => logok(format!("Saved {}", path.display())),
                    Ok(false) => {}
                    Err(err) => {
                        logw(format!("Could not materialize {}: {:#}", result.clip_id, err))
                    }
                }
            }

            results.push(result);

            if !pause.is_zero() {
                logi(format!("Pacing: waiting {}s", pause.as_secs()));
                tokio::time::sleep(pause).await;
            }
        }

        let mut outcome = RunOutcome {
            run_id,
            output_dir,
            settings: self.settings.clone(),
            results,
            health,
            completed_at: Local::now(),
            artifacts: ExportReport::default(),
        };
        outcome.artifacts = export::export_run(&outcome).await;

        logi(format!(
            "Run {} complete: {} success, {} recovered, {} failed",
            outcome.run_id,
            outcome.succeeded(),
            outcome.recovered(),
            outcome.failed()
        ));
        if outcome.assembly_ready() {
            logok("All clips accounted for; ready for assembly");
        } else {
            logw(format!("{} clip(s) missing; assembly blocked", outcome.failed()));
        }

        Ok(outcome)
    }
}
