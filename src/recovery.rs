//! Per-clip recovery state machine.
//!
//! A clip walks a fixed ladder: original prompt, simplified, semantic
//! proxy, decomposed, then the decomposed prompt on the fallback provider.
//! Every stage costs exactly one provider call. The controller never
//! fails; it always hands back a terminal [`ClipResult`].

use crate::api::{GenerationToken, ProviderFailure};
use crate::clip::{
    ClipRequest, ClipResult, ClipStatus, ErrorKind, PromptLineage, ProviderId, RecoveryStrategy,
};
use crate::pool::ProviderPool;
use crate::prompt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Original,
    Simplified,
    SemanticProxy,
    Decomposed,
    ProviderFailover,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Original,
        Stage::Simplified,
        Stage::SemanticProxy,
        Stage::Decomposed,
        Stage::ProviderFailover,
    ];

    /// 1-based attempt number of this stage.
    pub fn attempt(self) -> u32 {
        match self {
            Stage::Original => 1,
            Stage::Simplified => 2,
            Stage::SemanticProxy => 3,
            Stage::Decomposed => 4,
            Stage::ProviderFailover => 5,
        }
    }

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Original => Some(Stage::Simplified),
            Stage::Simplified => Some(Stage::SemanticProxy),
            Stage::SemanticProxy => Some(Stage::Decomposed),
            Stage::Decomposed => Some(Stage::ProviderFailover),
            Stage::ProviderFailover => None,
        }
    }

    /// Strategy credited when this stage succeeds.
    pub fn strategy(self) -> Option<RecoveryStrategy> {
        match self {
            Stage::Original => None,
            Stage::Simplified => Some(RecoveryStrategy::PromptSimplification),
            Stage::SemanticProxy => Some(RecoveryStrategy::SemanticProxy),
            Stage::Decomposed => Some(RecoveryStrategy::OmniDecomposition),
            Stage::ProviderFailover => Some(RecoveryStrategy::ProviderFailover),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Original => "original",
            Stage::Simplified => "simplified",
            Stage::SemanticProxy => "semantic_proxy",
            Stage::Decomposed => "decomposed",
            Stage::ProviderFailover => "failover",
        }
    }
}

/// Chooses the stage to try after a failure.
///
/// This is the hook for error-aware recovery (e.g. jumping straight to
/// failover on a rate limit). Returning `None`, or a stage that is not
/// strictly later, ends the ladder.
pub trait EscalationPolicy: Send + Sync {
    fn next_stage(&self, failed: Stage, failure: &ProviderFailure) -> Option<Stage>;
}

/// Walks every stage in order regardless of the failure kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEscalation;

impl EscalationPolicy for UniformEscalation {
    fn next_stage(&self, failed: Stage, _failure: &ProviderFailure) -> Option<Stage> {
        failed.next()
    }
}

/// One provider call made on behalf of a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub stage: Stage,
    pub provider: ProviderId,
    pub prompt: String,
    pub failure: Option<ErrorKind>,
}

#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub result: ClipResult,
    pub token: Option<GenerationToken>,
    pub attempts: Vec<AttemptRecord>,
}

pub struct RecoveryController<'a> {
    pool: &'a ProviderPool,
    policy: &'a dyn EscalationPolicy,
    clips_dir: &'a Path,
    duration: f64,
}

impl<'a> RecoveryController<'a> {
    pub fn new(
        pool: &'a ProviderPool,
        policy: &'a dyn EscalationPolicy,
        clips_dir: &'a Path,
        duration: f64,
    ) -> Self {
        Self {
            pool,
            policy,
            clips_dir,
            duration,
        }
    }

    pub fn clip_path(&self, clip_id: &str) -> PathBuf {
        self.clips_dir.join(format!("{}.mp4", clip_id))
    }

    /// Prompt for `stage`, recording it in the lineage the first time the
    /// stage is reached.
    fn prompt_for(stage: Stage, lineage: &mut PromptLineage) -> String {
        match stage {
            Stage::Original => lineage.original().to_string(),
            Stage::Simplified => {
                let text = prompt::simplify(lineage.original());
                lineage.record_simplified(&text);
                text
            }
            Stage::SemanticProxy => {
                let base = lineage
                    .simplified()
                    .map(str::to_string)
                    .unwrap_or_else(|| prompt::simplify(lineage.original()));
                let text = prompt::semantic_proxy(&base);
                lineage.record_semantic_proxy(&text);
                text
            }
            Stage::Decomposed | Stage::ProviderFailover => {
                let text = lineage
                    .decomposed()
                    .map(str::to_string)
                    .unwrap_or_else(|| prompt::decompose(lineage.original()));
                lineage.record_decomposed(&text);
                text
            }
        }
    }

    fn target_for(&self, stage: Stage, assigned: &ProviderId) -> ProviderId {
        match stage {
            Stage::ProviderFailover => self.pool.fallback_for(assigned).clone(),
            _ => assigned.clone(),
        }
    }

    async fn call(
        &self,
        provider: &ProviderId,
        prompt: &str,
        clip_id: &str,
    ) -> Result<GenerationToken, ProviderFailure> {
        match self.pool.adapter(provider) {
            Some(adapter) => adapter.generate(prompt, clip_id).await,
            None => Err(ProviderFailure::new(
                ErrorKind::UnknownError,
                format!("provider {} is not registered", provider),
            )),
        }
    }

    pub async fn run(&self, request: &ClipRequest) -> RecoveryOutcome {
        let clip_id = request.clip_id();
        let assigned = request.provider();
        let mut lineage = PromptLineage::new(request.prompt());
        let mut attempts = Vec::new();
        let mut stage = Stage::Original;

        loop {
            let text = Self::prompt_for(stage, &mut lineage);
            let target = self.target_for(stage, assigned);
            info!(clip_id, provider = %target, stage = stage.as_str(), "generation attempt");

            match self.call(&target, &text, clip_id).await {
                Ok(token) => {
                    attempts.push(AttemptRecord {
                        stage,
                        provider: target.clone(),
                        prompt: text.clone(),
                        failure: None,
                    });
                    lineage.record_final(&text);
                    let status = if stage == Stage::Original {
                        ClipStatus::Success
                    } else {
                        ClipStatus::Recovered
                    };
                    let result = ClipResult {
                        clip_id: clip_id.to_string(),
                        ordinal: request.ordinal(),
                        status,
                        file_path: Some(self.clip_path(clip_id)),
                        assigned_provider: assigned.clone(),
                        provider: target,
                        duration: self.duration,
                        attempts: stage.attempt(),
                        recovery_strategy: stage.strategy(),
                        error: None,
                        lineage,
                    };
                    return RecoveryOutcome {
                        result,
                        token: Some(token),
                        attempts,
                    };
                }
                Err(failure) => {
                    warn!(
                        clip_id,
                        provider = %target,
                        stage = stage.as_str(),
                        error = %failure.kind,
                        "attempt failed: {}",
                        failure.detail
                    );
                    attempts.push(AttemptRecord {
                        stage,
                        provider: target,
                        prompt: text.clone(),
                        failure: Some(failure.kind),
                    });

                    match self.policy.next_stage(stage, &failure) {
                        Some(next) if next > stage => stage = next,
                        _ => {
                            lineage.record_final(&text);
                            let result = ClipResult {
                                clip_id: clip_id.to_string(),
                                ordinal: request.ordinal(),
                                status: ClipStatus::Failed,
                                file_path: None,
                                assigned_provider: assigned.clone(),
                                provider: assigned.clone(),
                                duration: 0.0,
                                attempts: stage.attempt(),
                                recovery_strategy: Some(RecoveryStrategy::Exhausted),
                                error: Some(failure.kind),
                                lineage,
                            };
                            return RecoveryOutcome {
                                result,
                                token: None,
                                attempts,
                            };
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ClipProvider, GenerationOutcome};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Accepts only prompts for which `accept` returns true.
    struct Scripted {
        id: ProviderId,
        accept: Box<dyn Fn(&str) -> bool + Send + Sync>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(name: &str, accept: impl Fn(&str) -> bool + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                id: ProviderId::new(name),
                accept: Box::new(accept),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ClipProvider for Scripted {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        async fn generate(&self, prompt: &str, _clip_id: &str) -> GenerationOutcome {
            self.seen.lock().unwrap().push(prompt.to_string());
            if (self.accept)(prompt) {
                Ok(GenerationToken::Job(format!("{}-ok", self.id)))
            } else {
                Err(ProviderFailure::new(ErrorKind::ContentPolicyError, "rejected"))
            }
        }
    }

    const PROMPT: &str = "A sleek weapon on a detailed table in a dark room";

    async fn run_with(primary: Arc<Scripted>, backup: Arc<Scripted>) -> RecoveryOutcome {
        let pool = ProviderPool::builder()
            .provider(primary, 1.0)
            .provider(backup, 1.0)
            .build()
            .unwrap();
        let clips = PathBuf::from("/runs/r1/clips");
        let controller = RecoveryController::new(&pool, &UniformEscalation, &clips, 8.0);
        let request = ClipRequest::new(1, PROMPT, ProviderId::new("primary"));
        controller.run(&request).await
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let out = run_with(
            Scripted::new("primary", |_| true),
            Scripted::new("backup", |_| true),
        )
        .await;
        let r = &out.result;
        assert_eq!(r.status, ClipStatus::Success);
        assert_eq!(r.attempts, 1);
        assert_eq!(r.recovery_strategy, None);
        assert_eq!(r.error, None);
        assert_eq!(r.file_path, Some(PathBuf::from("/runs/r1/clips/clip_01.mp4")));
        assert_eq!(r.lineage.final_text(), Some(PROMPT));
        assert_eq!(r.lineage.simplified(), None);
        assert!(out.token.is_some());
    }

    #[tokio::test]
    async fn simplification_recovers() {
        let out = run_with(
            Scripted::new("primary", |p| !p.contains("sleek")),
            Scripted::new("backup", |_| true),
        )
        .await;
        let r = &out.result;
        assert_eq!(r.status, ClipStatus::Recovered);
        assert_eq!(r.attempts, 2);
        assert_eq!(r.recovery_strategy, Some(RecoveryStrategy::PromptSimplification));
        assert_eq!(r.lineage.simplified(), Some("A weapon on a table in a dark room"));
        assert_eq!(r.lineage.semantic_proxy(), None);
        assert_eq!(r.lineage.final_text(), r.lineage.simplified());
    }

    #[tokio::test]
    async fn semantic_proxy_runs_on_simplified_text() {
        let out = run_with(
            Scripted::new("primary", |p| !p.contains("weapon")),
            Scripted::new("backup", |_| true),
        )
        .await;
        let r = &out.result;
        assert_eq!(r.attempts, 3);
        assert_eq!(r.recovery_strategy, Some(RecoveryStrategy::SemanticProxy));
        assert_eq!(r.lineage.final_text(), Some("A tool on a table in a dark room"));
        assert_eq!(r.lineage.decomposed(), None);
    }

    #[tokio::test]
    async fn decomposition_recovers() {
        let out = run_with(
            Scripted::new("primary", |p| p.starts_with("A room in")),
            Scripted::new("backup", |_| true),
        )
        .await;
        let r = &out.result;
        assert_eq!(r.attempts, 4);
        assert_eq!(r.recovery_strategy, Some(RecoveryStrategy::OmniDecomposition));
        assert_eq!(r.lineage.decomposed(), Some("A room in a dark, cinematic setting"));
        assert_eq!(r.provider.as_str(), "primary");
    }

    #[tokio::test]
    async fn failover_replaces_provider_and_keeps_decomposed_prompt() {
        let backup = Scripted::new("backup", |_| true);
        let out = run_with(Scripted::new("primary", |_| false), backup.clone()).await;
        let r = &out.result;
        assert_eq!(r.status, ClipStatus::Recovered);
        assert_eq!(r.attempts, 5);
        assert_eq!(r.recovery_strategy, Some(RecoveryStrategy::ProviderFailover));
        assert_eq!(r.provider.as_str(), "backup");
        assert_eq!(r.assigned_provider.as_str(), "primary");
        assert_eq!(
            backup.seen.lock().unwrap().as_slice(),
            &["A room in a dark, cinematic setting".to_string()]
        );
        assert_eq!(r.file_path, Some(PathBuf::from("/runs/r1/clips/clip_01.mp4")));
    }

    #[tokio::test]
    async fn exhaustion_is_terminal_failure() {
        let out = run_with(
            Scripted::new("primary", |_| false),
            Scripted::new("backup", |_| false),
        )
        .await;
        let r = &out.result;
        assert_eq!(r.status, ClipStatus::Failed);
        assert_eq!(r.attempts, MAX_ATTEMPTS);
        assert_eq!(r.recovery_strategy, Some(RecoveryStrategy::Exhausted));
        assert_eq!(r.error, Some(ErrorKind::ContentPolicyError));
        assert_eq!(r.file_path, None);
        assert_eq!(r.duration, 0.0);
        assert_eq!(r.provider.as_str(), "primary");
        assert_eq!(r.lineage.depth(), 4);
        assert_eq!(r.lineage.final_text(), r.lineage.decomposed());
        assert_eq!(out.attempts.len(), 5);
        assert!(out.token.is_none());
    }

    #[tokio::test]
    async fn attempts_track_stage_order() {
        let out = run_with(
            Scripted::new("primary", |_| false),
            Scripted::new("backup", |_| false),
        )
        .await;
        let stages: Vec<Stage> = out.attempts.iter().map(|a| a.stage).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
        for (i, a) in out.attempts.iter().enumerate() {
            assert_eq!(a.stage.attempt(), i as u32 + 1);
        }
    }

    struct GiveUpOnRateLimit;

    impl EscalationPolicy for GiveUpOnRateLimit {
        fn next_stage(&self, failed: Stage, failure: &ProviderFailure) -> Option<Stage> {
            if failure.kind == ErrorKind::RateLimitError {
                return None;
            }
            failed.next()
        }
    }

    struct RateLimited(ProviderId);

    #[async_trait]
    impl ClipProvider for RateLimited {
        fn id(&self) -> &ProviderId {
            &self.0
        }

        async fn generate(&self, _prompt: &str, _clip_id: &str) -> GenerationOutcome {
            Err(ProviderFailure::new(ErrorKind::RateLimitError, "429"))
        }
    }

    #[tokio::test]
    async fn escalation_policy_can_end_the_ladder() {
        let pool = ProviderPool::builder()
            .provider(Arc::new(RateLimited(ProviderId::new("busy"))), 1.0)
            .build()
            .unwrap();
        let clips = PathBuf::from("clips");
        let controller = RecoveryController::new(&pool, &GiveUpOnRateLimit, &clips, 8.0);
        let out = controller
            .run(&ClipRequest::new(2, "a person", ProviderId::new("busy")))
            .await;
        assert_eq!(out.result.status, ClipStatus::Failed);
        assert_eq!(out.result.attempts, 1);
        assert_eq!(out.result.error, Some(ErrorKind::RateLimitError));
        assert_eq!(out.result.lineage.final_text(), Some("a person"));
    }
}
