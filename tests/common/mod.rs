#![allow(dead_code)]

use async_trait::async_trait;
use opal_clip_factory::api::{
    ClipProvider, GenerationOutcome, GenerationToken, ProviderFailure,
};
use opal_clip_factory::config::Config;
use opal_clip_factory::{
    ClipFactory, ErrorKind, OperatingMode, ProviderId, ProviderPool, RunSettings,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub enum Script {
    AcceptAll,
    RejectAll(ErrorKind),
    /// Reject the first n calls, accept the rest.
    RejectFirst(usize),
}

pub struct ScriptedProvider {
    id: ProviderId,
    script: Script,
    calls: AtomicUsize,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedProvider {
    pub fn new(name: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(name),
            script,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClipProvider for ScriptedProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn generate(&self, prompt: &str, clip_id: &str) -> GenerationOutcome {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((clip_id.to_string(), prompt.to_string()));
        let accept = match self.script {
            Script::AcceptAll => true,
            Script::RejectAll(_) => false,
            Script::RejectFirst(limit) => n >= limit,
        };
        if accept {
            Ok(GenerationToken::Job(format!("{}-{}", self.id, clip_id)))
        } else {
            let kind = match self.script {
                Script::RejectAll(kind) => kind,
                _ => ErrorKind::ContentPolicyError,
            };
            Err(ProviderFailure::new(kind, "scripted rejection"))
        }
    }
}

pub fn pool(providers: &[Arc<ScriptedProvider>]) -> ProviderPool {
    providers
        .iter()
        .fold(ProviderPool::builder(), |b, p| b.provider(p.clone(), 1.0))
        .build()
        .unwrap()
}

/// Factory that keeps the mode's real pause between clips.
pub fn paced_factory(base: &Path, pool: ProviderPool, mode: OperatingMode) -> ClipFactory {
    let mut settings = RunSettings::from_config(&Config::default(), mode);
    settings.output_base = base.to_path_buf();
    ClipFactory::new(pool, settings).with_run_id("2026-01-01_120000")
}

pub fn factory(base: &Path, pool: ProviderPool) -> ClipFactory {
    let mut settings = RunSettings::from_config(&Config::default(), OperatingMode::Accelerated);
    settings.output_base = base.to_path_buf();
    settings.pause_override = Some(Duration::ZERO);
    ClipFactory::new(pool, settings).with_run_id("2026-01-01_120000")
}

pub fn prompts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
