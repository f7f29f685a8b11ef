pub mod api;
pub mod clip;
pub mod config;
pub mod error;
pub mod export;
pub mod ffmpeg;
pub mod generator;
pub mod init;
pub mod inspect;
pub mod materialize;
pub mod pool;
pub mod prompt;
pub mod prompts_file;
pub mod recovery;

pub use clip::{
    ClipRequest, ClipResult, ClipStatus, ErrorKind, OperatingMode, PromptLineage, ProviderId,
    RecoveryStrategy,
};
pub use error::{FactoryError, FactoryResult};
pub use generator::{ClipFactory, RunOutcome, RunSettings};
pub use pool::{ProviderHealth, ProviderPool};

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!(tag, "{}", message),
        _ => tracing::info!(tag, "{}", message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
