use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const CLIPS_DIR: &str = "clips";

/// Create a fresh `<run_dir>` and `<run_dir>/clips`, returning the clips path.
///
/// Parents are created as needed. The run directory itself must not exist
/// yet; an existing one yields `io::ErrorKind::AlreadyExists`.
pub async fn ensure_run_directories(run_dir: &Path) -> io::Result<PathBuf> {
    if let Some(parent) = run_dir.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::create_dir(run_dir).await?;
    crate::logi(format!("Created directory: {}", run_dir.display()));

    let clips = run_dir.join(CLIPS_DIR);
    fs::create_dir(&clips).await?;
    Ok(clips)
}

pub async fn check_ffmpeg() -> bool {
    match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
