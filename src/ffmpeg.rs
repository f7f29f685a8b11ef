use anyhow::{Context, Result};
use std::path::Path;
use tokio::process::Command;

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let status = cmd.status().await.context("Command execution failed")?;
    if !status.success() {
        return Err(anyhow::anyhow!("Command failed: {:?}", args));
    }

    Ok(())
}

/// Parse `WIDTHxHEIGHT`, requiring even positive dimensions for yuv420p.
pub fn parse_resolution(resolution: &str) -> Option<(u32, u32)> {
    let (w, h) = resolution.trim().split_once(['x', 'X'])?;
    let w = w.trim().parse::<u32>().ok()?;
    let h = h.trim().parse::<u32>().ok()?;
    if w == 0 || h == 0 || w % 2 != 0 || h % 2 != 0 {
        return None;
    }
    Some((w, h))
}

fn still_to_clip_args(
    still: &Path,
    duration_s: f64,
    fps: u32,
    (w, h): (u32, u32),
    out_mp4: &Path,
) -> Vec<String> {
    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},fps={fps},format=yuv420p"
    );

    vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        "-i".to_string(),
        still.display().to_string(),
        "-t".to_string(),
        format!("{:.3}", duration_s),
        "-vf".to_string(),
        filter,
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-crf".to_string(),
        "22".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]
}

/// Render a still image into a fixed-length vertical clip.
pub async fn ffmpeg_still_to_clip(
    still: &Path,
    duration_s: f64,
    fps: u32,
    resolution: &str,
    out_mp4: &Path,
) -> Result<bool> {
    let Some(dims) = parse_resolution(resolution) else {
        return Ok(false);
    };
    if duration_s <= 0.1 {
        return Ok(false);
    }

    let args = still_to_clip_args(still, duration_s, fps, dims, out_mp4);
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resolution() {
        assert_eq!(parse_resolution("1080x1920"), Some((1080, 1920)));
        assert_eq!(parse_resolution(" 720X1280 "), Some((720, 1280)));
        assert_eq!(parse_resolution("1081x1920"), None);
        assert_eq!(parse_resolution("1080"), None);
        assert_eq!(parse_resolution("0x1920"), None);
    }

    #[test]
    fn still_args_carry_duration_and_geometry() {
        let args = still_to_clip_args(
            Path::new("clips/clip_01.png"),
            8.0,
            30,
            (1080, 1920),
            Path::new("clips/clip_01.mp4"),
        );
        assert_eq!(args[0], "ffmpeg");
        assert!(args.contains(&"8.000".to_string()));
        assert!(args.iter().any(|a| a.contains("crop=1080:1920") && a.contains("fps=30")));
        assert_eq!(args.last().map(String::as_str), Some("clips/clip_01.mp4"));
    }
}
