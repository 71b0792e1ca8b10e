//! yt-dlp backed resolver and fetcher
//!
//! Shells out to `yt-dlp` for metadata, thumbnails, media downloads, and
//! playlist queries. Metadata and thumbnail fetches for one URL run
//! concurrently.

use super::MediaResolver;
use crate::error::{Error, Result};
use async_trait::async_trait;
use jukeq_common::human_time::parse_duration;
use jukeq_common::QueueEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

static WATCH_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:http(?:s)?://(?:www\.)?)?youtu(?:be\.com/watch\?v=|\.be/)([\w\-]+)").unwrap()
});

static START_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[?&]t=(?:([0-9]+)h)?(?:([0-9]+)m)?(?:([0-9]+)s?)?(?:&|$)").unwrap()
});

static THUMBNAIL_OUTPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[info\] Writing video thumbnail .*? to: .*?[\\/]([^\\/\r\n]+)").unwrap()
});

/// Extract the media id from a watch URL.
pub fn extract_id(url: &str) -> Option<&str> {
    WATCH_URL
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
}

/// Extract a start offset in seconds from a URL's `t=` parameter.
pub fn start_offset(url: &str) -> u64 {
    let Some(caps) = START_PARAM.captures(url) else {
        return 0;
    };
    let field = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    field(1) * 3600 + field(2) * 60 + field(3)
}

pub struct YtDlpResolver {
    thumbnails_dir: PathBuf,
}

impl YtDlpResolver {
    pub fn new(thumbnails_dir: impl Into<PathBuf>) -> Self {
        YtDlpResolver {
            thumbnails_dir: thumbnails_dir.into(),
        }
    }

    async fn run(args: &[&str]) -> Result<String> {
        debug!("yt-dlp {}", args.join(" "));
        let output = Command::new("yt-dlp")
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Resolution(format!("failed to run yt-dlp: {}", e)))?;
        if !output.status.success() {
            return Err(Error::Resolution(format!(
                "yt-dlp exited with {}",
                output.status
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn resolve(&self, url: &str) -> Result<QueueEntry> {
        let id = extract_id(url)
            .ok_or_else(|| Error::Resolution(format!("not a watch URL: {}", url)))?
            .to_string();

        let thumb_target = self.thumbnails_dir.join(&id);
        let thumb_target = thumb_target.to_string_lossy().into_owned();
        let info_args = [url, "--print", "%(duration>%H:%M:%S)s %(title)s"];
        let thumb_args = [
            "--write-thumbnail",
            "--skip-download",
            url,
            "-o",
            &thumb_target,
        ];
        let info = Self::run(&info_args);
        let thumb = Self::run(&thumb_args);
        let (info, thumb) = tokio::join!(info, thumb);
        let info = info?;
        let thumb = thumb?;

        let (duration_s, title) = info
            .trim()
            .split_once(' ')
            .ok_or_else(|| Error::Resolution(format!("unexpected yt-dlp output: {}", info)))?;
        let duration = parse_duration(duration_s)
            .ok_or_else(|| Error::Resolution(format!("invalid duration: {}", duration_s)))?;

        let thumbnail = THUMBNAIL_OUTPUT
            .captures(&thumb)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::Resolution("could not identify thumbnail file".into()))?;

        Ok(QueueEntry {
            id,
            title: title.trim().to_string(),
            duration,
            thumbnail,
            start: start_offset(url),
            is_filler: false,
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        if dest.exists() {
            std::fs::remove_file(dest)?;
        }
        info!("Starting download into {}: {}", dest.display(), url);
        let status = Command::new("yt-dlp")
            .args(["--ignore-errors", "-f", "bestaudio", url, "-o"])
            .arg(dest)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // Abandoned downloads (shutdown, skip) must not leave orphans.
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| Error::Download(format!("failed to run yt-dlp: {}", e)))?;
        if !status.success() {
            return Err(Error::Download(format!("yt-dlp exited with {}", status)));
        }
        Ok(())
    }

    async fn playlist_len(&self, source: &str) -> Result<usize> {
        let out = Self::run(&[source, "-I0", "-O", "playlist:playlist_count"]).await?;
        out.trim()
            .parse()
            .map_err(|_| Error::FillerConfig(format!("bad playlist count: {}", out.trim())))
    }

    async fn playlist_item(&self, source: &str, index: usize) -> Result<String> {
        // yt-dlp playlist positions are 1-based.
        let position = (index + 1).to_string();
        let out = Self::run(&[
            source,
            "--playlist-start",
            &position,
            "--playlist-end",
            &position,
            "--print",
            "%(id)s",
        ])
        .await?;
        let id = out.trim();
        if id.is_empty() {
            return Err(Error::Resolution(format!(
                "playlist item {} of {} not found",
                position, source
            )));
        }
        Ok(format!("https://youtube.com/watch?v={}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_watch_urls() {
        assert_eq!(
            extract_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(extract_id("https://youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_id("youtube.com/watch?v=abc_-123"), Some("abc_-123"));
        assert_eq!(extract_id("https://example.com/watch?v=abc"), None);
        assert_eq!(extract_id("not a url"), None);
    }

    #[test]
    fn start_offset_parses_t_parameter() {
        assert_eq!(start_offset("https://youtu.be/x?t=1h2m3s"), 3723);
        assert_eq!(start_offset("https://youtu.be/x?t=2m30"), 150);
        assert_eq!(start_offset("https://youtu.be/x?t=45s&other=1"), 45);
        assert_eq!(start_offset("https://youtu.be/x"), 0);
    }

    #[test]
    fn thumbnail_filename_is_captured_from_output() {
        let out = "[info] Writing video thumbnail 0 to: thumbnails/abc123.webp\n";
        let caps = THUMBNAIL_OUTPUT.captures(out).unwrap();
        assert_eq!(&caps[1], "abc123.webp");
    }
}
