//! Failure screenshots.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::browser::PageHandle;
use crate::error::{BrowserError, BrowserResult};

const MAX_TITLE_LEN: usize = 80;

/// Turn a scenario title into something safe to use in a file name
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed: String = out.trim_matches('_').chars().take(MAX_TITLE_LEN).collect();
    let trimmed = trimmed.trim_end_matches('_');
    if trimmed.is_empty() {
        "scenario".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn screenshot_file_name(title: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.png", sanitize_title(title), at.format("%Y%m%d_%H%M%S_%3f"))
}

/// Capture `page` into `dir`, creating the directory if needed.
pub async fn capture_screenshot(page: &dyn PageHandle, dir: &Path, title: &str) -> BrowserResult<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BrowserError::Screenshot(format!("{}: {}", dir.display(), e)))?;

    let path = dir.join(screenshot_file_name(title, Local::now()));
    page.screenshot(&path).await?;
    info!(path = %path.display(), "Failure screenshot saved");
    Ok(path)
}
