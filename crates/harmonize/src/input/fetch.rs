//! Download a source file when it is not already on disk.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::info;

use crate::error::{HarmonizeError, Result};

/// Make sure `path` exists, downloading it from `url` if it does not.
///
/// Returns `true` when a download happened. The body is written to a
/// sibling `.part` file and renamed into place, so an interrupted download
/// never leaves a truncated source behind.
pub fn ensure_file(path: &Path, url: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HarmonizeError::io(parent, e))?;
    }

    info!(url, path = %path.display(), "downloading source file");

    let http_error = |message: String| HarmonizeError::Http {
        url: url.to_string(),
        message,
    };

    // Census servers can take minutes to stream the larger extracts.
    let client = Client::builder()
        .timeout(Duration::from_secs(600))
        .build()
        .map_err(|e| http_error(format!("failed to create HTTP client: {}", e)))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| http_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(http_error(format!("server returned {}", response.status())));
    }

    let body = response.bytes().map_err(|e| http_error(e.to_string()))?;

    let partial = path.with_extension("part");
    let mut file = std::fs::File::create(&partial).map_err(|e| HarmonizeError::io(&partial, e))?;
    file.write_all(&body)
        .map_err(|e| HarmonizeError::io(&partial, e))?;
    std::fs::rename(&partial, path).map_err(|e| HarmonizeError::io(path, e))?;

    info!(path = %path.display(), bytes = body.len(), "download complete");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_file_is_not_downloaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cc-est2019-alldata.csv");
        std::fs::write(&path, "STATE\n").unwrap();

        // The URL is never contacted when the file exists.
        assert!(!ensure_file(&path, "http://invalid.invalid/data.csv").unwrap());
    }

    #[test]
    fn test_unreachable_host_is_http_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.csv");

        let err = ensure_file(&path, "http://127.0.0.1:9/data.csv").unwrap_err();
        assert!(matches!(err, HarmonizeError::Http { .. }));
        assert!(!path.exists());
    }
}
