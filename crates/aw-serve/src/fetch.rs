//! Remote artifact download with a local cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use aw_engine::{OPTIONAL_FILES, REQUIRED_FILES};
use aw_types::{ArtifactError, AwResult};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Downloads artifact files from a base URL into a per-URL cache directory.
///
/// Files already in the cache are reused. Failed downloads are retried with
/// a linear backoff: the n-th retry waits `n * backoff`.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: reqwest::Client,
    cache_root: PathBuf,
    attempts: u32,
    backoff: Duration,
}

impl Default for ArtifactFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactFetcher {
    pub fn new() -> Self {
        let cache_root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("amlwolf");
        Self {
            client: reqwest::Client::new(),
            cache_root,
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cache directory used for `base_url`: the first 16 hex digits of its
    /// SHA-256 digest.
    pub fn cache_dir_for(&self, base_url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(base_url.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        self.cache_root.join(&digest[..16])
    }

    /// Make every artifact file for `base_url` available locally and return
    /// the directory holding them.
    pub async fn fetch(&self, base_url: &str) -> AwResult<PathBuf> {
        let base_url = base_url.trim_end_matches('/');
        let dir = self.cache_dir_for(base_url);
        tokio::fs::create_dir_all(&dir).await?;

        for name in REQUIRED_FILES {
            let dest = dir.join(name);
            if dest.exists() {
                continue;
            }
            let url = format!("{base_url}/{name}");
            if !self.download(&url, &dest).await? {
                return Err(ArtifactError::NotFound { path: url }.into());
            }
        }
        for name in OPTIONAL_FILES {
            let dest = dir.join(name);
            if dest.exists() {
                continue;
            }
            let url = format!("{base_url}/{name}");
            if !self.download(&url, &dest).await? {
                info!(%url, "optional artifact not published");
            }
        }

        info!(url = %base_url, cache = %dir.display(), "artifacts available locally");
        Ok(dir)
    }

    /// Returns `false` when the server answers 404.
    async fn download(&self, url: &str, dest: &Path) -> AwResult<bool> {
        let mut last_error = String::new();
        for attempt in 1..=self.attempts {
            match self.try_download(url).await {
                Ok(Some(bytes)) => {
                    let partial = dest.with_extension("part");
                    tokio::fs::write(&partial, &bytes).await?;
                    tokio::fs::rename(&partial, dest).await?;
                    info!(%url, bytes = bytes.len(), "downloaded artifact");
                    return Ok(true);
                }
                Ok(None) => return Ok(false),
                Err(e) => {
                    warn!(%url, attempt, attempts = self.attempts, error = %e, "artifact download failed");
                    last_error = e;
                    if attempt < self.attempts {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
            }
        }
        Err(ArtifactError::DownloadFailed {
            url: url.to_string(),
            attempts: self.attempts,
            message: last_error,
        }
        .into())
    }

    async fn try_download(&self, url: &str) -> Result<Option<Vec<u8>>, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {e}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read response body: {e}"))?;
        Ok(Some(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves `files`, failing the first `failures` requests with a 503.
    async fn file_server(files: HashMap<String, String>, failures: usize) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buffer = vec![0u8; 4096];
                let n = socket.read(&mut buffer).await.unwrap();
                let request = String::from_utf8_lossy(&buffer[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let seen = counter.fetch_add(1, Ordering::SeqCst);

                let (status, body) = if seen < failures {
                    ("503 Service Unavailable", String::new())
                } else {
                    match files.get(path.trim_start_matches("/m/")) {
                        Some(body) => ("200 OK", body.clone()),
                        None => ("404 Not Found", String::new()),
                    }
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}/m"), hits)
    }

    fn fetcher(cache: &Path) -> ArtifactFetcher {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        ArtifactFetcher::new()
            .with_client(client)
            .with_cache_root(cache)
            .with_backoff(Duration::from_millis(1))
    }

    fn required_files() -> HashMap<String, String> {
        REQUIRED_FILES
            .iter()
            .map(|name| (name.to_string(), format!("{{\"file\":\"{name}\"}}")))
            .collect()
    }

    #[tokio::test]
    async fn retries_then_downloads_and_skips_missing_optional_files() {
        let cache = tempdir().unwrap();
        let (url, hits) = file_server(required_files(), 2).await;
        let fetcher = fetcher(cache.path());

        let dir = fetcher.fetch(&url).await.unwrap();
        for name in REQUIRED_FILES {
            assert!(dir.join(name).exists(), "{name} missing");
        }
        for name in OPTIONAL_FILES {
            assert!(!dir.join(name).exists());
        }
        // two failures, three required files, two optional 404s
        assert_eq!(hits.load(Ordering::SeqCst), 7);

        // second fetch reuses the cache for required files
        fetcher.fetch(&url).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn gives_up_after_the_configured_attempts() {
        let cache = tempdir().unwrap();
        let (url, hits) = file_server(required_files(), usize::MAX).await;
        let fetcher = fetcher(cache.path()).with_attempts(2);

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(
            matches!(
                err,
                aw_types::AwError::Artifact(ArtifactError::DownloadFailed { attempts: 2, .. })
            ),
            "{err}"
        );
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_required_file_is_not_found() {
        let cache = tempdir().unwrap();
        let (url, _) = file_server(HashMap::new(), 0).await;
        let fetcher = fetcher(cache.path());
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(
            err,
            aw_types::AwError::Artifact(ArtifactError::NotFound { .. })
        ));
    }

    #[test]
    fn cache_dir_depends_on_url() {
        let fetcher = ArtifactFetcher::new().with_cache_root("/tmp/aw");
        let a = fetcher.cache_dir_for("https://a.example/m");
        assert_eq!(a, fetcher.cache_dir_for("https://a.example/m"));
        assert_ne!(a, fetcher.cache_dir_for("https://b.example/m"));
        assert!(a.starts_with("/tmp/aw"));
    }

    #[test]
    fn cache_key_is_a_fixed_digest() {
        let fetcher = ArtifactFetcher::new().with_cache_root("/tmp/aw");
        assert_eq!(
            fetcher.cache_dir_for(""),
            PathBuf::from("/tmp/aw/e3b0c44298fc1c14")
        );
        assert_eq!(
            fetcher.cache_dir_for("abc"),
            PathBuf::from("/tmp/aw/ba7816bf8f01cfea")
        );
    }
}
