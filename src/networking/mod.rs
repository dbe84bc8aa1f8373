use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::{UpdateError, UpdateResult};
use crate::progress::{ProgressObserver, ProgressUpdate};
use crate::util::{format_speed, url_file_name};

const USER_AGENT: &str = concat!("palia-launcher/", env!("CARGO_PKG_VERSION"));
const PROGRESS_INTERVAL_SECS: f32 = 0.2;

/// Retrieves remote bytes into a local file.
///
/// On success `dest` holds the complete body. On failure `dest` is left untouched.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn ProgressObserver,
    ) -> UpdateResult<()>;
}

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new() -> Self {
        // No overall timeout: baseline archives can take a long time to stream.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }

    pub async fn fetch_manifest(&self, url: &str) -> UpdateResult<Vec<u8>> {
        info!("network: fetching patch manifest from {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::network(url, e))?
            .error_for_status()
            .map_err(|e| UpdateError::network(url, e))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| UpdateError::network(url, e))?;
        Ok(body.to_vec())
    }

    async fn download_to_part(
        &self,
        url: &str,
        part: &Path,
        progress: &dyn ProgressObserver,
    ) -> UpdateResult<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::network(url, e))?
            .error_for_status()
            .map_err(|e| UpdateError::network(url, e))?;

        let mut file = File::create(part)
            .await
            .map_err(|e| UpdateError::io(part, e))?;

        let name = url_file_name(url).unwrap_or(url).to_owned();
        let message = format!("Downloading {name}");
        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_tick = Instant::now();
        let mut last_bytes = 0u64;

        progress.report(
            ProgressUpdate::counted("download", message.clone(), 0, total).with_file(&name),
        );
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| UpdateError::network(url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| UpdateError::io(part, e))?;
            downloaded += chunk.len() as u64;

            let since = last_tick.elapsed().as_secs_f32();
            if since > PROGRESS_INTERVAL_SECS {
                let speed = (downloaded - last_bytes) as f32 / since;
                progress.report(
                    ProgressUpdate::counted("download", message.clone(), downloaded, total)
                        .with_file(&name)
                        .with_speed(format_speed(speed)),
                );
                last_tick = Instant::now();
                last_bytes = downloaded;
            }
        }

        file.flush().await.map_err(|e| UpdateError::io(part, e))?;
        file.sync_all().await.map_err(|e| UpdateError::io(part, e))?;

        if let Some(total) = total
            && downloaded < total
        {
            return Err(UpdateError::network(
                url,
                format!("download incomplete: received {downloaded} of {total} bytes"),
            ));
        }

        progress.report(
            ProgressUpdate::counted("download", message, downloaded, Some(downloaded))
                .with_file(name),
        );
        Ok(())
    }
}

impl Default for NetworkClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for NetworkClient {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn ProgressObserver,
    ) -> UpdateResult<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdateError::io(parent, e))?;
        }
        let part = part_path(dest);
        debug!("network: downloading {url} via {}", part.display());

        if let Err(err) = self.download_to_part(url, &part, progress).await {
            let _ = fs::remove_file(&part).await;
            return Err(err);
        }
        fs::rename(&part, dest)
            .await
            .map_err(|e| UpdateError::io(dest, e))?;
        info!("network: downloaded {}", dest.display());
        Ok(())
    }
}

/// Sibling of `dest` that receives the body until it is complete.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;
    use crate::progress::NoopProgress;
    use crate::progress::tests::RecordingProgress;

    /// Answers a single request with `response` and returns the URL to request.
    async fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/files/patch.pak")
    }

    fn local_client() -> NetworkClient {
        NetworkClient {
            client: Client::builder().no_proxy().build().unwrap(),
        }
    }

    fn ok_response(body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    #[tokio::test]
    async fn complete_body_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Paks").join("patch.pak");
        let body: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        let url = serve_once(ok_response(&body)).await;

        let progress = RecordingProgress::default();
        local_client().fetch(&url, &dest, &progress).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(!part_path(&dest).exists());

        let updates = progress.updates.lock().unwrap();
        let counts: Vec<u64> = updates.iter().filter_map(|u| u.current).collect();
        assert!(counts.windows(2).all(|pair| pair[0] <= pair[1]), "{counts:?}");
        let last = updates.last().unwrap();
        assert!(last.is_complete());
        assert_eq!(last.current, Some(body.len() as u64));
        assert_eq!(last.current_file.as_deref(), Some("patch.pak"));
    }

    #[tokio::test]
    async fn truncated_body_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("patch.pak");
        std::fs::write(&dest, b"old").unwrap();
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nhello".to_vec(),
        )
        .await;

        let err = local_client()
            .fetch(&url, &dest, &NoopProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, UpdateError::Network { .. }), "{err:?}");
        assert_eq!(std::fs::read(&dest).unwrap(), b"old");
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn error_status_is_network_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("patch.pak");
        std::fs::write(&dest, b"old").unwrap();
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        )
        .await;

        let err = local_client()
            .fetch(&url, &dest, &NoopProgress)
            .await
            .unwrap_err();

        match err {
            UpdateError::Network { url: failed, reason } => {
                assert_eq!(failed, url);
                assert!(reason.contains("404"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(std::fs::read(&dest).unwrap(), b"old");
        assert!(!part_path(&dest).exists());
    }

    #[test]
    fn part_file_sits_next_to_destination() {
        let dest = Path::new("/games/palia/Palia/Content/Paks/patch.pak");
        assert_eq!(
            part_path(dest),
            Path::new("/games/palia/Palia/Content/Paks/patch.pak.part")
        );
    }
}
