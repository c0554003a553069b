use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use tokio::time::sleep;

use crate::errors::FetchError;

const PLAYLIST_HEADER: &str = "#EXTM3U";

/// Retrieves raw playlist text from a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Exponential backoff capped at 10s
fn backoff_ms(attempt: u32) -> u64 {
    (1u64 << attempt.min(16)).saturating_mul(500).min(10_000)
}

/// Decode a downloaded body, rejecting anything that isn't M3U text
pub fn decode_playlist(body: Vec<u8>) -> Result<String, FetchError> {
    let text = String::from_utf8(body)
        .map_err(|_| FetchError::ContentType("response is not UTF-8 text".to_string()))?;

    if !text.trim_start_matches('\u{feff}').starts_with(PLAYLIST_HEADER) {
        return Err(FetchError::ContentType(
            "response does not start with #EXTM3U".to_string(),
        ));
    }
    Ok(text)
}

/// HTTP fetcher with retry on 429 and network errors
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    max_m3u_size_mb: usize,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        timeout_ms: u64,
        max_retries: u32,
        max_m3u_size_mb: usize,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_millis(timeout_ms))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            max_retries,
            max_m3u_size_mb,
        })
    }

    fn max_bytes(&self) -> u64 {
        (self.max_m3u_size_mb as u64) * 1024 * 1024
    }

    fn too_large(&self, len: u64) -> FetchError {
        FetchError::TooLarge {
            size_mb: len as f64 / 1024f64 / 1024f64,
            limit_mb: self.max_m3u_size_mb,
        }
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<Response, FetchError> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        if let Some(len) = resp.content_length() {
                            if len > self.max_bytes() {
                                return Err(self.too_large(len));
                            }
                        }
                        return Ok(resp);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                        let backoff = backoff_ms(attempt);
                        tracing::warn!("fetch_retry" = attempt + 1, "reason" = "429", "backoff_ms" = backoff);
                        sleep(Duration::from_millis(backoff)).await;
                        attempt += 1;
                        continue;
                    }

                    let message = match status {
                        StatusCode::NOT_FOUND => "Playlist not found. Check the URL.".to_string(),
                        StatusCode::FORBIDDEN => "Access denied. The playlist may require authentication.".to_string(),
                        StatusCode::TOO_MANY_REQUESTS => "Too many requests. The playlist server is rate limiting.".to_string(),
                        _ => status.canonical_reason().unwrap_or("Error").to_string(),
                    };
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                        message,
                    });
                }
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(err.into());
                    }
                    let backoff = backoff_ms(attempt);
                    tracing::warn!("fetch_retry" = attempt + 1, "reason" = "network", "backoff_ms" = backoff);
                    sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Download the body chunk by chunk into one buffer, then decode it
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        tracing::info!("Downloading playlist: {}", url);
        let response = self.fetch_with_retry(url).await?;

        let max_bytes = self.max_bytes();
        let mut body: Vec<u8> = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if (body.len() + chunk.len()) as u64 > max_bytes {
                return Err(self.too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::info!("Playlist size: {:.2} MB", body.len() as f64 / 1024.0 / 1024.0);
        decode_playlist(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::get, Router};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fetcher(max_mb: usize) -> HttpFetcher {
        HttpFetcher::new("test-agent", 5_000, 0, max_mb).unwrap()
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_ms(0), 500);
        assert_eq!(backoff_ms(1), 1000);
        assert_eq!(backoff_ms(10), 10_000);
        assert_eq!(backoff_ms(40), 10_000);
    }

    #[test]
    fn test_decode_playlist() {
        assert_eq!(decode_playlist(b"#EXTM3U\n".to_vec()).unwrap(), "#EXTM3U\n");
        assert!(matches!(
            decode_playlist(b"<html></html>".to_vec()),
            Err(FetchError::ContentType(_))
        ));
        assert!(matches!(
            decode_playlist(vec![0xff, 0xfe, 0x00]),
            Err(FetchError::ContentType(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_text_downloads_playlist() {
        let router = Router::new()
            .route("/list.m3u", get(|| async { "#EXTM3U\n#EXTINF:-1,A\nhttp://a/1\n" }))
            .route("/page", get(|| async { "<html></html>" }))
            .route("/missing", get(|| async { (AxumStatus::NOT_FOUND, "nope") }));
        let base = serve(router).await;
        let fetcher = fetcher(1);

        let text = fetcher.fetch_text(&format!("{}/list.m3u", base)).await.unwrap();
        assert!(text.starts_with("#EXTM3U"));

        let err = fetcher.fetch_text(&format!("{}/page", base)).await.unwrap_err();
        assert!(matches!(err, FetchError::ContentType(_)));

        let err = fetcher.fetch_text(&format!("{}/missing", base)).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_text_enforces_size_cap() {
        let big = format!("#EXTM3U\n{}", "x".repeat(2 * 1024 * 1024));
        let router = Router::new().route("/big.m3u", get(move || async move { big }));
        let base = serve(router).await;

        let err = fetcher(1).fetch_text(&format!("{}/big.m3u", base)).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit_mb: 1, .. }));
    }
}
