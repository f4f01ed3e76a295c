use futures::{future::BoxFuture, FutureExt};
use log::debug;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Why a candidate image was rejected. Only ever logged.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("status {0}")]
    Status(StatusCode),
    #[error("response is not an image")]
    NotAnImage,
}

/// Decides which URL a card should display. Implementations never fail:
/// any problem with `candidate` resolves to `fallback`.
pub trait ImageProber: Send + Sync {
    fn probe<'a>(&'a self, candidate: &'a str, fallback: &'a str) -> BoxFuture<'a, String>;
}

#[derive(Clone, Debug)]
pub struct HttpImageProber {
    client: Client,
    timeout: Duration,
}

impl HttpImageProber {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn check(&self, url: &str) -> Result<(), ImageLoadError> {
        let mut response = match timeout(self.timeout, self.client.get(url).send()).await {
            Ok(response) => response?,
            Err(_) => return Err(ImageLoadError::Timeout(self.timeout)),
        };

        if !response.status().is_success() {
            return Err(ImageLoadError::Status(response.status()));
        }

        let declared_image = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false);

        let first_chunk = match timeout(self.timeout, response.chunk()).await {
            Ok(chunk) => chunk?,
            Err(_) => return Err(ImageLoadError::Timeout(self.timeout)),
        };
        let sniffed = first_chunk
            .as_deref()
            .map(|bytes| image::guess_format(bytes).is_ok())
            .unwrap_or(false);

        if sniffed || declared_image {
            Ok(())
        } else {
            Err(ImageLoadError::NotAnImage)
        }
    }
}

impl ImageProber for HttpImageProber {
    fn probe<'a>(&'a self, candidate: &'a str, fallback: &'a str) -> BoxFuture<'a, String> {
        async move {
            let candidate = candidate.trim();
            if candidate.is_empty() {
                return fallback.to_string();
            }
            match self.check(candidate).await {
                Ok(()) => candidate.to_string(),
                Err(err) => {
                    debug!("Image probe for {candidate} failed ({err}); using fallback");
                    fallback.to_string()
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prober() -> HttpImageProber {
        HttpImageProber::new(Client::new(), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn blank_candidate_uses_fallback() {
        assert_eq!(prober().probe("   ", "fallback.png").await, "fallback.png");
    }

    #[tokio::test]
    async fn unreachable_candidate_uses_fallback() {
        let resolved = prober()
            .probe("http://127.0.0.1:9/missing.png", "fallback.png")
            .await;
        assert_eq!(resolved, "fallback.png");
    }

    #[tokio::test]
    async fn malformed_url_uses_fallback() {
        assert_eq!(prober().probe("bad-url", "fallback.png").await, "fallback.png");
    }
}
