// SPDX-FileCopyrightText: © 2025 Castlink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! REST client for the stream/channel service.

use castlink_api::{ApiErrorBody, StreamDirectory, StreamInfo};
use castlink_core::error::CastlinkError;
use url::Url;

/// [`StreamDirectory`] backed by `GET {api_url}/streams/{id}`.
#[derive(Debug, Clone)]
pub struct HttpStreamDirectory {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpStreamDirectory {
    /// # Errors
    ///
    /// Returns [`CastlinkError::Configuration`] if `api_url` is not a valid
    /// base URL.
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self, CastlinkError> {
        let base = Url::parse(api_url)
            .map_err(|e| CastlinkError::Configuration(format!("invalid API URL '{api_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(CastlinkError::Configuration(format!("{api_url} cannot be a base URL")));
        }
        Ok(Self { client: reqwest::Client::new(), base, token })
    }

    fn stream_url(&self, stream_id: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("streams").push(stream_id);
        }
        url
    }
}

#[async_trait::async_trait]
impl StreamDirectory for HttpStreamDirectory {
    async fn fetch_stream(&self, stream_id: &str) -> Result<StreamInfo, CastlinkError> {
        let url = self.stream_url(stream_id);
        tracing::debug!(%url, "Fetching stream");

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response =
            request.send().await.map_err(|e| CastlinkError::Network(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.detail)
                .unwrap_or(body);
            tracing::warn!(%url, %status, %detail, "Stream lookup failed");
            return Err(CastlinkError::Network(format!(
                "stream '{stream_id}' lookup failed with {status}: {detail}"
            )));
        }

        response
            .json::<StreamInfo>()
            .await
            .map_err(|e| CastlinkError::Network(format!("invalid stream response from {url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and hands back the request head.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });
        (format!("http://{addr}"), task)
    }

    #[test]
    fn test_stream_url_joins_path() {
        let directory = HttpStreamDirectory::new("https://api.example.com/v1/", None).unwrap();
        assert_eq!(directory.stream_url("abc").as_str(), "https://api.example.com/v1/streams/abc");
    }

    #[tokio::test]
    async fn test_fetch_stream_sends_token_and_parses() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"id":"abc","channel_id":"c1","title":"Live now","status":"live","viewer_count":3,"chat_enabled":true}"#,
        )
        .await;
        let directory = HttpStreamDirectory::new(&base, Some("tok".into())).unwrap();

        let stream = directory.fetch_stream("abc").await.unwrap();
        assert!(stream.is_live());
        assert_eq!(stream.viewer_count, 3);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /streams/abc "));
        assert!(request.to_lowercase().contains("authorization: bearer tok"));
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let (base, _server) = serve_once("404 Not Found", r#"{"detail":"Stream not found"}"#).await;
        let directory = HttpStreamDirectory::new(&base, None).unwrap();

        let err = directory.fetch_stream("missing").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("404"), "{message}");
        assert!(message.contains("Stream not found"), "{message}");
    }
}
