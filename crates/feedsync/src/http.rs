//! HTTP boundary for feed fetches.
//!
//! Everything above this module talks to [`HttpTransport`]; only
//! [`ReqwestTransport`] touches sockets.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// A JSON GET against the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// A buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("request timed out: {url}")]
    Timeout { url: String },

    #[error("no mock response registered for {url}")]
    NoMockResponse { url: String },
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Reqwest-backed transport with a per-request timeout.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feedsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let resp = self
            .client
            .get(&request.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HttpError::Timeout {
                        url: request.url.clone(),
                    }
                } else {
                    HttpError::Transport(e.to_string())
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// In-memory mock transport keyed by URL.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<String, VecDeque<HttpResponse>>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for a URL. Repeated registrations are served FIFO.
    pub fn push_response(&self, url: impl Into<String>, response: HttpResponse) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner
            .routes
            .entry(url.into())
            .or_default()
            .push_back(response);
    }

    /// Register a 200 response with a JSON body.
    pub fn push_json(&self, url: impl Into<String>, body: &serde_json::Value) {
        self.push_response(
            url,
            HttpResponse {
                status: 200,
                body: body.to_string().into_bytes(),
            },
        );
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner.requests.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");

        let url = request.url.clone();
        inner.requests.push(request);

        match inner.routes.get_mut(&url).and_then(|q| q.pop_front()) {
            Some(resp) => Ok(resp),
            None => Err(HttpError::NoMockResponse { url }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_covers_only_2xx() {
        let resp = |status| HttpResponse {
            status,
            body: Vec::new(),
        };
        assert!(resp(200).is_success());
        assert!(resp(204).is_success());
        assert!(!resp(304).is_success());
        assert!(!resp(503).is_success());
    }

    #[tokio::test]
    async fn mock_transport_serves_responses_in_order_and_records_requests() {
        let transport = MockTransport::new();
        let url = "https://feed.example.com/?page=0&pageSize=20";
        transport.push_json(url, &serde_json::json!({"content": []}));
        transport.push_response(
            url,
            HttpResponse {
                status: 503,
                body: Vec::new(),
            },
        );

        let req = HttpRequest::get(url);
        let first = transport.send(req.clone()).await.expect("first response");
        assert_eq!(first.status, 200);
        assert_eq!(first.body, br#"{"content":[]}"#.to_vec());

        let second = transport.send(req.clone()).await.expect("second response");
        assert_eq!(second.status, 503);

        assert_eq!(transport.requests(), vec![req.clone(), req]);
    }

    #[tokio::test]
    async fn mock_transport_errors_when_no_response_is_registered() {
        let transport = MockTransport::new();
        let err = transport
            .send(HttpRequest::get("https://feed.example.com/missing"))
            .await
            .expect_err("missing mock should error");
        match err {
            HttpError::NoMockResponse { url } => {
                assert_eq!(url, "https://feed.example.com/missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reqwest_transport_asks_for_json_and_reads_the_body() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .expect("set_read_timeout");

            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];
            loop {
                match stream.read(&mut tmp) {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&tmp[..n]);
                        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        break;
                    }
                    Err(e) => panic!("read request: {e}"),
                }
            }

            let req_text = String::from_utf8_lossy(&buf).to_lowercase();
            assert!(
                req_text.starts_with("get /feed?page=3 "),
                "unexpected request line: {req_text:?}"
            );
            assert!(req_text.contains("accept: application/json"), "{req_text:?}");
            assert!(req_text.contains("user-agent: feedsync/"), "{req_text:?}");

            let body = br#"{"content":[]}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream
                .write_all(response.as_bytes())
                .expect("write headers");
            stream.write_all(body).expect("write body");
            stream.flush().ok();
        });

        let transport =
            ReqwestTransport::with_timeout(Duration::from_secs(5)).expect("transport builds");
        let resp = transport
            .send(HttpRequest::get(format!("http://{addr}/feed?page=3")))
            .await
            .expect("transport should succeed");
        assert!(resp.is_success());
        assert_eq!(resp.body, br#"{"content":[]}"#.to_vec());

        handle.join().expect("server thread");
    }

    #[tokio::test]
    async fn reqwest_transport_reports_invalid_urls_as_transport_errors() {
        let transport =
            ReqwestTransport::with_timeout(Duration::from_secs(5)).expect("transport builds");
        let err = transport
            .send(HttpRequest::get("not a url"))
            .await
            .expect_err("expected error");
        assert!(matches!(err, HttpError::Transport(_)));
    }
}
