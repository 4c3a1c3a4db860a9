use crate::error::{Failure, FailureKind};
use crate::router::Route;
use crate::storage::AgentInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TransformRequest {
    pub text: String,
    pub command: String,
}

/// Only the fields this client reads; anything else in the body is ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TransformResponse {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub agent_info: Option<AgentInfo>,
}

/// The remote service seam. Tests and alternative transports implement this.
#[async_trait]
pub trait TransformBackend: Send + Sync {
    async fn transform(
        &self,
        route: Route,
        request: &TransformRequest,
    ) -> Result<TransformResponse, Failure>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TransformBackend for HttpBackend {
    async fn transform(
        &self,
        route: Route,
        request: &TransformRequest,
    ) -> Result<TransformResponse, Failure> {
        let url = format!("{}{}", self.base_url, route.path());
        tracing::debug!(%url, %route, "dispatching transform request");

        let mut builder = self.client.post(&url).json(request);
        // Guest mode when there is no token.
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = error_detail(&body);
            tracing::info!(%url, status = status.as_u16(), "backend rejected request");
            return Err(Failure::new(
                FailureKind::from_status(status.as_u16()),
                format!("HTTP {}: {}", status.as_u16(), detail),
            ));
        }

        response
            .json::<TransformResponse>()
            .await
            .map_err(|err| {
                if err.is_decode() {
                    Failure::new(FailureKind::Unknown, format!("invalid response body: {err}"))
                } else {
                    classify_transport_error(err)
                }
            })
    }
}

fn classify_transport_error(err: reqwest::Error) -> Failure {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::ConnectionRefused
    } else if let Some(status) = err.status() {
        FailureKind::from_status(status.as_u16())
    } else {
        FailureKind::Unknown
    };
    Failure::new(kind, err.to_string())
}

// Backends usually answer errors with {"detail": "..."}; fall back to the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no response body".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn request() -> TransformRequest {
        TransformRequest {
            text: "hello world".to_string(),
            command: "Make it more formal".to_string(),
        }
    }

    fn backend(server: &MockServer, token: Option<&str>) -> HttpBackend {
        HttpBackend::new(&server.uri(), token.map(str::to_string), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn posts_text_and_command_to_route_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/transform"))
            .and(body_json(serde_json::json!({"text": "hello world", "command": "Make it more formal"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "Greetings, world.",
                "agent_info": {"model": "gpt-style", "processing_time_ms": 812, "timestamp": "2024-05-01T10:00:00Z"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = backend(&server, None)
            .transform(Route::Transform, &request())
            .await
            .unwrap();
        assert_eq!(resp.result.as_deref(), Some("Greetings, world."));
        let info = resp.agent_info.unwrap();
        assert_eq!(info.model, "gpt-style");
        assert_eq!(info.tokens_used, None);
    }

    #[tokio::test]
    async fn attaches_bearer_token_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/summarize"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "short"})))
            .expect(1)
            .mount(&server)
            .await;

        let resp = backend(&server, Some("secret"))
            .transform(Route::Summarize, &request())
            .await
            .unwrap();
        assert_eq!(resp.result.as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn guest_requests_carry_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/prompt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"result": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        backend(&server, None)
            .transform(Route::Prompt, &request())
            .await
            .unwrap();

        let received: Vec<Request> = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(!received[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn http_errors_are_classified() {
        let server = MockServer::start().await;
        for (route, status) in [(Route::Prompt, 400), (Route::Summarize, 429), (Route::Transform, 500)] {
            Mock::given(method("POST"))
                .and(path(route.path()))
                .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({"detail": "nope"})))
                .mount(&server)
                .await;
        }
        let backend = backend(&server, None);

        let err = backend.transform(Route::Prompt, &request()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::BadRequest);
        assert_eq!(err.message, "HTTP 400: nope");
        let err = backend.transform(Route::Summarize, &request()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::RateLimited);
        let err = backend.transform(Route::Transform, &request()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::ServerError);
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"result": "late"}))
                    .set_delay(Duration::from_millis(1500)),
            )
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri(), None, Duration::from_millis(200));
        let err = backend.transform(Route::Prompt, &request()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn refused_connection_is_classified() {
        // Grab a free port, then close the listener so nothing accepts on it.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let backend = HttpBackend::new(&format!("http://{addr}"), None, Duration::from_secs(2));
        let err = backend.transform(Route::Prompt, &request()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn stalled_body_is_a_timeout() {
        use std::io::{Read, Write};

        // Answers with headers and a partial body, then goes quiet.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"result\"",
            );
            let _ = stream.flush();
            std::thread::sleep(Duration::from_secs(3));
        });

        let backend = HttpBackend::new(&format!("http://{addr}"), None, Duration::from_millis(300));
        let err = backend.transform(Route::Prompt, &request()).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn malformed_body_is_reported_as_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = backend(&server, None)
            .transform(Route::Prompt, &request())
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Unknown);
        assert!(err.message.starts_with("invalid response body"));
    }

    #[test]
    fn error_detail_falls_back_to_body() {
        assert_eq!(error_detail(r#"{"detail":"bad input"}"#), "bad input");
        assert_eq!(error_detail("plain failure"), "plain failure");
        assert_eq!(error_detail("  "), "no response body");
    }
}
