use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use reqwest::Client;
use std::time::Duration;

use crate::config::{is_plausible_api_key, AnalyzerConfig, DEFAULT_TIMEOUT_SECS, OPENROUTER_BASE_URL};
use crate::error::{AnalyzerError, CompletionError, Result};
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};

pub const MAX_TOKENS: u32 = 4000;
pub const TEMPERATURE: f32 = 0.1;

const APP_REFERER: &str = "https://analizzatore-pdf-finanziari.streamlit.app";
const APP_TITLE: &str = "Analizzatore PDF Finanziari";

/// Anything that can turn a prompt into model text.
///
/// One call is exactly one attempt: implementations must not retry.
pub trait CompletionBackend {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        model: &'a str,
        api_key: &'a str,
    ) -> BoxFuture<'a, std::result::Result<String, CompletionError>>;
}

/// Chat-completions client for OpenRouter.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new() -> Result<Self> {
        Self::with_settings(OPENROUTER_BASE_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        Self::with_settings(&config.base_url, config.request_timeout)
    }

    pub fn with_settings(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyzerError::InvalidConfig(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn complete(
        &self,
        prompt: &str,
        model: &str,
        api_key: &str,
    ) -> std::result::Result<String, CompletionError> {
        let api_key = api_key.trim();
        if !is_plausible_api_key(api_key) {
            return Err(CompletionError::InvalidCredential);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let payload = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        debug!("POST {} (model {}, prompt {} chars)", url, model, prompt.chars().count());

        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), &err_text));
        }

        let body = res.text().await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        parsed.first_content().ok_or_else(|| {
            CompletionError::MalformedResponse("missing choices[0].message.content".to_string())
        })
    }
}

impl CompletionBackend for OpenRouterClient {
    fn complete<'a>(
        &'a self,
        prompt: &'a str,
        model: &'a str,
        api_key: &'a str,
    ) -> BoxFuture<'a, std::result::Result<String, CompletionError>> {
        OpenRouterClient::complete(self, prompt, model, api_key).boxed()
    }
}

/// Maps a non-2xx status to the call's error kind.
pub fn error_for_status(status: u16, body: &str) -> CompletionError {
    match status {
        401 => CompletionError::InvalidCredential,
        402 => CompletionError::InsufficientCredit,
        429 => CompletionError::RateLimited,
        code => CompletionError::Transport {
            status: Some(code),
            message: if body.is_empty() {
                "request failed".to_string()
            } else {
                body.chars().take(200).collect()
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    const VALID_KEY: &str = "sk-or-v1-0123456789abcdef";

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let body_len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serves one canned response and hands back the raw request it received.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            request
        });
        (base_url, handle)
    }

    fn client_for(base_url: &str) -> OpenRouterClient {
        OpenRouterClient::with_settings(base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_message_content() {
        let (url, server) =
            serve_once("200 OK", r#"{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"}}]}"#)
                .await;

        let text = client_for(&url)
            .complete("prompt text", "openai/gpt-4.1", VALID_KEY)
            .await
            .unwrap();
        assert_eq!(text, "{\"a\":1}");

        let request = server.await.unwrap();
        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /chat/completions"));
        assert!(lower.contains(&format!("authorization: bearer {}", VALID_KEY).to_lowercase()));
        assert!(lower.contains("content-type: application/json"));
        assert!(lower.contains("http-referer:"));
        assert!(lower.contains("x-title: analizzatore pdf finanziari"));
        assert!(request.contains("\"max_tokens\":4000"));
        assert!(request.contains("\"temperature\":0.1"));
        assert!(request.contains("\"model\":\"openai/gpt-4.1\""));
        assert!(request.contains("\"messages\":[{\"role\":\"user\",\"content\":\"prompt text\"}]"));
    }

    #[tokio::test]
    async fn test_short_key_makes_no_network_call() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let result = client_for(&url).complete("prompt", "openai/gpt-4.1", "abcde").await;
        assert_eq!(result, Err(CompletionError::InvalidCredential));

        let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(accepted.is_err(), "no connection should have been attempted");
    }

    #[tokio::test]
    async fn test_status_401_maps_to_invalid_credential() {
        let (url, _server) = serve_once("401 Unauthorized", r#"{"error":"no auth"}"#).await;
        let result = client_for(&url).complete("p", "m", VALID_KEY).await;
        assert_eq!(result, Err(CompletionError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_status_402_maps_to_insufficient_credit() {
        let (url, _server) = serve_once("402 Payment Required", "{}").await;
        let result = client_for(&url).complete("p", "m", VALID_KEY).await;
        assert_eq!(result, Err(CompletionError::InsufficientCredit));
    }

    #[tokio::test]
    async fn test_status_429_maps_to_rate_limited() {
        let (url, _server) = serve_once("429 Too Many Requests", "{}").await;
        let result = client_for(&url).complete("p", "m", VALID_KEY).await;
        assert_eq!(result, Err(CompletionError::RateLimited));
    }

    #[tokio::test]
    async fn test_other_status_keeps_code() {
        let (url, _server) = serve_once("503 Service Unavailable", "upstream down").await;
        let result = client_for(&url).complete("p", "m", VALID_KEY).await;
        assert!(matches!(
            result,
            Err(CompletionError::Transport { status: Some(503), .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_content_is_malformed() {
        let (url, _server) = serve_once("200 OK", r#"{"choices":[]}"#).await;
        let result = client_for(&url).complete("p", "m", VALID_KEY).await;
        assert!(matches!(result, Err(CompletionError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let (url, _server) = serve_once("200 OK", "<html>gateway</html>").await;
        let result = client_for(&url).complete("p", "m", VALID_KEY).await;
        assert!(matches!(result, Err(CompletionError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_slow_server_maps_to_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_request(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let client = OpenRouterClient::with_settings(&url, Duration::from_millis(200)).unwrap();
        let result = client.complete("p", "m", VALID_KEY).await;
        assert_eq!(result, Err(CompletionError::Timeout));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let result = client_for(&url).complete("p", "m", VALID_KEY).await;
        assert!(matches!(result, Err(CompletionError::Transport { status: None, .. })));
    }

    #[test]
    fn test_error_for_status_truncates_body() {
        let long_body = "x".repeat(1000);
        match error_for_status(500, &long_body) {
            CompletionError::Transport { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message.len(), 200);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
