use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use url::Url;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::ndjson::process_ndjson;
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_CHUNKS, STREAM_ERRORS,
};
use crate::types::{ChatChunk, ChatRequest, ChatResponse, ErrorBody, ModelInfo, ModelList};

/// Where the model server listens when nothing else is configured.
pub const DEFAULT_HOST: &str = "http://localhost:11434/";

/// Environment variable consulted for the server address.
pub const HOST_ENV_VAR: &str = "OLLAMA_HOST";

/// Default connect, request, and stream idle timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for a local Ollama model server.
#[derive(Clone)]
pub struct Ollama {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl Ollama {
    /// Create a new client.
    ///
    /// The server address is read from the OLLAMA_HOST environment variable, falling back
    /// to [`DEFAULT_HOST`].
    pub fn new() -> Result<Self> {
        Self::with_options(None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// An explicit `host` wins over OLLAMA_HOST.  Hosts without a scheme are taken to be
    /// plain HTTP.
    pub fn with_options(host: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let host = resolve_host(host, env::var(HOST_ENV_VAR).ok());
        let base_url = normalize_host(&host)?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
            logger: None,
        })
    }

    /// Attach a logger that sees every request, response, and stream chunk.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The server's base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::url(format!("invalid endpoint {path}"), Some(e)))
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("request to {} timed out", self.base_url),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(
                format!("cannot reach model server at {}: {e}", self.base_url),
                Some(Box::new(e)),
            )
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let pending = request.headers(self.default_headers()).send();
        let response = match tokio::time::timeout(self.timeout, pending).await {
            Ok(response) => response.map_err(|e| self.map_send_error(e))?,
            Err(_) => {
                return Err(Error::timeout(
                    format!("no response from {}", self.base_url),
                    Some(self.timeout.as_secs_f64()),
                ));
            }
        };
        Ok(response)
    }

    /// Process error responses and convert to our Error type
    async fn process_error_response(response: Response, model: Option<&str>) -> Error {
        let status_code = response.status().as_u16();
        let reason = response
            .status()
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };
        let message = if body.trim().is_empty() {
            reason
        } else {
            body
        };
        error_from_body(status_code, &message, model)
    }

    fn record<T>(&self, started: Instant, result: Result<T>) -> Result<T> {
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());
        if let Err(err) = &result {
            CLIENT_REQUEST_ERRORS.click();
            if let Some(logger) = &self.logger {
                logger.log_error(err);
            }
        }
        result
    }

    /// Send a chat request and wait for the complete answer.
    pub async fn send(&self, mut request: ChatRequest) -> Result<ChatResponse> {
        request.stream = false;
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(&request);
        }
        let started = Instant::now();
        let result = self.send_inner(&request).await;
        let result = self.record(started, result);
        if let (Ok(response), Some(logger)) = (&result, &self.logger) {
            logger.log_response(response);
        }
        result
    }

    async fn send_inner(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.endpoint("api/chat")?;
        let builder = self.client.post(url).timeout(self.timeout).json(request);
        let response = self.execute(builder).await?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response, Some(&request.model)).await);
        }

        response.json::<ChatResponse>().await.map_err(|e| {
            if e.is_timeout() {
                self.map_send_error(e)
            } else {
                Error::serialization(
                    format!("Failed to parse response: {e}"),
                    Some(Box::new(e)),
                )
            }
        })
    }

    /// Send a chat request and get a streaming response.
    ///
    /// Returns a stream of chunks that can be processed incrementally.  Going longer than
    /// the client timeout between two reads ends the stream with a timeout error.
    pub async fn stream(
        &self,
        mut request: ChatRequest,
    ) -> Result<impl Stream<Item = Result<ChatChunk>> + Send + 'static> {
        request.stream = true;
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(&request);
        }
        let started = Instant::now();
        let result = self.open_stream(&request).await;
        let response = self.record(started, result)?;

        let logger = self.logger.clone();
        let chunks = process_ndjson(Box::pin(response.bytes_stream()), Some(self.timeout))
            .inspect(move |item| match item {
                Ok(chunk) => {
                    STREAM_CHUNKS.click();
                    if let Some(logger) = &logger {
                        logger.log_stream_chunk(chunk);
                    }
                }
                Err(err) => {
                    STREAM_ERRORS.click();
                    if let Some(logger) = &logger {
                        logger.log_error(err);
                    }
                }
            });
        Ok(chunks)
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<Response> {
        let url = self.endpoint("api/chat")?;
        let response = self.execute(self.client.post(url).json(request)).await?;
        if !response.status().is_success() {
            return Err(Self::process_error_response(response, Some(&request.model)).await);
        }
        Ok(response)
    }

    /// List the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let result = self.list_models_inner().await;
        self.record(started, result)
    }

    async fn list_models_inner(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("api/tags")?;
        let builder = self.client.get(url).timeout(self.timeout);
        let response = self.execute(builder).await?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response, None).await);
        }

        let list = response.json::<ModelList>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse model list: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(list.models)
    }
}

impl fmt::Debug for Ollama {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ollama")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// Pick the server address: explicit flag, then environment, then [`DEFAULT_HOST`].
fn resolve_host(flag: Option<String>, env: Option<String>) -> String {
    flag.into_iter()
        .chain(env)
        .find(|host| !host.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOST.to_string())
}

/// Turn `127.0.0.1:11434` or `http://host:port` into a base URL ending in `/`.
fn normalize_host(host: &str) -> Result<Url> {
    let host = host.trim();
    let mut url = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    if !url.ends_with('/') {
        url.push('/');
    }
    Url::parse(&url).map_err(|e| Error::url(format!("invalid server address {host:?}"), Some(e)))
}

/// Map a failed HTTP status and its body onto an [`Error`].
///
/// The server reports failures as `{"error": "..."}`; anything else is used verbatim.
fn error_from_body(status_code: u16, body: &str, model: Option<&str>) -> Error {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| body.trim().to_string());
    match status_code {
        400 => Error::bad_request(message, None),
        404 => Error::not_found(
            message,
            model.map(|_| "model".to_string()),
            model.map(String::from),
        ),
        408 => Error::timeout(message, None),
        _ => Error::api(status_code, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = Ollama::with_options(
            Some("http://gpu-box:11434".to_string()),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.base_url().as_str(), "http://gpu-box:11434/");
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert!(client.logger.is_none());
    }

    #[test]
    fn default_timeout() {
        let client = Ollama::with_options(Some(DEFAULT_HOST.to_string()), None).unwrap();
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(client.base_url().as_str(), DEFAULT_HOST);
    }

    #[test]
    fn host_precedence() {
        assert_eq!(
            resolve_host(Some("a:1".into()), Some("b:2".into())),
            "a:1".to_string()
        );
        assert_eq!(resolve_host(None, Some("b:2".into())), "b:2".to_string());
        assert_eq!(resolve_host(Some("  ".into()), None), DEFAULT_HOST.to_string());
        assert_eq!(resolve_host(None, None), DEFAULT_HOST.to_string());
    }

    #[test]
    fn scheme_less_host_gets_http() {
        let url = normalize_host("127.0.0.1:11434").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:11434/");
        assert_eq!(url.join("api/chat").unwrap().path(), "/api/chat");
    }

    #[test]
    fn base_path_is_preserved() {
        let url = normalize_host("https://proxy.example.com/ollama").unwrap();
        assert_eq!(
            url.join("api/tags").unwrap().as_str(),
            "https://proxy.example.com/ollama/api/tags"
        );
    }

    #[test]
    fn invalid_host_is_rejected() {
        let err = normalize_host("http://").unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn missing_model_maps_to_not_found() {
        let err = error_from_body(
            404,
            r#"{"error":"model \"llama9\" not found, try pulling it first"}"#,
            Some("llama9"),
        );
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "model not found: model \"llama9\" not found, try pulling it first"
        );
    }

    #[test]
    fn status_mapping() {
        assert!(error_from_body(400, r#"{"error":"bad"}"#, None).is_bad_request());
        assert!(error_from_body(408, "", None).is_timeout());
        let err = error_from_body(500, "upstream exploded", None);
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "API error (500): upstream exploded");
    }

    #[test]
    fn debug_hides_internals() {
        let client = Ollama::with_options(Some(DEFAULT_HOST.to_string()), None).unwrap();
        let debug = format!("{client:?}");
        assert!(debug.contains("localhost:11434"));
        assert!(debug.contains("logger: false"));
    }
}
