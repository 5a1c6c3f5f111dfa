use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::error::MinerError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_RETRIES: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 200;
const DEFAULT_ACCEPT: &str = "application/json, text/html;q=0.9, */*;q=0.8";

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|value| value.contains("json"))
            .unwrap_or(false)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<Value, MinerError> {
        serde_json::from_slice(&self.body).map_err(|err| MinerError::Payload(err.to_string()))
    }
}

/// Blocking GET capability handed to every fetcher.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, MinerError>;

    /// Like [`HttpClient::get`], but any non-2xx status is an error.
    fn get_success(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<HttpResponse, MinerError> {
        let response = self.get(url, params)?;
        if response.is_success() {
            return Ok(response);
        }
        let mut message = clip(&response.text(), 200);
        if message.is_empty() {
            message = "request failed".to_string();
        }
        Err(MinerError::Status {
            url: url.to_string(),
            status: response.status,
            message,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub fn default_user_agent() -> String {
    format!("st-miner/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, MinerError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&settings.user_agent)
                .map_err(|err| MinerError::InvalidHeader(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| MinerError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, MinerError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if !is_retryable_status(status) {
                        return Ok(resp);
                    }
                    let Some(delay) = retry_delay(attempt) else {
                        return Ok(resp);
                    };
                    debug!(status, delay_ms = delay.as_millis() as u64, "retrying request");
                    thread::sleep(delay);
                }
                Err(err) => {
                    let delay = if is_retryable_error(&err) {
                        retry_delay(attempt)
                    } else {
                        None
                    };
                    let Some(delay) = delay else {
                        return Err(MinerError::Http(err.to_string()));
                    };
                    debug!(error = %err, delay_ms = delay.as_millis() as u64, "retrying request");
                    thread::sleep(delay);
                }
            }
            attempt += 1;
        }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, MinerError> {
        debug!(url, params = params.len(), "GET");
        let response = self.send_with_retries(|| self.client.get(url).query(params))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let body = response
            .bytes()
            .map_err(|err| MinerError::Http(err.to_string()))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
            content_type,
        })
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

/// Linear backoff for retry number `attempt + 1`; `None` once retries are
/// exhausted.
fn retry_delay(attempt: usize) -> Option<Duration> {
    (attempt < MAX_RETRIES)
        .then(|| Duration::from_millis(RETRY_BASE_DELAY_MS * (attempt as u64 + 1)))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
