use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::KiraError;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

pub fn build_client(
    timeout: Duration,
    map_err: fn(String) -> KiraError,
) -> Result<Client, KiraError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("kira-pb/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| map_err(err.to_string()))?,
    );
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|err| map_err(err.to_string()))
}

/// Sends the request built by `make_req`, retrying transient failures with a
/// linear backoff.
pub fn send_with_retries<F>(
    mut make_req: F,
    map_err: fn(String) -> KiraError,
) -> Result<Response, KiraError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match make_req().send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Err(map_err(err.to_string()));
            }
        }
    }
}

/// Passes successful responses through; turns anything else into the
/// source's status error.
pub fn handle_status(
    response: Response,
    fallback: &str,
    map_status: fn(u16, String) -> KiraError,
) -> Result<Response, KiraError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().unwrap_or_else(|_| fallback.to_string());
    Err(map_status(status, message))
}

fn backoff(attempt: usize) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    thread::sleep(Duration::from_millis(delay));
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(404));
    }
}
