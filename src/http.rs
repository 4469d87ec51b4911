//! Shared HTTP client construction and retry policy (§4.2, §5).
//!
//! Transient connection/timeout errors are retried with exponential back-off
//! by a `reqwest-middleware` layer; once a response is in hand, 4xx/5xx
//! status codes are surfaced to the caller immediately as permanent
//! [`FetchError::Status`] — they are never retried.

use crate::error::FetchError;
use reqwest::Response;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use std::time::Duration;

const USER_AGENT: &str = concat!("schedgraph/", env!("CARGO_PKG_VERSION"));

/// Build a client whose transient failures are retried with exponential
/// back-off in `[min, max]`, stopping after `attempts` tries.
pub fn build_client(
    request_timeout: Duration,
    attempts: u32,
    min_retry_interval: Duration,
    max_retry_interval: Duration,
) -> anyhow::Result<ClientWithMiddleware> {
    let inner = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(request_timeout)
        .build()?;

    let backoff = ExponentialBackoff::builder()
        .retry_bounds(min_retry_interval, max_retry_interval)
        .build_with_max_retries(attempts);

    Ok(ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy(backoff))
        .build())
}

/// Issue a GET request and map a non-success status into a permanent
/// [`FetchError::Status`] without retrying.
pub async fn get(client: &ClientWithMiddleware, url: &str) -> Result<Response, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Request {
            url: url.to_owned(),
            source: source.into(),
        })?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            status: response.status().as_u16(),
            url: url.to_owned(),
        });
    }

    Ok(response)
}

/// Decode a response body as text, tolerating the encodings the upstream has
/// historically served (utf-8, utf-8-sig, utf-16, utf-16-le) per §6.
pub async fn decode_body(response: Response) -> Result<String, FetchError> {
    let url = response.url().to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|source| FetchError::Request {
            url: url.clone(),
            source: source.into(),
        })?;
    Ok(decode_bytes(&bytes))
}

/// Best-effort encoding sniff: BOM-prefixed UTF-16 (LE/BE) and UTF-8 (with or
/// without a BOM); falls back to lossy UTF-8 for anything else.
pub fn decode_bytes(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        return decode_utf16(&bytes[2..], false);
    }
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        return decode_utf16(&bytes[2..], true);
    }
    let body = if bytes.len() >= 3 && &bytes[0..3] == [0xEF, 0xBB, 0xBF] {
        &bytes[3..]
    } else {
        bytes
    };
    String::from_utf8_lossy(body).into_owned()
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
