use crate::error::{ProviderError, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub(crate) fn client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn headers(api_key: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
        let value = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|err| ProviderError::InvalidConfig(format!("invalid API key: {err}")))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// POST `body` as JSON and decode the JSON reply.
pub(crate) async fn post_json<B, R>(
    http: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    body: &B,
    timeout: Duration,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let resp = http
        .post(url)
        .headers(headers(api_key)?)
        .json(body)
        .send()
        .await
        .map_err(|err| classify(err, timeout))?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Status { status, body });
    }

    let text = resp.text().await.map_err(|err| classify(err, timeout))?;
    serde_json::from_str(&text).map_err(|err| ProviderError::InvalidResponse(err.to_string()))
}

fn classify(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    } else {
        ProviderError::Http(err)
    }
}
