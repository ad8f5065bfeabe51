use crate::error::{NaimError, Result};
use crate::protocol::scalar_text;
use crate::types::ReceiverDescriptor;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// Client for a receiver's HTTP control API
///
/// Every call reads or writes one key of one resource. Failures are
/// classified, logged here, and returned to the caller as a plain
/// `Err` value; nothing is retried.
#[derive(Clone)]
pub struct NaimClient {
    http: reqwest::Client,
    base_url: String,
}

impl NaimClient {
    /// Create a client for the API rooted at `base_url` (e.g. `http://192.168.0.20:15081`)
    ///
    /// # Errors
    ///
    /// Returns `NaimError::Transport` if the HTTP stack cannot be set up
    /// with the requested timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NaimError::Transport {
                url: base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { http, base_url })
    }

    /// Create a client for a discovered receiver
    pub fn for_receiver(receiver: &ReceiverDescriptor, port: u16, timeout: Duration) -> Result<Self> {
        Self::new(receiver.base_url(port), timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Read `key` from the JSON body of `GET <path>`.
    ///
    /// A missing key is `Ok(None)`, not an error.
    pub async fn get(&self, path: &str, key: &str) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("naimApiCall - GET : {}@{}", key, url);

        let result = self.fetch(&url, key).await;
        if let Err(e) = &result {
            e.report();
        }
        result
    }

    async fn fetch(&self, url: &str, key: &str) -> Result<Option<Value>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| classify(url, e))?;

        let mut body: Value = response.json().await.map_err(|e| classify(url, e))?;
        Ok(body.get_mut(key).map(Value::take).filter(|v| !v.is_null()))
    }

    /// Read `key` as text, numbers and booleans rendered the way the API spells them
    pub async fn get_text(&self, path: &str, key: &str) -> Result<Option<String>> {
        Ok(self.get(path, key).await?.as_ref().and_then(scalar_text))
    }

    /// Read `key` and deserialize it
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Option<T>> {
        match self.get(path, key).await? {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                let err = NaimError::InvalidResponse(format!("{} in {}{}: {}", key, self.base_url, path, e));
                err.report();
                err
            }),
            None => Ok(None),
        }
    }

    /// Write `key=value` on `path`.
    ///
    /// Some commands are only accepted as a GET with query parameters;
    /// `force_get` sends those that way.
    pub async fn put(&self, path: &str, key: &str, value: &str, force_get: bool) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(
            "naimApiCall - PUT {}: {} into {}@{}",
            if force_get { "(forced) " } else { "" },
            value,
            key,
            url
        );

        let request = if force_get {
            self.http.get(&url)
        } else {
            self.http.put(&url)
        };

        let result = request
            .query(&[(key, value)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| classify(&url, e));

        if let Err(e) = &result {
            e.report();
        }
        result
    }
}

/// Sort a transport error into rejected / unreachable / never sent
fn classify(url: &str, error: reqwest::Error) -> NaimError {
    let url = url.to_string();
    let message = error.to_string();

    if let Some(status) = error.status() {
        NaimError::DeviceRejected {
            url,
            status: status.as_u16(),
            message,
        }
    } else if error.is_builder() {
        NaimError::Transport { url, message }
    } else if error.is_decode() {
        NaimError::InvalidResponse(format!("{}: {}", url, message))
    } else {
        NaimError::DeviceUnreachable { url, message }
    }
}
