//! Client configuration.

use url::Url;

use crate::error::{ClientError, Result};

/// Configuration for [`crate::HttpRelationshipApi`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://localhost:3001`.
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Page size requested by paged lists.
    pub page_limit: u32,
    /// Session token sent as `Authorization: Bearer`.
    pub bearer_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://localhost:3001".to_string(),
            request_timeout_ms: 10_000,
            page_limit: 20,
            bearer_token: None,
        }
    }
}

impl ClientConfig {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub(crate) fn parsed_base(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("base_url {:?}: {}", self.base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "base_url {:?} cannot be a base",
                self.base_url
            )));
        }
        Ok(url)
    }
}
