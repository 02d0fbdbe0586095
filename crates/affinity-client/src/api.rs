//! HTTP transport for the relationship endpoints.

use affinity_common::{
    ErrorBody, ListParams, Page, RelationType, RelationView, RelationshipItem, ToggleState,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Which side of a relation a listing is anchored on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListTarget {
    /// Who holds `relation_type` towards `object_id` (likers, followers).
    SubjectsOf {
        relation_type: RelationType,
        object_id: String,
    },
    /// What `subject_id` holds `relation_type` towards (liked, following).
    ObjectsOf {
        subject_id: String,
        relation_type: RelationType,
    },
}

impl ListTarget {
    fn segments(&self) -> Vec<&str> {
        match self {
            ListTarget::SubjectsOf {
                relation_type,
                object_id,
            } => vec![
                "relationships",
                relation_type.as_str(),
                object_id.as_str(),
                "subjects",
            ],
            ListTarget::ObjectsOf {
                subject_id,
                relation_type,
            } => vec![
                "subjects",
                subject_id.as_str(),
                "relationships",
                relation_type.as_str(),
            ],
        }
    }
}

#[async_trait]
pub trait RelationshipApi: Send + Sync {
    async fn toggle(&self, relation_type: RelationType, object_id: &str) -> Result<ToggleState>;

    async fn fetch_state(
        &self,
        relation_type: RelationType,
        object_id: &str,
    ) -> Result<RelationView>;

    async fn list(
        &self,
        target: &ListTarget,
        params: &ListParams,
    ) -> Result<Page<RelationshipItem>>;
}

/// [`RelationshipApi`] over `reqwest`.
#[derive(Clone)]
pub struct HttpRelationshipApi {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl HttpRelationshipApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base: config.parsed_base()?,
            token: config.bearer_token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        endpoint_url(&self.base, segments)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::Config(format!("{} cannot be a base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn append_list_params(url: &mut Url, params: &ListParams) {
    let mut pairs: Vec<(&str, String)> = Vec::new();
    if let Some(page) = params.page {
        pairs.push(("page", page.to_string()));
    }
    if let Some(limit) = params.limit {
        pairs.push(("limit", limit.to_string()));
    }
    if let Some(since) = params.since {
        pairs.push(("since", since.to_rfc3339()));
    }
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    let bytes = resp.bytes().await?;

    if !status.is_success() {
        let (code, message) = match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => (body.error.code, body.error.message),
            Err(_) => (
                "UNKNOWN".to_string(),
                String::from_utf8_lossy(&bytes).into_owned(),
            ),
        };
        return Err(ClientError::Status {
            status: status.as_u16(),
            code,
            message,
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
impl RelationshipApi for HttpRelationshipApi {
    async fn toggle(&self, relation_type: RelationType, object_id: &str) -> Result<ToggleState> {
        let url = self.endpoint(&["relationships", relation_type.as_str(), object_id, "toggle"])?;
        debug!("POST {}", url);
        let resp = self.authorize(self.http.post(url)).send().await?;
        decode(resp).await
    }

    async fn fetch_state(
        &self,
        relation_type: RelationType,
        object_id: &str,
    ) -> Result<RelationView> {
        let url = self.endpoint(&["relationships", relation_type.as_str(), object_id])?;
        debug!("GET {}", url);
        let resp = self.authorize(self.http.get(url)).send().await?;
        decode(resp).await
    }

    async fn list(
        &self,
        target: &ListTarget,
        params: &ListParams,
    ) -> Result<Page<RelationshipItem>> {
        let mut url = self.endpoint(&target.segments())?;
        append_list_params(&mut url, params);
        debug!("GET {}", url);
        let resp = self.authorize(self.http.get(url)).send().await?;
        decode(resp).await
    }
}
