//! HTTP clients for the Grouping and Broadcast collaborators.
//!
//! Each client is built from a base URL (for example
//! `http://grouping:6103/grouping`) and a request timeout. Records live at
//! `{base}/{id}`. Response bodies may be bare records or wrapped in the
//! collaborators' `{"code": .., "data": ..}` envelope.

use std::time::Duration;

use async_trait::async_trait;
use common::{Broadcast, BroadcastPatch, Group, GroupId, GroupPatch, NewBroadcast, NewGroup};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::services::broadcast::BroadcastClient;
use crate::services::grouping::GroupingClient;

#[derive(Debug, Clone)]
struct Endpoint {
    client: Client,
    base: Url,
    resource: &'static str,
}

impl Endpoint {
    fn new(base_url: &str, timeout: Duration, resource: &'static str) -> Result<Self, ClientError> {
        if base_url.trim().is_empty() {
            return Err(ClientError::Config(format!(
                "{resource} base URL not configured"
            )));
        }
        let base = Url::parse(base_url).map_err(|e| {
            ClientError::Config(format!("invalid {resource} base URL {base_url:?}: {e}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "{resource} base URL {base_url:?} cannot carry a path"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base,
            resource,
        })
    }

    fn record_url(&self, id: &GroupId) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(id.as_str());
        }
        url
    }

    /// Sends the request and maps transport failures and error statuses.
    async fn send(
        &self,
        request: RequestBuilder,
        id: Option<&GroupId>,
    ) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message: String = body.chars().take(200).collect();

        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(ClientError::NotFound {
                    resource: self.resource,
                    id: id.clone(),
                });
            }
        }

        if is_retryable_status(status) {
            warn!(resource = self.resource, %status, body = %message, "upstream returned retryable status");
            Err(ClientError::Unavailable(format!("HTTP {status} - {message}")))
        } else {
            warn!(resource = self.resource, %status, body = %message, "upstream rejected request");
            Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::timeout()
    } else if err.is_connect() {
        ClientError::Unavailable(format!("connection failed: {err}"))
    } else {
        ClientError::Unavailable(err.to_string())
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Strips the `{"code", "data", "message"}` envelope if present.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut fields) if fields.contains_key("code") && fields.contains_key("data") => {
            fields.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

async fn read_json(response: Response) -> Result<Value, ClientError> {
    let value: Value = response
        .json()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))?;
    Ok(unwrap_envelope(value))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let value = read_json(response).await?;
    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Single-record bodies omit the id; the record takes the id it was
/// addressed by.
fn addressed_group(mut group: Group, id: &GroupId) -> Group {
    if group.group_id.is_blank() {
        group.group_id = id.clone();
    }
    group
}

fn addressed_broadcast(mut broadcast: Broadcast, group_id: &GroupId) -> Broadcast {
    if broadcast.grouping_id.is_blank() {
        broadcast.grouping_id = group_id.clone();
    }
    broadcast
}

/// HTTP implementation of [`GroupingClient`].
#[derive(Debug, Clone)]
pub struct HttpGroupingClient {
    endpoint: Endpoint,
}

impl HttpGroupingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: Endpoint::new(base_url, timeout, "group")?,
        })
    }
}

#[async_trait]
impl GroupingClient for HttpGroupingClient {
    async fn get(&self, id: &GroupId) -> Result<Group, ClientError> {
        let url = self.endpoint.record_url(id);
        debug!(%url, "fetching group");
        let response = self
            .endpoint
            .send(self.endpoint.client.get(url), Some(id))
            .await?;
        Ok(addressed_group(decode(response).await?, id))
    }

    async fn create(&self, group: &NewGroup) -> Result<Group, ClientError> {
        let url = self.endpoint.base.clone();
        debug!(%url, no_of_pax = group.no_of_pax, "creating group");
        let response = self
            .endpoint
            .send(self.endpoint.client.post(url).json(group), None)
            .await?;
        let created: Group = decode(response).await?;
        if created.group_id.is_blank() {
            return Err(ClientError::Decode(
                "created group carries no id".to_string(),
            ));
        }
        Ok(created)
    }

    async fn update(&self, id: &GroupId, patch: &GroupPatch) -> Result<Group, ClientError> {
        let url = self.endpoint.record_url(id);
        debug!(%url, "updating group");
        let response = self
            .endpoint
            .send(self.endpoint.client.patch(url).json(patch), Some(id))
            .await?;
        Ok(addressed_group(decode(response).await?, id))
    }

    async fn delete(&self, id: &GroupId) -> Result<(), ClientError> {
        let url = self.endpoint.record_url(id);
        debug!(%url, "deleting group");
        self.endpoint
            .send(self.endpoint.client.delete(url), Some(id))
            .await?;
        Ok(())
    }
}

/// HTTP implementation of [`BroadcastClient`].
#[derive(Debug, Clone)]
pub struct HttpBroadcastClient {
    endpoint: Endpoint,
}

impl HttpBroadcastClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: Endpoint::new(base_url, timeout, "broadcast")?,
        })
    }
}

#[async_trait]
impl BroadcastClient for HttpBroadcastClient {
    async fn get(&self, group_id: &GroupId) -> Result<Broadcast, ClientError> {
        let url = self.endpoint.record_url(group_id);
        debug!(%url, "fetching broadcast");
        let response = self
            .endpoint
            .send(self.endpoint.client.get(url), Some(group_id))
            .await?;
        Ok(addressed_broadcast(decode(response).await?, group_id))
    }

    async fn list(&self) -> Result<Vec<Broadcast>, ClientError> {
        let url = self.endpoint.base.clone();
        debug!(%url, "listing broadcasts");
        let response = match self.endpoint.send(self.endpoint.client.get(url), None).await {
            Ok(response) => response,
            // The collaborator answers 404 when no broadcast is open.
            Err(ClientError::Rejected { status: 404, .. }) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let value = match read_json(response).await? {
            Value::Object(mut fields) if fields.contains_key("broadcasts") => {
                fields.remove("broadcasts").unwrap_or(Value::Null)
            }
            other => other,
        };
        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn create(
        &self,
        group_id: &GroupId,
        broadcast: &NewBroadcast,
    ) -> Result<Broadcast, ClientError> {
        let url = self.endpoint.record_url(group_id);
        debug!(%url, lf_pax = broadcast.lf_pax, "opening broadcast");
        let response = self
            .endpoint
            .send(self.endpoint.client.post(url).json(broadcast), None)
            .await?;
        Ok(addressed_broadcast(decode(response).await?, group_id))
    }

    async fn update(
        &self,
        group_id: &GroupId,
        patch: &BroadcastPatch,
    ) -> Result<Broadcast, ClientError> {
        let url = self.endpoint.record_url(group_id);
        debug!(%url, lf_pax = patch.lf_pax, "updating broadcast");
        let response = self
            .endpoint
            .send(self.endpoint.client.patch(url).json(patch), Some(group_id))
            .await?;
        Ok(addressed_broadcast(decode(response).await?, group_id))
    }

    async fn delete(&self, group_id: &GroupId) -> Result<(), ClientError> {
        let url = self.endpoint.record_url(group_id);
        debug!(%url, "deleting broadcast");
        self.endpoint
            .send(self.endpoint.client.delete(url), Some(group_id))
            .await?;
        Ok(())
    }
}
