//! A backend for realtime-database style REST endpoints, where every node is
//! addressable as `{database_url}/{path}.json`.
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;

use crate::backend::{OnComplete, OnError, OnValue, RemoteBackend};
use crate::{RemoteError, RemoteErrorCode, Snapshot, StorePath};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RestConfig {
    pub database_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

pub struct RestBackend {
    config: Arc<RestConfig>,
    client: reqwest::Client,
    runtime: Handle,
}

impl RestBackend {
    /// Must be called from inside a tokio runtime; requests run as tasks on it
    /// and report back through the continuations.
    pub fn new(config: RestConfig) -> Result<Self, RemoteError> {
        let runtime = Handle::try_current().map_err(|e| {
            RemoteError::new(RemoteErrorCode::Other, format!("no tokio runtime: {e}"))
        })?;
        Ok(Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
            runtime,
        })
    }

    /// `{database_url}/{segments}.json`, every segment percent-encoded, with
    /// the token as an encoded `auth` query parameter.
    fn node_url(config: &RestConfig, path: &StorePath) -> Result<reqwest::Url, RemoteError> {
        let mut url = parse_database_url(&config.database_url)?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                RemoteError::new(
                    RemoteErrorCode::Other,
                    format!("database url {} cannot have a path", config.database_url),
                )
            })?;
            segments.pop_if_empty();
            match path.segments().split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{last}.json"));
                }
                None => {
                    segments.push(".json");
                }
            }
        }
        if let Some(token) = &config.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }
}

fn parse_database_url(database_url: &str) -> Result<reqwest::Url, RemoteError> {
    reqwest::Url::parse(database_url).map_err(|e| {
        RemoteError::new(
            RemoteErrorCode::Other,
            format!("invalid database url {database_url}: {e}"),
        )
    })
}

impl RemoteBackend for RestBackend {
    fn configure(&self) -> Result<(), RemoteError> {
        parse_database_url(&self.config.database_url)?;
        log::info!("Using REST store at {}", self.config.database_url);
        Ok(())
    }

    fn observe_single_event(&self, path: &StorePath, on_value: OnValue, on_error: OnError) {
        let url = match Self::node_url(&self.config, path) {
            Ok(url) => url,
            Err(e) => return on_error(e),
        };
        let key = path.key().map(str::to_string);
        let client = self.client.clone();

        self.runtime.spawn(async move {
            match get_json(&client, url).await {
                Ok(value) => on_value(Snapshot::new(key, Some(value))),
                Err(e) => on_error(e),
            }
        });
    }

    fn set_value(&self, path: &StorePath, value: Value, on_complete: OnComplete) {
        let url = match Self::node_url(&self.config, path) {
            Ok(url) => url,
            Err(e) => return on_complete(Some(e)),
        };
        let client = self.client.clone();

        self.runtime.spawn(async move {
            on_complete(put_json(&client, url, &value).await.err());
        });
    }

    fn child_by_auto_id(&self, _path: &StorePath) -> Option<String> {
        // v7 ids lead with a millisecond timestamp, so keys sort by creation time
        Some(uuid::Uuid::now_v7().simple().to_string())
    }
}

fn request_error(e: reqwest::Error) -> RemoteError {
    RemoteError::network(format!("{e:?}"))
}

fn status_error(status: reqwest::StatusCode, body: &str) -> RemoteError {
    let code = match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            RemoteErrorCode::PermissionDenied
        }
        _ => RemoteErrorCode::Other,
    };
    RemoteError::new(code, format!("request failed with status {status}: {body}"))
}

async fn get_json(client: &reqwest::Client, url: reqwest::Url) -> Result<Value, RemoteError> {
    let response = client.get(url).send().await.map_err(request_error)?;
    let status = response.status();
    let body = response.text().await.map_err(request_error)?;
    if !status.is_success() {
        return Err(status_error(status, &body));
    }

    serde_json::from_str(&body).map_err(|e| {
        RemoteError::new(
            RemoteErrorCode::Other,
            format!("Failed to parse node: {e}\nResponse body: {body}"),
        )
    })
}

async fn put_json(client: &reqwest::Client, url: reqwest::Url, value: &Value) -> Result<(), RemoteError> {
    let response = client
        .put(url)
        .json(value)
        .send()
        .await
        .map_err(request_error)?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        log::error!("Failed to write node: {status} - {body}");
        return Err(status_error(status, &body));
    }
    Ok(())
}
