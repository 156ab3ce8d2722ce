//! HTTP remote store
//!
//! Talks to one or more configured JSON document endpoints (a serverless
//! proxy or a public blob store). Pulls try endpoints in priority order and
//! take the first decodable answer; pushes PUT the full document to every
//! endpoint and succeed if at least one accepts. Everything is bounded by
//! the configured request timeout and degrades silently on failure.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use cutboard_core::config::SyncConfig;
use cutboard_core::{CustomUsers, Dataset, RemoteStore};

use crate::error::{Error, Result};

pub struct HttpRemote {
    client: reqwest::Client,
    user_endpoints: Vec<String>,
    dataset_endpoints: Vec<String>,
    timeout_secs: u64,
}

/// Directory document as served by the endpoints; either wrapped in a
/// `users` envelope or the bare map.
#[derive(Deserialize)]
#[serde(untagged)]
enum UsersPayload {
    Wrapped { users: CustomUsers },
    Direct(CustomUsers),
}

impl UsersPayload {
    fn into_users(self) -> CustomUsers {
        match self {
            UsersPayload::Wrapped { users } => users,
            UsersPayload::Direct(users) => users,
        }
    }
}

/// Dataset document; some endpoints wrap the record in a `data` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetPayload {
    Wrapped { data: Dataset },
    Direct(Dataset),
}

impl DatasetPayload {
    fn into_dataset(self) -> Dataset {
        match self {
            DatasetPayload::Wrapped { data } => data,
            DatasetPayload::Direct(data) => data,
        }
    }
}

impl HttpRemote {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            user_endpoints: config.user_endpoints.clone(),
            dataset_endpoints: config.dataset_endpoints.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    async fn get_json(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.timeout_secs)
            } else {
                Error::Http(e)
            }
        })?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status()));
        }
        Ok(response.text().await?)
    }

    async fn put_json(&self, url: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout_secs)
                } else {
                    Error::Http(e)
                }
            })?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status()));
        }
        Ok(())
    }

    /// First endpoint that answers with a decodable document wins
    async fn pull_first<T, F>(&self, endpoints: &[String], decode: F) -> Option<T>
    where
        F: Fn(&str) -> serde_json::Result<T>,
    {
        for url in endpoints {
            match self.get_json(url).await {
                Ok(raw) => match decode(&raw) {
                    Ok(value) => {
                        debug!(url, "remote pull succeeded");
                        return Some(value);
                    }
                    Err(e) => warn!(url, "remote payload undecodable: {e}"),
                },
                Err(e) => warn!(url, "remote pull failed: {e}"),
            }
        }
        None
    }

    async fn push_all(&self, endpoints: &[String], body: &str) -> bool {
        let mut accepted = false;
        for url in endpoints {
            match self.put_json(url, body).await {
                Ok(()) => {
                    debug!(url, "remote push accepted");
                    accepted = true;
                }
                Err(e) => warn!(url, "remote push failed: {e}"),
            }
        }
        accepted
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn pull_users(&self) -> Option<CustomUsers> {
        self.pull_first(&self.user_endpoints, |raw| {
            serde_json::from_str::<UsersPayload>(raw).map(UsersPayload::into_users)
        })
        .await
    }

    async fn push_users(&self, users: &CustomUsers) -> bool {
        let body = match serde_json::to_string(&serde_json::json!({ "users": users })) {
            Ok(body) => body,
            Err(e) => {
                warn!("failed to encode user directory: {e}");
                return false;
            }
        };
        self.push_all(&self.user_endpoints, &body).await
    }

    async fn pull_dataset(&self) -> Option<Dataset> {
        self.pull_first(&self.dataset_endpoints, |raw| {
            serde_json::from_str::<DatasetPayload>(raw).map(DatasetPayload::into_dataset)
        })
        .await
    }

    async fn push_dataset(&self, dataset: &Dataset) -> bool {
        let body = match serde_json::to_string(dataset) {
            Ok(body) => body,
            Err(e) => {
                warn!("failed to encode dataset: {e}");
                return false;
            }
        };
        self.push_all(&self.dataset_endpoints, &body).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn remote_with(user_endpoints: Vec<String>, dataset_endpoints: Vec<String>) -> HttpRemote {
        let config = SyncConfig {
            user_endpoints,
            dataset_endpoints,
            request_timeout_secs: 2,
            ..SyncConfig::default()
        };
        HttpRemote::new(&config).unwrap()
    }

    /// One-shot HTTP server answering every request with the given body
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/")
    }

    const USER_DOC: &str = r#"{"users": {"jane": {
        "hash": "abc", "name": "Jane", "role": "editor", "active": true
    }}}"#;

    #[test]
    fn test_wrapped_and_direct_user_payloads_decode() {
        let wrapped: UsersPayload = serde_json::from_str(USER_DOC).unwrap();
        assert!(wrapped.into_users().contains_key("jane"));

        let direct: UsersPayload = serde_json::from_str(
            r#"{"jane": {"hash": "abc", "name": "Jane", "role": "editor", "active": true}}"#,
        )
        .unwrap();
        assert!(direct.into_users().contains_key("jane"));
    }

    #[test]
    fn test_wrapped_dataset_payload_decodes() {
        let payload: DatasetPayload =
            serde_json::from_str(r#"{"data": {"projects": [], "version": "3.0"}}"#).unwrap();
        assert_eq!(payload.into_dataset().version, "3.0");
    }

    #[tokio::test]
    async fn test_no_endpoints_means_no_sync() {
        let remote = remote_with(Vec::new(), Vec::new());
        assert!(remote.pull_users().await.is_none());
        assert!(!remote.push_users(&CustomUsers::default()).await);
        assert!(remote.pull_dataset().await.is_none());
    }

    #[tokio::test]
    async fn test_pull_users_from_live_endpoint() {
        let url = serve_once("200 OK", USER_DOC).await;
        let remote = remote_with(vec![url], Vec::new());

        let users = remote.pull_users().await.unwrap();
        assert_eq!(users.get("jane").unwrap().display_name, "Jane");
    }

    #[tokio::test]
    async fn test_pull_falls_through_to_next_endpoint() {
        // First endpoint refuses the connection, second answers.
        let good = serve_once("200 OK", USER_DOC).await;
        let remote = remote_with(vec!["http://127.0.0.1:1/".to_string(), good], Vec::new());
        assert!(remote.pull_users().await.is_some());
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_document() {
        let url = serve_once("500 Internal Server Error", "{}").await;
        let remote = remote_with(vec![url], Vec::new());
        assert!(remote.pull_users().await.is_none());
    }

    #[tokio::test]
    async fn test_push_reports_acceptance() {
        let url = serve_once("200 OK", "{}").await;
        let remote = remote_with(vec![url], Vec::new());
        assert!(remote.push_users(&CustomUsers::default()).await);

        let unreachable = remote_with(vec!["http://127.0.0.1:1/".to_string()], Vec::new());
        assert!(!unreachable.push_users(&CustomUsers::default()).await);
    }
}
