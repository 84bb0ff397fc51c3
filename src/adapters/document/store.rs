use crate::domain::ports::{DocumentStore, SessionProvider};
use crate::utils::error::{AnnoError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use url::Url;

fn matches_filters(document: &Value, filters: &[(String, String)]) -> bool {
    filters
        .iter()
        .all(|(field, expected)| document.get(field).and_then(Value::as_str) == Some(expected))
}

/// In-process collections; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, BTreeMap<String, Value>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error(e: impl std::fmt::Display) -> AnnoError {
        AnnoError::StorageError {
            message: format!("Lock error: {}", e),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().map_err(Self::lock_error)?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        let mut collections = self.collections.write().map_err(Self::lock_error)?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), document);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut collections = self.collections.write().map_err(Self::lock_error)?;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn query(&self, collection: &str, filters: &[(String, String)]) -> Result<Vec<Value>> {
        let collections = self.collections.read().map_err(Self::lock_error)?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| matches_filters(doc, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Document database reached over REST:
/// `GET|PUT|DELETE {base}/{collection}/{key}` and
/// `POST {base}/{collection}:query` with `{"where": {field: value}}`.
///
/// The signed-in user's id token is sent as a bearer token.
#[derive(Clone)]
pub struct RestDocumentStore {
    client: Client,
    base_url: Url,
    session: Arc<dyn SessionProvider>,
}

impl RestDocumentStore {
    pub fn new(client: Client, base_url: &str, session: Arc<dyn SessionProvider>) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| AnnoError::InvalidConfigValueError {
            field: "document.endpoint".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AnnoError::InvalidConfigValueError {
                field: "document.endpoint".to_string(),
                value: base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }
        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.current_user().and_then(|u| u.id_token) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fail(response: reqwest::Response, key: &str) -> AnnoError {
        match response.status() {
            StatusCode::UNAUTHORIZED => AnnoError::AuthenticationRequired {
                backend: "document".to_string(),
            },
            StatusCode::FORBIDDEN => AnnoError::NotAuthorized {
                id: key.to_string(),
            },
            status => AnnoError::Remote {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            },
        }
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let response = self
            .authorize(self.client.get(self.url(&[collection, key])))
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => Err(Self::fail(response, key).await),
        }
    }

    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<()> {
        let response = self
            .authorize(self.client.put(self.url(&[collection, key])))
            .json(&document)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::fail(response, key).await)
        }
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let response = self
            .authorize(self.client.delete(self.url(&[collection, key])))
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::fail(response, key).await),
        }
    }

    async fn query(&self, collection: &str, filters: &[(String, String)]) -> Result<Vec<Value>> {
        let conditions: serde_json::Map<String, Value> = filters
            .iter()
            .map(|(field, value)| (field.clone(), Value::String(value.clone())))
            .collect();
        let query_segment = format!("{}:query", collection);
        let response = self
            .authorize(self.client.post(self.url(&[&query_segment])))
            .json(&json!({ "where": conditions }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::fail(response, collection).await);
        }
        let documents: Vec<Value> = response.json().await?;
        // The server may ignore unknown filters; enforce them locally as well.
        Ok(documents
            .into_iter()
            .filter(|doc| matches_filters(doc, filters))
            .collect())
    }
}
