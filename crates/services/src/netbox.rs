//! NetBox REST and GraphQL client.

use async_trait::async_trait;
use serde_json::{json, Value};

use invsync_connector::{CollaboratorError, GraphQlRequest, InventoryMutation, InventoryQuery, Payload};
use invsync_core::config::NetBoxConfig;
use invsync_core::{Endpoint, ObjectId};

use crate::http::ApiClient;

const SERVICE: &str = "netbox";
const GRAPHQL_PATH: &str = "/graphql/";

pub struct NetBoxClient {
    api: ApiClient,
}

impl NetBoxClient {
    pub fn new(config: &NetBoxConfig, timeout_secs: u64) -> Result<Self, CollaboratorError> {
        let mut headers = Vec::new();
        if let Some(token) = &config.api_token {
            headers.push(("authorization", format!("Token {token}")));
        }
        let api = ApiClient::new(SERVICE, &config.base_url, &headers, timeout_secs, config.verify_ssl)?;
        Ok(Self { api })
    }

    /// Every record of `endpoint`, following `next` links across pages.
    pub async fn list(&self, endpoint: Endpoint, filters: &[(&str, &str)]) -> Result<Vec<Value>, CollaboratorError> {
        let mut records = Vec::new();
        let mut page = self.api.get(endpoint.path(), filters).await?;
        loop {
            let (results, next) = split_page(page)?;
            records.extend(results);
            match next {
                Some(url) => {
                    tracing::debug!(%endpoint, next = %url, "Following pagination link");
                    page = self.api.get(&url, &[]).await?;
                }
                None => break,
            }
        }
        tracing::debug!(%endpoint, count = records.len(), "Listed records");
        Ok(records)
    }

    pub async fn get(&self, endpoint: Endpoint, id: ObjectId) -> Result<Value, CollaboratorError> {
        self.api.get(&endpoint.item_path(id), &[]).await
    }

    pub async fn update(&self, endpoint: Endpoint, id: ObjectId, changes: &Value) -> Result<Value, CollaboratorError> {
        tracing::info!(%endpoint, id, "Updating record");
        self.api.patch(&endpoint.item_path(id), changes).await
    }

    /// Delete one record by id, or several in one bulk request.
    pub async fn delete(&self, endpoint: Endpoint, ids: &[ObjectId]) -> Result<usize, CollaboratorError> {
        match ids {
            [] => Ok(0),
            [id] => {
                self.api.delete(&endpoint.item_path(*id), None).await?;
                tracing::info!(%endpoint, id, "Deleted record");
                Ok(1)
            }
            many => {
                self.api.delete(endpoint.path(), Some(&bulk_ids(many))).await?;
                tracing::info!(%endpoint, count = many.len(), "Deleted records");
                Ok(many.len())
            }
        }
    }
}

#[async_trait]
impl InventoryQuery for NetBoxClient {
    async fn execute_query(&self, request: &GraphQlRequest) -> Result<Value, CollaboratorError> {
        let body = serde_json::to_value(request).map_err(|e| CollaboratorError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })?;
        tracing::debug!(operation = %request.operation, variables = ?request.variables, "Executing GraphQL query");
        let response = self.api.post(GRAPHQL_PATH, &body).await?;
        check_graphql(response)
    }
}

#[async_trait]
impl InventoryMutation for NetBoxClient {
    async fn create(&self, endpoint: Endpoint, body: Payload) -> Result<Payload, CollaboratorError> {
        let many = matches!(body, Payload::Many(_));
        let response = self.api.post(endpoint.path(), &body.into_value()).await?;
        Ok(match response {
            Value::Array(items) => Payload::Many(items),
            other if many => Payload::Many(vec![other]),
            other => Payload::One(other),
        })
    }
}

/// `results` and the `next` link of one list page.
fn split_page(page: Value) -> Result<(Vec<Value>, Option<String>), CollaboratorError> {
    let Value::Object(mut page) = page else {
        return Err(CollaboratorError::Decode {
            service: SERVICE,
            message: "list page is not an object".to_string(),
        });
    };
    let results = match page.remove("results") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(CollaboratorError::Decode {
                service: SERVICE,
                message: "list page has no 'results' array".to_string(),
            })
        }
    };
    let next = match page.remove("next") {
        Some(Value::String(url)) if !url.is_empty() => Some(url),
        _ => None,
    };
    Ok((results, next))
}

fn bulk_ids(ids: &[ObjectId]) -> Value {
    Value::Array(ids.iter().map(|id| json!({ "id": id })).collect())
}

/// A GraphQL `errors` array fails the query even on HTTP 200.
fn check_graphql(response: Value) -> Result<Value, CollaboratorError> {
    match response.get("errors").and_then(Value::as_array) {
        Some(errors) if !errors.is_empty() => {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| match e.get("message").and_then(Value::as_str) {
                    Some(message) => message.to_string(),
                    None => e.to_string(),
                })
                .collect();
            tracing::error!(errors = ?messages, "GraphQL query returned errors");
            Err(CollaboratorError::Query(messages.join("; ")))
        }
        _ => Ok(response),
    }
}
