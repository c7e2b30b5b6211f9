//! Firestore v1 REST client.
//!
//! Documents travel as typed values (`{"stringValue": "..."}`); records in
//! this crate are plain JSON. `encode_value` / `decode_value` convert between
//! the two.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::FirebaseAuth;
use crate::config::FirebaseConfig;
use crate::documents::{DocumentStore, Record};
use crate::error::StoreError;

/// Document store backed by Cloud Firestore, authenticated as the signed-in identity.
pub struct FirestoreStore {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: Arc<FirebaseAuth>,
}

impl FirestoreStore {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &FirebaseConfig, auth: Arc<FirebaseAuth>) -> Self {
        Self {
            http,
            base_url: config.firestore_base_url.clone(),
            project_id: config.project_id.clone(),
            auth,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.id_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<(u16, String), StoreError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        Ok((status, text))
    }
}

#[async_trait::async_trait]
impl DocumentStore for FirestoreStore {
    async fn put(&self, collection: &str, key: &str, record: Record) -> Result<(), StoreError> {
        let url = document_url(&self.base_url, &self.project_id, collection, key)?;
        let body = json!({ "fields": encode_fields(&record) });
        let (status, text) = self
            .send(self.http.patch(url).json(&body))
            .await?;
        if status != 200 {
            return Err(status_error(status, text));
        }
        debug!(%collection, %key, "document written");
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Record>, StoreError> {
        let url = document_url(&self.base_url, &self.project_id, collection, key)?;
        let (status, text) = self.send(self.http.get(url)).await?;
        match status {
            200 => parse_document(&text).map(Some),
            404 => Ok(None),
            _ => Err(status_error(status, text)),
        }
    }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[derive(Deserialize)]
struct DocumentBody {
    #[serde(default)]
    fields: Record,
}

/// Build the document URL. Every segment is percent-encoded, so keys may hold
/// any characters, `/` included.
fn document_url(base_url: &str, project_id: &str, collection: &str, key: &str) -> Result<reqwest::Url, StoreError> {
    let mut url =
        reqwest::Url::parse(base_url).map_err(|e| StoreError::Request(format!("invalid firestore base url: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| StoreError::Request(format!("firestore base url cannot carry a path: {base_url}")))?
        .pop_if_empty()
        .extend(["v1", "projects", project_id, "databases", "(default)", "documents", collection, key]);
    Ok(url)
}

fn status_error(status: u16, body: String) -> StoreError {
    match status {
        401 | 403 => StoreError::PermissionDenied(body),
        _ => StoreError::Response { status, body },
    }
}

fn parse_document(json: &str) -> Result<Record, StoreError> {
    let body: DocumentBody = serde_json::from_str(json).map_err(|e| StoreError::Parse(e.to_string()))?;
    Ok(decode_fields(&body.fields))
}

fn encode_fields(record: &Record) -> Value {
    Value::Object(
        record
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore encodes int64 as a decimal string.
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

fn decode_fields(fields: &Record) -> Record {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), decode_value(value)))
        .collect()
}

/// Unwrap one typed value. Unknown kinds decode to null.
fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|typed| typed.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" | "booleanValue" | "doubleValue"
        | "geoPointValue" => inner.clone(),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map_or_else(|| inner.clone(), Value::from),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

#[cfg(test)]
#[path = "firestore_test.rs"]
mod tests;
