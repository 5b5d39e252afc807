//! Remote store access
//!
//! This module provides:
//! - A `Transport` trait that executes one request against the mail service
//! - `HttpTransport`, a blocking implementation on ureq
//! - `RecordingTransport`, a scripted in-memory implementation
//! - Response normalization to domain models

mod http;
mod memory;
mod normalize;

pub use http::HttpTransport;
pub use memory::RecordingTransport;
pub use normalize::{normalize_attachment, normalize_message, normalize_rows};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{MailboxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    /// Raw file upload
    File {
        filename: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// One call to the remote store. Paths are relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
}

impl Request {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query pair; repeated keys are kept in order
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn file(mut self, filename: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        self.body = Body::File {
            filename: filename.into(),
            content_type,
            bytes,
        };
        self
    }

    /// First value of a query key
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a repeated query key, in order
    pub fn query_values(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Ids carried in an `{id: [...]}` body
    pub fn body_ids(&self) -> Vec<String> {
        self.json_body()
            .and_then(|body| body.get("id"))
            .and_then(|ids| ids.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Executes requests against the remote store.
///
/// Implementations block until the response is complete and return the
/// decoded JSON body (`Value::Null` for an empty body). HTTP error statuses
/// are returned as errors classified by [`MailboxError::from_status`].
pub trait Transport: Send + Sync {
    fn execute(&self, request: &Request) -> Result<Value>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &Request) -> Result<Value> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &Request) -> Result<Value> {
        (**self).execute(request)
    }
}

/// Decode a response body into a typed payload
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| MailboxError::Decode {
        message: e.to_string(),
    })
}

/// Decode a body that may be empty into a payload with defaults
pub fn decode_or_default<T: DeserializeOwned + Default>(value: Value) -> Result<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    decode(value)
}

/// `{id: [...]}` body used by the bulk endpoints
pub(crate) fn id_body<S: AsRef<str>>(ids: &[S]) -> Value {
    let ids: Vec<&str> = ids.iter().map(|id| id.as_ref()).collect();
    serde_json::json!({ "id": ids })
}

/// Remote store response types
pub mod api {
    use serde::{Deserialize, Deserializer, Serialize};

    /// Accept a number or a numeric string
    pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Number(n)) => Some(n),
            Some(Raw::Float(f)) => Some(f as i64),
            Some(Raw::Text(s)) => s.trim().parse().ok(),
            None => None,
        })
    }

    fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(string_or_number(deserializer)?
            .map(|n| n.max(0) as u32)
            .unwrap_or(0))
    }

    fn bytes<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(string_or_number(deserializer)?
            .map(|n| n.max(0) as u64)
            .unwrap_or(0))
    }

    /// A message row from `list` or the detail from `message/{id}`
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRow {
        pub id: Option<String>,
        #[serde(default, deserialize_with = "string_or_number")]
        pub date: Option<i64>,
        pub from: Option<String>,
        pub subject: Option<String>,
        pub body: Option<String>,
        #[serde(default)]
        pub display_names: Vec<(String, String)>,
        #[serde(default)]
        pub to: Vec<String>,
        #[serde(default)]
        pub cc: Vec<String>,
        #[serde(default)]
        pub bcc: Vec<String>,
        #[serde(default)]
        pub unread: bool,
        pub state: Option<String>,
        pub system_folder: Option<String>,
        #[serde(default)]
        pub has_attachment: bool,
        #[serde(default)]
        pub attachments: Vec<AttachmentRow>,
        #[serde(default)]
        pub is_report_required: bool,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AttachmentRow {
        pub id: Option<String>,
        #[serde(default)]
        pub filename: String,
        #[serde(default, deserialize_with = "bytes")]
        pub size: u64,
        pub content_type: Option<String>,
    }

    /// Response of the attachment endpoints: the message's full attachment list
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct AttachmentsResponse {
        #[serde(default)]
        pub attachments: Vec<AttachmentRow>,
    }

    /// One node of a folder snapshot
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FolderNode {
        pub path: String,
        #[serde(default)]
        pub folder_name: String,
        #[serde(default)]
        pub id: Option<String>,
        #[serde(default, deserialize_with = "count")]
        pub count: u32,
        #[serde(default, deserialize_with = "count")]
        pub unread: u32,
        #[serde(default)]
        pub folders: Vec<FolderNode>,
    }

    /// Body of `POST draft` / `PUT draft/{id}` / `POST send`
    #[derive(Debug, Clone, Serialize)]
    pub struct DraftPayload {
        pub subject: String,
        pub body: String,
        pub to: Vec<String>,
        pub cc: Vec<String>,
        pub bcc: Vec<String>,
        pub attachments: Vec<AttachmentRow>,
    }

    /// Response of `POST draft`
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct DraftResponse {
        pub id: Option<String>,
    }

    /// Response of `POST send`
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct SendResponse {
        #[serde(default, deserialize_with = "count")]
        pub sent: u32,
        #[serde(default)]
        pub inactive: Vec<String>,
        #[serde(default)]
        pub undelivered: Vec<String>,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct QuotaResponse {
        #[serde(default, deserialize_with = "bytes")]
        pub quota: u64,
        #[serde(default, deserialize_with = "bytes")]
        pub storage: u64,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct MaxDepthResponse {
        #[serde(rename = "max-depth", default, deserialize_with = "count")]
        pub max_depth: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::api::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = Request::post("toggleUnread")
            .query("id", "a")
            .query("id", "b")
            .query("unread", false);
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.query_values("id"), vec!["a", "b"]);
        assert_eq!(request.query_value("unread"), Some("false"));
        assert_eq!(request.query_value("missing"), None);
    }

    #[test]
    fn test_body_ids() {
        let request = Request::put("trash").json(id_body(&["m1", "m2"]));
        assert_eq!(request.body_ids(), vec!["m1", "m2"]);
        assert!(Request::get("quota").body_ids().is_empty());
    }

    #[test]
    fn test_row_accepts_string_dates() {
        let row: MessageRow = decode(json!({
            "id": "m1",
            "date": "1700000000000",
            "unread": true,
            "systemFolder": "INBOX",
            "displayNames": [["u1", "User One"]],
            "to": ["u1"]
        }))
        .unwrap();
        assert_eq!(row.date, Some(1_700_000_000_000));
        assert_eq!(row.display_names, vec![("u1".to_string(), "User One".to_string())]);

        let numeric: MessageRow = decode(json!({ "id": "m2", "date": 42 })).unwrap();
        assert_eq!(numeric.date, Some(42));
    }

    #[test]
    fn test_folder_node_tolerates_string_counts() {
        let node: FolderNode = decode(json!({
            "path": "/Inbox",
            "folderName": "Inbox",
            "count": "10",
            "unread": 3,
            "folders": [{ "path": "/Inbox/Work", "folderName": "Work", "id": "257" }]
        }))
        .unwrap();
        assert_eq!(node.count, 10);
        assert_eq!(node.unread, 3);
        assert_eq!(node.folders[0].id.as_deref(), Some("257"));
        assert_eq!(node.folders[0].unread, 0);
    }

    #[test]
    fn test_max_depth_key() {
        let depth: MaxDepthResponse = decode(json!({ "max-depth": "3" })).unwrap();
        assert_eq!(depth.max_depth, 3);
    }
}
