//! Operation catalog shared by the caller and the responder.
//!
//! Each operation is a zero-sized type implementing [`Operation`], binding a
//! tag to its request and response shapes. Payload structs carry their required
//! fields plus an `extra` map so either side can add fields without breaking
//! the other.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Additional attributes beyond an operation's required fields.
pub type Extra = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),
}

/// Closed set of operation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationName {
    SaveNotebook,
    ReadCode,
}

impl OperationName {
    pub const ALL: [OperationName; 2] = [OperationName::SaveNotebook, OperationName::ReadCode];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SaveNotebook => "saveNotebook",
            Self::ReadCode => "readCode",
        }
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownOperation(s.to_string()))
    }
}

/// Binds an operation tag to its request and response shapes.
pub trait Operation: Send + Sync + 'static {
    const NAME: OperationName;
    type Request: Serialize + DeserializeOwned + Default + Send + 'static;
    type Response: Serialize + DeserializeOwned + Send + 'static;
}

/// Persist the notebook.
pub enum SaveNotebook {}

impl Operation for SaveNotebook {
    const NAME: OperationName = OperationName::SaveNotebook;
    type Request = SaveNotebookRequest;
    type Response = SaveNotebookResponse;
}

/// Read the notebook's current source.
pub enum ReadCode {}

impl Operation for ReadCode {
    const NAME: OperationName = OperationName::ReadCode;
    type Request = ReadCodeRequest;
    type Response = ReadCodeResponse;
}

/// The unit placed on the wire: `{ "operation": <tag>, "request": <object> }`.
///
/// `operation` stays a plain string here so a responder can report the exact
/// tag it did not recognize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub operation: String,
    #[serde(default)]
    pub request: serde_json::Value,
}

impl Envelope {
    pub fn new(operation: OperationName, request: serde_json::Value) -> Self {
        Self {
            operation: operation.as_str().to_string(),
            request,
        }
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ProtocolError> {
        serde_json::from_value(value).map_err(ProtocolError::MalformedEnvelope)
    }

    pub fn operation(&self) -> Result<OperationName, ProtocolError> {
        self.operation.parse()
    }

    /// The request payload, with an absent or null payload read as `{}`.
    pub fn into_request(self) -> serde_json::Value {
        match self.request {
            serde_json::Value::Null => serde_json::Value::Object(Extra::new()),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveNotebookRequest {
    /// Target filename; the responder falls back to its current file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Whether to write to disk; the responder defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist: Option<bool>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl SaveNotebookRequest {
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = Some(persist);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveNotebookResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl SaveNotebookResponse {
    pub fn succeeded(filename: impl Into<String>) -> Self {
        Self {
            success: true,
            filename: Some(filename.into()),
            extra: Extra::new(),
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadCodeRequest {
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadCodeResponse {
    pub contents: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl ReadCodeResponse {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            extra: Extra::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_names_match_wire_tags() {
        for op in OperationName::ALL {
            let tag = serde_json::to_value(op).unwrap();
            assert_eq!(tag, json!(op.as_str()));
            assert_eq!(op.as_str().parse::<OperationName>().unwrap(), op);
        }
    }

    #[test]
    fn unknown_operation_names_tag() {
        let err = "deleteNotebook".parse::<OperationName>().unwrap_err();
        assert_eq!(err.to_string(), "unknown operation: deleteNotebook");
    }

    #[test]
    fn save_envelope_serializes() {
        let request = SaveNotebookRequest::default()
            .with_filename("x.py")
            .with_persist(false);
        let envelope = Envelope::new(
            SaveNotebook::NAME,
            serde_json::to_value(request).unwrap(),
        );
        insta::assert_json_snapshot!(envelope);
    }

    #[test]
    fn default_requests_serialize_to_empty_objects() {
        assert_eq!(
            serde_json::to_value(SaveNotebookRequest::default()).unwrap(),
            json!({})
        );
        assert_eq!(
            serde_json::to_value(ReadCodeRequest::default()).unwrap(),
            json!({})
        );
    }

    #[test]
    fn extra_fields_survive_roundtrip() {
        let raw = json!({"filename": "a.py", "format": "ipynb", "tags": ["x"]});
        let request: SaveNotebookRequest = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(request.filename.as_deref(), Some("a.py"));
        assert_eq!(request.persist, None);
        assert_eq!(request.extra.get("format"), Some(&json!("ipynb")));
        assert_eq!(serde_json::to_value(&request).unwrap(), raw);
    }

    #[test]
    fn failed_save_response_is_minimal() {
        assert_eq!(
            serde_json::to_value(SaveNotebookResponse::failed()).unwrap(),
            json!({"success": false})
        );
    }

    #[test]
    fn succeeded_save_response_serializes() {
        insta::assert_json_snapshot!(SaveNotebookResponse::succeeded("x.py"));
    }

    #[test]
    fn read_code_response_requires_contents() {
        let err = serde_json::from_value::<ReadCodeResponse>(json!({"text": "x"}));
        assert!(err.is_err());

        let ok: ReadCodeResponse = serde_json::from_value(json!({"contents": ""})).unwrap();
        assert_eq!(ok, ReadCodeResponse::new(""));
    }

    #[test]
    fn envelope_null_request_reads_as_empty_object() {
        let envelope = Envelope::from_value(json!({"operation": "readCode"})).unwrap();
        assert_eq!(envelope.operation().unwrap(), OperationName::ReadCode);
        assert_eq!(envelope.into_request(), json!({}));
    }

    #[test]
    fn envelope_without_operation_is_malformed() {
        let err = Envelope::from_value(json!({"request": {}})).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedEnvelope(_)));
    }
}
