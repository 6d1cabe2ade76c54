//! Message model shared by publishers, subscribers and the dispatcher.
//!
//! Everything on a channel is text. JSON text decodes into [`Payload::Json`];
//! anything else is carried through untouched as [`Payload::Raw`] so that no
//! dequeued message is ever dropped for failing to parse.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::SearchHit;

/// Request id used when a message does not carry one.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// A JSON object with its fields kept in insertion order.
pub type Message = Map<String, Value>;

/// A dequeued (or to-be-enqueued) channel entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Raw(String),
}

impl Payload {
    /// Decodes channel text, falling back to the raw string.
    pub fn decode(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(text.to_owned()),
        }
    }

    /// Wire form: raw strings verbatim, everything else as JSON.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            Payload::Raw(text) => Ok(text.clone()),
            Payload::Json(value) => serde_json::to_string(value),
        }
    }

    /// Returns the payload as a JSON object, re-trying raw text as JSON.
    pub fn into_object(self) -> Option<Message> {
        let value = match self {
            Payload::Json(value) => value,
            Payload::Raw(text) => serde_json::from_str(&text).ok()?,
        };
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// `request_id` of an object payload, if it has a string one.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Payload::Json(Value::Object(map)) => map.get("request_id").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Message> for Payload {
    fn from(map: Message) -> Self {
        Payload::Json(Value::Object(map))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Raw(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Raw(text.to_owned())
    }
}

/// `request_id` of a message, or [`UNKNOWN_REQUEST_ID`].
pub fn request_id_of(message: &Message) -> String {
    message
        .get("request_id")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_REQUEST_ID)
        .to_owned()
}

/// The closed set of operations a message can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateCollection,
    AddData,
    Search,
    DeleteCollection,
    ListCollections,
    CollectionExists,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::CreateCollection,
        Action::AddData,
        Action::Search,
        Action::DeleteCollection,
        Action::ListCollections,
        Action::CollectionExists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateCollection => "create_collection",
            Action::AddData => "add_data",
            Action::Search => "search",
            Action::DeleteCollection => "delete_collection",
            Action::ListCollections => "list_collections",
            Action::CollectionExists => "collection_exists",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| s.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

/// Correlated reply to a [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<SearchHit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn empty(request_id: impl Into<String>, status: Status) -> Self {
        Self {
            request_id: request_id.into(),
            status,
            message: None,
            results: None,
            collections: None,
            exists: None,
            error: None,
        }
    }

    pub fn success(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::empty(request_id, Status::Success)
        }
    }

    pub fn results(request_id: impl Into<String>, results: Vec<SearchHit>) -> Self {
        Self {
            results: Some(results),
            ..Self::empty(request_id, Status::Success)
        }
    }

    pub fn collections(request_id: impl Into<String>, collections: Vec<String>) -> Self {
        Self {
            collections: Some(collections),
            ..Self::empty(request_id, Status::Success)
        }
    }

    /// Answer to an existence check; `message` spells it out for humans.
    pub fn exists(request_id: impl Into<String>, collection: &str, exists: bool) -> Self {
        let message = if exists {
            format!("Collection '{collection}' exists")
        } else {
            format!("Collection '{collection}' does not exist")
        };
        Self {
            message: Some(message),
            exists: Some(exists),
            ..Self::empty(request_id, Status::Success)
        }
    }

    pub fn error(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(request_id, Status::Error)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
