//! Service-side message routing.
//!
//! [`Dispatcher::dispatch`] is the only place a per-message failure becomes a
//! `status: error` [`Response`]; everything below it returns
//! [`DispatchError`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::core::error::DispatchError;
use crate::core::message::{request_id_of, Action, Message, Payload, Response, UNKNOWN_REQUEST_ID};
use crate::core::publisher::Publisher;
use crate::core::subscriber::MessageHandler;
use crate::store::{StoreError, VectorStore};

pub const DEFAULT_N_RESULTS: usize = 25;

const MISSING_ACTION: &str = "Message missing 'action' field";
const MISSING_NAME: &str = "Missing collection_name";
const MISSING_DATA: &str = "Missing collection_name or data";
const MISSING_QUERY: &str = "Missing collection_name or query";

/// A validated request, ready to run against the store.
#[derive(Debug, Clone, PartialEq)]
enum Request {
    CreateCollection {
        collection: String,
    },
    AddData {
        collection: String,
        documents: Vec<(String, String)>,
    },
    Search {
        collection: String,
        query: String,
        n_results: usize,
    },
    DeleteCollection {
        collection: String,
    },
    ListCollections,
    CollectionExists {
        collection: String,
    },
}

fn non_empty_str<'a>(message: &'a Message, field: &str) -> Option<&'a str> {
    message
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn parse_action(message: &Message) -> Result<Action, DispatchError> {
    match message.get("action") {
        None | Some(Value::Null) => Err(DispatchError::Validation(MISSING_ACTION.into())),
        Some(Value::String(name)) => name.parse().map_err(DispatchError::UnknownAction),
        Some(other) => Err(DispatchError::UnknownAction(other.to_string())),
    }
}

fn parse_documents(message: &Message) -> Result<Vec<(String, String)>, DispatchError> {
    let data = match message.get("data") {
        Some(Value::Object(data)) if !data.is_empty() => data,
        _ => return Err(DispatchError::Validation(MISSING_DATA.into())),
    };
    data.iter()
        .map(|(key, value)| match value {
            Value::String(text) => Ok((key.clone(), text.clone())),
            _ => Err(DispatchError::Validation(format!(
                "data value for '{key}' must be a string"
            ))),
        })
        .collect()
}

fn parse_n_results(message: &Message, default: usize) -> Result<usize, DispatchError> {
    match message.get("n_results") {
        None | Some(Value::Null) => Ok(default),
        Some(value) => value
            .as_u64()
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| DispatchError::Validation("n_results must be a positive integer".into())),
    }
}

fn parse_request(message: &Message, default_n_results: usize) -> Result<Request, DispatchError> {
    let collection = non_empty_str(message, "collection_name").map(str::to_owned);

    let request = match parse_action(message)? {
        Action::CreateCollection => Request::CreateCollection {
            collection: collection.ok_or_else(|| DispatchError::Validation(MISSING_NAME.into()))?,
        },
        Action::DeleteCollection => Request::DeleteCollection {
            collection: collection.ok_or_else(|| DispatchError::Validation(MISSING_NAME.into()))?,
        },
        Action::AddData => {
            let collection = collection.ok_or_else(|| DispatchError::Validation(MISSING_DATA.into()))?;
            Request::AddData {
                collection,
                documents: parse_documents(message)?,
            }
        }
        Action::Search => {
            let (Some(collection), Some(query)) = (collection, non_empty_str(message, "query")) else {
                return Err(DispatchError::Validation(MISSING_QUERY.into()));
            };
            Request::Search {
                collection,
                query: query.to_owned(),
                n_results: parse_n_results(message, default_n_results)?,
            }
        }
        Action::ListCollections => Request::ListCollections,
        Action::CollectionExists => Request::CollectionExists {
            collection: collection.ok_or_else(|| DispatchError::Validation(MISSING_NAME.into()))?,
        },
    };
    Ok(request)
}

/// Routes decoded messages to the vector store and publishes the responses.
pub struct Dispatcher {
    store: Arc<dyn VectorStore>,
    responses: Option<(Publisher, String)>,
    default_n_results: usize,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("response_channel", &self.response_channel())
            .field("default_n_results", &self.default_n_results)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            responses: None,
            default_n_results: DEFAULT_N_RESULTS,
        }
    }

    /// Publish every response on `channel` when used as a [`MessageHandler`].
    pub fn with_responses(mut self, publisher: Publisher, channel: impl Into<String>) -> Self {
        self.responses = Some((publisher, channel.into()));
        self
    }

    pub fn with_default_n_results(mut self, n_results: usize) -> Self {
        self.default_n_results = n_results.max(1);
        self
    }

    pub fn response_channel(&self) -> Option<&str> {
        self.responses.as_ref().map(|(_, channel)| channel.as_str())
    }

    /// Handles one message and builds its response. Never fails.
    pub async fn dispatch(&self, payload: Payload) -> Response {
        let Some(message) = payload.into_object() else {
            warn!(target: "dispatcher", "Received message that is not a JSON object");
            return Response::error(UNKNOWN_REQUEST_ID, "Message must be a JSON object");
        };
        let request_id = request_id_of(&message);

        match self.route(&request_id, &message).await {
            Ok(response) => response,
            Err(e) => {
                let action = message.get("action").and_then(Value::as_str).unwrap_or("");
                let collection = message
                    .get("collection_name")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                match &e {
                    DispatchError::Handler(_) => error!(
                        target: "dispatcher",
                        %request_id,
                        %action,
                        %collection,
                        error = %e,
                        "Error processing message"
                    ),
                    _ => warn!(
                        target: "dispatcher",
                        %request_id,
                        %action,
                        error = %e,
                        "Rejected message"
                    ),
                }
                Response::error(request_id, e.to_string())
            }
        }
    }

    async fn route(&self, request_id: &str, message: &Message) -> Result<Response, DispatchError> {
        let request = parse_request(message, self.default_n_results)?;
        debug!(target: "dispatcher", %request_id, ?request, "Dispatching request");

        let response = match request {
            Request::CreateCollection { collection } => {
                self.store.create_collection(&collection).await?;
                Response::success(request_id, format!("Collection {collection} created"))
            }
            Request::AddData {
                collection,
                documents,
            } => {
                let added = self.store.add_dictionary(&collection, &documents).await?;
                Response::success(request_id, format!("Added {added} items to {collection}"))
            }
            Request::Search {
                collection,
                query,
                n_results,
            } => {
                let hits = self.store.search(&query, n_results, &collection).await?;
                Response::results(request_id, hits)
            }
            Request::DeleteCollection { collection } => {
                if !self.store.delete_collection(&collection).await? {
                    return Err(StoreError::CollectionNotFound(collection).into());
                }
                Response::success(request_id, format!("Collection '{collection}' deleted"))
            }
            Request::ListCollections => Response::collections(request_id, self.store.list_collections().await?),
            Request::CollectionExists { collection } => {
                let exists = self.store.collection_exists(&collection).await?;
                Response::exists(request_id, &collection, exists)
            }
        };
        Ok(response)
    }

    async fn publish_response(&self, response: &Response) {
        let Some((publisher, channel)) = &self.responses else {
            debug!(target: "dispatcher", request_id = %response.request_id, "No response channel configured");
            return;
        };
        if let Err(e) = publisher.publish_json(channel, response).await {
            error!(
                target: "dispatcher",
                request_id = %response.request_id,
                %channel,
                error = %e,
                "Failed to publish response"
            );
        }
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, payload: Payload) -> anyhow::Result<()> {
        let response = self.dispatch(payload).await;
        self.publish_response(&response).await;
        Ok(())
    }
}
