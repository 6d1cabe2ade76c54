pub mod error;
pub mod message;
pub mod protocol;
pub mod publisher;
pub mod queue;
pub mod queue_manager;
pub mod subscriber;

pub use error::{DispatchError, QueueError};
pub use message::{Action, Message, Payload, Response, Status, UNKNOWN_REQUEST_ID};
pub use publisher::Publisher;
pub use queue::{Connector, MemoryQueue, QueueTransport, TcpConnector, TcpQueue};
pub use queue_manager::{QueueManager, QueueManagerOptions};
pub use subscriber::{handler_fn, MessageHandler, Subscriber, SubscriberState};
