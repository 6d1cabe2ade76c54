//! Publisher module for vsmq.
//! Exposes the Publisher interface for message publication.
#[allow(clippy::module_inception)]
pub mod publisher;

pub use publisher::Publisher;
