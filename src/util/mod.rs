pub mod backoff;
pub mod shutdown;

pub use backoff::FixedBackoff;
pub use shutdown::{cancel_on_signal, shutdown_signal};
