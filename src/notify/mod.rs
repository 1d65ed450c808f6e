//! Webhook notification delivery with classified, bounded retries.

pub mod delivery;
pub mod payload;
pub mod transport;

pub use delivery::{Notifier, RetryPolicy};
pub use transport::ReqwestTransport;
