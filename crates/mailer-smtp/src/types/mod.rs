//! Core SMTP types.

mod address;
mod capability;
mod reply;

pub use address::Address;
pub use capability::Capabilities;
pub use reply::{Reply, ReplyCode};
