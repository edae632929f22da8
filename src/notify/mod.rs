pub mod client;
pub mod error;
pub mod types;

pub use client::WebhookClient;
pub use error::NotifyError;
pub use types::{DeployNotice, NoticeAck};
