//! Inbound mail for kvmail: a small SMTP receiver that stores every accepted
//! message as a `received` email.

mod config;
mod email;
mod handler;
mod persistor;
mod server;

pub use config::{ConfigError, SmtpConfig};
pub use email::InboundMessage;
pub use handler::{MAX_MESSAGE_SIZE, SmtpHandler};
pub use persistor::{RepositoryPersistor, SmtpPersistor};
pub use server::serve;
