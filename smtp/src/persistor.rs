use kvmail_store::{EmailRepository, RecordStore};
use std::future::Future;

use crate::email::InboundMessage;

pub trait SmtpPersistor: Clone + Send + Sync + 'static {
    fn persist_email(
        &self,
        message: &InboundMessage,
    ) -> impl Future<Output = Result<(), kvmail_store::Error>> + Send;
}

/// Stores inbound mail as `received` emails.
#[derive(Clone)]
pub struct RepositoryPersistor<S> {
    emails: EmailRepository<S>,
}

impl<S: RecordStore> RepositoryPersistor<S> {
    pub fn new(emails: EmailRepository<S>) -> Self {
        Self { emails }
    }
}

impl<S: RecordStore> SmtpPersistor for RepositoryPersistor<S> {
    async fn persist_email(&self, message: &InboundMessage) -> Result<(), kvmail_store::Error> {
        let stored = self.emails.store(message.clone().into_new_email()).await?;
        tracing::info!(id = %stored.id, from = %stored.from, "received email");
        Ok(())
    }
}
