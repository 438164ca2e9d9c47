//! Tick handler driving retry passes

use std::sync::Weak;

use async_trait::async_trait;
use resync_common::{TickControl, TickHandler};
use tracing::debug;

use super::policy::QueuePolicy;
use super::resilient::ClientInner;

/// Runs one retry pass per tick. Holds the client weakly so an abandoned
/// client is not kept alive by its own pump.
pub(crate) struct RetryPump<P: QueuePolicy> {
    client: Weak<ClientInner<P>>,
}

impl<P: QueuePolicy> RetryPump<P> {
    pub(crate) fn new(client: Weak<ClientInner<P>>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<P: QueuePolicy> TickHandler for RetryPump<P> {
    async fn tick(&mut self, control: &mut TickControl) {
        let Some(client) = self.client.upgrade() else {
            debug!("Client dropped, stopping retry pump");
            control.abort();
            return;
        };
        client.retry_pass().await;
        debug!(client = %client.name(), next_in_ms = control.interval().as_millis() as u64, "Retry tick done");
    }
}
