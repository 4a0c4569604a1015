// ABOUTME: Embedder-facing capability set for the SMSC acceptor
// ABOUTME: authenticate is the one required hook; everything else defaults to a no-op

use async_trait::async_trait;

use crate::datatypes::SubmitSm;
use crate::error::{SmppError, SmppResult};
use crate::session::Session;

/// Hooks the embedder supplies to a [`Server`](crate::server::Server).
///
/// `authenticate` must be implemented; the lifecycle notifications and
/// the message sink default to no-ops so embedders consume only what
/// they need.
#[async_trait]
pub trait ServerHandler: Send + Sync {
    /// Decide whether a bind with these credentials is admitted.
    /// Rejection answers the bind with ESME_RINVPASWD and closes.
    async fn authenticate(&self, system_id: &str, password: &str, system_type: &str) -> bool;

    /// TCP connection accepted; the session is still unbound.
    async fn on_client_connected(&self, _session: &Session) {}

    /// Bind accepted and acknowledged.
    async fn on_client_bound(&self, _session: &Session) {}

    /// Session reached Closed. `None` marks a graceful end.
    async fn on_client_disconnected(&self, _session: &Session, _error: Option<&SmppError>) {}

    /// A submit_sm from a bound transmitter. Return the message id to
    /// acknowledge with; an empty string lets the server assign its
    /// own. An `Err` answers the submit with ESME_RSYSERR.
    async fn on_message_received(
        &self,
        _session: &Session,
        _submit: &SubmitSm,
    ) -> SmppResult<String> {
        Ok(String::new())
    }
}
