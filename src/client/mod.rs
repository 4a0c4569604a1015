// ABOUTME: ESME-side façade: connect, bind, submit, keep-alive and unbind over one session
// ABOUTME: Inbound deliver_sm is acknowledged automatically before the handler sees it

mod builder;

pub use builder::ClientBuilder;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::debug;

use crate::codec::{CodecError, Pdu};
use crate::datatypes::{
    Address, BindMode, DeliverSmResp, NumericPlanIndicator, ServiceType, SubmitSm, SystemId, Tlv,
    TypeOfNumber, MAX_SHORT_MESSAGE,
};
use crate::datatypes::tlv::tags;
use crate::error::{SmppError, SmppResult};
use crate::session::{Session, SessionConfig, SessionEvent, SessionRole, SessionState};

/// Callbacks a client embedder may supply. Every method has a no-op
/// default, so implementors override only what they consume.
#[async_trait]
pub trait ClientHandler: Send + Sync {
    /// A PDU the session did not consume internally: deliver_sm (after
    /// it was acknowledged) and outbind.
    async fn on_pdu_received(&self, _pdu: &Pdu) {}

    /// The session reached Closed. `None` for a graceful end.
    async fn on_connection_lost(&self, _error: Option<&SmppError>) {}
}

/// Handler used when the embedder supplies none.
pub struct NoopClientHandler;

#[async_trait]
impl ClientHandler for NoopClientHandler {}

/// Per-message options for [`Client::submit_sm`].
#[derive(Clone, Debug, Default)]
pub struct SubmitOptions {
    pub service_type: ServiceType,
    pub source_addr_ton: TypeOfNumber,
    pub source_addr_npi: NumericPlanIndicator,
    pub dest_addr_ton: TypeOfNumber,
    pub dest_addr_npi: NumericPlanIndicator,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub registered_delivery: u8,
    pub data_coding: u8,
}

/// An ESME endpoint bound (or binding) to a remote SMSC.
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct Client {
    session: Session,
}

impl Client {
    /// Connect without callbacks.
    pub async fn connect<A: ToSocketAddrs>(addr: A, config: SessionConfig) -> SmppResult<Client> {
        Self::connect_with_handler(addr, config, Arc::new(NoopClientHandler)).await
    }

    /// Connect and register a handler for unsolicited traffic.
    pub async fn connect_with_handler<A: ToSocketAddrs>(
        addr: A,
        config: SessionConfig,
        handler: Arc<dyn ClientHandler>,
    ) -> SmppResult<Client> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let (session, events) = Session::spawn(stream, SessionRole::Initiator, config);
        tokio::spawn(event_pump(session.clone(), events, handler));
        Ok(Client { session })
    }

    /// The underlying session, for state and activity introspection.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub async fn bind_transmitter(&self) -> SmppResult<SystemId> {
        self.session.bind(BindMode::Transmitter).await
    }

    pub async fn bind_receiver(&self) -> SmppResult<SystemId> {
        self.session.bind(BindMode::Receiver).await
    }

    pub async fn bind_transceiver(&self) -> SmppResult<SystemId> {
        self.session.bind(BindMode::Transceiver).await
    }

    /// Submit a short message; resolves with the SMSC-assigned message
    /// id. Messages longer than 254 octets are carried in the
    /// message_payload TLV with sm_length 0, per section 5.2.21.
    pub async fn submit_sm(
        &self,
        source_addr: &str,
        destination_addr: &str,
        message: &[u8],
        options: SubmitOptions,
    ) -> SmppResult<String> {
        let source_addr = parse_address(source_addr, "source_addr")?;
        let destination_addr = parse_address(destination_addr, "destination_addr")?;

        let (short_message, tlvs) = if message.len() > MAX_SHORT_MESSAGE {
            debug!(
                length = message.len(),
                "message exceeds short_message bound, using message_payload"
            );
            (
                Vec::new(),
                vec![Tlv::new(tags::MESSAGE_PAYLOAD, message.to_vec())],
            )
        } else {
            (message.to_vec(), Vec::new())
        };

        let pdu = Pdu::SubmitSm(Box::new(SubmitSm {
            sequence_number: 0,
            service_type: options.service_type,
            source_addr_ton: options.source_addr_ton,
            source_addr_npi: options.source_addr_npi,
            source_addr,
            dest_addr_ton: options.dest_addr_ton,
            dest_addr_npi: options.dest_addr_npi,
            destination_addr,
            esm_class: options.esm_class,
            protocol_id: options.protocol_id,
            priority_flag: options.priority_flag,
            schedule_delivery_time: Default::default(),
            validity_period: Default::default(),
            registered_delivery: options.registered_delivery,
            replace_if_present_flag: 0,
            data_coding: options.data_coding,
            sm_default_msg_id: 0,
            short_message,
            tlvs,
        }));

        match self.session.send_request(pdu).await? {
            Pdu::SubmitSmResp(resp) => {
                if resp.command_status.is_ok() {
                    Ok(resp.message_id.as_str().to_string())
                } else {
                    Err(SmppError::Rejected(resp.command_status))
                }
            }
            Pdu::GenericNack(nack) => Err(SmppError::Rejected(nack.command_status)),
            other => Err(SmppError::UnexpectedPdu {
                expected: "submit_sm_resp",
                actual: other.command_name(),
            }),
        }
    }

    /// Round-trip an enquire_link; `timeout` defaults to the session's
    /// response timeout.
    pub async fn enquire_link(&self, timeout: Option<Duration>) -> SmppResult<()> {
        self.session.enquire_link(timeout).await
    }

    /// Release the bind. Completes once the peer acknowledges or the
    /// bind timeout elapses.
    pub async fn unbind(&self) -> SmppResult<()> {
        self.session.unbind().await
    }

    /// Unbind if bound, then close the socket.
    pub async fn disconnect(&self) -> SmppResult<()> {
        if self.session.state().is_bound() {
            let _ = self.session.unbind().await;
        }
        self.session.force_close();
        Ok(())
    }
}

fn parse_address(value: &str, field: &'static str) -> SmppResult<Address> {
    Address::try_from(value).map_err(|e| {
        SmppError::Protocol(CodecError::Field {
            field,
            reason: e.to_string(),
        })
    })
}

/// Services session events: acknowledges deliveries, forwards the rest
/// to the handler, and reports the terminal close.
async fn event_pump(
    session: Session,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    handler: Arc<dyn ClientHandler>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::DeliverSm(pdu) => {
                let _ = session.send_response(Pdu::DeliverSmResp(DeliverSmResp::new(
                    pdu.sequence_number,
                )));
                handler.on_pdu_received(&Pdu::DeliverSm(pdu)).await;
            }
            SessionEvent::Pdu(pdu) => handler.on_pdu_received(&pdu).await,
            SessionEvent::Closed(error) => {
                handler.on_connection_lost(error.as_ref()).await;
                break;
            }
            // Acceptor-only events; a client session never produces them.
            SessionEvent::BindRequest(_) | SessionEvent::SubmitSm(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_options_default_to_plain_gsm() {
        let options = SubmitOptions::default();
        assert_eq!(options.data_coding, 0);
        assert_eq!(options.registered_delivery, 0);
        assert_eq!(options.source_addr_ton, TypeOfNumber::Unknown);
    }

    #[test]
    fn address_validation_propagates_field_name() {
        let err = parse_address("1234567890123456789012345", "source_addr").unwrap_err();
        match err {
            SmppError::Protocol(CodecError::Field { field, .. }) => {
                assert_eq!(field, "source_addr")
            }
            other => panic!("expected field error, got {other:?}"),
        }
    }
}
