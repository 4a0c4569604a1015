// ABOUTME: SMSC-side acceptor: listens, authenticates binds, services bound sessions,
// ABOUTME: routes deliver_sm to bound receivers, and drains everything on stop

mod handler;
mod registry;
mod shutdown;

pub use handler::ServerHandler;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::client::SubmitOptions;
use crate::codec::Pdu;
use crate::connection::FrameWriter;
use crate::datatypes::{
    BindRequest, CommandStatus, DeliverSm, GenericNack, MessageId, SubmitSm, SubmitSmResp,
    SystemId, Tlv, MAX_SHORT_MESSAGE,
};
use crate::datatypes::tlv::tags;
use crate::error::{SmppError, SmppResult};
use crate::session::{
    PeerInfo, Session, SessionConfig, SessionEvent, SessionRole, SessionState,
};

use registry::Registry;
use shutdown::ShutdownCoordinator;

/// Acceptor configuration. Timers for accepted sessions come from the
/// embedded [`SessionConfig`]; its identity fields are unused on this
/// side except `system_id`, which names the SMSC in bind responses.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Identity answered in bind responses.
    pub system_id: SystemId,
    /// Cap on concurrent sessions. Connections over the cap are
    /// accepted, nacked with ESME_RSYSERR, and closed.
    pub max_connections: usize,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            system_id: SystemId::new(b"SMSC").expect("literal fits"),
            max_connections: 100,
            session: SessionConfig::default(),
        }
    }
}

struct ServerInner {
    config: ServerConfig,
    handler: Arc<dyn ServerHandler>,
    registry: Registry,
    shutdown: ShutdownCoordinator,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    message_counter: AtomicU64,
}

/// An SMSC endpoint servicing many concurrent ESME sessions.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    pub fn new(config: ServerConfig, handler: Arc<dyn ServerHandler>) -> Server {
        Server {
            inner: Arc::new(ServerInner {
                config,
                handler,
                registry: Registry::new(),
                shutdown: ShutdownCoordinator::new(),
                acceptor: Mutex::new(None),
                local_addr: Mutex::new(None),
                message_counter: AtomicU64::new(1),
            }),
        }
    }

    /// Begin accepting connections. Idempotent: a second call returns
    /// the address already bound.
    pub async fn start<A: ToSocketAddrs>(&self, addr: A) -> SmppResult<SocketAddr> {
        if let Some(addr) = self.local_addr() {
            if self.inner.acceptor.lock().expect("acceptor lock").is_some() {
                return Ok(addr);
            }
        }

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        *self.inner.local_addr.lock().expect("addr lock") = Some(local_addr);

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            accept_loop(inner, listener).await;
        });
        *self.inner.acceptor.lock().expect("acceptor lock") = Some(handle);

        info!(address = %local_addr, "server started");
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock().expect("addr lock")
    }

    /// Number of live sessions, bound or not.
    pub fn session_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Deliver a message to a peer bound for receive under
    /// `target_system_id`. Resolves once the peer acknowledges.
    pub async fn deliver_sm(
        &self,
        target_system_id: &str,
        source_addr: &str,
        destination_addr: &str,
        message: &[u8],
        options: SubmitOptions,
    ) -> SmppResult<()> {
        let session = self
            .inner
            .registry
            .find_receiver(target_system_id)
            .ok_or_else(|| SmppError::NoSuchPeer(target_system_id.to_string()))?;

        let (short_message, tlvs) = if message.len() > MAX_SHORT_MESSAGE {
            (
                Vec::new(),
                vec![Tlv::new(tags::MESSAGE_PAYLOAD, message.to_vec())],
            )
        } else {
            (message.to_vec(), Vec::new())
        };

        let pdu = Pdu::DeliverSm(Box::new(DeliverSm {
            sequence_number: 0,
            service_type: options.service_type,
            source_addr_ton: options.source_addr_ton,
            source_addr_npi: options.source_addr_npi,
            source_addr: parse_addr(source_addr, "source_addr")?,
            dest_addr_ton: options.dest_addr_ton,
            dest_addr_npi: options.dest_addr_npi,
            destination_addr: parse_addr(destination_addr, "destination_addr")?,
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

        match session.send_request(pdu).await? {
            Pdu::DeliverSmResp(resp) if resp.command_status.is_ok() => Ok(()),
            Pdu::DeliverSmResp(resp) => Err(SmppError::Rejected(resp.command_status)),
            Pdu::GenericNack(nack) => Err(SmppError::Rejected(nack.command_status)),
            other => Err(SmppError::UnexpectedPdu {
                expected: "deliver_sm_resp",
                actual: other.command_name(),
            }),
        }
    }

    /// Graceful stop: close the listener, ask every live session to
    /// unbind, wait up to `grace_period`, then force-close stragglers.
    /// Resolves only after every session reached Closed and the accept
    /// loop exited. Idempotent and safe to call concurrently.
    pub async fn stop(&self, grace_period: Duration) -> SmppResult<()> {
        if !self.inner.shutdown.begin_drain() {
            // Someone else is already stopping; wait for them.
            self.inner.shutdown.terminated().await;
            return Ok(());
        }

        // Server-originated unbind toward every bound session.
        for session in self.inner.registry.all() {
            if session.state().is_bound() {
                tokio::spawn(async move {
                    let _ = session.unbind().await;
                });
            } else {
                session.force_close();
            }
        }

        let deadline = tokio::time::Instant::now() + grace_period;
        while self.inner.registry.len() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let stragglers = self.inner.registry.all();
        if !stragglers.is_empty() {
            warn!(count = stragglers.len(), "grace period expired, force-closing");
            for session in &stragglers {
                session.force_close();
            }
        }
        for session in stragglers {
            session.closed().await;
            self.inner.registry.remove(session.id());
        }

        let acceptor = self.inner.acceptor.lock().expect("acceptor lock").take();
        if let Some(handle) = acceptor {
            let _ = handle.await;
        }

        self.inner.shutdown.terminate();
        info!("server stopped");
        Ok(())
    }
}

fn parse_addr(value: &str, field: &'static str) -> SmppResult<crate::datatypes::Address> {
    crate::datatypes::Address::try_from(value).map_err(|e| {
        SmppError::Protocol(crate::codec::CodecError::Field {
            field,
            reason: e.to_string(),
        })
    })
}

async fn accept_loop(inner: Arc<ServerInner>, listener: TcpListener) {
    let mut shutdown_rx = inner.shutdown.subscribe();
    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if !inner.shutdown.is_accepting() {
                    break;
                }
            }

            result = listener.accept() => match result {
                Ok((stream, peer_addr)) => handle_accept(&inner, stream, peer_addr),
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
    info!("listener stopped");
}

fn handle_accept(inner: &Arc<ServerInner>, stream: TcpStream, peer_addr: SocketAddr) {
    let _ = stream.set_nodelay(true);

    if inner.registry.len() >= inner.config.max_connections {
        warn!(peer = %peer_addr, "connection limit reached, nacking");
        tokio::spawn(reject_over_capacity(stream));
        return;
    }

    let (session, events) = Session::spawn(stream, SessionRole::Acceptor, inner.config.session.clone());
    inner.registry.insert(session.clone());

    let span = info_span!("conn", session = %session.id(), peer = %peer_addr);
    let inner = inner.clone();
    tokio::spawn(connection_task(inner, session, events).instrument(span));
}

/// Over-capacity answer: accept, nack with ESME_RSYSERR, close. The
/// nack's sequence number is 1; no inbound PDU has been read to echo.
async fn reject_over_capacity(stream: TcpStream) {
    let (_read_half, write_half) = stream.into_split();
    let mut writer = FrameWriter::new(write_half);
    let _ = writer
        .write_pdu(&Pdu::GenericNack(GenericNack::error(
            1,
            CommandStatus::SystemError,
        )))
        .await;
    let _ = writer.shutdown().await;
}

async fn connection_task(
    inner: Arc<ServerInner>,
    session: Session,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    inner.handler.on_client_connected(&session).await;

    let closed_error = loop {
        // An unbound peer gets bind_timeout to present credentials.
        let next = if session.state() == SessionState::Open {
            match tokio::time::timeout(inner.config.session.bind_timeout, events.recv()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!("no bind within bind_timeout, closing");
                    session.abort(SmppError::Timeout);
                    continue;
                }
            }
        } else {
            events.recv().await
        };

        let Some(event) = next else { break None };
        match event {
            SessionEvent::BindRequest(request) => handle_bind(&inner, &session, request).await,
            SessionEvent::SubmitSm(submit) => handle_submit(&inner, &session, submit).await,
            SessionEvent::DeliverSm(_) | SessionEvent::Pdu(_) => {}
            SessionEvent::Closed(error) => break error,
        }
    };

    inner.registry.remove(session.id());
    inner
        .handler
        .on_client_disconnected(&session, closed_error.as_ref())
        .await;
    debug!("connection task finished");
}

async fn handle_bind(inner: &Arc<ServerInner>, session: &Session, request: BindRequest) {
    let system_id = request.system_id().as_str().to_string();
    let admitted = inner
        .handler
        .authenticate(
            &system_id,
            request.password().as_str(),
            request.system_type().as_str(),
        )
        .await;

    if !admitted {
        warn!(system_id = %system_id, "authentication failed");
        let _ = session.send_response(
            request.response(CommandStatus::InvalidPassword, inner.config.system_id),
        );
        session.abort(SmppError::Authentication);
        return;
    }

    session.complete_bind(
        request.mode(),
        PeerInfo {
            system_id: *request.system_id(),
            system_type: *request.system_type(),
            interface_version: Some(request.interface_version()),
        },
    );
    inner.registry.bind(session.id(), &system_id);
    let _ = session.send_response(request.response(CommandStatus::Ok, inner.config.system_id));

    info!(system_id = %system_id, mode = ?request.mode(), "client bound");
    inner.handler.on_client_bound(session).await;
}

async fn handle_submit(inner: &Arc<ServerInner>, session: &Session, submit: Box<SubmitSm>) {
    let sequence = submit.sequence_number;
    let response = match inner.handler.on_message_received(session, &submit).await {
        Ok(id) => {
            let id = if id.is_empty() {
                inner.next_message_id()
            } else {
                id
            };
            match MessageId::try_from(id.as_str()) {
                Ok(message_id) => {
                    debug!(sequence, message_id = %message_id, "message accepted");
                    SubmitSmResp::ok(sequence, message_id)
                }
                Err(e) => {
                    warn!(error = %e, "handler returned unusable message id");
                    SubmitSmResp::error(sequence, CommandStatus::SystemError)
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "message handler failed");
            SubmitSmResp::error(sequence, CommandStatus::SystemError)
        }
    };
    let _ = session.send_response(Pdu::SubmitSmResp(response));
}

impl ServerInner {
    fn next_message_id(&self) -> String {
        self.message_counter
            .fetch_add(1, Ordering::Relaxed)
            .to_string()
    }
}
