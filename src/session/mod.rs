// ABOUTME: SMPP session engine: bind lifecycle, sequence allocation, request/response
// ABOUTME: correlation, keep-alive, and teardown; one implementation drives both roles

mod config;
mod pending;

pub use config::SessionConfig;

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::codec::Pdu;
use crate::connection::{FrameError, FrameReader, FrameWriter};
use crate::datatypes::{
    BindMode, BindReceiver, BindRequest, BindTransceiver, BindTransmitter, CommandId,
    CommandStatus, DeliverSmResp, EnquireLink, EnquireLinkResp, GenericNack, InterfaceVersion,
    SubmitSmResp, SystemId, SystemType, Unbind, UnbindResp,
};
use crate::error::{SmppError, SmppResult};

use pending::{Completion, PendingTable};

/// Which side of the connection this session is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionRole {
    /// ESME: connects out and binds.
    Initiator,
    /// SMSC: accepts the connection and services binds.
    Acceptor,
}

/// Session lifecycle states (specification section 2.1). The bound
/// states name the ESME's mode on both sides of the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
    BoundTx,
    BoundRx,
    BoundTrx,
    Unbinding,
}

impl SessionState {
    pub fn is_bound(self) -> bool {
        matches!(
            self,
            SessionState::BoundTx | SessionState::BoundRx | SessionState::BoundTrx
        )
    }

    fn for_mode(mode: BindMode) -> Self {
        match mode {
            BindMode::Transmitter => SessionState::BoundTx,
            BindMode::Receiver => SessionState::BoundRx,
            BindMode::Transceiver => SessionState::BoundTrx,
        }
    }

    /// The bind mode this state corresponds to, if bound.
    pub fn bind_mode(self) -> Option<BindMode> {
        match self {
            SessionState::BoundTx => Some(BindMode::Transmitter),
            SessionState::BoundRx => Some(BindMode::Receiver),
            SessionState::BoundTrx => Some(BindMode::Transceiver),
            _ => None,
        }
    }
}

/// Process-unique session identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        SessionId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

/// Peer identity captured at bind time.
#[derive(Clone, Debug, Default)]
pub struct PeerInfo {
    pub system_id: SystemId,
    pub system_type: SystemType,
    pub interface_version: Option<InterfaceVersion>,
}

/// What the session surfaces to its owning façade. Responses,
/// enquire_link, unbind and unknown PDUs are handled internally and
/// never appear here.
#[derive(Debug)]
pub enum SessionEvent {
    /// Acceptor only: a bind request awaiting authentication. The owner
    /// answers via [`Session::send_response`] and
    /// [`Session::complete_bind`].
    BindRequest(BindRequest),
    /// Acceptor only: a submit_sm from a bound transmitter. The owner
    /// answers with a submit_sm_resp.
    SubmitSm(Box<crate::datatypes::SubmitSm>),
    /// Initiator only: a deliver_sm from the SMSC. The owner
    /// acknowledges with a deliver_sm_resp.
    DeliverSm(Box<crate::datatypes::DeliverSm>),
    /// Informational PDUs with no state-machine path (outbind).
    Pdu(Pdu),
    /// The session reached Closed. `None` means a graceful end.
    Closed(Option<SmppError>),
}

struct Activity {
    last_rx: Instant,
    last_tx: Instant,
}

struct SessionInner {
    id: SessionId,
    role: SessionRole,
    peer_addr: Option<SocketAddr>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    peer: Mutex<Option<PeerInfo>>,
    sequence: AtomicU32,
    pending: PendingTable,
    /// Inbound request sequences currently awaiting our response.
    inflight_inbound: Mutex<HashSet<u32>>,
    writer_tx: mpsc::UnboundedSender<Pdu>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    activity: Mutex<Activity>,
    closed_tx: watch::Sender<bool>,
    keepalive_probes: AtomicU64,
}

/// Handle to a running session. Cheap to clone; the I/O and timer tasks
/// hold their own references and exit when the session closes.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Take ownership of a connected socket and start the session's
    /// reader, writer and timer tasks. The returned receiver yields the
    /// events the owning façade must service.
    pub fn spawn(
        stream: TcpStream,
        role: SessionRole,
        config: SessionConfig,
    ) -> (Session, mpsc::UnboundedReceiver<SessionEvent>) {
        let peer_addr = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (closed_tx, _) = watch::channel(false);

        let now = Instant::now();
        let inner = Arc::new(SessionInner {
            id: SessionId::next(),
            role,
            peer_addr,
            config,
            state: Mutex::new(SessionState::Open),
            peer: Mutex::new(None),
            sequence: AtomicU32::new(0),
            pending: PendingTable::new(),
            inflight_inbound: Mutex::new(HashSet::new()),
            writer_tx,
            event_tx,
            activity: Mutex::new(Activity {
                last_rx: now,
                last_tx: now,
            }),
            closed_tx,
            keepalive_probes: AtomicU64::new(0),
        });

        debug!(session = %inner.id, ?role, peer = ?peer_addr, "session open");

        tokio::spawn(Self::reader_loop(
            inner.clone(),
            FrameReader::new(read_half),
        ));
        tokio::spawn(Self::writer_loop(
            inner.clone(),
            writer_rx,
            FrameWriter::new(write_half),
        ));
        tokio::spawn(Self::timer_loop(inner.clone()));

        (Session { inner }, event_rx)
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn role(&self) -> SessionRole {
        self.inner.role
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().expect("state lock")
    }

    /// Identity of the peer, available once bound.
    pub fn peer(&self) -> Option<PeerInfo> {
        self.inner.peer.lock().expect("peer lock").clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed_tx.borrow()
    }

    /// Wait until the session reaches Closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Time since the last PDU arrived from the peer.
    pub fn rx_idle(&self) -> Duration {
        let activity = self.inner.activity.lock().expect("activity lock");
        activity.last_rx.elapsed()
    }

    /// Time since the last PDU was written to the peer.
    pub fn tx_idle(&self) -> Duration {
        let activity = self.inner.activity.lock().expect("activity lock");
        activity.last_tx.elapsed()
    }

    /// Number of keep-alive probes this session has originated.
    pub fn keepalive_probes(&self) -> u64 {
        self.inner.keepalive_probes.load(Ordering::Relaxed)
    }

    /// Number of outbound requests currently awaiting responses.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Send a request PDU and wait for its response, enforcing the
    /// state discipline for the session's role. The sequence number is
    /// allocated here; whatever the caller stamped is overwritten.
    pub async fn send_request(&self, pdu: Pdu) -> SmppResult<Pdu> {
        self.check_can_request(&pdu)?;
        self.request(pdu, self.inner.config.response_timeout).await
    }

    /// Queue a response PDU. Responses echo the request's sequence
    /// number, which the caller must already have set.
    pub fn send_response(&self, pdu: Pdu) -> SmppResult<()> {
        let sequence = pdu.sequence_number();
        self.inner
            .inflight_inbound
            .lock()
            .expect("inbound lock")
            .remove(&sequence);
        self.inner.queue_write(pdu)
    }

    /// Initiator: bind in the given mode using the configured identity.
    /// Returns the peer's system_id. A rejection or a bind timeout
    /// closes the session.
    pub async fn bind(&self, mode: BindMode) -> SmppResult<SystemId> {
        if self.inner.role != SessionRole::Initiator {
            return Err(SmppError::InvalidState {
                operation: "bind",
                state: self.state(),
            });
        }
        let state = self.state();
        if state != SessionState::Open {
            return Err(SmppError::InvalidState {
                operation: "bind",
                state,
            });
        }

        let cfg = &self.inner.config;
        let pdu = match mode {
            BindMode::Transmitter => Pdu::BindTransmitter(BindTransmitter {
                sequence_number: 0,
                system_id: cfg.system_id,
                password: cfg.password,
                system_type: cfg.system_type,
                interface_version: cfg.interface_version,
                addr_ton: cfg.addr_ton,
                addr_npi: cfg.addr_npi,
                address_range: cfg.address_range,
            }),
            BindMode::Receiver => Pdu::BindReceiver(BindReceiver {
                sequence_number: 0,
                system_id: cfg.system_id,
                password: cfg.password,
                system_type: cfg.system_type,
                interface_version: cfg.interface_version,
                addr_ton: cfg.addr_ton,
                addr_npi: cfg.addr_npi,
                address_range: cfg.address_range,
            }),
            BindMode::Transceiver => Pdu::BindTransceiver(BindTransceiver {
                sequence_number: 0,
                system_id: cfg.system_id,
                password: cfg.password,
                system_type: cfg.system_type,
                interface_version: cfg.interface_version,
                addr_ton: cfg.addr_ton,
                addr_npi: cfg.addr_npi,
                address_range: cfg.address_range,
            }),
        };

        let resp = match self.request(pdu, cfg.bind_timeout).await {
            Ok(resp) => resp,
            Err(err) => {
                // An unanswered bind closes the session.
                self.inner.teardown(Some(err.clone()));
                return Err(err);
            }
        };

        let (status, system_id, sc_version) = match (&resp, mode) {
            (Pdu::BindTransmitterResp(r), BindMode::Transmitter) => {
                (r.command_status, r.system_id, r.sc_interface_version.clone())
            }
            (Pdu::BindReceiverResp(r), BindMode::Receiver) => {
                (r.command_status, r.system_id, r.sc_interface_version.clone())
            }
            (Pdu::BindTransceiverResp(r), BindMode::Transceiver) => {
                (r.command_status, r.system_id, r.sc_interface_version.clone())
            }
            (Pdu::GenericNack(n), _) => (n.command_status, SystemId::default(), None),
            (other, _) => {
                let err = SmppError::UnexpectedPdu {
                    expected: "bind response",
                    actual: other.command_name(),
                };
                self.inner.teardown(Some(err.clone()));
                return Err(err);
            }
        };

        if !status.is_ok() {
            let err = SmppError::Bind(status);
            self.inner.teardown(Some(err.clone()));
            return Err(err);
        }

        let interface_version = sc_version
            .and_then(|tlv| tlv.value.first().copied())
            .and_then(|v| InterfaceVersion::try_from(v).ok());
        self.complete_bind(
            mode,
            PeerInfo {
                system_id,
                system_type: SystemType::default(),
                interface_version,
            },
        );
        info!(session = %self.inner.id, ?mode, peer_system_id = %system_id, "bound");
        Ok(system_id)
    }

    /// Acceptor: record a successful bind handled by the owner. Called
    /// before the ok response is queued so no PDU can observe a stale
    /// state.
    pub fn complete_bind(&self, mode: BindMode, peer: PeerInfo) {
        *self.inner.state.lock().expect("state lock") = SessionState::for_mode(mode);
        *self.inner.peer.lock().expect("peer lock") = Some(peer);
    }

    /// Round-trip an enquire_link. `timeout` falls back to the
    /// session's response_timeout.
    pub async fn enquire_link(&self, timeout: Option<Duration>) -> SmppResult<()> {
        let state = self.state();
        if !state.is_bound() {
            return Err(SmppError::InvalidState {
                operation: "enquire_link",
                state,
            });
        }
        let timeout = timeout.unwrap_or(self.inner.config.response_timeout);
        self.request(Pdu::EnquireLink(EnquireLink::new(0)), timeout)
            .await
            .map(|_| ())
    }

    /// Release the bind and close. Completes once unbind_resp arrives
    /// or the bind timeout elapses; either way the session ends Closed
    /// without error.
    pub async fn unbind(&self) -> SmppResult<()> {
        {
            let mut state = self.inner.state.lock().expect("state lock");
            if !state.is_bound() {
                return Err(SmppError::InvalidState {
                    operation: "unbind",
                    state: *state,
                });
            }
            *state = SessionState::Unbinding;
        }

        let outcome = self
            .request(Pdu::Unbind(Unbind::new(0)), self.inner.config.bind_timeout)
            .await;
        match outcome {
            Ok(_) => debug!(session = %self.inner.id, "unbind acknowledged"),
            Err(SmppError::Timeout) => {
                debug!(session = %self.inner.id, "unbind response timed out")
            }
            Err(e) => debug!(session = %self.inner.id, error = %e, "unbind aborted"),
        }
        self.inner.teardown(None);
        Ok(())
    }

    /// Close immediately without the unbind handshake. Pending waiters
    /// resolve with `ConnectionClosed`.
    pub fn force_close(&self) {
        self.inner.teardown(None);
    }

    /// Close carrying a terminating error, which pending waiters and
    /// the owner's Closed event observe.
    pub fn abort(&self, error: SmppError) {
        self.inner.teardown(Some(error));
    }

    fn check_can_request(&self, pdu: &Pdu) -> SmppResult<()> {
        let state = self.state();
        let role = self.inner.role;
        let allowed = match pdu {
            Pdu::BindTransmitter(_) | Pdu::BindReceiver(_) | Pdu::BindTransceiver(_) => {
                role == SessionRole::Initiator && state == SessionState::Open
            }
            Pdu::SubmitSm(_) => {
                role == SessionRole::Initiator
                    && matches!(state, SessionState::BoundTx | SessionState::BoundTrx)
            }
            Pdu::DeliverSm(_) => {
                role == SessionRole::Acceptor
                    && matches!(state, SessionState::BoundRx | SessionState::BoundTrx)
            }
            Pdu::EnquireLink(_) => state.is_bound(),
            Pdu::Unbind(_) => state.is_bound() || state == SessionState::Unbinding,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(SmppError::InvalidState {
                operation: pdu.command_name(),
                state,
            })
        }
    }

    async fn request(&self, mut pdu: Pdu, timeout: Duration) -> SmppResult<Pdu> {
        if self.is_closed() {
            return Err(SmppError::ConnectionClosed);
        }

        let waiter = loop {
            let sequence = self.inner.next_sequence();
            pdu.set_sequence_number(sequence);
            // An occupied slot means the counter lapped an ancient
            // request; take the next number.
            if let Some(waiter) = self
                .inner
                .pending
                .insert(sequence, pdu.command_id(), timeout)
            {
                break waiter;
            }
        };

        if let Err(e) = self.inner.queue_write(pdu) {
            self.inner.pending.remove(waiter.sequence());
            return Err(e);
        }
        waiter.wait(timeout).await
    }

    async fn reader_loop(inner: Arc<SessionInner>, mut reader: FrameReader<OwnedReadHalf>) {
        let mut closed_rx = inner.closed_tx.subscribe();
        let reason = loop {
            if *closed_rx.borrow_and_update() {
                break None;
            }
            tokio::select! {
                _ = closed_rx.changed() => break None,
                result = reader.read_pdu() => match result {
                    Ok(Some(pdu)) => {
                        inner.touch_rx();
                        if let Err(e) = inner.dispatch(pdu) {
                            break Some(e);
                        }
                        if *inner.closed_tx.borrow() {
                            break None;
                        }
                    }
                    Ok(None) => break Some(SmppError::ConnectionClosed),
                    Err(e) => {
                        // Nack a bad length when the header made it far
                        // enough to recover the sequence number.
                        if let SmppError::Frame(FrameError::InvalidLength {
                            sequence_number: Some(seq),
                            ..
                        }) = &e
                        {
                            let _ = inner.queue_write(Pdu::GenericNack(GenericNack::error(
                                *seq,
                                CommandStatus::InvalidCommandLength,
                            )));
                        }
                        break Some(e);
                    }
                }
            }
        };
        inner.teardown(reason);
    }

    async fn writer_loop(
        inner: Arc<SessionInner>,
        mut rx: mpsc::UnboundedReceiver<Pdu>,
        mut writer: FrameWriter<OwnedWriteHalf>,
    ) {
        let mut closed_rx = inner.closed_tx.subscribe();
        loop {
            if *closed_rx.borrow_and_update() {
                // Flush whatever was queued ahead of the close so final
                // responses reach the wire before the FIN.
                while let Ok(pdu) = rx.try_recv() {
                    if writer.write_pdu(&pdu).await.is_err() {
                        break;
                    }
                }
                let _ = writer.shutdown().await;
                break;
            }
            tokio::select! {
                biased;

                maybe = rx.recv() => match maybe {
                    Some(pdu) => {
                        if let Err(e) = writer.write_pdu(&pdu).await {
                            inner.teardown(Some(e));
                            break;
                        }
                        inner.touch_tx();
                    }
                    None => break,
                },

                // Loop around so the flush above runs.
                _ = closed_rx.changed() => {}
            }
        }
    }

    async fn timer_loop(inner: Arc<SessionInner>) {
        let keepalive = inner.config.enquire_link_interval;
        let tick = (keepalive / 4).clamp(Duration::from_millis(10), Duration::from_secs(5));
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut closed_rx = inner.closed_tx.subscribe();

        loop {
            if *closed_rx.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = closed_rx.changed() => break,
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let expired = inner.pending.sweep(now);
                    if expired > 0 {
                        debug!(session = %inner.id, expired, "pending requests timed out");
                    }

                    let state = *inner.state.lock().expect("state lock");
                    if !(state.is_bound() || state == SessionState::Unbinding) {
                        continue;
                    }

                    let (rx_idle, tx_idle) = {
                        let activity = inner.activity.lock().expect("activity lock");
                        (
                            now.duration_since(activity.last_rx),
                            now.duration_since(activity.last_tx),
                        )
                    };

                    if rx_idle >= keepalive * 2 {
                        warn!(session = %inner.id, ?rx_idle, "keep-alive expired, closing");
                        inner.teardown(Some(SmppError::Timeout));
                        break;
                    }

                    if state.is_bound() && tx_idle >= keepalive {
                        inner.send_keepalive();
                    }
                }
            }
        }
    }
}

impl SessionInner {
    fn next_sequence(&self) -> u32 {
        let prev = self
            .sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(if v >= 0x7FFF_FFFF { 1 } else { v + 1 })
            })
            .expect("sequence update closure is total");
        if prev >= 0x7FFF_FFFF {
            1
        } else {
            prev + 1
        }
    }

    fn queue_write(&self, pdu: Pdu) -> SmppResult<()> {
        debug!(
            session = %self.id,
            command = pdu.command_name(),
            sequence = pdu.sequence_number(),
            "queueing PDU"
        );
        self.writer_tx
            .send(pdu)
            .map_err(|_| SmppError::ConnectionClosed)
    }

    fn touch_rx(&self) {
        self.activity.lock().expect("activity lock").last_rx = Instant::now();
    }

    fn touch_tx(&self) {
        self.activity.lock().expect("activity lock").last_tx = Instant::now();
    }

    fn send_keepalive(&self) {
        let sequence = self.next_sequence();
        if self.pending.insert_detached(
            sequence,
            CommandId::EnquireLink.into(),
            self.config.response_timeout,
        ) {
            self.keepalive_probes.fetch_add(1, Ordering::Relaxed);
            debug!(session = %self.id, sequence, "sending keep-alive probe");
            let _ = self.queue_write(Pdu::EnquireLink(EnquireLink::new(sequence)));
        }
    }

    fn event(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Track an inbound request sequence until our response goes out.
    /// Returns false when the sequence is already being serviced.
    fn track_inbound(&self, sequence: u32) -> bool {
        self.inflight_inbound
            .lock()
            .expect("inbound lock")
            .insert(sequence)
    }

    fn dispatch(&self, pdu: Pdu) -> SmppResult<()> {
        debug!(
            session = %self.id,
            command = pdu.command_name(),
            sequence = pdu.sequence_number(),
            "received PDU"
        );

        if pdu.is_response() {
            return self.dispatch_response(pdu);
        }

        if let Pdu::Unknown {
            command_id,
            sequence_number,
            ..
        } = &pdu
        {
            warn!(
                session = %self.id,
                command_id = format_args!("{command_id:#010x}"),
                "unknown command, answering generic_nack"
            );
            return self.queue_write(Pdu::GenericNack(GenericNack::invalid_command_id(
                *sequence_number,
            )));
        }

        let state = *self.state.lock().expect("state lock");
        match state {
            SessionState::Open => self.dispatch_in_open(pdu),
            SessionState::Closed => Ok(()),
            _ => self.dispatch_in_bound(state, pdu),
        }
    }

    fn dispatch_response(&self, pdu: Pdu) -> SmppResult<()> {
        let actual = pdu.command_name();
        let sequence = pdu.sequence_number();
        match self.pending.complete(pdu) {
            Completion::Completed => Ok(()),
            Completion::Unsolicited => {
                warn!(session = %self.id, sequence, command = actual, "unsolicited response dropped");
                Ok(())
            }
            Completion::Mismatch { expected } => Err(SmppError::UnexpectedPdu {
                expected: response_name(expected),
                actual,
            }),
        }
    }

    fn dispatch_in_open(&self, pdu: Pdu) -> SmppResult<()> {
        match (self.role, pdu) {
            (SessionRole::Acceptor, Pdu::BindTransmitter(p)) => {
                self.emit_bind(BindRequest::Transmitter(p))
            }
            (SessionRole::Acceptor, Pdu::BindReceiver(p)) => {
                self.emit_bind(BindRequest::Receiver(p))
            }
            (SessionRole::Acceptor, Pdu::BindTransceiver(p)) => {
                self.emit_bind(BindRequest::Transceiver(p))
            }
            (_, Pdu::Outbind(p)) => {
                self.event(SessionEvent::Pdu(Pdu::Outbind(p)));
                Ok(())
            }
            (SessionRole::Acceptor, other) => {
                // Nothing but a bind is admissible before binding; the
                // acceptor answers the discipline violation and closes.
                warn!(
                    session = %self.id,
                    command = other.command_name(),
                    "request before bind, closing"
                );
                let _ = self.queue_write(invalid_bind_state_response(&other));
                Err(SmppError::InvalidState {
                    operation: other.command_name(),
                    state: SessionState::Open,
                })
            }
            (SessionRole::Initiator, other) => {
                warn!(
                    session = %self.id,
                    command = other.command_name(),
                    "peer request while unbound, nacking"
                );
                self.queue_write(Pdu::GenericNack(GenericNack::error(
                    other.sequence_number(),
                    CommandStatus::IncorrectBindStatus,
                )))
            }
        }
    }

    fn emit_bind(&self, request: BindRequest) -> SmppResult<()> {
        let sequence = request.sequence_number();
        if !self.track_inbound(sequence) {
            warn!(session = %self.id, sequence, "duplicate inbound sequence, nacking");
            return self.queue_write(Pdu::GenericNack(GenericNack::error(
                sequence,
                CommandStatus::SystemError,
            )));
        }
        self.event(SessionEvent::BindRequest(request));
        Ok(())
    }

    fn dispatch_in_bound(&self, state: SessionState, pdu: Pdu) -> SmppResult<()> {
        match pdu {
            Pdu::EnquireLink(req) => self.queue_write(Pdu::EnquireLinkResp(EnquireLinkResp::new(
                req.sequence_number,
            ))),

            Pdu::Unbind(req) => {
                info!(session = %self.id, "peer initiated unbind");
                let _ = self.queue_write(Pdu::UnbindResp(UnbindResp::new(req.sequence_number)));
                self.teardown(None);
                Ok(())
            }

            Pdu::SubmitSm(p) => {
                let allowed = self.role == SessionRole::Acceptor
                    && matches!(state, SessionState::BoundTx | SessionState::BoundTrx);
                if !allowed {
                    return self.queue_write(Pdu::SubmitSmResp(SubmitSmResp::error(
                        p.sequence_number,
                        CommandStatus::IncorrectBindStatus,
                    )));
                }
                if !self.track_inbound(p.sequence_number) {
                    warn!(session = %self.id, sequence = p.sequence_number, "duplicate inbound sequence, nacking");
                    return self.queue_write(Pdu::GenericNack(GenericNack::error(
                        p.sequence_number,
                        CommandStatus::SystemError,
                    )));
                }
                self.event(SessionEvent::SubmitSm(p));
                Ok(())
            }

            Pdu::DeliverSm(p) => {
                let allowed = self.role == SessionRole::Initiator
                    && matches!(state, SessionState::BoundRx | SessionState::BoundTrx);
                if !allowed {
                    return self.queue_write(Pdu::DeliverSmResp(DeliverSmResp::error(
                        p.sequence_number,
                        CommandStatus::IncorrectBindStatus,
                    )));
                }
                if !self.track_inbound(p.sequence_number) {
                    warn!(session = %self.id, sequence = p.sequence_number, "duplicate inbound sequence, nacking");
                    return self.queue_write(Pdu::GenericNack(GenericNack::error(
                        p.sequence_number,
                        CommandStatus::SystemError,
                    )));
                }
                self.event(SessionEvent::DeliverSm(p));
                Ok(())
            }

            Pdu::BindTransmitter(p) => self.reject_rebind(BindRequest::Transmitter(p)),
            Pdu::BindReceiver(p) => self.reject_rebind(BindRequest::Receiver(p)),
            Pdu::BindTransceiver(p) => self.reject_rebind(BindRequest::Transceiver(p)),

            Pdu::Outbind(p) => {
                self.event(SessionEvent::Pdu(Pdu::Outbind(p)));
                Ok(())
            }

            // Responses and Unknown were handled in dispatch().
            _ => Ok(()),
        }
    }

    fn reject_rebind(&self, request: BindRequest) -> SmppResult<()> {
        warn!(session = %self.id, "bind while already bound");
        self.queue_write(request.response(CommandStatus::AlreadyBound, SystemId::default()))
    }

    /// Move to Closed exactly once: flush waiters, notify the owner,
    /// release the writer. `None` marks a graceful end.
    fn teardown(&self, reason: Option<SmppError>) {
        if self.closed_tx.send_replace(true) {
            return;
        }
        *self.state.lock().expect("state lock") = SessionState::Closed;

        let flush_error = reason
            .clone()
            .unwrap_or(SmppError::ConnectionClosed);
        self.pending.flush(&flush_error);
        self.inflight_inbound.lock().expect("inbound lock").clear();

        match &reason {
            Some(err) => info!(session = %self.id, error = %err, "session closed"),
            None => info!(session = %self.id, "session closed"),
        }
        self.event(SessionEvent::Closed(reason));
    }
}

/// Response PDU answering a state-discipline violation: the matching
/// `*_resp` where one exists, generic_nack otherwise.
fn invalid_bind_state_response(pdu: &Pdu) -> Pdu {
    let sequence = pdu.sequence_number();
    let status = CommandStatus::IncorrectBindStatus;
    match pdu {
        Pdu::SubmitSm(_) => Pdu::SubmitSmResp(SubmitSmResp::error(sequence, status)),
        Pdu::DeliverSm(_) => Pdu::DeliverSmResp(DeliverSmResp::error(sequence, status)),
        Pdu::Unbind(_) => Pdu::UnbindResp(UnbindResp::error(sequence, status)),
        Pdu::EnquireLink(_) => Pdu::EnquireLinkResp(EnquireLinkResp::error(sequence, status)),
        _ => Pdu::GenericNack(GenericNack::error(sequence, status)),
    }
}

fn response_name(command_id: u32) -> &'static str {
    match CommandId::try_from(command_id) {
        Ok(CommandId::BindTransmitterResp) => "bind_transmitter_resp",
        Ok(CommandId::BindReceiverResp) => "bind_receiver_resp",
        Ok(CommandId::BindTransceiverResp) => "bind_transceiver_resp",
        Ok(CommandId::SubmitSmResp) => "submit_sm_resp",
        Ok(CommandId::DeliverSmResp) => "deliver_sm_resp",
        Ok(CommandId::UnbindResp) => "unbind_resp",
        Ok(CommandId::EnquireLinkResp) => "enquire_link_resp",
        Ok(CommandId::GenericNack) => "generic_nack",
        _ => "response",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_allocation_wraps_to_one() {
        let (closed_tx, _) = watch::channel(false);
        let (writer_tx, _writer_rx) = mpsc::unbounded_channel();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let inner = SessionInner {
            id: SessionId::next(),
            role: SessionRole::Initiator,
            peer_addr: None,
            config: SessionConfig::default(),
            state: Mutex::new(SessionState::Open),
            peer: Mutex::new(None),
            sequence: AtomicU32::new(0x7FFF_FFFE),
            pending: PendingTable::new(),
            inflight_inbound: Mutex::new(HashSet::new()),
            writer_tx,
            event_tx,
            activity: Mutex::new(Activity {
                last_rx: Instant::now(),
                last_tx: Instant::now(),
            }),
            closed_tx,
            keepalive_probes: AtomicU64::new(0),
        };

        assert_eq!(inner.next_sequence(), 0x7FFF_FFFF);
        assert_eq!(inner.next_sequence(), 1);
        assert_eq!(inner.next_sequence(), 2);
    }

    #[test]
    fn state_bind_mode_mapping() {
        assert_eq!(
            SessionState::for_mode(BindMode::Transceiver),
            SessionState::BoundTrx
        );
        assert_eq!(
            SessionState::BoundRx.bind_mode(),
            Some(BindMode::Receiver)
        );
        assert_eq!(SessionState::Open.bind_mode(), None);
        assert!(SessionState::BoundTx.is_bound());
        assert!(!SessionState::Unbinding.is_bound());
    }

    #[test]
    fn violation_response_uses_matching_resp_type() {
        use crate::datatypes::SubmitSm;
        let pdu = Pdu::SubmitSm(Box::new(SubmitSm {
            sequence_number: 5,
            ..SubmitSm::default()
        }));
        match invalid_bind_state_response(&pdu) {
            Pdu::SubmitSmResp(r) => {
                assert_eq!(r.command_status, CommandStatus::IncorrectBindStatus);
                assert_eq!(r.sequence_number, 5);
            }
            other => panic!("expected SubmitSmResp, got {other:?}"),
        }

        let unknown = Pdu::Unknown {
            command_id: 0x0000_000A,
            command_status: 0,
            sequence_number: 6,
            body: Default::default(),
        };
        assert!(matches!(
            invalid_bind_state_response(&unknown),
            Pdu::GenericNack(_)
        ));
    }
}
