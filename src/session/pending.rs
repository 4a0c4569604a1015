// ABOUTME: Outstanding-request table: sequence number -> waiter, deadline, expected response
// ABOUTME: Entries leave only via matching response, timeout, cancellation, or session teardown

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::codec::Pdu;
use crate::datatypes::{CommandId, RESPONSE_BIT};
use crate::error::{SmppError, SmppResult};

struct Entry {
    command_id: u32,
    deadline: Instant,
    /// `None` for fire-and-forget requests (keep-alive probes): the
    /// response is consumed silently and expiry has no waiter to fail.
    tx: Option<oneshot::Sender<SmppResult<Pdu>>>,
}

/// Outcome of offering a response PDU to the table.
pub(crate) enum Completion {
    /// Sequence matched and the command_id was acceptable.
    Completed,
    /// No entry for this sequence; the response is unsolicited.
    Unsolicited,
    /// Sequence matched but the response's command_id does not pair
    /// with the pending request. Protocol violation; tear down.
    Mismatch { expected: u32 },
}

#[derive(Clone)]
pub(crate) struct PendingTable {
    entries: Arc<Mutex<HashMap<u32, Entry>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether a request with this sequence is outstanding.
    #[cfg(test)]
    pub fn contains(&self, sequence: u32) -> bool {
        self.entries.lock().expect("pending lock").contains_key(&sequence)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("pending lock").len()
    }

    /// Register an awaited request. Fails if the sequence is already
    /// in flight, which the wrapping allocator makes unreachable short
    /// of a full counter wrap.
    pub fn insert(
        &self,
        sequence: u32,
        command_id: u32,
        timeout: Duration,
    ) -> Option<ResponseWaiter> {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries.lock().expect("pending lock");
        if entries.contains_key(&sequence) {
            return None;
        }
        entries.insert(
            sequence,
            Entry {
                command_id,
                deadline: Instant::now() + timeout,
                tx: Some(tx),
            },
        );
        Some(ResponseWaiter {
            sequence,
            table: self.clone(),
            rx,
            finished: false,
        })
    }

    /// Register a request whose response nobody awaits.
    pub fn insert_detached(&self, sequence: u32, command_id: u32, timeout: Duration) -> bool {
        let mut entries = self.entries.lock().expect("pending lock");
        if entries.contains_key(&sequence) {
            return false;
        }
        entries.insert(
            sequence,
            Entry {
                command_id,
                deadline: Instant::now() + timeout,
                tx: None,
            },
        );
        true
    }

    /// Offer an inbound response. A generic_nack completes whatever
    /// request it echoes; otherwise the command_id must be the pending
    /// request's response id.
    pub fn complete(&self, pdu: Pdu) -> Completion {
        let sequence = pdu.sequence_number();
        let mut entries = self.entries.lock().expect("pending lock");

        let Some(entry) = entries.get(&sequence) else {
            return Completion::Unsolicited;
        };

        let expected = entry.command_id | RESPONSE_BIT;
        let actual = pdu.command_id();
        if actual != expected && actual != u32::from(CommandId::GenericNack) {
            return Completion::Mismatch { expected };
        }

        let entry = entries.remove(&sequence).expect("entry present");
        if let Some(tx) = entry.tx {
            // A dropped waiter is fine; the entry is gone either way.
            let _ = tx.send(Ok(pdu));
        }
        Completion::Completed
    }

    /// Drop an entry without resolving it (cancellation path).
    pub fn remove(&self, sequence: u32) {
        self.entries.lock().expect("pending lock").remove(&sequence);
    }

    /// Fail every entry whose deadline has passed. Returns how many
    /// expired.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().expect("pending lock");
        let expired: Vec<u32> = entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(&seq, _)| seq)
            .collect();
        for seq in &expired {
            if let Some(entry) = entries.remove(seq) {
                if let Some(tx) = entry.tx {
                    let _ = tx.send(Err(SmppError::Timeout));
                }
            }
        }
        expired.len()
    }

    /// Resolve every remaining waiter with the terminating error.
    pub fn flush(&self, error: &SmppError) {
        let mut entries = self.entries.lock().expect("pending lock");
        for (_, entry) in entries.drain() {
            if let Some(tx) = entry.tx {
                let _ = tx.send(Err(error.clone()));
            }
        }
    }
}

/// Handle to one outstanding request. Dropping it without awaiting
/// cancels the request: the entry is removed and no PDU is sent
/// (SMPP has no cancel primitive on the wire).
pub(crate) struct ResponseWaiter {
    sequence: u32,
    table: PendingTable,
    rx: oneshot::Receiver<SmppResult<Pdu>>,
    finished: bool,
}

impl ResponseWaiter {
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Wait for the response with a deadline. On expiry the entry is
    /// removed and `Timeout` returned; the session stays usable.
    pub async fn wait(mut self, timeout: Duration) -> SmppResult<Pdu> {
        let outcome = tokio::time::timeout(timeout, &mut self.rx).await;
        self.finished = true;
        match outcome {
            Ok(Ok(result)) => result,
            // Sender vanished without resolving: the session died in a
            // way that bypassed the flush.
            Ok(Err(_)) => Err(SmppError::ConnectionClosed),
            Err(_) => {
                self.table.remove(self.sequence);
                Err(SmppError::Timeout)
            }
        }
    }
}

impl Drop for ResponseWaiter {
    fn drop(&mut self) {
        if !self.finished {
            self.table.remove(self.sequence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{EnquireLinkResp, SubmitSmResp};

    fn resp(seq: u32) -> Pdu {
        Pdu::EnquireLinkResp(EnquireLinkResp::new(seq))
    }

    #[tokio::test]
    async fn matching_response_resolves_waiter() {
        let table = PendingTable::new();
        let waiter = table
            .insert(7, CommandId::EnquireLink.into(), Duration::from_secs(5))
            .unwrap();

        assert!(matches!(table.complete(resp(7)), Completion::Completed));
        let pdu = waiter.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(pdu.sequence_number(), 7);
        assert!(!table.contains(7));
    }

    #[tokio::test]
    async fn unsolicited_response_is_reported() {
        let table = PendingTable::new();
        assert!(matches!(table.complete(resp(9)), Completion::Unsolicited));
    }

    #[tokio::test]
    async fn mismatched_command_id_is_a_violation() {
        let table = PendingTable::new();
        let _waiter = table
            .insert(3, CommandId::SubmitSm.into(), Duration::from_secs(5))
            .unwrap();

        match table.complete(resp(3)) {
            Completion::Mismatch { expected } => {
                assert_eq!(expected, u32::from(CommandId::SubmitSmResp));
            }
            _ => panic!("expected mismatch"),
        }
        // the entry survives a mismatch; teardown flushes it
        assert!(table.contains(3));
    }

    #[tokio::test]
    async fn generic_nack_completes_any_request() {
        use crate::datatypes::{CommandStatus, GenericNack};
        let table = PendingTable::new();
        let waiter = table
            .insert(4, CommandId::SubmitSm.into(), Duration::from_secs(5))
            .unwrap();

        let nack = Pdu::GenericNack(GenericNack::error(4, CommandStatus::SystemError));
        assert!(matches!(table.complete(nack), Completion::Completed));
        let pdu = waiter.wait(Duration::from_secs(1)).await.unwrap();
        assert!(matches!(pdu, Pdu::GenericNack(_)));
    }

    #[tokio::test]
    async fn duplicate_sequence_is_rejected() {
        let table = PendingTable::new();
        let _first = table
            .insert(5, CommandId::SubmitSm.into(), Duration::from_secs(5))
            .unwrap();
        assert!(table
            .insert(5, CommandId::SubmitSm.into(), Duration::from_secs(5))
            .is_none());
    }

    #[tokio::test]
    async fn waiter_times_out_and_clears_entry() {
        let table = PendingTable::new();
        let waiter = table
            .insert(6, CommandId::SubmitSm.into(), Duration::from_secs(60))
            .unwrap();

        let err = waiter.wait(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, SmppError::Timeout));
        assert!(!table.contains(6));
    }

    #[tokio::test]
    async fn dropping_waiter_cancels() {
        let table = PendingTable::new();
        let waiter = table
            .insert(8, CommandId::SubmitSm.into(), Duration::from_secs(60))
            .unwrap();
        drop(waiter);
        assert!(!table.contains(8));
    }

    #[tokio::test]
    async fn sweep_fails_expired_entries() {
        let table = PendingTable::new();
        let waiter = table
            .insert(10, CommandId::SubmitSm.into(), Duration::from_millis(0))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(table.sweep(Instant::now()), 1);

        let err = waiter.wait(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, SmppError::Timeout));
    }

    #[tokio::test]
    async fn flush_resolves_all_waiters_with_error() {
        let table = PendingTable::new();
        let w1 = table
            .insert(11, CommandId::SubmitSm.into(), Duration::from_secs(60))
            .unwrap();
        let w2 = table
            .insert(12, CommandId::EnquireLink.into(), Duration::from_secs(60))
            .unwrap();

        table.flush(&SmppError::ConnectionClosed);
        assert!(matches!(
            w1.wait(Duration::from_secs(1)).await.unwrap_err(),
            SmppError::ConnectionClosed
        ));
        assert!(matches!(
            w2.wait(Duration::from_secs(1)).await.unwrap_err(),
            SmppError::ConnectionClosed
        ));
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn detached_entry_consumes_response_silently() {
        let table = PendingTable::new();
        assert!(table.insert_detached(
            13,
            CommandId::EnquireLink.into(),
            Duration::from_secs(5)
        ));
        assert!(matches!(table.complete(resp(13)), Completion::Completed));
        assert!(!table.contains(13));
    }

    #[test]
    fn submit_resp_pairs_with_submit() {
        let table = PendingTable::new();
        let _w = table
            .insert(20, CommandId::SubmitSm.into(), Duration::from_secs(5))
            .unwrap();
        let resp = Pdu::SubmitSmResp(SubmitSmResp::ok(20, Default::default()));
        assert!(matches!(table.complete(resp), Completion::Completed));
    }
}
