// ABOUTME: Drain-based shutdown state machine for the acceptor and its sessions
// ABOUTME: Running -> Draining stops the accept loop; Terminated means every session closed

use tokio::sync::watch;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ShutdownState {
    Running,
    Draining,
    Terminated,
}

/// Coordinates one-way progress through the shutdown states. All
/// transitions are idempotent; concurrent `stop` calls race benignly.
pub(crate) struct ShutdownCoordinator {
    state: watch::Sender<ShutdownState>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self { state }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    pub fn is_accepting(&self) -> bool {
        self.state() == ShutdownState::Running
    }

    /// Enter Draining. Returns false when shutdown had already begun.
    pub fn begin_drain(&self) -> bool {
        let mut began = false;
        self.state.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::Draining;
                began = true;
                true
            } else {
                false
            }
        });
        if began {
            info!("server draining");
        }
        began
    }

    pub fn terminate(&self) {
        self.state.send_if_modified(|state| {
            if *state != ShutdownState::Terminated {
                *state = ShutdownState::Terminated;
                true
            } else {
                false
            }
        });
    }

    /// Wait until the Terminated state is reached.
    pub async fn terminated(&self) {
        let mut rx = self.subscribe();
        while *rx.borrow_and_update() != ShutdownState::Terminated {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_is_one_way_and_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        assert!(coordinator.is_accepting());

        assert!(coordinator.begin_drain());
        assert!(!coordinator.begin_drain());
        assert!(!coordinator.is_accepting());
        assert_eq!(coordinator.state(), ShutdownState::Draining);

        coordinator.terminate();
        coordinator.terminate();
        assert_eq!(coordinator.state(), ShutdownState::Terminated);
        assert!(!coordinator.begin_drain());
    }

    #[tokio::test]
    async fn terminated_wakes_waiters() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();
        coordinator.begin_drain();
        coordinator.terminate();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ShutdownState::Terminated);
        coordinator.terminated().await;
    }
}
