//! Connectivity monitoring.

use tokio::sync::watch;

/// Source of connectivity state.
///
/// Hosts bridge their platform's network signal into an implementation of
/// this trait. The engine reads the current state as a sync precondition and
/// subscribes to transitions to trigger a sync on reconnect.
pub trait ConnectivityMonitor: Send + Sync {
    /// Returns true if the network is currently reachable.
    fn is_online(&self) -> bool;

    /// Subscribes to connectivity transitions.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity state shared between a host and the engine.
///
/// The host calls [`SharedConnectivity::set_online`]; every subscriber sees
/// the transition.
#[derive(Debug)]
pub struct SharedConnectivity {
    sender: watch::Sender<bool>,
}

impl SharedConnectivity {
    /// Creates a monitor with an initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self { sender }
    }

    /// Creates a monitor that starts online.
    #[must_use]
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Updates the state. Subscribers are only notified on change.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl Default for SharedConnectivity {
    fn default() -> Self {
        Self::online()
    }
}

impl ConnectivityMonitor for SharedConnectivity {
    fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_changes_are_visible() {
        let monitor = SharedConnectivity::new(false);
        assert!(!monitor.is_online());

        monitor.set_online(true);
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn subscribers_are_notified_on_change_only() {
        let monitor = SharedConnectivity::online();
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());

        monitor.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }
}
