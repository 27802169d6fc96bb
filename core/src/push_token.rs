//! Bounded wait for a push-notification registration token.
//!
//! The token arrives from whichever of two paths fires first: the SDK's
//! refresh callback (push) or an explicit token request issued at startup
//! (pull). Both feed the same latch. Waiters observe the first non-null
//! value; later re-deliveries overwrite the held value and are seen by
//! waiters registered after that point.

use async_trait::async_trait;
use startgate_async_utils::OrElapsedExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;
use tracing::warn;

/// Capability interface over the platform messaging SDK.
#[async_trait]
pub trait PushTokenSource: Send + Sync {
    /// One-shot pull of the current registration token.
    async fn request_token(&self) -> Option<String>;

    /// Wire the SDK's refresh callback to `handle`. The adapter should call
    /// [`PushTokenHandle::deliver`] on every token (re-)delivery.
    fn on_token_refresh(&self, handle: PushTokenHandle);
}

/// Write side of the token latch, handed to SDK adapters.
#[derive(Clone)]
pub struct PushTokenHandle {
    tx: watch::Sender<Option<String>>,
}

impl PushTokenHandle {
    pub fn deliver(&self, token: String) {
        debug!("push token delivered");
        self.tx.send_replace(Some(token));
    }
}

/// At-most-once token latch with fan-out notification.
pub struct PushTokenWaiter {
    tx: watch::Sender<Option<String>>,
}

impl Default for PushTokenWaiter {
    fn default() -> Self {
        Self::new()
    }
}

impl PushTokenWaiter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn handle(&self) -> PushTokenHandle {
        PushTokenHandle {
            tx: self.tx.clone(),
        }
    }

    /// Token currently held by the latch, if any.
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Registers the refresh callback and kicks off the pull request.
    ///
    /// Must be called from within a tokio runtime; the pull runs as a
    /// detached task so startup is never blocked on the SDK.
    pub fn start(&self, source: Arc<dyn PushTokenSource>) {
        source.on_token_refresh(self.handle());
        let handle = self.handle();
        tokio::spawn(async move {
            match source.request_token().await {
                Some(token) => handle.deliver(token),
                None => warn!("push token pull returned nothing"),
            }
        });
    }

    /// Resolves with the held token immediately, or waits until a token
    /// arrives or `timeout` elapses. On timeout, returns whatever the latch
    /// holds at that instant (possibly `None`).
    pub async fn wait_for_token(&self, timeout: Duration) -> Option<String> {
        let mut rx = self.tx.subscribe();
        if let Some(token) = self.current() {
            return Some(token);
        }
        let arrival = async move {
            match rx.wait_for(|held| held.is_some()).await {
                Ok(held) => held.clone(),
                // Sender dropped; nothing will ever arrive.
                Err(_) => None,
            }
        };
        match arrival.or_elapsed(timeout).await {
            Ok(Some(token)) => Some(token),
            _ => self.current(),
        }
    }
}
