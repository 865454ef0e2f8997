use super::{AuthProvider, User};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// The provider has not reported anything yet.
    Initializing,
    /// Signed in (`Some`) or signed out (`None`).
    Resolved(Option<User>),
}

/// A registered auth-state listener.
///
/// Counts itself in the provider's listener total for as long as it lives,
/// so every exit path of a waiter, including a timeout or a dropped future,
/// unregisters it.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: watch::Receiver<AuthState>,
    listeners: Arc<AtomicUsize>,
}

impl AuthSubscription {
    pub fn new(rx: watch::Receiver<AuthState>, listeners: Arc<AtomicUsize>) -> Self {
        listeners.fetch_add(1, Ordering::SeqCst);
        Self { rx, listeners }
    }

    /// Waits for the next resolved state. Returns `None` once the provider
    /// has gone away.
    pub async fn next_state(&mut self) -> Option<Option<User>> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            let state = self.rx.borrow_and_update().clone();
            if let AuthState::Resolved(user) = state {
                return Some(user);
            }
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.listeners.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process identity provider.
///
/// Like a hosted provider, a new listener is told about an already resolved
/// state right away, and about every later sign-in or sign-out.
#[derive(Debug)]
pub struct LocalAuth {
    tx: watch::Sender<AuthState>,
    listeners: Arc<AtomicUsize>,
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuth {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AuthState::Initializing);
        Self {
            tx,
            listeners: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn signed_in(user: User) -> Self {
        let auth = Self::new();
        auth.sign_in(user);
        auth
    }

    pub fn signed_out() -> Self {
        let auth = Self::new();
        auth.sign_out();
        auth
    }

    pub fn sign_in(&self, user: User) {
        tracing::debug!(uid = %user.uid, "auth state: signed in");
        self.tx.send_replace(AuthState::Resolved(Some(user)));
    }

    pub fn sign_out(&self) {
        tracing::debug!("auth state: signed out");
        self.tx.send_replace(AuthState::Resolved(None));
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }
}

impl AuthProvider for LocalAuth {
    fn current_user(&self) -> Option<User> {
        match &*self.tx.borrow() {
            AuthState::Resolved(Some(user)) => Some(user.clone()),
            _ => None,
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        let mut rx = self.tx.subscribe();
        if matches!(*rx.borrow(), AuthState::Resolved(_)) {
            rx.mark_changed();
        }
        AuthSubscription::new(rx, Arc::clone(&self.listeners))
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthState, LocalAuth};
    use crate::remote::{AuthProvider, User};

    #[test]
    fn current_user_follows_sign_in_and_out() {
        let auth = LocalAuth::new();
        assert_eq!(auth.current_user(), None);
        assert_eq!(auth.state(), AuthState::Initializing);

        auth.sign_in(User::new("uid-1"));
        assert_eq!(auth.current_user(), Some(User::new("uid-1")));

        auth.sign_out();
        assert_eq!(auth.current_user(), None);
        assert_eq!(auth.state(), AuthState::Resolved(None));
    }

    #[test]
    fn dropping_subscription_unregisters_listener() {
        let auth = LocalAuth::new();
        let first = auth.subscribe();
        let second = auth.subscribe();
        assert_eq!(auth.listener_count(), 2);

        drop(first);
        assert_eq!(auth.listener_count(), 1);
        drop(second);
        assert_eq!(auth.listener_count(), 0);
    }

    #[tokio::test]
    async fn resolved_state_is_delivered_to_new_listener() {
        let auth = LocalAuth::signed_out();
        let mut subscription = auth.subscribe();

        assert_eq!(subscription.next_state().await, Some(None));
    }

    #[tokio::test]
    async fn listener_sees_later_sign_in() {
        let auth = LocalAuth::new();
        let mut subscription = auth.subscribe();

        auth.sign_in(User::new("uid-2"));

        assert_eq!(subscription.next_state().await, Some(Some(User::new("uid-2"))));
    }
}
