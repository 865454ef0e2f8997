//! Resolves the signed-in user, waiting out the provider's start-up.

use crate::error::AppError;
use crate::remote::{AuthProvider, User};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_millis(5000);

pub struct SessionResolver<A> {
    auth: Arc<A>,
    timeout: Option<Duration>,
}

impl<A> Clone for SessionResolver<A> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            timeout: self.timeout,
        }
    }
}

impl<A: AuthProvider> SessionResolver<A> {
    pub fn new(auth: Arc<A>, timeout: Option<Duration>) -> Self {
        Self { auth, timeout }
    }

    pub async fn wait_for_user(&self) -> Result<User, AppError> {
        self.wait_for_user_within(self.timeout).await
    }

    /// Returns the resolved identity, suspending until the provider's first
    /// state notification if none is known yet.
    ///
    /// A single listener is registered while waiting and released on every
    /// exit path.
    pub async fn wait_for_user_within(&self, timeout: Option<Duration>) -> Result<User, AppError> {
        if let Some(user) = self.auth.current_user() {
            return Ok(user);
        }

        let mut subscription = self.auth.subscribe();
        let notified = match timeout {
            Some(limit) => tokio::time::timeout(limit, subscription.next_state())
                .await
                .map_err(|_| {
                    tracing::warn!(timeout_ms = limit.as_millis(), "timed out waiting for user");
                    AppError::timeout("timed out waiting for user authentication")
                })?,
            None => subscription.next_state().await,
        };

        notified
            .flatten()
            .ok_or_else(|| AppError::not_authenticated("no user signed in"))
    }
}

#[cfg(test)]
mod tests {
    use super::SessionResolver;
    use crate::remote::{LocalAuth, User};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn resolved_user_returns_without_listening() {
        let auth = Arc::new(LocalAuth::signed_in(User::new("uid-1")));
        let resolver = SessionResolver::new(Arc::clone(&auth), None);

        let user = resolver.wait_for_user().await.unwrap();

        assert_eq!(user.uid, "uid-1");
        assert_eq!(auth.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_late_sign_in() {
        let auth = Arc::new(LocalAuth::new());
        let resolver = SessionResolver::new(Arc::clone(&auth), Some(Duration::from_secs(5)));

        let sign_in = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert_eq!(auth.listener_count(), 1);
            auth.sign_in(User::new("uid-late"));
        };
        let (user, ()) = tokio::join!(resolver.wait_for_user(), sign_in);

        assert_eq!(user.unwrap().uid, "uid-late");
        assert_eq!(auth.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_and_releases_listener() {
        let auth = Arc::new(LocalAuth::new());
        let resolver = SessionResolver::new(Arc::clone(&auth), Some(Duration::from_millis(50)));

        let err = resolver.wait_for_user().await.unwrap_err();

        assert_eq!(err.code(), "timeout");
        assert_eq!(auth.listener_count(), 0);
    }

    #[tokio::test]
    async fn signed_out_notification_is_not_authenticated() {
        let auth = Arc::new(LocalAuth::signed_out());
        let resolver = SessionResolver::new(Arc::clone(&auth), None);

        let err = resolver.wait_for_user().await.unwrap_err();

        assert_eq!(err.code(), "not_authenticated");
        assert_eq!(auth.listener_count(), 0);
    }

    #[tokio::test]
    async fn subscription_ends_when_provider_drops() {
        let auth = Arc::new(LocalAuth::new());
        let resolver = SessionResolver::new(Arc::clone(&auth), None);
        let mut subscription = crate::remote::AuthProvider::subscribe(auth.as_ref());
        drop(auth);
        drop(resolver);

        assert_eq!(subscription.next_state().await, None);
    }
}
