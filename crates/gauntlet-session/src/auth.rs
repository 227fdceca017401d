//! Authentication hook for the handshake.
//!
//! Gauntlet does not issue credentials. The account service does, and the
//! server only needs to turn a bearer token into an [`Identity`]. Implement
//! [`Authenticator`] against that service; the demo binary ships a
//! development implementation that accepts anyone.

use crate::SessionError;

/// Who a connection belongs to, as vouched for by the auth service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: u64,
    /// Default player name. May be blank.
    pub display_name: String,
}

/// Validates a client's bearer token.
///
/// # Example
///
/// ```rust
/// use gauntlet_session::{Authenticator, Identity, SessionError};
///
/// /// Accepts numeric tokens and uses them as the user id.
/// struct NumericAuthenticator;
///
/// impl Authenticator for NumericAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
///         let user_id: u64 = token
///             .parse()
///             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
///         Ok(Identity {
///             user_id,
///             display_name: String::new(),
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Resolves `token` to an identity.
    ///
    /// `token` is empty when the client sent none.
    ///
    /// # Errors
    /// Returns [`SessionError::AuthFailed`] if the token is rejected.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, SessionError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectAll;

    impl Authenticator for RejectAll {
        async fn authenticate(&self, _token: &str) -> Result<Identity, SessionError> {
            Err(SessionError::AuthFailed("closed beta".into()))
        }
    }

    struct EchoName;

    impl Authenticator for EchoName {
        async fn authenticate(&self, token: &str) -> Result<Identity, SessionError> {
            Ok(Identity {
                user_id: token.len() as u64,
                display_name: token.to_owned(),
            })
        }
    }

    #[tokio::test]
    async fn test_authenticate_rejecting_impl_returns_auth_failed() {
        let err = RejectAll.authenticate("anything").await.unwrap_err();
        assert!(matches!(err, SessionError::AuthFailed(msg) if msg == "closed beta"));
    }

    #[tokio::test]
    async fn test_authenticate_accepting_impl_returns_identity() {
        let identity = EchoName.authenticate("ada").await.unwrap();
        assert_eq!(identity.user_id, 3);
        assert_eq!(identity.display_name, "ada");
    }
}
