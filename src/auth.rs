//! Authentication capability
//!
//! Authentication is consumed as a capability, not a concrete type: the
//! pool hands a freshly connected, unauthenticated [`ImapClientConn`] to
//! [`ImapAuth::apply`] and expects an authenticated [`ImapSession`] back,
//! or an [`AuthError`]. `PasswordAuth` and `OAuth2Auth` are the two
//! concrete strategies; callers may supply their own.

use std::future::Future;
use std::pin::Pin;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};

use crate::errors::AuthError;
use crate::imap_io::{ImapClientConn, ImapSession};

/// Connection details handed to an [`ImapAuth`] implementation so it can
/// decide, e.g., which SASL mechanism a given host is known to require.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub host: String,
    pub port: u16,
}

/// A pluggable IMAP authentication strategy.
///
/// Implementations take ownership of driving the connection from the
/// unauthenticated `NONAUTH` state into `AUTH`, via whatever command
/// sequence the mechanism requires.
pub trait ImapAuth: Send + Sync {
    /// Authenticate `client`, consuming it and returning the authenticated
    /// session. On failure the underlying connection is dropped; the pool
    /// opens a fresh TCP/TLS connection before retrying.
    fn apply<'a>(
        &'a self,
        client: ImapClientConn,
        ctx: &'a AuthContext,
    ) -> Pin<Box<dyn Future<Output = Result<ImapSession, AuthError>> + Send + 'a>>;
}

/// Plain `LOGIN username password`.
#[derive(Clone)]
pub struct PasswordAuth {
    pub username: String,
    pub password: SecretString,
}

impl PasswordAuth {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

impl ImapAuth for PasswordAuth {
    fn apply<'a>(
        &'a self,
        client: ImapClientConn,
        _ctx: &'a AuthContext,
    ) -> Pin<Box<dyn Future<Output = Result<ImapSession, AuthError>> + Send + 'a>> {
        Box::pin(async move {
            client
                .login(&self.username, self.password.expose_secret())
                .await
                .map_err(|(e, _client)| AuthError::LoginFailed(e.to_string()))
        })
    }
}

/// `AUTHENTICATE XOAUTH2` with a caller-supplied token provider.
///
/// `token_provider` is called fresh on every authentication attempt
/// (including pool-initiated reconnects), so it should return an
/// unexpired access token rather than a cached one.
pub struct OAuth2Auth<F> {
    pub username: String,
    pub token_provider: F,
}

impl<F> OAuth2Auth<F>
where
    F: Fn() -> String + Send + Sync,
{
    pub fn new(username: impl Into<String>, token_provider: F) -> Self {
        Self {
            username: username.into(),
            token_provider,
        }
    }

    /// `"user=<email>\x01auth=Bearer <token>\x01\x01"`, base64-encoded.
    fn xoauth2_string(&self, access_token: &str) -> String {
        let raw = format!(
            "user={}\x01auth=Bearer {}\x01\x01",
            self.username, access_token
        );
        BASE64.encode(raw.as_bytes())
    }
}

impl<F> ImapAuth for OAuth2Auth<F>
where
    F: Fn() -> String + Send + Sync,
{
    fn apply<'a>(
        &'a self,
        client: ImapClientConn,
        _ctx: &'a AuthContext,
    ) -> Pin<Box<dyn Future<Output = Result<ImapSession, AuthError>> + Send + 'a>> {
        Box::pin(async move {
            let token = (self.token_provider)();
            let auth_str = self.xoauth2_string(&token);

            client
                .authenticate("XOAUTH2", &XOAuth2Authenticator { auth_str })
                .await
                .map_err(|(e, _client)| AuthError::OAuth2Failed(e.to_string()))
        })
    }
}

/// No-op auth for talking to pre-authenticated or trusted local test
/// servers. Left in as an explicit, named opt-out rather than letting
/// callers pass `auth: None`.
pub struct NoAuth;

impl ImapAuth for NoAuth {
    fn apply<'a>(
        &'a self,
        client: ImapClientConn,
        _ctx: &'a AuthContext,
    ) -> Pin<Box<dyn Future<Output = Result<ImapSession, AuthError>> + Send + 'a>> {
        Box::pin(async move { Ok(client.into_session()) })
    }
}

struct XOAuth2Authenticator {
    auth_str: String,
}

impl async_imap::Authenticator for XOAuth2Authenticator {
    type Response = String;

    fn process(&mut self, _challenge: &[u8]) -> Self::Response {
        self.auth_str.clone()
    }
}
