//! IMAP wire transport
//!
//! Timeout-bounded wrappers around `async-imap` operations: TCP connect,
//! TLS handshake, greeting, and per-command round-trips. All network calls
//! are TLS-only; the socket timeout comes from [`crate::config::IMAPConfig`].

use std::sync::Arc;
use std::time::Duration;

use async_imap::types::{Capabilities, Fetch, Name};
use futures::TryStreamExt;
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::config::IMAPConfig;
use crate::errors::IMAPError;

/// TLS stream type this crate speaks IMAP over.
pub type ImapStream = tokio_rustls::client::TlsStream<TcpStream>;
/// An unauthenticated connection, pre-`LOGIN`/`AUTHENTICATE`.
pub type ImapClientConn = async_imap::Client<ImapStream>;
/// An authenticated IMAP session.
pub type ImapSession = async_imap::Session<ImapStream>;

/// TCP-connect and complete the TLS handshake, returning an unauthenticated
/// `async-imap` client once the server's greeting has been read.
///
/// Authentication is the caller's responsibility (see [`crate::auth`]) so
/// the pool can plug in `LOGIN` or `AUTHENTICATE XOAUTH2` uniformly.
pub async fn connect(config: &IMAPConfig) -> Result<ImapClientConn, IMAPError> {
    let connect_duration = config.timeout;

    let tcp = timeout(
        connect_duration,
        TcpStream::connect((config.host.as_str(), config.port)),
    )
    .await
    .map_err(|_| IMAPError::Timeout("tcp connect timeout".to_owned()))?
    .map_err(|e| IMAPError::NetworkError(format!("tcp connect failed: {e}")))?;

    if !config.use_ssl {
        return Err(IMAPError::ProtocolError(
            "cleartext IMAP is not supported by this transport; use an auth capability that \
             layers STARTTLS if cleartext bootstrap is required"
                .to_owned(),
        ));
    }

    let tls_config = if config.insecure_skip_cert_verify {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoCertVerification))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };
    let connector = TlsConnector::from(Arc::new(tls_config));

    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|_| IMAPError::ProtocolError("invalid IMAP host for TLS SNI".to_owned()))?;
    let tls_stream = timeout(connect_duration, connector.connect(server_name, tcp))
        .await
        .map_err(|_| IMAPError::Timeout("TLS handshake timeout".to_owned()))?
        .map_err(|e| IMAPError::NetworkError(format!("TLS handshake failed: {e}")))?;

    let mut client = async_imap::Client::new(tls_stream);
    let greeting = timeout(connect_duration, client.read_response())
        .await
        .map_err(|_| IMAPError::Timeout("IMAP greeting timeout".to_owned()))?
        .map_err(|e| IMAPError::NetworkError(format!("IMAP greeting failed: {e}")))?;

    if greeting.is_none() {
        return Err(IMAPError::NetworkError(
            "IMAP server closed connection before greeting".to_owned(),
        ));
    }

    Ok(client)
}

pub async fn noop(config: &IMAPConfig, session: &mut ImapSession) -> Result<(), IMAPError> {
    timeout(config.timeout, session.noop())
        .await
        .map_err(|_| IMAPError::Timeout("NOOP timed out".to_owned()))?
        .map_err(|e| IMAPError::NetworkError(format!("NOOP failed: {e}")))
}

pub async fn capabilities(
    config: &IMAPConfig,
    session: &mut ImapSession,
) -> Result<Capabilities, IMAPError> {
    timeout(config.timeout, session.capabilities())
        .await
        .map_err(|_| IMAPError::Timeout("CAPABILITY timed out".to_owned()))?
        .map_err(|e| IMAPError::NetworkError(format!("CAPABILITY failed: {e}")))
}

pub async fn list_all_mailboxes(
    config: &IMAPConfig,
    session: &mut ImapSession,
) -> Result<Vec<Name>, IMAPError> {
    let stream = timeout(config.timeout, session.list(None, Some("*")))
        .await
        .map_err(|_| IMAPError::Timeout("LIST timed out".to_owned()))?
        .map_err(|e| IMAPError::NetworkError(format!("LIST failed: {e}")))?;

    timeout(config.timeout, stream.try_collect::<Vec<_>>())
        .await
        .map_err(|_| IMAPError::Timeout("LIST stream timed out".to_owned()))?
        .map_err(|e| IMAPError::NetworkError(format!("LIST stream failed: {e}")))
}

pub async fn select(
    config: &IMAPConfig,
    session: &mut ImapSession,
    mailbox: &str,
    readonly: bool,
) -> Result<(), IMAPError> {
    let result = if readonly {
        timeout(config.timeout, session.examine(mailbox)).await
    } else {
        timeout(config.timeout, session.select(mailbox)).await
    };
    result
        .map_err(|_| IMAPError::Timeout(format!("SELECT timed out for mailbox '{mailbox}'")))?
        .map_err(|e| IMAPError::MailboxNotFound(format!("{mailbox}: {e}")))?;
    Ok(())
}

pub async fn status_uidnext(
    config: &IMAPConfig,
    session: &mut ImapSession,
    mailbox: &str,
) -> Result<u32, IMAPError> {
    let mailbox_status = timeout(config.timeout, session.status(mailbox, "(UIDNEXT)"))
        .await
        .map_err(|_| IMAPError::Timeout(format!("STATUS timed out for mailbox '{mailbox}'")))?
        .map_err(|e| IMAPError::ProtocolError(format!("STATUS UIDNEXT failed: {e}")))?;

    mailbox_status
        .uid_next
        .ok_or_else(|| IMAPError::UnparseableResponse {
            what: "STATUS UIDNEXT",
            raw: format!("missing UIDNEXT for '{mailbox}'"),
        })
}

/// `MESSAGES`, `UNSEEN`, `UIDNEXT`, `UIDVALIDITY`. (`HIGHESTMODSEQ` is a
/// CONDSTORE field and out of scope.)
pub async fn status_full(
    config: &IMAPConfig,
    session: &mut ImapSession,
    mailbox: &str,
) -> Result<async_imap::types::Mailbox, IMAPError> {
    timeout(
        config.timeout,
        session.status(mailbox, "(MESSAGES UNSEEN UIDNEXT UIDVALIDITY)"),
    )
    .await
    .map_err(|_| IMAPError::Timeout(format!("STATUS timed out for mailbox '{mailbox}'")))?
    .map_err(|e| IMAPError::ProtocolError(format!("STATUS failed for '{mailbox}': {e}")))
}

pub async fn uid_search(
    config: &IMAPConfig,
    session: &mut ImapSession,
    criteria: &str,
) -> Result<Vec<u32>, IMAPError> {
    let set = timeout(config.timeout, session.uid_search(criteria))
        .await
        .map_err(|_| IMAPError::Timeout("UID SEARCH timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("SEARCH failed: {e}")))?;
    let mut uids: Vec<u32> = set.into_iter().collect();
    uids.sort_unstable();
    Ok(uids)
}

pub async fn uid_fetch(
    config: &IMAPConfig,
    session: &mut ImapSession,
    uid_set: &str,
    query: &str,
) -> Result<Vec<Fetch>, IMAPError> {
    let stream = timeout(config.timeout, session.uid_fetch(uid_set, query))
        .await
        .map_err(|_| IMAPError::Timeout("UID FETCH timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("FETCH failed: {e}")))?;
    timeout(config.timeout, stream.try_collect())
        .await
        .map_err(|_| IMAPError::Timeout("UID FETCH stream timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("FETCH stream failed: {e}")))
}

pub async fn uid_store(
    config: &IMAPConfig,
    session: &mut ImapSession,
    uid_set: &str,
    query: &str,
) -> Result<(), IMAPError> {
    let stream = timeout(config.timeout, session.uid_store(uid_set, query))
        .await
        .map_err(|_| IMAPError::Timeout("UID STORE timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("STORE failed: {e}")))?;
    let _: Vec<Fetch> = timeout(config.timeout, stream.try_collect())
        .await
        .map_err(|_| IMAPError::Timeout("UID STORE stream timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("STORE stream failed: {e}")))?;
    Ok(())
}

pub async fn uid_copy(
    config: &IMAPConfig,
    session: &mut ImapSession,
    uid_set: &str,
    mailbox: &str,
) -> Result<(), IMAPError> {
    timeout(config.timeout, session.uid_copy(uid_set, mailbox))
        .await
        .map_err(|_| IMAPError::Timeout("UID COPY timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("COPY failed: {e}")))
}

pub async fn uid_move(
    config: &IMAPConfig,
    session: &mut ImapSession,
    uid_set: &str,
    mailbox: &str,
) -> Result<(), IMAPError> {
    timeout(config.timeout, session.uid_mv(uid_set, mailbox))
        .await
        .map_err(|_| IMAPError::Timeout("UID MOVE timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("MOVE failed: {e}")))
}

pub async fn uid_expunge(
    config: &IMAPConfig,
    session: &mut ImapSession,
    uid_set: &str,
) -> Result<(), IMAPError> {
    let stream = timeout(config.timeout, session.uid_expunge(uid_set))
        .await
        .map_err(|_| IMAPError::Timeout("UID EXPUNGE timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("UID EXPUNGE failed: {e}")))?;
    let _: Vec<u32> = timeout(config.timeout, stream.try_collect())
        .await
        .map_err(|_| IMAPError::Timeout("UID EXPUNGE stream timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("UID EXPUNGE stream failed: {e}")))?;
    Ok(())
}

pub async fn expunge(config: &IMAPConfig, session: &mut ImapSession) -> Result<(), IMAPError> {
    let stream = timeout(config.timeout, session.expunge())
        .await
        .map_err(|_| IMAPError::Timeout("EXPUNGE timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("EXPUNGE failed: {e}")))?;
    let _: Vec<u32> = timeout(config.timeout, stream.try_collect())
        .await
        .map_err(|_| IMAPError::Timeout("EXPUNGE stream timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("EXPUNGE stream failed: {e}")))?;
    Ok(())
}

/// `APPEND` raw message bytes to `mailbox`.
///
/// `async-imap`'s `append` takes the flag list and internal date as plain
/// `Option<&str>` wire arguments and returns `()` on success — it does not
/// surface `APPENDUID`, so the caller is responsible for learning the new
/// UID some other way (see [`crate::client::ImapClient::append`]).
pub async fn append(
    config: &IMAPConfig,
    session: &mut ImapSession,
    mailbox: &str,
    content: &[u8],
    flags: &[String],
) -> Result<(), IMAPError> {
    let flags_arg = if flags.is_empty() {
        None
    } else {
        Some(format!("({})", flags.join(" ")))
    };

    timeout(
        config.timeout,
        session.append(mailbox, flags_arg.as_deref(), None, content),
    )
    .await
    .map_err(|_| IMAPError::Timeout("APPEND timed out".to_owned()))?
    .map_err(|e| IMAPError::ProtocolError(format!("APPEND failed: {e}")))
}

pub async fn create_mailbox(
    config: &IMAPConfig,
    session: &mut ImapSession,
    name: &str,
) -> Result<(), IMAPError> {
    timeout(config.timeout, session.create(name))
        .await
        .map_err(|_| IMAPError::Timeout("CREATE timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("CREATE '{name}' failed: {e}")))
}

pub async fn delete_mailbox(
    config: &IMAPConfig,
    session: &mut ImapSession,
    name: &str,
) -> Result<(), IMAPError> {
    timeout(config.timeout, session.delete(name))
        .await
        .map_err(|_| IMAPError::Timeout("DELETE timed out".to_owned()))?
        .map_err(|e| IMAPError::ProtocolError(format!("DELETE '{name}' failed: {e}")))
}

pub async fn logout(session: &mut ImapSession) {
    let _ = session.logout().await;
}

/// `UID FETCH <uid> (UID INTERNALDATE BODYSTRUCTURE BODY.PEEK[HEADER])`.
///
/// The first stage of the two-stage fetch: learn the part tree and the
/// top-level headers without pulling any body bytes over the wire yet.
pub async fn uid_fetch_structure(
    config: &IMAPConfig,
    session: &mut ImapSession,
    uid: u32,
) -> Result<Option<Fetch>, IMAPError> {
    let fetches = uid_fetch(
        config,
        session,
        &uid.to_string(),
        "(UID INTERNALDATE BODYSTRUCTURE BODY.PEEK[HEADER])",
    )
    .await?;
    Ok(fetches.into_iter().find(|f| f.uid == Some(uid)))
}

/// `UID FETCH <uid> (BODY.PEEK[<part>.MIME] BODY.PEEK[<part>])`, returning
/// the raw MIME-header bytes and body bytes for one selected part number.
pub async fn uid_fetch_part(
    config: &IMAPConfig,
    session: &mut ImapSession,
    uid: u32,
    part: &str,
) -> Result<Option<(Vec<u8>, Vec<u8>)>, IMAPError> {
    let query = format!("(BODY.PEEK[{part}.MIME] BODY.PEEK[{part}])");
    let fetches = uid_fetch(config, session, &uid.to_string(), &query).await?;
    let Some(fetch) = fetches.into_iter().find(|f| f.uid == Some(uid)) else {
        return Ok(None);
    };

    let mime_section = imap_proto::types::SectionPath::Part(
        part_number_path(part),
        Some(imap_proto::types::MessageSection::Mime),
    );
    let body_section = imap_proto::types::SectionPath::Part(part_number_path(part), None);

    let mime_bytes = fetch.section(&mime_section).unwrap_or(&[]).to_vec();
    let body_bytes = fetch.section(&body_section).unwrap_or(&[]).to_vec();
    Ok(Some((mime_bytes, body_bytes)))
}

/// Parses a dotted IMAP part number (`"2.1"`) into `imap_proto`'s
/// part-number-path representation.
fn part_number_path(part: &str) -> Vec<u32> {
    part.split('.').filter_map(|s| s.parse().ok()).collect()
}

/// Accepts any server certificate unconditionally. Only wired up when
/// [`IMAPConfig::insecure_skip_cert_verify`] is set, for self-signed local
/// test servers and bridge processes — never for a real mail provider.
#[derive(Debug)]
struct NoCertVerification;

impl rustls::client::danger::ServerCertVerifier for NoCertVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls_pki_types::CertificateDer<'_>,
        _intermediates: &[rustls_pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls_pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls_pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls_pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
