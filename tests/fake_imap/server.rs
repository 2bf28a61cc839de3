//! In-process fake IMAP server used by the integration suite.
//!
//! Speaks just enough IMAP4rev1 over implicit TLS to drive this crate's
//! connection lifecycle end to end: TLS handshake -> greeting -> LOGIN ->
//! SELECT -> SEARCH/FETCH/STORE/COPY/EXPUNGE/APPEND -> LOGOUT. Unlike a
//! server reached through STARTTLS, the client here dials straight into
//! TLS, so the greeting is written after the handshake completes rather
//! than before it.
//!
//! `CAPABILITY`, `NOOP`, `LOGIN`, `LOGOUT`, `LIST`, `SELECT`/`EXAMINE`,
//! `UID STORE`, `UID COPY` and `EXPUNGE` are parsed with `imap-codec`'s
//! typed `Command` decoder. `UID SEARCH`, `UID FETCH` and `APPEND` are
//! detected by keyword before the decoder ever sees them and handed to
//! the raw-text handlers instead (see `handlers/uid_search.rs`,
//! `handlers/uid_fetch.rs`, `handlers/append.rs` for why).

use super::handlers::{
    handle_append, handle_capability, handle_expunge, handle_list, handle_login, handle_logout,
    handle_noop, handle_select, handle_uid_copy, handle_uid_fetch, handle_uid_search,
    handle_uid_store, StoreArgs,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use imap_codec::CommandCodec;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// A fake IMAP server bound to an OS-assigned localhost port, reachable
/// only over TLS (matching this crate's implicit-TLS connection path).
pub struct FakeImapServer {
    port: u16,
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    pub async fn start(mailbox: Mailbox) -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()]).expect("generate self-signed cert");
        let cert_der = cert.cert.der().clone();
        let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der.into())
            .expect("build server TLS config");

        let acceptor = TlsAcceptor::from(Arc::new(tls_config));
        let mailbox = Arc::new(Mutex::new(mailbox));

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let acceptor = acceptor.clone();
                let mailbox = mailbox.clone();
                tokio::spawn(async move {
                    handle_connection(stream, acceptor, &mailbox).await;
                });
            }
        });

        Self { port, _handle: handle }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }
}

async fn handle_connection(stream: tokio::net::TcpStream, acceptor: TlsAcceptor, mailbox: &Mutex<Mailbox>) {
    let Ok(tls_stream) = acceptor.accept(stream).await else {
        return;
    };
    let mut reader = BufReader::new(tls_stream);
    if write_line(&mut reader, "* OK IMAP4rev1 Fake server ready\r\n").await.is_err() {
        return;
    }
    handle_imap_session(reader, mailbox).await;
}

fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

fn extract_tag(trimmed: &str) -> &str {
    trimmed.split_whitespace().next().unwrap_or("*")
}

#[allow(clippy::too_many_lines)]
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(mut reader: BufReader<S>, mailbox: &Mutex<Mailbox>) {
    let mut selected_folder: Option<String> = None;
    let codec = CommandCodec::default();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        let tag = extract_tag(trimmed);
        let upper = trimmed.to_uppercase();

        if upper.contains("APPEND") {
            handle_append(tag, trimmed, mailbox, &mut reader).await;
            continue;
        }
        if upper.contains("SEARCH") {
            let snap = mailbox.lock().unwrap().clone();
            handle_uid_search(tag, trimmed, &snap, selected_folder.as_deref(), &mut reader).await;
            continue;
        }
        if upper.contains("FETCH") {
            let snap = mailbox.lock().unwrap().clone();
            handle_uid_fetch(tag, trimmed, &snap, selected_folder.as_deref(), &mut reader).await;
            continue;
        }

        let line_bytes = line.as_bytes();
        let Ok((_, command)) = codec.decode(line_bytes) else {
            let resp = format!("{tag} BAD Parse error\r\n");
            if write_line(&mut reader, &resp).await.is_err() {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();
        let snap = mailbox.lock().unwrap().clone();

        match command.body {
            CommandBody::Capability => {
                handle_capability(tag, &mut reader).await;
            }
            CommandBody::Noop => {
                handle_noop(tag, &mut reader).await;
            }
            CommandBody::Login { .. } => {
                if !handle_login(tag, &mut reader).await {
                    break;
                }
            }
            CommandBody::List { .. } => {
                handle_list(tag, &snap, &mut reader).await;
            }
            CommandBody::Select { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                selected_folder = handle_select(tag, &name, false, &snap, &mut reader).await;
            }
            CommandBody::Examine { mailbox: mb, .. } => {
                let name = mailbox_name(&mb);
                selected_folder = handle_select(tag, &name, true, &snap, &mut reader).await;
            }
            CommandBody::Store { ref sequence_set, uid: true, ref kind, ref response, ref flags, .. } => {
                let args = StoreArgs { sequence_set, kind, response, flags };
                handle_uid_store(tag, &args, mailbox, selected_folder.as_deref(), &mut reader).await;
            }
            CommandBody::Copy { ref sequence_set, mailbox: ref dest_mb, uid: true, .. } => {
                let dest_name = mailbox_name(dest_mb);
                handle_uid_copy(tag, sequence_set, &dest_name, mailbox, selected_folder.as_deref(), &mut reader)
                    .await;
            }
            CommandBody::Expunge => {
                handle_expunge(tag, mailbox, selected_folder.as_deref(), &mut reader).await;
            }
            CommandBody::Logout => {
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ => {
                let resp = format!("{tag} BAD Unknown command\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    break;
                }
            }
        }
    }
}
