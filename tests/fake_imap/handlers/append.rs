//! APPEND command handler (RFC 3501 §6.3.11).
//!
//! The client sends the mailbox name and a literal byte count on the
//! command line (`A1 APPEND "Sent" (\Seen) {1234}`), then waits for a `+`
//! continuation before streaming the literal bytes and a trailing CRLF.
//! That continuation handshake is the one piece of the protocol this
//! fixture can't get from `imap-codec`'s one-shot line decode, so APPEND
//! is read directly off the socket here rather than routed through the
//! same typed-command dispatch as `SELECT`/`STORE`/`COPY`.

use super::super::io::write_line;
use super::super::mailbox::{Mailbox, TestEmail};
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, BufReader};

fn extract_mailbox_name(rest: &str) -> Option<String> {
    let start = rest.find('"')?;
    let end = rest[start + 1..].find('"')? + start + 1;
    Some(rest[start + 1..end].to_owned())
}

fn extract_literal_len(rest: &str) -> Option<usize> {
    let start = rest.rfind('{')?;
    let end = rest[start..].find('}')? + start;
    rest[start + 1..end].parse().ok()
}

/// Handle `APPEND <mailbox> [flags] [date] {n}`. `command_line` is the
/// first line already read by the caller (tag plus everything up to the
/// CRLF); the literal bytes are read here directly off `stream`.
pub async fn handle_append<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    command_line: &str,
    mailbox: &Mutex<Mailbox>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = extract_mailbox_name(command_line) else {
        let _ = write_line(stream, &format!("{tag} BAD Malformed APPEND\r\n")).await;
        return;
    };
    let Some(len) = extract_literal_len(command_line) else {
        let _ = write_line(stream, &format!("{tag} BAD Malformed APPEND\r\n")).await;
        return;
    };

    let folder_exists = { mailbox.lock().unwrap().get_folder(&folder_name).is_some() };
    if !folder_exists {
        let _ = write_line(stream, &format!("{tag} NO [TRYCREATE] Folder not found\r\n")).await;
        return;
    }

    if write_line(stream, "+ OK\r\n").await.is_err() {
        return;
    }

    let mut buf = vec![0u8; len];
    if stream.read_exact(&mut buf).await.is_err() {
        return;
    }
    let mut trailer = [0u8; 2];
    let _ = stream.read_exact(&mut trailer).await;

    {
        let mut mb = mailbox.lock().unwrap();
        let folder = mb.get_folder_mut(&folder_name).unwrap();
        let next_uid = folder.emails.iter().map(|e| e.uid).max().map_or(1, |max| max + 1);
        folder.emails.push(TestEmail::from_appended_raw(next_uid, &buf));
    }

    let _ = write_line(stream, &format!("{tag} OK APPEND completed\r\n")).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_mailbox_and_literal_len() {
        let line = "A1 APPEND \"Sent\" (\\Seen) {1234}";
        assert_eq!(extract_mailbox_name(line), Some("Sent".to_owned()));
        assert_eq!(extract_literal_len(line), Some(1234));
    }

    #[test]
    fn extracts_literal_len_without_flags() {
        let line = "A1 APPEND \"INBOX\" {42}";
        assert_eq!(extract_literal_len(line), Some(42));
    }
}
