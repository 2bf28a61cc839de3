//! SELECT/EXAMINE command handler (RFC 3501 §6.3.1/§6.3.2). Both behave
//! identically here — the fixture has no read-only enforcement — so one
//! handler serves both; the caller passes which keyword was sent only to
//! decide the trailing `[READ-WRITE]`/`[READ-ONLY]` response code.

use super::super::io::write_line;
use super::super::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_select<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder_name: &str,
    readonly: bool,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> Option<String> {
    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} NO Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return None;
    };

    let _ = write_line(stream, "* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)\r\n").await;
    let _ = write_line(stream, &format!("* {} EXISTS\r\n", folder.emails.len())).await;
    let _ = write_line(stream, "* 0 RECENT\r\n").await;
    let _ = write_line(stream, "* OK [UIDVALIDITY 1]\r\n").await;

    let uidnext = folder.emails.iter().map(|e| e.uid).max().map_or(1, |max| max + 1);
    let _ = write_line(stream, &format!("* OK [UIDNEXT {uidnext}]\r\n")).await;
    let _ = write_line(stream, "* OK [PERMANENTFLAGS (\\Seen \\Deleted)] Limited\r\n").await;

    if let Some(pos) = folder.emails.iter().position(|e| !e.seen) {
        let _ = write_line(stream, &format!("* OK [UNSEEN {}]\r\n", pos + 1)).await;
    }

    let mode = if readonly { "READ-ONLY" } else { "READ-WRITE" };
    let resp = format!("{tag} OK [{mode}] SELECT completed\r\n");
    let _ = write_line(stream, &resp).await;
    Some(folder_name.to_owned())
}
