//! LIST command handler (RFC 3501 §7.2.2): one `* LIST` line per folder.

use super::super::io::write_line;
use super::super::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) {
    for folder in &mailbox.folders {
        let line = format!("* LIST (\\HasNoChildren) \"/\" \"{}\"\r\n", folder.name);
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }
    let resp = format!("{tag} OK LIST completed\r\n");
    let _ = write_line(stream, &resp).await;
}
