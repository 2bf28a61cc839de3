//! NOOP command handler (RFC 3501 §6.1.2). Used as a keepalive/pool probe.

use super::super::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_noop<S: AsyncRead + AsyncWrite + Unpin>(tag: &str, stream: &mut BufReader<S>) {
    let resp = format!("{tag} OK NOOP completed\r\n");
    let _ = write_line(stream, &resp).await;
}
