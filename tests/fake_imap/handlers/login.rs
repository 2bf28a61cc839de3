//! LOGIN command handler. Accepts any credentials — the fixture's auth
//! surface under test is `insecure_skip_cert_verify`'s TLS path, not the
//! credential check itself.

use super::super::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(tag: &str, stream: &mut BufReader<S>) -> bool {
    let resp = format!("{tag} OK LOGIN completed\r\n");
    write_line(stream, &resp).await.is_ok()
}
