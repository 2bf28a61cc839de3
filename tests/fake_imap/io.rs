//! Shared I/O helpers for the fake IMAP server: thin, eagerly-flushed
//! wrappers around `AsyncWriteExt` so every handler writes the same way.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

pub async fn write_line<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    line: &str,
) -> std::io::Result<()> {
    stream.get_mut().write_all(line.as_bytes()).await?;
    stream.get_mut().flush().await
}

pub async fn write_bytes<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    data: &[u8],
) -> std::io::Result<()> {
    stream.get_mut().write_all(data).await?;
    stream.get_mut().flush().await
}
