//! Per-connection line loop
//!
//! Each line the client sends is one command. Single-line responses are
//! written as one line; multi-line responses (`stats`, `help`, `metrics`)
//! are followed by a line containing only `END`.
//!
//! A line that is not UTF-8 gets `ERR parse: invalid utf-8` and the loop
//! keeps going. A line longer than [`MAX_LINE_LEN`] gets
//! `ERR parse: line too long` and the connection is closed; at most
//! `MAX_LINE_LEN + 1` bytes of it are ever buffered.
//!
//! # Transport keywords
//!
//! Handled here, never reach the cache:
//! - `metrics` → Prometheus text export
//! - `quit` → close the connection

use crate::command::{render_error, CommandProcessor};
use crate::error::Error;
use crate::metrics;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Terminator for multi-line responses
pub const END_MARKER: &str = "END";

/// Longest command line accepted (newline included) before the connection is dropped
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Serves command lines for one client
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    processor: CommandProcessor,
}

impl ConnectionHandler {
    pub fn new(processor: CommandProcessor) -> Self {
        Self { processor }
    }

    /// Run the line loop until the client disconnects or sends `quit`
    pub async fn handle<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = (&mut reader)
                .take(MAX_LINE_LEN as u64 + 1)
                .read_until(b'\n', &mut buf)
                .await?;
            if read == 0 {
                tracing::debug!("Client closed connection");
                break;
            }
            if buf.len() > MAX_LINE_LEN {
                tracing::warn!(limit = MAX_LINE_LEN, "Dropping client after overlong line");
                write_line(&mut writer, &render_error(&Error::parse("line too long"))).await?;
                break;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(_) => {
                    metrics::record_command("invalid", false);
                    write_line(&mut writer, &render_error(&Error::parse("invalid utf-8"))).await?;
                    continue;
                }
            };

            match line.trim() {
                "quit" => break,
                "metrics" => {
                    let text = metrics::export_metrics();
                    write_block(&mut writer, &text).await?;
                }
                _ => match self.processor.handle(line) {
                    Ok(response) if response.is_multiline() => {
                        write_block(&mut writer, &response.to_string()).await?;
                    }
                    Ok(response) => write_line(&mut writer, &response.to_string()).await?,
                    Err(e) => write_line(&mut writer, &render_error(&e)).await?,
                },
            }
        }

        writer.flush().await?;
        Ok(())
    }
}

async fn write_line<W>(writer: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn write_block<W>(writer: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    if !text.ends_with('\n') {
        writer.write_all(b"\n").await?;
    }
    write_line(writer, END_MARKER).await
}
