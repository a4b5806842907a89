//! Line-oriented transport for local operation.
//!
//! Input lines look like `<account_id> <text>`; replies are written as
//! `[<account_id>] <text>`.

use super::{ChatTransport, IncomingMessage, Reply};
use crate::error::ChannelError;
use async_trait::async_trait;
use drip_core::AccountId;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::debug;

pub struct ConsoleTransport<R, W> {
    lines: Mutex<Lines<R>>,
    writer: Mutex<W>,
}

impl ConsoleTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Read stdin, write stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }
}

/// Split `<account_id> <text>`; `None` for blank or malformed lines
pub fn parse_console_line(line: &str) -> Option<IncomingMessage> {
    let line = line.trim();
    let (id, text) = line.split_once(char::is_whitespace)?;
    let account_id: AccountId = id.parse().ok()?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(IncomingMessage::new(account_id, text))
}

#[async_trait]
impl<R, W> ChatTransport for ConsoleTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &'static str {
        "console"
    }

    async fn receive(&self) -> Result<Option<IncomingMessage>, ChannelError> {
        let mut lines = self.lines.lock().await;
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
            let Some(line) = line else {
                return Ok(None);
            };
            match parse_console_line(&line) {
                Some(message) => return Ok(Some(message)),
                None if line.trim().is_empty() => {}
                None => debug!("Skipping malformed console line: {}", line),
            }
        }
    }

    async fn send(&self, reply: Reply) -> Result<(), ChannelError> {
        let mut writer = self.writer.lock().await;
        let rendered = format!("[{}] {}\n", reply.account_id, reply.text);
        writer
            .write_all(rendered.as_bytes())
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console_line() {
        assert_eq!(
            parse_console_line("42 /start 7"),
            Some(IncomingMessage::new(AccountId::new(42), "/start 7"))
        );
        assert_eq!(
            parse_console_line("  -5   0.75 bc1q  "),
            Some(IncomingMessage::new(AccountId::new(-5), "0.75 bc1q"))
        );
        assert_eq!(parse_console_line("/start"), None);
        assert_eq!(parse_console_line("abc /mine"), None);
        assert_eq!(parse_console_line("42"), None);
        assert_eq!(parse_console_line(""), None);
    }

    #[tokio::test]
    async fn test_receive_skips_bad_lines_then_ends() {
        let input: &[u8] = b"1 /mine\n\nnot-a-line\n2 /ad\n";
        let transport = ConsoleTransport::new(input, Vec::new());

        assert_eq!(
            transport.receive().await.unwrap(),
            Some(IncomingMessage::new(AccountId::new(1), "/mine"))
        );
        assert_eq!(
            transport.receive().await.unwrap(),
            Some(IncomingMessage::new(AccountId::new(2), "/ad"))
        );
        assert_eq!(transport.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_writes_tagged_line() {
        let input: &[u8] = b"";
        let transport = ConsoleTransport::new(input, Vec::new());
        transport
            .send(Reply::new(AccountId::new(9), "Balance: 0"))
            .await
            .unwrap();

        let written = String::from_utf8(transport.into_writer()).unwrap();
        assert_eq!(written, "[9] Balance: 0\n");
    }
}
