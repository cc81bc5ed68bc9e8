//! Connection plumbing: inbound line framing and paced outbound writes.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::encoding::{decode_line, strip_terminator};
use super::pacer::{FloodController, Priority};
use crate::Result;

/// Reads LF-delimited lines and decodes them to text.
///
/// `next_line` is cancellation safe: bytes of a partially received line stay
/// buffered until the rest arrives, so it can be used in `tokio::select!`.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a byte stream.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::with_capacity(512),
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let line = decode_line(strip_terminator(&self.buf));
        self.buf.clear();
        Ok(Some(line))
    }
}

/// Writer half of the session: every outbound line goes through the pacer.
pub struct Connection<W> {
    writer: W,
    pacer: FloodController,
}

impl<W: AsyncWrite + Unpin> Connection<W> {
    /// Wrap a writer with a fresh pacer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pacer: FloodController::new(),
        }
    }

    /// Submit a line; it is written now or queued behind a probe.
    pub async fn send(&mut self, line: impl Into<String>, priority: Priority) -> Result<()> {
        let ready = self.pacer.submit(line, priority);
        self.write_lines(ready).await
    }

    /// Submit several lines with the same priority, preserving their order.
    pub async fn send_all<I>(&mut self, lines: I, priority: Priority) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        for line in lines {
            self.send(line, priority).await?;
        }
        Ok(())
    }

    /// The server answered the probe; flush what the new budget allows.
    pub async fn acknowledge_probe(&mut self) -> Result<()> {
        if self.pacer.queued() > 0 {
            debug!("flood check answered, replaying {} lines", self.pacer.queued());
        }
        let ready = self.pacer.acknowledge();
        self.write_lines(ready).await
    }

    /// Pacer state, for inspection.
    pub fn pacer(&self) -> &FloodController {
        &self.pacer
    }

    /// The underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    async fn write_lines(&mut self, lines: Vec<String>) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        for line in lines {
            match line.find(" :AUTH ") {
                Some(at) => debug!("--> {} :AUTH ***", &line[..at]),
                None => debug!("--> {}", line),
            }
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }
}

/// Open a TCP connection to the server.
pub async fn connect(
    host: &str,
    port: u16,
) -> Result<(LineReader<OwnedReadHalf>, Connection<OwnedWriteHalf>)> {
    let stream = TcpStream::connect((host, port)).await?;
    info!("Connected to {}:{} ({})", host, port, stream.peer_addr()?);
    let (read_half, write_half) = stream.into_split();
    Ok((LineReader::new(read_half), Connection::new(write_half)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irc::pacer::PROBE_TOKEN;

    fn written(conn: &Connection<Vec<u8>>) -> String {
        String::from_utf8(conn.get_ref().clone()).unwrap()
    }

    #[tokio::test]
    async fn test_line_reader_splits_lines() {
        let data: &[u8] = b"PING :a\r\n:srv 001 bot :hi\nlast";
        let mut reader = LineReader::new(data);

        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("PING :a"));
        assert_eq!(
            reader.next_line().await.unwrap().as_deref(),
            Some(":srv 001 bot :hi")
        );
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_reader_decodes_legacy_bytes() {
        let data: &[u8] = b":a!b@c PRIVMSG #x :J\xf6rg\r\n";
        let mut reader = LineReader::new(data);
        assert_eq!(
            reader.next_line().await.unwrap().as_deref(),
            Some(":a!b@c PRIVMSG #x :Jörg")
        );
    }

    #[tokio::test]
    async fn test_connection_writes_crlf() {
        let mut conn = Connection::new(Vec::new());
        conn.send("NICK bot", Priority::Normal).await.unwrap();
        conn.send("USER bot 8 * :Bot", Priority::Normal).await.unwrap();
        assert_eq!(written(&conn), "NICK bot\r\nUSER bot 8 * :Bot\r\n");
    }

    #[tokio::test]
    async fn test_connection_probe_and_replay() {
        let mut conn = Connection::new(Vec::new());
        let big = "x".repeat(1000);
        conn.send(big.clone(), Priority::Normal).await.unwrap();
        conn.send("PRIVMSG #a :queued", Priority::Normal).await.unwrap();

        assert_eq!(written(&conn), format!("{big}\r\n{PROBE_TOKEN}\r\n"));
        assert_eq!(conn.pacer().queued(), 1);

        conn.acknowledge_probe().await.unwrap();
        assert_eq!(
            written(&conn),
            format!("{big}\r\n{PROBE_TOKEN}\r\nPRIVMSG #a :queued\r\n")
        );
    }
}
