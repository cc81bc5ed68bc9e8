//! Main event loop.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info, warn};

use super::session::Session;
use crate::config::Config;
use crate::irc::{connect, LineReader};
use crate::links::{HttpLinkLookup, LinkLookup};
use crate::snapshot::SnapshotStore;
use crate::{BotError, Result};

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The server closed the connection.
    ServerClosed,
    /// The control input reached end of stream.
    ControlClosed,
    /// Ctrl-C.
    Interrupted,
}

/// Connect, run until shutdown and write the snapshot.
pub async fn run(config: Config) -> Result<()> {
    let store = SnapshotStore::new(&config.snapshot.path);
    let pending = store.load();
    let lookup = HttpLinkLookup::new(&config.links)?;

    let (reader, conn) = connect(&config.server.host, config.server.port).await?;
    let control = config
        .control
        .stdin
        .then(|| LineReader::new(tokio::io::stdin()));

    let mut session = Session::new(config, conn, lookup, pending);
    let outcome = match session.register().await {
        Ok(()) => drive(&mut session, reader, control).await,
        Err(e) => Err(e),
    };

    if let Err(e) = store.save(&session.snapshot()) {
        error!("Failed to save snapshot: {}", e);
    }

    match outcome? {
        Shutdown::ServerClosed => Err(BotError::ConnectionClosed),
        Shutdown::ControlClosed | Shutdown::Interrupted => Ok(()),
    }
}

/// Process server lines, control lines and Ctrl-C, one at a time.
///
/// Handler errors and panics are logged and the loop continues; only read
/// errors and end of stream stop it.
pub async fn drive<R, C, W, L>(
    session: &mut Session<W, L>,
    mut reader: LineReader<R>,
    mut control: Option<LineReader<C>>,
) -> Result<Shutdown>
where
    R: AsyncRead + Unpin,
    C: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    L: LinkLookup,
{
    loop {
        tokio::select! {
            line = reader.next_line() => {
                let Some(line) = line? else {
                    warn!("Server closed the connection");
                    return Ok(Shutdown::ServerClosed);
                };
                match AssertUnwindSafe(session.handle_line(&line)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Error handling {:?}: {}", line, e),
                    Err(panic) => {
                        error!("Handler panicked on {:?}: {}", line, panic_message(&*panic))
                    }
                }
            }
            line = async {
                match control.as_mut() {
                    Some(c) => c.next_line().await,
                    None => std::future::pending().await,
                }
            } => {
                let Some(line) = line? else {
                    info!("Control input closed, shutting down");
                    return Ok(Shutdown::ControlClosed);
                };
                if let Err(e) = session.send_control(&line).await {
                    error!("Error sending control line: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                return Ok(Shutdown::Interrupted);
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
