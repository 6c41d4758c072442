//! Raw byte-stream transport (`nc host 9999`).
//!
//! A client connects, writes its paste and then either closes its write side
//! or simply stops sending. There is no length prefix and no terminator, so a
//! read deadline elapsing is how the server learns the client is done: the
//! first chunk gets the initial deadline, and every chunk after that resets an
//! idle deadline. Slow-but-steady senders can take as long as they like;
//! stalled ones are cut off after one idle window, and whatever arrived by then
//! is the paste.
//!
//! The server answers with exactly one CRLF-terminated line (the paste URL or
//! an error) and closes the connection.

use crate::config::Config;
use crate::constants::{MAX_PAYLOAD_SIZE, PROXY_V1_MAX_LEN, READ_CHUNK_SIZE};
use crate::error::{AppError, Result};
use crate::models::{CreatedPaste, IdKind};
use crate::ratelimit::Admission;
use crate::services::PasteService;
use crate::validation::ValidationError;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};

const PROXY_SIGNATURE: &[u8] = b"PROXY ";

#[derive(Debug, Clone, Copy)]
pub struct ReadTimeouts {
    /// Wait for the first chunk
    pub initial: Duration,
    /// Wait between chunks once data is flowing
    pub idle: Duration,
}

pub struct StreamServer {
    service: Arc<PasteService>,
    admission: Admission,
    timeouts: ReadTimeouts,
    trust_proxy_headers: bool,
    abuse_contact: Option<String>,
}

impl StreamServer {
    pub fn new(service: Arc<PasteService>, admission: Admission, config: &Config) -> Self {
        Self {
            service,
            admission,
            timeouts: ReadTimeouts {
                initial: config.initial_read_timeout,
                idle: config.idle_read_timeout,
            },
            trust_proxy_headers: config.trust_proxy_headers,
            abuse_contact: config.abuse_contact.clone(),
        }
    }

    /// Accept loop: one task per connection.
    ///
    /// Once `shutdown` resolves the listener is closed and the call returns
    /// only after every accepted connection has sent its reply.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Byte-stream listener on {}", addr);
        }

        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_join(finished);
                    continue;
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::error!("Error accepting connection: {}", e);
                        // Usually fd exhaustion; give in-flight connections a moment to finish.
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                },
            };

            let server = self.clone();
            connections.spawn(async move {
                server.handle_connection(stream, peer).await;
            });
        }

        drop(listener);
        tracing::info!(
            in_flight = connections.len(),
            "Byte-stream listener closed, draining connections"
        );
        while let Some(finished) = connections.join_next().await {
            log_join(finished);
        }
    }

    /// Runs one connection to completion. The stream is written to once and
    /// shut down on every path, then dropped when this returns.
    pub async fn handle_connection<S>(&self, mut stream: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (client, outcome) = self.process(&mut stream, peer).await;

        let reply = match outcome {
            Ok(created) => {
                tracing::info!(id = %created.id, client = %client, "Created paste via TCP");
                created.url
            }
            Err(e) => {
                e.log(&client);
                e.client_message(self.abuse_contact.as_deref())
            }
        };

        let line = format!("{}\r\n", reply.replace('\n', "\r\n"));
        if let Err(e) = stream.write_all(line.as_bytes()).await {
            tracing::debug!(client = %client, "Could not deliver reply: {}", e);
        }
        if let Err(e) = stream.shutdown().await {
            tracing::debug!(client = %client, "Shutdown failed: {}", e);
        }
    }

    async fn process<S>(&self, stream: &mut S, peer: SocketAddr) -> (String, Result<CreatedPaste>)
    where
        S: AsyncRead + Unpin,
    {
        let mut client = peer.ip().to_string();
        let mut already_read = Vec::new();

        // The proxy's header is the only thing read before admission control,
        // since until it arrives the real client is unknown.
        if self.trust_proxy_headers {
            match read_proxy_header(&mut *stream, self.timeouts.initial).await {
                Ok((source, rest)) => {
                    if let Some(ip) = source {
                        client = ip.to_string();
                    }
                    already_read = rest;
                }
                Err(e) => return (client, Err(e)),
            }
        }

        if let Err(e) = self.admission.check(&client) {
            return (client, Err(e));
        }

        let outcome = match read_payload(&mut *stream, already_read, self.timeouts).await {
            Ok(content) => self.service.create(&content, IdKind::Standard).await,
            Err(e) => Err(e),
        };

        (client, outcome)
    }
}

fn log_join(finished: std::result::Result<(), JoinError>) {
    if let Err(e) = finished {
        tracing::error!("Connection task failed: {}", e);
    }
}

/// Reads until end of stream or until a deadline passes with nothing new.
///
/// Gives up with `TooLarge` the moment the running total passes
/// [`MAX_PAYLOAD_SIZE`], without buffering the rest.
pub async fn read_payload<R>(
    reader: &mut R,
    mut payload: Vec<u8>,
    timeouts: ReadTimeouts,
) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    let mut deadline = if payload.is_empty() {
        timeouts.initial
    } else {
        timeouts.idle
    };

    loop {
        let n = match tokio::time::timeout(deadline, reader.read(&mut chunk)).await {
            Err(_) => {
                tracing::debug!(bytes = payload.len(), "Read deadline reached, treating as end of input");
                break;
            }
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => {
                tracing::debug!(bytes = payload.len(), "Socket read timed out, treating as end of input");
                break;
            }
            Ok(Err(e)) => return Err(AppError::Read(e)),
        };

        if payload.len() + n > MAX_PAYLOAD_SIZE {
            return Err(ValidationError::TooLarge.into());
        }

        payload.extend_from_slice(&chunk[..n]);
        deadline = timeouts.idle;
    }

    Ok(payload)
}

/// Consumes a PROXY protocol v1 header if the stream starts with one.
///
/// Returns the advertised source address (if any) and every byte read past
/// the header, which belongs to the payload. A stream that does not start
/// with `PROXY ` hands back what was read so far untouched.
async fn read_proxy_header<R>(reader: &mut R, timeout: Duration) -> Result<(Option<IpAddr>, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(PROXY_V1_MAX_LEN);
    let mut chunk = [0u8; PROXY_V1_MAX_LEN];

    loop {
        let prefix = buf.len().min(PROXY_SIGNATURE.len());
        if buf[..prefix] != PROXY_SIGNATURE[..prefix] {
            return Ok((None, buf));
        }

        if let Some(end) = buf.windows(2).position(|w| w == b"\r\n") {
            let source = parse_proxy_v1(&buf[..end]);
            if source.is_none() {
                tracing::debug!("PROXY header without a usable source address");
            }
            return Ok((source, buf[end + 2..].to_vec()));
        }

        if buf.len() >= PROXY_V1_MAX_LEN {
            tracing::warn!("Oversized PROXY header, using peer address");
            return Ok((None, buf));
        }

        // Never read past the longest legal header.
        let want = PROXY_V1_MAX_LEN - buf.len();
        match tokio::time::timeout(timeout, reader.read(&mut chunk[..want])).await {
            Err(_) | Ok(Ok(0)) => return Ok((None, buf)),
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => return Ok((None, buf)),
            Ok(Err(e)) => return Err(AppError::Read(e)),
        }
    }
}

/// `PROXY TCP4 <src> <dst> <sport> <dport>` → `<src>`. `UNKNOWN` yields `None`.
fn parse_proxy_v1(line: &[u8]) -> Option<IpAddr> {
    let line = std::str::from_utf8(line).ok()?;
    let mut fields = line.split(' ');

    if fields.next()? != "PROXY" {
        return None;
    }

    match fields.next()? {
        "TCP4" | "TCP6" => fields.next()?.parse().ok(),
        _ => None,
    }
}
