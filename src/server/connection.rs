use crate::lifecycle::PodManager;
use crate::metrics::ProxyMetrics;
use crate::server::dispatch::dispatch;
use crate::Result;
use bytes::{Bytes, BytesMut};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use podproxy_common::{ErrorKind, ProxyCommand, ProxyResponse};
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

type FrameSink = SplitSink<Framed<TcpStream, LengthDelimitedCodec>, Bytes>;
type FrameStream = SplitStream<Framed<TcpStream, LengthDelimitedCodec>>;
type Pending = VecDeque<io::Result<BytesMut>>;

/// Frames read ahead while a lookup is polling. Past this the handler stops
/// reading and the peer sees TCP backpressure.
const MAX_PENDING_FRAMES: usize = 32;

/// Keeps the active connection gauge honest however the handler exits.
struct ActiveConnection(ProxyMetrics);

impl ActiveConnection {
    fn open(metrics: &ProxyMetrics) -> Self {
        metrics.active_connections.inc();
        Self(metrics.clone())
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.0.active_connections.dec();
    }
}

/// Serve one connection until the peer closes it.
///
/// Commands run one at a time in arrival order and each gets exactly one
/// response. A frame that cannot be decoded is answered with a protocol
/// error and ends the connection. Closing the connection while a container
/// id lookup is polling abandons the lookup.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    manager: Arc<PodManager>,
    metrics: ProxyMetrics,
    max_frame_length: usize,
) -> Result<()> {
    let _active = ActiveConnection::open(&metrics);

    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_length)
        .new_codec();
    let (mut sink, mut frames) = Framed::new(stream, codec).split();

    // Frames read ahead while a command was still running.
    let mut pending = Pending::new();

    loop {
        let next = match pending.pop_front() {
            Some(frame) => Some(frame),
            None => frames.next().await,
        };

        let frame = match next {
            // Orderly close, including a zero-length read.
            None => {
                debug!(%peer, "Connection closed by peer");
                return Ok(());
            }
            Some(Ok(frame)) => frame,
            Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => {
                return reject(&mut sink, &metrics, peer, e.to_string()).await;
            }
            Some(Err(e)) => {
                debug!(%peer, error = %e, "Connection read failed");
                return Ok(());
            }
        };

        let command = match ProxyCommand::decode(&frame) {
            Ok(command) => command,
            Err(e) => return reject(&mut sink, &metrics, peer, e.to_string()).await,
        };
        let verb = command.verb();
        debug!(%peer, command = verb, "Received command");

        let response = match command {
            ProxyCommand::ResolveContainerId(_) => {
                match run_watching_peer(&manager, &command, &mut frames, &mut pending).await {
                    Some(response) => response,
                    None => {
                        info!(%peer, command = verb, "Peer went away, abandoning command");
                        metrics.record_command(verb, "cancelled");
                        finish_pending(&manager, &metrics, peer, pending).await;
                        return Ok(());
                    }
                }
            }
            // Mutations always run to completion so a caller that sends and
            // hangs up still gets its pod.
            _ => dispatch(&manager, &command).await,
        };

        metrics.record_command(verb, response.outcome());
        if let ProxyResponse::Error { kind, message } = &response {
            debug!(%peer, command = verb, %kind, %message, "Command failed");
        }

        if let Err(e) = send(&mut sink, &response).await {
            debug!(%peer, error = %e, "Could not deliver response");
            return Ok(());
        }
    }
}

/// Run `command` while watching the read half for the peer hanging up.
///
/// Returns `None` if the peer closed first. Frames that arrive meanwhile are
/// queued in `pending` and handled after this command's response. The read
/// half stays watched until the queue is full or a framing error is queued,
/// since the codec yields nothing useful after an error.
async fn run_watching_peer(
    manager: &PodManager,
    command: &ProxyCommand,
    frames: &mut FrameStream,
    pending: &mut Pending,
) -> Option<ProxyResponse> {
    let op = dispatch(manager, command);
    tokio::pin!(op);

    loop {
        let watching = pending.len() < MAX_PENDING_FRAMES
            && !matches!(pending.back(), Some(Err(_)));

        tokio::select! {
            response = &mut op => return Some(response),
            next = frames.next(), if watching => match next {
                Some(Ok(frame)) => pending.push_back(Ok(frame)),
                Some(Err(e)) if e.kind() == io::ErrorKind::InvalidData => pending.push_back(Err(e)),
                _ => return None,
            }
        }
    }
}

/// Apply mutations that were queued behind an abandoned lookup.
///
/// Nobody is left to read the responses, but a pod the caller asked for is
/// still created or deleted. Further lookups are skipped.
async fn finish_pending(
    manager: &PodManager,
    metrics: &ProxyMetrics,
    peer: SocketAddr,
    pending: Pending,
) {
    for frame in pending {
        let Ok(frame) = frame else { break };
        let Ok(command) = ProxyCommand::decode(&frame) else {
            break;
        };
        let verb = command.verb();

        if let ProxyCommand::ResolveContainerId(_) = command {
            metrics.record_command(verb, "cancelled");
            continue;
        }

        debug!(%peer, command = verb, "Applying command queued before hang-up");
        let response = dispatch(manager, &command).await;
        metrics.record_command(verb, response.outcome());
    }
}

async fn reject(
    sink: &mut FrameSink,
    metrics: &ProxyMetrics,
    peer: SocketAddr,
    reason: String,
) -> Result<()> {
    warn!(%peer, %reason, "Rejecting malformed message, closing connection");
    metrics.record_command("unknown", ErrorKind::Protocol.as_str());

    let response = ProxyResponse::error(ErrorKind::Protocol, reason);
    if let Err(e) = send(sink, &response).await {
        debug!(%peer, error = %e, "Could not deliver protocol error");
    }
    Ok(())
}

async fn send(sink: &mut FrameSink, response: &ProxyResponse) -> io::Result<()> {
    let payload = response
        .encode()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    sink.send(Bytes::from(payload)).await
}
