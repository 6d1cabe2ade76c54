use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::QueueError;
use crate::core::protocol::{Frame, FramedStream, LENGTH_FIELD_LEN};
use crate::core::queue::{MemoryQueue, QueueTransport};

// handles a single client's tcp stream until EOF, a protocol error or shutdown
pub async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    queue: &MemoryQueue,
    max_frame_bytes: usize,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mut framed = FramedStream::new(stream, max_frame_bytes);

    loop {
        let read = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            read = framed.read_frame() => read,
        };

        let request = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!(target: "broker", %peer, "Client disconnected");
                return Ok(());
            }
            Err(QueueError::Protocol(e)) => {
                // drop the connection to protect the broker
                warn!(target: "broker", %peer, error = %e, "Closing connection after protocol error");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let reply = match request {
            Frame::Push {
                channel,
                payload,
                front,
            } => {
                if front {
                    queue.push_front(&channel, payload).await?;
                } else {
                    queue.push(&channel, payload).await?;
                }
                Frame::Ok
            }
            Frame::Pop {
                channel,
                timeout_ms,
            } => {
                // Watch the socket while waiting: a popper that hangs up must
                // not claim an item it can never receive.
                let pop = queue.pop(&channel, Duration::from_millis(timeout_ms));
                tokio::pin!(pop);
                let popped = loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        popped = &mut pop => break popped?,
                        read = framed.fill() => match read? {
                            0 => {
                                info!(target: "broker", %peer, %channel, "Client disconnected during pop");
                                return Ok(());
                            }
                            _ if framed.buffered() > max_frame_bytes + LENGTH_FIELD_LEN => {
                                warn!(target: "broker", %peer, "Closing connection that pipelined past a pending pop");
                                return Ok(());
                            }
                            // early bytes of the next request; decoded after this reply
                            _ => continue,
                        },
                    }
                };
                match popped {
                    Some(item) => {
                        let reply = Frame::Item(item);
                        if let Err(e) = framed.write_frame(&reply).await {
                            if let Frame::Item(item) = reply {
                                debug!(target: "broker", %peer, %channel, "Returning undelivered item to channel head");
                                queue.push_front(&channel, item).await?;
                            }
                            return Err(e.into());
                        }
                        continue;
                    }
                    None => Frame::Empty,
                }
            }
            Frame::Len { channel } => Frame::Count(queue.len(&channel).await? as u64),
            other => Frame::Error(format!("unexpected request frame {:?}", other.frame_type())),
        };

        framed.write_frame(&reply).await?;
    }
}
