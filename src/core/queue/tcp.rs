//! Queue transport backed by a single TCP connection to a `vsmq-broker`.
//!
//! Requests are strictly request/reply and serialized on the connection. A
//! caller may drop a request future half way (the subscriber does exactly
//! that to a pending POP when it is stopped); the next request first reads
//! the orphaned reply and, if it carried an item, pushes that item back to
//! the head of its channel. A connection that failed or was abandoned mid
//! write is replaced with a fresh one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::error::QueueError;
use crate::core::protocol::{Frame, FramedStream, DEFAULT_MAX_FRAME_BYTES};
use crate::core::queue::{Connector, QueueTransport};

#[derive(Debug)]
enum InFlight {
    Clean,
    /// Stream state unknown (error or cancelled write); reconnect before use.
    Broken,
    /// A request went out but its reply was never read.
    Awaiting { requeue: Option<String> },
}

#[derive(Debug)]
struct Connection {
    framed: FramedStream<TcpStream>,
    in_flight: InFlight,
}

fn closed() -> QueueError {
    QueueError::Transport(std::io::Error::new(
        std::io::ErrorKind::ConnectionAborted,
        "queue service closed the connection",
    ))
}

fn unexpected(reply: Frame) -> QueueError {
    QueueError::Broker(format!("unexpected reply: {:?}", reply.frame_type()))
}

impl Connection {
    async fn open(addr: &str, max_frame_bytes: usize) -> Result<Self, QueueError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: FramedStream::new(stream, max_frame_bytes),
            in_flight: InFlight::Clean,
        })
    }

    async fn recover(&mut self, addr: &str, max_frame_bytes: usize) -> Result<(), QueueError> {
        match std::mem::replace(&mut self.in_flight, InFlight::Broken) {
            InFlight::Clean => {
                self.in_flight = InFlight::Clean;
                Ok(())
            }
            InFlight::Broken => {
                warn!(target: "tcp_queue", %addr, "Reconnecting to queue service");
                *self = Connection::open(addr, max_frame_bytes).await?;
                Ok(())
            }
            InFlight::Awaiting { requeue } => {
                self.in_flight = InFlight::Awaiting {
                    requeue: requeue.clone(),
                };
                let reply = self.read_reply().await?;
                self.in_flight = InFlight::Clean;
                if let (Some(channel), Frame::Item(payload)) = (requeue, reply) {
                    debug!(target: "tcp_queue", %channel, "Returning orphaned item to channel head");
                    self.call(Frame::Push {
                        channel,
                        payload,
                        front: true,
                    })
                    .await?;
                }
                Ok(())
            }
        }
    }

    async fn read_reply(&mut self) -> Result<Frame, QueueError> {
        match self.framed.read_frame().await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => {
                self.in_flight = InFlight::Broken;
                Err(closed())
            }
            Err(e) => {
                self.in_flight = InFlight::Broken;
                Err(e)
            }
        }
    }

    async fn call(&mut self, request: Frame) -> Result<Frame, QueueError> {
        let requeue = match &request {
            Frame::Pop { channel, .. } => Some(channel.clone()),
            _ => None,
        };

        self.in_flight = InFlight::Broken;
        self.framed.write_frame(&request).await?;
        self.in_flight = InFlight::Awaiting { requeue };

        let reply = self.read_reply().await?;
        self.in_flight = InFlight::Clean;
        match reply {
            Frame::Error(message) => Err(QueueError::Broker(message)),
            other => Ok(other),
        }
    }
}

/// A private connection to a remote queue service.
#[derive(Debug)]
pub struct TcpQueue {
    addr: String,
    max_frame_bytes: usize,
    conn: Mutex<Connection>,
}

impl TcpQueue {
    pub async fn connect(addr: impl Into<String>) -> Result<Self, QueueError> {
        Self::connect_with(addr, DEFAULT_MAX_FRAME_BYTES).await
    }

    pub async fn connect_with(addr: impl Into<String>, max_frame_bytes: usize) -> Result<Self, QueueError> {
        let addr = addr.into();
        let conn = Connection::open(&addr, max_frame_bytes).await?;
        debug!(target: "tcp_queue", %addr, "Connected to queue service");
        Ok(Self {
            addr,
            max_frame_bytes,
            conn: Mutex::new(conn),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn request(&self, frame: Frame) -> Result<Frame, QueueError> {
        let mut conn = self.conn.lock().await;
        conn.recover(&self.addr, self.max_frame_bytes).await?;
        conn.call(frame).await
    }

    async fn push_at(&self, channel: &str, payload: String, front: bool) -> Result<(), QueueError> {
        let reply = self
            .request(Frame::Push {
                channel: channel.to_string(),
                payload,
                front,
            })
            .await?;
        match reply {
            Frame::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

#[async_trait]
impl QueueTransport for TcpQueue {
    async fn push(&self, channel: &str, payload: String) -> Result<(), QueueError> {
        self.push_at(channel, payload, false).await
    }

    async fn push_front(&self, channel: &str, payload: String) -> Result<(), QueueError> {
        self.push_at(channel, payload, true).await
    }

    async fn pop(&self, channel: &str, timeout: Duration) -> Result<Option<String>, QueueError> {
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let reply = self
            .request(Frame::Pop {
                channel: channel.to_string(),
                timeout_ms,
            })
            .await?;
        match reply {
            Frame::Item(payload) => Ok(Some(payload)),
            Frame::Empty => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    async fn len(&self, channel: &str) -> Result<usize, QueueError> {
        let reply = self
            .request(Frame::Len {
                channel: channel.to_string(),
            })
            .await?;
        match reply {
            Frame::Count(count) => Ok(count as usize),
            other => Err(unexpected(other)),
        }
    }

    async fn settle(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.lock().await;
        match conn.in_flight {
            InFlight::Awaiting { .. } => conn.recover(&self.addr, self.max_frame_bytes).await,
            _ => Ok(()),
        }
    }
}

/// Opens a new [`TcpQueue`] per `connect` call.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    max_frame_bytes: usize,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Arc<dyn QueueTransport>, QueueError> {
        let queue = TcpQueue::connect_with(self.addr.clone(), self.max_frame_bytes).await?;
        Ok(Arc::new(queue))
    }
}
