#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vsmq::core::protocol::DEFAULT_MAX_FRAME_BYTES;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        vsmq::logging::init_logging();
    });
}

/// A queue service on an ephemeral local port.
pub struct TestBroker {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

impl TestBroker {
    pub async fn start() -> Self {
        Self::start_with(DEFAULT_MAX_FRAME_BYTES).await
    }

    pub async fn start_with(max_frame_bytes: usize) -> Self {
        init_logging();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(vsmq::serve_broker(listener, shutdown.clone(), max_frame_bytes));
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.handle
            .await
            .expect("broker task panicked")
            .expect("broker returned an error");
    }
}

/// Polls `check` every 10ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
