//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use pulse_stream::{
    ConnectionManager, EventTransport, FrameStream, StaticToken, StreamConfig, TokenProvider,
    TransportResult,
};

use crate::manager::BindingManager;

/// Transport whose streams connect instantly and stay open forever.
pub(crate) struct HangingTransport {
    attempts: AtomicUsize,
}

impl HangingTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
        })
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventTransport for HangingTransport {
    async fn connect(&self, _url: &Url) -> TransportResult<FrameStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(futures::stream::pending::<TransportResult<Bytes>>()))
    }
}

/// Token provider that never has a token.
pub(crate) struct NoToken;

impl TokenProvider for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

/// Binding manager wired to a hanging transport.
pub(crate) fn binding_manager() -> (BindingManager, Arc<HangingTransport>) {
    let transport = HangingTransport::new();
    let connections = ConnectionManager::with_transport(
        StreamConfig::new("http://gateway.test"),
        Arc::new(StaticToken::new("test-token")),
        Arc::clone(&transport) as Arc<dyn EventTransport>,
    )
    .expect("valid config");

    (
        BindingManager::with_connections(Arc::new(connections)),
        transport,
    )
}

/// Give spawned connection tasks a chance to run without advancing time.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
