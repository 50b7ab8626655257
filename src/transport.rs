//! Outbound transport seam
//!
//! The surface only queues messages; whatever implements [`Transport`]
//! owns delivery. Failed sends are logged and dropped.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::midi::{format_hex, MidiMessage};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one complete message in a single packet
    async fn send(&self, message: &MidiMessage) -> Result<()>;
}

/// Hand one queued message to the transport. Returns false if it failed.
pub async fn deliver(transport: &dyn Transport, message: &MidiMessage) -> bool {
    match transport.send(message).await {
        Ok(()) => {
            trace!("Delivered {}", message);
            true
        }
        Err(e) => {
            warn!(
                "Dropping {} ({}): {}",
                message,
                format_hex(&message.encode()),
                e
            );
            false
        }
    }
}

/// Drain the outbound queue until every sender is gone
pub async fn forward(mut rx: mpsc::UnboundedReceiver<MidiMessage>, transport: &dyn Transport) {
    while let Some(message) = rx.recv().await {
        deliver(transport, &message).await;
    }
}
