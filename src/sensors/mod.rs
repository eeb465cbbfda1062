// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Sensor module - ingest boundary and event sources

mod event;
mod simulator;

pub use event::*;
pub use simulator::{DemoNode, Scenario};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

/// Anything that pushes raw sensor messages onto the ingestion channel
#[async_trait]
pub trait EventSource: Send {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Feed `tx` until shutdown or until the channel closes
    async fn run(
        &mut self,
        tx: mpsc::Sender<RawMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<()>;
}
