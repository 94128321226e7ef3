use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, RwLock};
use tracing::{info, warn};

use common::{EngineState, MarketState, Result};

use crate::binance::TradeStream;
use crate::pipeline::Pipeline;
use crate::reporter::StatusReporter;

/// Ticks buffered between the socket reader and the pipeline.
const TICK_BUFFER: usize = 1024;

/// Cloneable handle for stopping and inspecting a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
    state: Arc<RwLock<EngineState>>,
    pipeline: Arc<Pipeline>,
}

impl EngineHandle {
    /// Ask the engine to stop. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    pub async fn market_state(&self) -> MarketState {
        self.pipeline.market_state().await
    }
}

/// Live engine: Binance trade stream feeding the pipeline, plus the
/// periodic status reporter.
pub struct Engine {
    symbol: String,
    pipeline: Arc<Pipeline>,
    status_interval: Duration,
    state: Arc<RwLock<EngineState>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Engine {
    pub fn new(
        symbol: impl Into<String>,
        pipeline: Arc<Pipeline>,
        status_interval: Duration,
    ) -> (Self, EngineHandle) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let state = Arc::new(RwLock::new(EngineState::Stopped));

        let handle = EngineHandle {
            shutdown_tx: shutdown_tx.clone(),
            state: state.clone(),
            pipeline: pipeline.clone(),
        };

        let engine = Engine {
            symbol: symbol.into(),
            pipeline,
            status_interval,
            state,
            shutdown_tx,
            shutdown_rx,
        };

        (engine, handle)
    }

    /// Stream live trades until shutdown is requested or the connection ends.
    ///
    /// The stream does not reconnect; a connection error is returned to the
    /// caller after the pipeline has drained the ticks already received.
    pub async fn run_live(self) -> Result<()> {
        let mut shutdown = self.shutdown_rx.clone();
        if *shutdown.borrow_and_update() {
            info!("Shutdown requested before start");
            return Ok(());
        }

        info!(symbol = %self.symbol, "Starting live engine");
        *self.state.write().await = EngineState::Running;

        let (tick_tx, tick_rx) = mpsc::channel(TICK_BUFFER);
        let pipeline = self.pipeline.clone();
        let pipeline_task = tokio::spawn(async move { pipeline.run(tick_rx).await });

        let reporter = StatusReporter::new(self.pipeline.clone(), self.status_interval);
        let reporter_task = tokio::spawn(reporter.run(self.shutdown_rx.clone()));

        let stream = TradeStream::new(self.symbol.clone(), tick_tx);

        let result = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("Shutdown requested, closing trade stream");
                Ok(())
            }
            res = stream.run() => {
                if let Err(e) = &res {
                    warn!(error = %e, "Trade stream failed");
                } else {
                    info!("Trade stream ended");
                }
                res
            }
        };

        // The stream (and its tick sender) is gone, so the pipeline finishes
        // once it has drained the buffer.
        if let Err(e) = pipeline_task.await {
            warn!(error = %e, "Pipeline task panicked");
        }
        self.shutdown_tx.send_replace(true);
        if let Err(e) = reporter_task.await {
            warn!(error = %e, "Status reporter task panicked");
        }

        *self.state.write().await = EngineState::Stopped;
        info!("Engine stopped");
        result
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
