use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, RunMode, Signal, SignalAction};
use engine::{optimizer, Engine, EngineFileConfig, Optimizer, Pipeline};

/// Signals queued between the pipeline and the consumer.
const SIGNAL_BUFFER: usize = 128;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid environment configuration")?;
    let file_cfg = EngineFileConfig::load(&cfg.engine_config_path)
        .context("invalid engine config file")?;
    info!(symbol = %cfg.symbol, mode = %cfg.run_mode, "TrendBot starting");

    // ── Signal consumer ───────────────────────────────────────────────────────
    let (signal_tx, signal_rx) = mpsc::channel::<Signal>(SIGNAL_BUFFER);
    let consumer = tokio::spawn(consume_signals(signal_rx));

    let pipeline = Arc::new(Pipeline::new(&file_cfg).with_signal_sink(signal_tx));

    match cfg.run_mode {
        RunMode::Live => run_live(&cfg, pipeline).await?,
        RunMode::Backtest => run_backtest(&cfg, pipeline).await?,
        RunMode::Optimize => {
            // Each combination runs on its own pipeline without a sink.
            drop(pipeline);
            run_optimize(&cfg, &file_cfg).await?
        }
    }

    // Pipeline (and its signal sender) are dropped by now; drain the queue.
    consumer.await.context("signal consumer panicked")?;
    info!("TrendBot exited");
    Ok(())
}

async fn run_live(cfg: &Config, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let (engine, handle) = Engine::new(cfg.symbol.clone(), pipeline, cfg.status_interval);

    let ctrl_c_handle = handle.clone();
    let ctrl_c = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                ctrl_c_handle.shutdown();
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    let result = engine.run_live().await;
    ctrl_c.abort();
    result.context("live engine failed")?;

    let state = handle.market_state().await;
    info!(
        trades = state.performance.total_trades,
        win_rate = state.performance.win_rate,
        total_pnl = state.performance.total_pnl,
        "Session summary"
    );
    Ok(())
}

fn first_dataset(cfg: &Config) -> anyhow::Result<PathBuf> {
    let datasets = market::list_datasets(&cfg.data_dir)
        .with_context(|| format!("cannot list datasets in {}", cfg.data_dir))?;
    let Some(dataset) = datasets.first() else {
        anyhow::bail!("no CSV datasets found in {}", cfg.data_dir);
    };
    if datasets.len() > 1 {
        info!(count = datasets.len(), using = %dataset.display(), "Multiple datasets found");
    }
    Ok(dataset.clone())
}

async fn run_backtest(cfg: &Config, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let dataset = first_dataset(cfg)?;
    let summary = pipeline
        .replay_file(&dataset)
        .await
        .with_context(|| format!("replay of {} failed", dataset.display()))?;

    let p = &summary.performance;
    info!(
        ticks = summary.ticks,
        skipped = summary.skipped,
        signals = summary.signals.len(),
        total_trades = p.total_trades,
        winning = p.winning_trades,
        losing = p.losing_trades,
        win_rate = p.win_rate,
        average_pnl = p.average_pnl,
        total_pnl = p.total_pnl,
        max_drawdown = p.max_drawdown,
        profit_factor = p.profit_factor,
        "Backtest results"
    );
    Ok(())
}

async fn run_optimize(cfg: &Config, file_cfg: &EngineFileConfig) -> anyhow::Result<()> {
    let dataset = first_dataset(cfg)?;
    let report = Optimizer::new(file_cfg.optimizer.clone())
        .run_file(&dataset, file_cfg)
        .await
        .with_context(|| format!("optimization over {} failed", dataset.display()))?;

    for (rank, r) in report.results.iter().take(5).enumerate() {
        info!(
            rank = rank + 1,
            score = r.score,
            trades = r.performance.total_trades,
            win_rate = r.performance.win_rate,
            profit_factor = r.performance.profit_factor,
            total_pnl = r.performance.total_pnl,
            volatility_lo = r.entry.volatility_lo,
            relative_strength_lo = r.entry.relative_strength_lo,
            min_trend_strength = r.entry.min_trend_strength,
            min_order_imbalance = r.entry.min_order_imbalance,
            min_efficiency_ratio = r.entry.min_efficiency_ratio,
            profit_target_multiplier = r.exit.profit_target_multiplier,
            trailing_stop_activation_pct = r.exit.trailing_stop_activation_pct,
            trailing_stop_distance = r.exit.trailing_stop_distance,
            "Optimization result"
        );
    }

    let stamp = report.generated_at.format("%Y%m%d_%H%M%S");
    let data_dir = Path::new(&cfg.data_dir);
    report
        .save(data_dir.join(format!("optimization_results_{stamp}.json")))
        .context("cannot save optimization results")?;

    match report.best() {
        Some(best) => {
            let path = data_dir.join(format!("optimized_engine_{stamp}.toml"));
            optimizer::save_config(&best.apply(file_cfg), &path)
                .context("cannot save optimized engine config")?;
        }
        None => warn!(
            evaluated = report.evaluated,
            min_trades = file_cfg.optimizer.min_trades,
            "No combination closed enough trades"
        ),
    }
    Ok(())
}

async fn consume_signals(mut rx: mpsc::Receiver<Signal>) {
    while let Some(signal) = rx.recv().await {
        match signal.action {
            SignalAction::Buy => info!(
                price = signal.price,
                time = %signal.time,
                trend = signal.metrics.trend_strength,
                efficiency = signal.metrics.market_efficiency_ratio,
                "BUY SIGNAL"
            ),
            SignalAction::Close => info!(
                price = signal.price,
                time = %signal.time,
                reason = ?signal.reason,
                profit_pct = signal.profit_pct,
                stop_loss = ?signal.updated_stop_loss,
                "SELL SIGNAL"
            ),
        }
    }
}
