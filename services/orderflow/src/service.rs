//! Multi-instrument footprint service
//!
//! One tokio task per subscribed instrument owns that instrument's
//! `FootprintPipeline`; it is the only writer. Prints, reconfigurations and
//! snapshot requests arrive on a bounded mpsc channel and are handled
//! strictly in order. After every applied print or reconfiguration the
//! task publishes a fresh snapshot on a broadcast channel: sends never
//! block, and a lagging subscriber skips to newer snapshots.
//!
//! ```text
//!  ingest()/reconfigure()/snapshot()
//!            │
//!   ┌────────▼────────┐  mpsc (bounded, ordered)
//!   │    registry     │──────────────┐
//!   │ RwLock<BTreeMap>│              │
//!   └─────────────────┘   ┌──────────▼──────────┐
//!                         │ pipeline task (1/id) │
//!                         └──────────┬──────────┘
//!                                    │ broadcast
//!                          subscribers (snapshots)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::errors::ConfigError;
use types::ids::InstrumentId;

use crate::config::{ConfigUpdate, FootprintConfig};
use crate::ingestion::RawPrint;
use crate::metrics::{Alert, AlertLevel, AlertThresholds, PipelineMetrics};
use crate::pipeline::FootprintPipeline;
use crate::snapshot::FootprintSnapshot;

pub type SnapshotReceiver = broadcast::Receiver<Arc<FootprintSnapshot>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("unknown instrument: {0}")]
    UnknownInstrument(InstrumentId),

    #[error("pipeline for {0} is no longer running")]
    PipelineClosed(InstrumentId),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Work items for an instrument's pipeline task.
#[derive(Debug)]
pub enum PipelineCommand {
    Print(RawPrint),
    Reconfigure {
        update: ConfigUpdate,
        reply: oneshot::Sender<Result<(), ConfigError>>,
    },
    Snapshot {
        reply: oneshot::Sender<FootprintSnapshot>,
    },
    Stop,
}

/// Channel sizing and alerting for the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Pending commands per instrument before `ingest` waits.
    pub command_buffer: usize,
    /// Snapshots a subscriber may fall behind before it starts skipping.
    pub snapshot_buffer: usize,
    pub alert_thresholds: AlertThresholds,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command_buffer: 1024,
            snapshot_buffer: 64,
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

struct InstrumentHandle {
    commands: mpsc::Sender<PipelineCommand>,
    snapshots: broadcast::Sender<Arc<FootprintSnapshot>>,
    metrics: Arc<PipelineMetrics>,
    task: JoinHandle<()>,
}

/// Registry of per-instrument pipelines.
pub struct FootprintService {
    defaults: FootprintConfig,
    config: ServiceConfig,
    registry: RwLock<BTreeMap<InstrumentId, InstrumentHandle>>,
}

impl FootprintService {
    pub fn new(defaults: FootprintConfig, config: ServiceConfig) -> Self {
        info!(
            command_buffer = config.command_buffer,
            snapshot_buffer = config.snapshot_buffer,
            "FootprintService initialized"
        );
        Self {
            defaults,
            config,
            registry: RwLock::new(BTreeMap::new()),
        }
    }

    /// Subscribe with the service's default configuration.
    pub async fn subscribe(&self, instrument: InstrumentId) -> Result<SnapshotReceiver, ServiceError> {
        self.subscribe_with(instrument, self.defaults.clone()).await
    }

    /// Start a pipeline for `instrument`, or join the running one.
    ///
    /// `config` only applies when a new pipeline is started.
    pub async fn subscribe_with(
        &self,
        instrument: InstrumentId,
        config: FootprintConfig,
    ) -> Result<SnapshotReceiver, ServiceError> {
        let mut registry = self.registry.write().await;
        if let Some(handle) = registry.get(&instrument) {
            debug!(instrument = %instrument, "joining running pipeline");
            return Ok(handle.snapshots.subscribe());
        }

        let metrics = Arc::new(PipelineMetrics::new());
        let pipeline = FootprintPipeline::with_metrics(instrument.clone(), config, metrics.clone())?;
        let (commands, command_rx) = mpsc::channel(self.config.command_buffer.max(1));
        let (snapshots, snapshot_rx) = broadcast::channel(self.config.snapshot_buffer.max(1));
        let task = tokio::spawn(run_pipeline(pipeline, command_rx, snapshots.clone()));

        info!(instrument = %instrument, "instrument subscribed");
        registry.insert(
            instrument,
            InstrumentHandle {
                commands,
                snapshots,
                metrics,
                task,
            },
        );
        Ok(snapshot_rx)
    }

    /// Stop the instrument's pipeline and wait for its task to finish.
    pub async fn unsubscribe(&self, instrument: &InstrumentId) -> Result<(), ServiceError> {
        let handle = self
            .registry
            .write()
            .await
            .remove(instrument)
            .ok_or_else(|| ServiceError::UnknownInstrument(instrument.clone()))?;

        // A closed channel means the task already exited.
        let _ = handle.commands.send(PipelineCommand::Stop).await;
        if let Err(err) = handle.task.await {
            warn!(instrument = %instrument, error = %err, "pipeline task ended abnormally");
        }
        info!(instrument = %instrument, "instrument unsubscribed");
        Ok(())
    }

    /// Queue a print for the instrument's pipeline.
    ///
    /// Waits while the command buffer is full. Invalid prints are rejected
    /// inside the pipeline and show up in its metrics.
    pub async fn ingest(&self, instrument: &InstrumentId, print: RawPrint) -> Result<(), ServiceError> {
        self.send(instrument, PipelineCommand::Print(print)).await
    }

    /// Apply a configuration update between two prints.
    pub async fn reconfigure(
        &self,
        instrument: &InstrumentId,
        update: ConfigUpdate,
    ) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(instrument, PipelineCommand::Reconfigure { update, reply })
            .await?;
        rx.await
            .map_err(|_| ServiceError::PipelineClosed(instrument.clone()))?
            .map_err(ServiceError::from)
    }

    /// Snapshot reflecting every command queued before this call.
    pub async fn snapshot(&self, instrument: &InstrumentId) -> Result<FootprintSnapshot, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(instrument, PipelineCommand::Snapshot { reply }).await?;
        rx.await
            .map_err(|_| ServiceError::PipelineClosed(instrument.clone()))
    }

    pub async fn receiver(&self, instrument: &InstrumentId) -> Result<SnapshotReceiver, ServiceError> {
        self.registry
            .read()
            .await
            .get(instrument)
            .map(|h| h.snapshots.subscribe())
            .ok_or_else(|| ServiceError::UnknownInstrument(instrument.clone()))
    }

    pub async fn metrics(&self, instrument: &InstrumentId) -> Result<BTreeMap<String, u64>, ServiceError> {
        self.registry
            .read()
            .await
            .get(instrument)
            .map(|h| h.metrics.export())
            .ok_or_else(|| ServiceError::UnknownInstrument(instrument.clone()))
    }

    /// Threshold breaches for the instrument, each logged as it is found.
    pub async fn alerts(&self, instrument: &InstrumentId) -> Result<Vec<Alert>, ServiceError> {
        let alerts = self
            .registry
            .read()
            .await
            .get(instrument)
            .map(|h| h.metrics.check_thresholds(&self.config.alert_thresholds))
            .ok_or_else(|| ServiceError::UnknownInstrument(instrument.clone()))?;

        for alert in &alerts {
            match alert.level {
                AlertLevel::Critical => {
                    error!(instrument = %instrument, metric = %alert.metric, "{}", alert.message)
                }
                AlertLevel::Warning => {
                    warn!(instrument = %instrument, metric = %alert.metric, "{}", alert.message)
                }
            }
        }
        Ok(alerts)
    }

    pub async fn instruments(&self) -> Vec<InstrumentId> {
        self.registry.read().await.keys().cloned().collect()
    }

    /// Stop every pipeline.
    pub async fn shutdown(&self) {
        for instrument in self.instruments().await {
            let _ = self.unsubscribe(&instrument).await;
        }
        info!("FootprintService stopped");
    }

    async fn send(&self, instrument: &InstrumentId, command: PipelineCommand) -> Result<(), ServiceError> {
        let sender = self
            .registry
            .read()
            .await
            .get(instrument)
            .map(|h| h.commands.clone())
            .ok_or_else(|| ServiceError::UnknownInstrument(instrument.clone()))?;
        sender
            .send(command)
            .await
            .map_err(|_| ServiceError::PipelineClosed(instrument.clone()))
    }
}

async fn run_pipeline(
    mut pipeline: FootprintPipeline,
    mut commands: mpsc::Receiver<PipelineCommand>,
    snapshots: broadcast::Sender<Arc<FootprintSnapshot>>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            PipelineCommand::Print(print) => {
                // Rejections are logged and counted by the pipeline itself.
                if pipeline.process(&print).is_ok() {
                    publish(&mut pipeline, &snapshots);
                }
            }
            PipelineCommand::Reconfigure { update, reply } => {
                let result = pipeline.reconfigure(&update);
                if result.is_ok() {
                    publish(&mut pipeline, &snapshots);
                }
                let _ = reply.send(result);
            }
            PipelineCommand::Snapshot { reply } => {
                let _ = reply.send(pipeline.snapshot());
            }
            PipelineCommand::Stop => break,
        }
    }
    info!(
        instrument = %pipeline.instrument(),
        ticks = pipeline.tape().tick_count,
        "pipeline task stopped"
    );
}

fn publish(
    pipeline: &mut FootprintPipeline,
    snapshots: &broadcast::Sender<Arc<FootprintSnapshot>>,
) {
    let snapshot = Arc::new(pipeline.snapshot());
    if snapshots.send(snapshot).is_err() {
        pipeline.metrics().record_unread_snapshot();
    }
}
