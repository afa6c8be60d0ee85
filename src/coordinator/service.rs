//! Single-task poll loop
//!
//! The coordinator lives inside one tokio task. Host requests arrive on a
//! flume channel and are handled between ticks, so a write never races a
//! read; each request carries a oneshot for its reply.

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::{Coordinator, WriteError};
use crate::data_mgmt::models::{Reading, RtValue, Snapshot};
use crate::node_mgmt::config::{ConfigError, ScanIntervals};
use crate::node_mgmt::lifecycle::LifecycleError;
use crate::readers::modbus_tcp::Connector;

const COMMAND_QUEUE: usize = 16;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("coordinator task is not running")]
    Stopped,
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

pub enum Command {
    Write {
        key: String,
        value: RtValue,
        reply: oneshot::Sender<Result<Option<Reading>, WriteError>>,
    },
    Reconfigure {
        intervals: ScanIntervals,
        reply: oneshot::Sender<Result<u64, ConfigError>>,
    },
    Unload {
        reply: oneshot::Sender<Result<(), LifecycleError>>,
    },
}

/// Host-side handle to a running coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: flume::Sender<Command>,
}

impl CoordinatorHandle {
    pub async fn write(&self, key: &str, value: RtValue) -> Result<Option<Reading>, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Write {
            key: key.to_string(),
            value,
            reply,
        })
        .await?;
        Ok(response.await.map_err(|_| ServiceError::Stopped)??)
    }

    /// New scan intervals; returns the config version that will apply from the next tick
    pub async fn reconfigure(&self, intervals: ScanIntervals) -> Result<u64, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Reconfigure { intervals, reply }).await?;
        Ok(response.await.map_err(|_| ServiceError::Stopped)??)
    }

    /// Stop polling, close the connection and end the task
    pub async fn unload(&self) -> Result<(), ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Unload { reply }).await?;
        Ok(response.await.map_err(|_| ServiceError::Stopped)??)
    }

    async fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.commands
            .send_async(command)
            .await
            .map_err(|_| ServiceError::Stopped)
    }
}

/// Run a started coordinator on its own task
///
/// Returns the host handle and the snapshot feed. The task ends on unload or
/// once every handle has been dropped.
pub fn spawn<C: Connector>(
    coordinator: Coordinator<C>,
) -> (CoordinatorHandle, flume::Receiver<Snapshot>, JoinHandle<()>) {
    let (command_tx, command_rx) = flume::bounded(COMMAND_QUEUE);
    let (snapshot_tx, snapshot_rx) = flume::unbounded();
    let task = tokio::spawn(run(coordinator, command_rx, snapshot_tx));
    (
        CoordinatorHandle {
            commands: command_tx,
        },
        snapshot_rx,
        task,
    )
}

async fn run<C: Connector>(
    mut coordinator: Coordinator<C>,
    commands: flume::Receiver<Command>,
    snapshots: flume::Sender<Snapshot>,
) {
    let mut next_tick = Instant::now();
    loop {
        tokio::select! {
            _ = sleep_until(next_tick) => {
                let now = Instant::now();
                match coordinator.tick(now.into_std()).await {
                    Ok(snapshot) => publish(&snapshots, snapshot),
                    Err(e) => {
                        log::error!("Stopping poll loop: {}", e);
                        return;
                    }
                }
                next_tick = now + coordinator.effective_period();
            }
            command = commands.recv_async() => {
                let Ok(command) = command else {
                    log::info!("All handles dropped, unloading");
                    if let Err(e) = coordinator.unload().await {
                        log::warn!("{}", e);
                    }
                    return;
                };
                if !handle(&mut coordinator, command, &snapshots).await {
                    return;
                }
            }
        }
    }
}

/// Returns false once the loop should end
async fn handle<C: Connector>(
    coordinator: &mut Coordinator<C>,
    command: Command,
    snapshots: &flume::Sender<Snapshot>,
) -> bool {
    match command {
        Command::Write { key, value, reply } => {
            let result = coordinator.write(&key, value).await;
            match &result {
                Ok(Some(_)) => publish(snapshots, coordinator.snapshot()),
                Ok(None) => {}
                Err(e) => log::warn!("Rejected write to {}: {}", key, e),
            }
            let _ = reply.send(result);
            true
        }
        Command::Reconfigure { intervals, reply } => {
            let _ = reply.send(coordinator.reconfigure(intervals));
            true
        }
        Command::Unload { reply } => {
            let _ = reply.send(coordinator.unload().await);
            false
        }
    }
}

fn publish(snapshots: &flume::Sender<Snapshot>, snapshot: Snapshot) {
    if snapshots.send(snapshot).is_err() {
        log::trace!("No snapshot subscribers");
    }
}
