// Node lifecycle control
// The storage engine and its front end start and stop as one logical unit

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use ravenhost_common::{RavenHostError, Result};

use super::engine::{EngineFactory, NodeConfig, StorageEngine};

/// Lifecycle state of the node process.
///
/// `Failed` is absorbing and reachable only from `Starting`; `stop` on a
/// failed node is a safe no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Stopped => write!(f, "STOPPED"),
            NodeState::Starting => write!(f, "STARTING"),
            NodeState::Running => write!(f, "RUNNING"),
            NodeState::Stopping => write!(f, "STOPPING"),
            NodeState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Front-end server contract. Construction and start are separate steps so
/// that a bind failure can be rolled back without touching the engine.
#[async_trait]
pub trait FrontEnd: Send + Sync {
    async fn start(&mut self) -> Result<()>;

    async fn dispose(&mut self);
}

/// Factory seam for constructing the front end during node start.
#[async_trait]
pub trait FrontEndFactory: Send + Sync {
    async fn create(
        &self,
        config: &NodeConfig,
        engine: Arc<dyn StorageEngine>,
    ) -> Result<Box<dyn FrontEnd>>;
}

/// Starts and stops the storage node with deterministic rollback.
///
/// Resources are acquired engine-first and released in reverse. Every
/// partial-failure path disposes exactly the resources acquired so far and
/// leaves both references cleared, so `stop` can always be called safely.
pub struct NodeLifecycleController {
    engine_factory: Arc<dyn EngineFactory>,
    front_end_factory: Arc<dyn FrontEndFactory>,
    engine: RwLock<Option<Arc<dyn StorageEngine>>>,
    front_end: Mutex<Option<Box<dyn FrontEnd>>>,
    state: RwLock<NodeState>,
}

impl NodeLifecycleController {
    pub fn new(
        engine_factory: Arc<dyn EngineFactory>,
        front_end_factory: Arc<dyn FrontEndFactory>,
    ) -> Self {
        Self {
            engine_factory,
            front_end_factory,
            engine: RwLock::new(None),
            front_end: Mutex::new(None),
            state: RwLock::new(NodeState::Stopped),
        }
    }

    /// Start the node: engine first, then background workers, then front end.
    ///
    /// Any failure disposes the resources acquired so far, moves the
    /// controller to `Failed`, and propagates the error.
    pub async fn start(&self, config: &NodeConfig) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != NodeState::Stopped {
                return Err(RavenHostError::IllegalState(format!(
                    "cannot start node from state {}",
                    state
                )));
            }
            *state = NodeState::Starting;
        }

        info!("starting storage node");

        let engine = match self.engine_factory.create(config).await {
            Ok(engine) => engine,
            Err(e) => {
                error!("storage engine construction failed: {}", e);
                *self.state.write().await = NodeState::Failed;
                return Err(e);
            }
        };

        engine.spin_background_workers();

        let mut front_end = match self.front_end_factory.create(config, engine.clone()).await {
            Ok(front_end) => front_end,
            Err(e) => {
                error!("front-end construction failed: {}", e);
                engine.dispose();
                *self.state.write().await = NodeState::Failed;
                return Err(e);
            }
        };

        if let Err(e) = front_end.start().await {
            error!("front-end start failed: {}", e);
            front_end.dispose().await;
            drop(front_end);
            engine.dispose();
            *self.state.write().await = NodeState::Failed;
            return Err(e);
        }

        *self.engine.write().await = Some(engine);
        *self.front_end.lock().await = Some(front_end);
        *self.state.write().await = NodeState::Running;

        info!("storage node running on port {}", config.port);
        Ok(())
    }

    /// Stop the node. Idempotent: disposes the front end if present, then the
    /// engine if present, clearing each reference. Calling `stop` when
    /// nothing is running is a no-op, not an error.
    pub async fn stop(&self) {
        let front_end = self.front_end.lock().await.take();
        let engine = self.engine.write().await.take();

        if front_end.is_none() && engine.is_none() {
            return;
        }

        *self.state.write().await = NodeState::Stopping;
        info!("stopping storage node");

        if let Some(mut front_end) = front_end {
            front_end.dispose().await;
        }
        if let Some(engine) = engine {
            engine.dispose();
        }

        *self.state.write().await = NodeState::Stopped;
        info!("storage node stopped");
    }

    pub async fn current_state(&self) -> NodeState {
        *self.state.read().await
    }

    /// Handle to the running engine, for the topology reconciler to write
    /// through. `None` unless the node is running.
    pub async fn engine_handle(&self) -> Option<Arc<dyn StorageEngine>> {
        self.engine.read().await.clone()
    }
}
