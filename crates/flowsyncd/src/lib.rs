//! Flow-rule reconciliation daemon.
//!
//! flowsyncd drives the flow tables of connected switches toward the
//! operator-declared desired state. The [`Daemon`] wires the pieces
//! together: the task queue, the switch registry, the flow table
//! mirror, and the per-switch reconciliation workers. Operators and
//! the switch transport interact through the [`Controller`] facade.
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowsync_core::MemoryRuleStore;
//! use flowsyncd::{config::DaemonConfig, Daemon};
//!
//! # struct MyTransport;
//! # #[async_trait::async_trait]
//! # impl flowsync_core::SwitchTransport for MyTransport {
//! #     async fn send_flow_mod(
//! #         &self,
//! #         _: flowsync_types::DatapathId,
//! #         _: &flowsync_types::FlowMod,
//! #     ) -> Result<(), flowsync_core::TransportError> { Ok(()) }
//! #     async fn request_stats(
//! #         &self,
//! #         _: flowsync_types::DatapathId,
//! #     ) -> Result<flowsync_types::StatsReport, flowsync_core::TransportError> {
//! #         Ok(Default::default())
//! #     }
//! # }
//! # async fn demo() {
//! let store = Arc::new(MemoryRuleStore::new());
//! let transport = Arc::new(MyTransport);
//! let daemon = Daemon::new(store, transport, DaemonConfig::default());
//! let controller = daemon.controller();
//! tokio::spawn(daemon.run());
//! // controller.submit_rule(...) etc.
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod loopback;

pub use controller::{Controller, SwitchStatus};
pub use engine::{PassState, ReconcileEngine, StatusBoard, SyncStatus, TaskQueue};
pub use error::DaemonError;

use config::DaemonConfig;
use flowsync_core::{FlowTableMirror, ReconcileTask, RuleStore, SwitchRegistry, SwitchTransport};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fully wired daemon: call [`Daemon::controller`] for the operator
/// surface, then [`Daemon::run`] to start reconciling.
pub struct Daemon {
    controller: Arc<Controller>,
    engine: Arc<ReconcileEngine>,
    registry: Arc<SwitchRegistry>,
    queue: Arc<TaskQueue>,
    rx: mpsc::UnboundedReceiver<ReconcileTask>,
    config: DaemonConfig,
}

impl Daemon {
    /// Wires the engine against the given store and transport.
    pub fn new(
        store: Arc<dyn RuleStore>,
        transport: Arc<dyn SwitchTransport>,
        config: DaemonConfig,
    ) -> Self {
        let (queue, rx) = TaskQueue::new();
        let registry = Arc::new(SwitchRegistry::new(queue.clone()));
        let mirror = Arc::new(FlowTableMirror::new());
        let status = Arc::new(StatusBoard::new());

        let engine = Arc::new(ReconcileEngine::new(
            Arc::clone(&registry),
            Arc::clone(&mirror),
            Arc::clone(&store),
            Arc::clone(&transport),
            Arc::clone(&status),
            config.engine.clone(),
        ));
        let controller = Arc::new(Controller::new(
            Arc::clone(&registry),
            mirror,
            store,
            status,
            queue.clone(),
        ));

        Self {
            controller,
            engine,
            registry,
            queue,
            rx,
            config,
        }
    }

    /// The operator/transport-facing surface. Clone freely.
    pub fn controller(&self) -> Arc<Controller> {
        Arc::clone(&self.controller)
    }

    /// Runs the engine (and the stats audit timer, when enabled)
    /// until every task sink is gone.
    pub async fn run(self) {
        if let Some(interval) = self.config.engine.audit_interval() {
            tokio::spawn(engine::run_audit_timer(
                Arc::clone(&self.registry),
                self.queue.clone(),
                interval,
            ));
        }
        self.engine.run(self.rx).await;
    }
}
