//! Core components of the flowsync switch synchronization engine.
//!
//! This crate provides the building blocks the reconciliation daemon
//! composes:
//!
//! - [`SwitchRegistry`]: connected-switch and port tracking
//! - [`FlowTableMirror`]: per-switch believed-installed flow entries
//! - [`resolver`]: pure priority/conflict resolution
//! - [`diff`]: pure desired-vs-mirror changeset computation
//! - [`RuleStore`]: the persistence-adapter seam (with an in-memory
//!   implementation for tests and standalone runs)
//! - [`SwitchTransport`]: the opaque switch-session seam
//! - [`expand`]: traffic-rule and QoS-policy expansion
//!
//! # Architecture
//!
//! The daemon follows an event-driven reconciliation model:
//!
//! 1. Operator mutations land in the rule store and enqueue a
//!    [`ReconcileTask`] for the affected switch
//! 2. A per-switch worker loads desired rules, expands traffic/QoS
//!    rules, and resolves conflicts
//! 3. The accepted set is diffed against the mirror snapshot
//! 4. Flow-mods go out through the transport; acks update the mirror
//!    and rule status
//!
//! Everything here is deliberately transport-agnostic: the wire
//! protocol of the switch session is somebody else's problem.

pub mod diff;
pub mod error;
pub mod expand;
pub mod mirror;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod task;
pub mod transport;

pub use diff::diff;
pub use error::{CoreError, StoreError, TransportError};
pub use expand::expand_for_switch;
pub use mirror::{AppliedOp, FlowTableMirror};
pub use registry::{SwitchRegistry, SwitchSnapshot};
pub use resolver::{resolve, Resolution};
pub use store::{MemoryRuleStore, RuleStore};
pub use task::{ReconcileReason, ReconcileTask, TaskSink};
pub use transport::SwitchTransport;
