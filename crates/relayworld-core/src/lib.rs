//! Reconciliation engine and client loop for Relayworld.
//!
//! Every client keeps its own copy of the world and converges with its
//! peers by applying the same signed events under the same rules. This
//! crate owns that copy and everything that touches it.
//!
//! # Architecture
//!
//! - [`engine`] -- [`Engine`], the single owner of the world store, and
//!   the inbound path (validate, dedup, confirm, reconcile, defer)
//! - [`actions`] -- [`LocalAction`] and the optimistic outbound path
//! - [`reconcile`] -- How one remote event mutates the store
//! - [`store`] -- [`WorldStore`], the reconciled in-memory model
//! - [`policy`] -- Authorization predicates for local actions
//! - [`scheduler`] -- Respawn, claim expiry, and decay sweeps
//! - `gathering` -- Gather sessions and the per-tick lifecycle pass
//! - [`runner`] -- [`run_client`], the `tokio::select!` loop
//! - [`transport`] -- [`Relay`] trait and the in-memory [`LocalRelay`]
//! - [`payment`] -- [`PaymentCollaborator`] trait for land claims
//! - [`notify`] -- [`Presenter`] trait, change notifications, notices
//! - [`clock`] -- [`Clock`] trait with system and manual clocks
//! - [`config`] -- YAML client configuration
//! - [`error`] -- Precondition, transport, and runner errors

pub mod actions;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
mod gathering;
pub mod notify;
pub mod payment;
pub mod policy;
pub mod reconcile;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod transport;

pub use actions::LocalAction;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, ConfigError};
pub use engine::{Engine, EngineStats, InboundOutcome};
pub use error::{PreconditionFailure, RunnerError, TransportError};
pub use notify::{Change, ChangeKind, NoOpPresenter, Notice, Presenter, RecordingPresenter};
pub use payment::{PaymentCollaborator, StaticPayment, claim_land_paid};
pub use runner::{Collaborators, EndReason, RunSummary, run_client};
pub use store::{WorldStats, WorldStore};
pub use transport::{Inbound, LocalRelay, Relay, Subscription, SubscriptionFilter};
