//! Route-driven client state synchronization for submission processing
//!
//! This crate owns the client-side cache of transcript/translation state for
//! the "single processing" view of a survey asset: one question of one
//! submission at a time, addressed by a route key parsed from the current
//! location path.
//!
//! The pieces:
//! - [`store::ProcessingStateStore`] is the core: route reconciliation,
//!   readiness gating, per-kind request cancellation, drafts and the
//!   commit protocol, snapshot publishing.
//! - [`gateway`] holds the backend contract
//!   ([`gateway::ProcessingDataGateway`]) and its reqwest implementation.
//! - [`asset`] is the local asset metadata collaborator.
//! - [`routes`] and [`index`] cover path parsing and the per-question
//!   submission uuid index with prev/next navigation.

pub mod asset;
pub mod gateway;
pub mod index;
pub mod routes;
pub mod store;

pub use store::{GatewayReply, ProcessingStateStore, StoreCommand};
