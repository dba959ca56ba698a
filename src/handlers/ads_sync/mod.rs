//! Ad insight synchronization engine
//!
//! Leaf-first: `action_metrics` and `records` normalize fetched rows,
//! `upsert` and `date_gaps` talk to the store, `orchestrator` runs the
//! per-level pipeline and `backfill` drives it on a schedule or per date.

pub mod action_metrics;
pub mod backfill;
pub mod date_gaps;
pub mod integrations;
pub mod orchestrator;
pub mod records;
pub mod upsert;

pub use orchestrator::{
    SyncOptions, SyncOrchestrator, SyncProgress, SyncRequest, SyncResult, SyncStage, SyncStats,
};
