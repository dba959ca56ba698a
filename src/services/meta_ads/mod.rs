//! Meta Marketing (Graph) API integration

pub mod client;
pub mod credentials;
pub mod error;
pub mod types;

pub use client::{InsightSource, MetaAdsClient};
pub use credentials::{CredentialsProvider, StaticTokenProvider};
pub use error::SyncError;
pub use types::{AdAccount, HierarchyLevel, RawEntity, RawEntityInsight, RawInsightDay};
