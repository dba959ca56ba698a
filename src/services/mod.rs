//! Services module for external integrations

pub mod meta_ads;

pub use meta_ads::{InsightSource, MetaAdsClient};
