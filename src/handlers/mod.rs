pub mod ads_sync;
