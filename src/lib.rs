//! Realms Snapshot API
//!
//! Incremental governance snapshot sync: pulls a DAO's realm, proposals,
//! vote records and members from the chain, reuses previously published
//! results for proposals that can no longer change, and publishes
//! compressed artifacts plus a versioned lookup manifest to a storage pool.

pub mod codec;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod rpc;
pub mod state;
pub mod storage;
pub mod sync;
