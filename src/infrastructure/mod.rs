pub mod alerts;
pub mod config;
pub mod credential_store;
pub mod error;
pub mod kv_store;
pub mod local_cache;
pub mod remote_store;
