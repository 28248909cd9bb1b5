//! Dictionary domain: types, remote client, offline evaluation, and the
//! cached client that ties them to the cache layer.

pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod offline;
pub mod query;
pub mod types;
pub mod watch;
