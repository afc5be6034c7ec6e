//! JSON file cache.
//!
//! Each key maps to one file `cache-<key>.json` holding
//! `{"modified": <unix seconds>, "data": <value>}`.

mod senders;
mod store;

pub use senders::{SENDERS_KEY, SenderCache};
pub use store::CacheStore;
