//! # lrucache
//!
//! Fixed-capacity, thread-safe, in-memory key-value cache with strict
//! least-recently-used eviction.
//!
//! ## Architecture
//! - **Index**: AHash map from key to arena slot (O(1))
//! - **Recency List**: Arena-backed doubly-linked list, head = most recent (O(1))
//! - **Guard**: One `parking_lot::RwLock` around both, so every operation is atomic
//!
//! ## Example
//!
//! ```
//! use lrucache::LruCache;
//!
//! let cache = LruCache::new(2).unwrap();
//! cache.set("a", 1);
//! cache.set("b", 2);
//! cache.get(&"a");     // promotes "a"
//! cache.set("c", 3);   // evicts "b"
//!
//! assert_eq!(cache.get(&"b"), None);
//! assert_eq!(cache.len(), 2);
//! ```

#![warn(missing_docs)]

mod cache;
mod error;
mod lru;

pub use cache::LruCache;
pub use error::{Error, Result};
