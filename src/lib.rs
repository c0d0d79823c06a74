//! Per-key cache entry state machine for a partitioned, transactional
//! key-value store.
//!
//! A [`entry::CacheEntry`] owns the authoritative in-memory metadata for
//! one key — value, version, TTL/obsolete bookkeeping, and lock
//! candidates — behind a single monitor, and mediates every mutation
//! pathway against its collaborators (row store, WAL, interceptors,
//! continuous queries) via a stateless [`entry::closure::UpdateClosure`].
//!
//! ```
//! use latticekv::config::CacheConfig;
//! use latticekv::defaults::{NoopContinuousQueryRegistry, NoopExternalStore, NoopInterceptor, StaticExpiryPolicy};
//! use latticekv::entry::{CacheEntry, Collaborators};
//! use latticekv::entry::closure::TtlInstruction;
//! use latticekv::partition::InMemoryPartition;
//! use latticekv::row_store::InMemoryRowStore;
//! use latticekv::version::{LocalVersionGenerator, Version};
//! use latticekv::wal::NoopWal;
//!
//! let row_store = InMemoryRowStore::new();
//! let wal = NoopWal;
//! let partition = InMemoryPartition::new();
//! let generator = LocalVersionGenerator::new(1, 0, 0);
//! let expiry = StaticExpiryPolicy::eternal();
//! let interceptor = NoopInterceptor;
//! let external_store = NoopExternalStore;
//! let cq = NoopContinuousQueryRegistry;
//!
//! let collaborators = Collaborators {
//!     row_store: &row_store,
//!     external_store: Some(&external_store),
//!     wal: &wal,
//!     interceptor: Some(&interceptor),
//!     cq: Some(&cq),
//!     events: None,
//!     partition: &partition,
//!     version_generator: &generator,
//!     expiry_policy: &expiry,
//!     result_future: None,
//!     metrics: None,
//! };
//!
//! let entry = CacheEntry::new(b"k1".to_vec(), Version::zero(), 0);
//! let config = CacheConfig::atomic();
//! let result = entry
//!     .inner_set(b"v1".to_vec(), Some(Version::new(1, 1, 1, 0, 0)), &[], TtlInstruction::Eternal, &collaborators, &config, 0)
//!     .unwrap();
//! assert_eq!(entry.inner_get(false, false, &collaborators, &config, 0).unwrap(), Some(b"v1".to_vec()));
//! let _ = result;
//! ```

#![deny(unsafe_code)]

pub mod candidate;
pub mod config;
pub mod defaults;
pub mod entry;
pub mod error;
pub mod events;
pub mod extras;
pub mod future;
pub mod interfaces;
pub mod logging;
pub mod metrics;
pub mod partition;
pub mod row_store;
pub mod version;
pub mod wal;

pub use crate::config::{AtomicityMode, CacheConfig};
pub use crate::entry::{CacheEntry, Collaborators, SwapEntrySnapshot, WriteOutcome};
pub use crate::error::{CacheError, Result};
pub use crate::extras::{EntryExtras, TtlState};
pub use crate::future::FutureAdapter;
pub use crate::version::{Version, VersionComparator, VersionGenerator};
