//! Lifelog Core — domain types, day-partitioned cache stores, remote sources.
//!
//! This crate contains the data layer of the lifelog sync engine:
//! - Domain types (opaque lifelog records, day ranges, sort direction, clocks)
//! - Cache entries with confirmation stamps and the on-disk payload codec
//! - Interchangeable cache stores (filesystem partitioned by year/month, in-memory)
//! - The remote source contract with typed queries and cursor pagination
//! - An in-memory remote fake and a blocking HTTP transport with a circuit breaker

pub mod cache;
pub mod domain;
pub mod remote;

pub use cache::{CacheEntry, CacheError, CacheStore, DayStatus, FilesystemStore, MemoryStore, ScanMap};
pub use domain::{Clock, DateExtractionError, DayRange, Direction, FixedClock, Lifelog, SystemClock};
pub use remote::{
    CircuitBreaker, HttpConfig, HttpSource, InMemorySource, LifelogQuery, Page, QueryParams, QueryWindow,
    RemoteError, RemoteSource,
};
