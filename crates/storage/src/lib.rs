// Path: crates/storage/src/lib.rs
#![forbid(unsafe_code)]

//! # Attestor Storage
//!
//! A redb-backed implementation of the persistence contracts in
//! `attestor-api`. One database file holds every table; each versioned
//! record is framed as `[sequence_be(8)][payload]` and writes are optimistic
//! sequence-CAS. The only multi-record transaction is list creation /
//! rollover, which must atomically bind a new list to its set.

mod redb_store;

pub use redb_store::RedbStore;
