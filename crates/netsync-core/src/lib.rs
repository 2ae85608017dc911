//! netsync Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemotePath`, `FileMeta`, `RemoteEntry`, `LocalEntry`, `SyncResult`
//! - **Port definitions** - Traits for adapters: `IRemoteStorage`, `ILocalFileSystem`, `ISyncEventSink`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//! - **Client context** - Immutable per-client settings shared by every remote call
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure value types with no I/O.
//! Ports define trait interfaces that adapter crates implement; the remote
//! client, conflict policy and sync engine live in their own crates.

pub mod config;
pub mod context;
pub mod domain;
pub mod ports;
