//! Purpose: Data-access layer for wide-column stores.
//! Exports: `core` (errors, data model, predicates, drivers), `api` (handle manager, facade),
//! `logging` (subscriber setup for binaries).
//! Role: Library crate; the store itself is reached through a `core::driver::Connector`.
//! Invariants: One shared connection per `StoreHandle`; per-call handles are scoped and
//! released on every exit path.
pub mod api;
pub mod core;
pub mod logging;
