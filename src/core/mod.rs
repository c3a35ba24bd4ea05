// Core modules: error model, data model, predicates, driver seam, and shipped drivers.
pub mod cell;
pub mod config;
pub mod driver;
pub mod error;
pub mod filter;
pub mod memory;
pub mod rest;
pub mod schema;
