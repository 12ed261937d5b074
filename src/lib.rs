//! rootscout library: live service dependency graph and root-cause isolation.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
