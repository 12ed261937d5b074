pub mod builder;
pub mod correlator;
pub mod edge;
pub mod event;
pub mod graph;
pub mod isolator;
pub mod node;
pub mod policy;
pub mod ports;
pub mod store;
pub mod telemetry;
