//! Result store
//!
//! SQLite tables holding the current state written by the jobs: unused
//! ports, MACs seen on ports, and the addresses they resolved to.

pub mod connection;
pub mod models;
pub mod queries;
pub mod schema;

pub use connection::Database;
pub use models::{
    Assignment, IpAddressRecord, MacObservation, MacOnPortRecord, MacSearch, NewUnusedPort,
    UnusedPortRecord,
};
