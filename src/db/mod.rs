//! Reference persistence adapter (§6): a single SQLite connection behind a
//! mutex, organized into one module per entity the way the teacher's own
//! `db/` splits `scans.rs`/`findings.rs` off from `connection.rs`/`schema.rs`.

pub mod accounts;
pub mod assets;
pub mod connection;
pub mod findings;
pub mod schema;
pub mod scan_logs;

pub use connection::Database;
