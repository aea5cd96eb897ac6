// Library side of the planner: everything except the HTTP server.
pub mod clock;
pub mod config; // TOML + env configuration
pub mod error;
pub mod logic; // Pure highlight / task invariants
pub mod models;
pub mod planner; // Domain operations over store + sync
pub mod remote;
pub mod store; // Local JSON collections
pub mod sync;
