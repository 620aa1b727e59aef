#![doc = "The `tasktrack` library crate."]
#![doc = ""]
#![doc = "Stateless token authentication and ownership-based authorization for a"]
#![doc = "multi-user task and project tracker, plus the HTTP surface built on it."]
#![doc = "The binary (`main.rs`) wires these pieces to Postgres and runs the server."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use crate::error::AppError;
pub use crate::state::AppState;
