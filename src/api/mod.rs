//! Web API module for the range buyer
//!
//! Provides the balance lookup and the background trade endpoints.

pub mod routes;
pub mod server;

pub use server::{create_app, AppState};
