pub mod actions;
pub mod auth;
pub mod baton;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod schema;
pub mod state;
pub mod validation;
