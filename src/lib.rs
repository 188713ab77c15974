//! Chat backend: stores conversation messages and asks a language model for
//! replies on request.

pub mod app_state;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod utils;
