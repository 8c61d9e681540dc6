// Library entry point for kinship
// Exposes modules for the binary and integration tests

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
