pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod login;
pub mod profile_client;
pub mod registration;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod web;
