pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod packages;
pub mod reconcile;
pub mod retry;
pub mod security;
pub mod server;
pub mod translate;
