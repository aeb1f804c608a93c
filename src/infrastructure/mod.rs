pub mod config;
pub mod error;
pub mod host;
pub mod mite_client;
pub mod settings_store;
