pub mod api;
pub mod config;
pub mod error;
pub mod geo;
pub mod map;
pub mod models;
pub mod observability;
pub mod publish;
pub mod source;
pub mod state;
pub mod subscribe;
