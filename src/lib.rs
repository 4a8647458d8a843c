pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod parser;
pub mod query;
pub mod rate_limiter;
pub mod redis;
pub mod server;
pub mod store;
pub mod validation;
pub mod verse;

pub use config::Config;
pub use error::{Result, VerseError};
pub use query::QueryEngine;
pub use rate_limiter::RateGovernor;
pub use server::create_app;
pub use store::VerseStore;
pub use verse::Verse;
