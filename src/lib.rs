mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod memory;
    pub mod postgres;
    pub mod query;
    pub mod schema;
    pub mod store;
}
mod authentication {
    pub mod cryptography;
    pub mod middleware;
    pub mod session;
    pub mod token;
}
mod constants;

pub mod config;
pub mod routes;

pub use authentication::*;
pub use constants::*;
pub use database::*;
