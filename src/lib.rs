pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod stats;
pub mod store;
pub mod users;

#[cfg(test)]
pub mod test_support;
