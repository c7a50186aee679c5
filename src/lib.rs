pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod ingest;
pub mod latest;
pub mod reading;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
