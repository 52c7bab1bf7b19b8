pub mod rest;
pub mod types;

pub use rest::{CoinbaseRestClient, COINBASE_REST_URL, COINBASE_SANDBOX_REST_URL};
