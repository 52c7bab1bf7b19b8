pub mod assembler;
pub mod coinbase;
pub mod config;
pub mod error;
pub mod exchange;
pub mod fetcher;
pub mod granularity;
pub mod model;
pub mod rate_limit;
pub mod window;
