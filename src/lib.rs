pub mod ai;
pub mod auth;
pub mod bids;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod models;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod settings;
pub mod state;
pub mod storage;
pub mod utils;
