pub mod allergen;
pub mod api_connection;
pub mod cli;
pub mod config;
pub mod cuisine;
pub mod generation;
pub mod normalizer;
pub mod search;
pub mod service;
