pub mod assets;
pub mod config;
pub mod database;
pub mod deciders;
pub mod errors;
pub mod ingestor;
pub mod loader;
pub mod models;
pub mod processors;
