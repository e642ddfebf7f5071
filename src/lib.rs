pub mod app;
pub mod catalogue;
pub mod challenge;
pub mod cli;
pub mod clock;
pub mod config;
pub mod logging;
pub mod state;
pub mod store;
pub mod utils;
pub mod web;
