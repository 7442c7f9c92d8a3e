pub mod build;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod fakes;
pub mod gateway;
pub mod load_config;
pub mod notify;
pub mod server;
pub mod snapshot;
pub mod synchronise;
pub mod tracker;
pub mod webhook;
