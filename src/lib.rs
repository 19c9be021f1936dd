pub mod common;
pub mod config;
pub mod connection;
pub mod gateway;
pub mod protocol;
pub mod queue;
pub mod rest;
pub mod session;
