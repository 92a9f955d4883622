//! Tao dividends service.
//!
//! Serves Bittensor Tao dividends per (subnet, hotkey) from a short-lived
//! cache backed by the chain, and can adjust stake in the background based
//! on social sentiment around a subnet.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod api;
pub mod cache;
pub mod chain;
pub mod config;
pub mod data;
pub mod engine;
pub mod llm;
pub mod storage;
pub mod types;
