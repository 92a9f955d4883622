//! Core engine: dividend aggregation plus the sentiment → stake pipeline.

pub mod aggregator;
pub mod executor;
pub mod queue;
pub mod sentiment;
