//! End-to-end tests against in-memory fakes. No network, no chain.

mod mock_chain;

mod api;
mod trade;
