//! Integration tests for packwalk-rs.
//!
//! Run with: `cargo test --test integration`

mod cache_pressure;
mod rev_walk_pipeline;
mod tree_walk_scenarios;
