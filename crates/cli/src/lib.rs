//! saucejs CLI
//!
//! Command-line interface for running browser unit-test pages on Sauce Labs
//! and administering the resulting jobs.

pub mod commands;
pub mod config;
pub mod output;
