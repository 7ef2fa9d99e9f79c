//! location-analyzer - catalog location analysis stage
//!
//! The stage a host pipeline embeds: [`processor::LocationProcessor`] gates
//! each location by type, enablement and allow-list, runs a pluggable
//! [`analyzer::LocationAnalyzer`] on the eligible ones, and reports through
//! a [`processor::ProcessorEmit`] sink. [`module::build_processor`] wires the
//! default HTTP analyzer from configuration.
//!
//! The `location-analyzer` binary is one such host.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod gate;
pub mod integrations;
pub mod models;
pub mod module;
pub mod processor;
pub mod report;
