//! Regferry CLI - copy, export and inspect registry images.

pub mod commands;
pub mod output;
pub mod report;
