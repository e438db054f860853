//! Pick files in a workspace and aggregate them into one context payload
//! for LLM prompts.
//!
//! The selection engine lives in [`store`]. [`classifier`] and [`walker`]
//! feed it, [`report`] reads it, and [`commands`] wraps it for front ends.

pub mod classifier;
pub mod cli;
pub mod clipboard;
pub mod commands;
pub mod config;
pub mod error;
pub mod persistence;
pub mod report;
pub mod store;
pub mod tree_builder;
pub mod tui;
pub mod utils;
pub mod walker;

pub use classifier::PathClassifier;
pub use config::{Config, ExclusionPolicy};
pub use error::{ContextError, Result};
pub use report::{Report, build_report};
pub use store::{SelectionState, SelectionStore};
pub use walker::TreeWalker;
