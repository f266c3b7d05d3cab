//! Assetmill - a front-end asset build pipeline
//!
//! This library provides functionality to:
//! - Compile, prefix and minify style sheets with source maps
//! - Concatenate and minify script bundles from an ordered module list
//! - Compress images into a distribution directory
//! - Watch source trees and rebuild on change, with live browser reload

pub mod cli;
pub mod config;
pub mod context;
pub mod modules;
pub mod pipeline;
pub mod serve;
pub mod stages;
pub mod tasks;
pub mod watch;

pub use context::TaskContext;
pub use pipeline::{Artifact, NamingPolicy, Pipeline, SourceSet};
pub use tasks::Task;
