//! ndkport library exports.
//!
//! The binary is a thin CLI over these modules; integration tests drive the
//! [`pipeline::Pipeline`] directly with scripted build strategies.

pub mod cache;
pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod flags;
pub mod package;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod publish;
pub mod source;
pub mod strategy;
pub mod target;
pub mod timing;

pub use error::PipelineError;
