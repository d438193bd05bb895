//! # sagemate-core
//!
//! Core types, traits, configuration, and error handling for the Sagemate agent.

pub mod config;
pub mod error;
pub mod message;
pub mod post;
pub mod traits;
