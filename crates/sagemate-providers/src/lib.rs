//! # sagemate-providers
//!
//! Language-model provider implementations for Sagemate.

pub mod anthropic;
