//! # sagemate-channels
//!
//! Social network integrations for Sagemate.

pub mod bluesky;
