//! Shared utilities for the Storyloom pipeline.

pub mod json_ext;
