//! Render pipelines and the bind group layouts they are built from.

pub mod basic;
