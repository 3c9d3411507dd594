//! HTTP Routes

pub mod encodings;
pub mod model;
pub mod predictions;
