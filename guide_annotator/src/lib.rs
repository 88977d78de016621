//! Base-editor guide library design and annotation.
//!
//! Tiles a gene with guides for a PAM, optionally counts their occurrences in
//! a reference genome, and predicts the protein changes each guide can cause
//! with a given editing chemistry.

pub mod annotation;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod gene;
pub mod genomic;
pub mod helper_functions;
pub mod models;

pub use error::{AnnotatorError, Result};
