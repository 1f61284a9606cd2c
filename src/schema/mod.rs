//! Column inference
//!
//! This module derives a table schema from a collection of JSON records,
//! taking the union of all fields and unifying their observed types.

pub mod builder;

pub use builder::{SchemaBuilder, infer_schema};
