//! In-memory tables
//!
//! A table is an ordered sequence of rows with named, typed columns. Every
//! operation returns a new table and leaves its input untouched.

pub mod types;
pub mod frame;

pub use types::{Cell, ColumnType, Field, Row, Schema};
pub use frame::{ColumnSpec, Table};
