//! Core module - Storage engine
//!
//! Contains the memory tree, its persistence and the path store.

pub mod error;
pub mod node;
pub mod path;
pub mod path_store;
pub mod persistence;
pub mod schema;
pub mod scoring;
pub mod shared;
pub mod tree;

pub use error::{Result, TreeError};
