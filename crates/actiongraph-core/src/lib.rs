pub mod audit;
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod io;
pub mod keys;
pub mod normalize;
pub mod pipeline;
pub mod reachability;
pub mod repair;
pub mod rules;
pub mod simulate;
pub mod tree;
pub mod types;
pub mod validate;
pub mod view;

pub use error::{CompileError, Rejection, Result};
pub use pipeline::{Compilation, Compiler};
