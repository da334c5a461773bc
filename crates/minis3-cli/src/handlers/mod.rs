//! Gateway request handlers

pub mod bucket;
pub mod node;
pub mod object;
pub mod service;

pub use bucket::*;
pub use node::*;
pub use object::*;
pub use service::*;
