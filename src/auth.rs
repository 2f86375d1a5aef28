//! Identity, scope, and token models shared by every relay layer.

pub mod id;
pub mod scope;
pub mod subject;
pub mod token;

pub use id::*;
pub use scope::*;
pub use subject::*;
pub use token::{record::*, secret::*};
