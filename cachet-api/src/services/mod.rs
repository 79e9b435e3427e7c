//! Service Layer
//!
//! Request handling independent of HTTP: envelope extraction, the lazily
//! built schema document and the operation dispatcher.

mod dispatcher;
mod metadata;
mod payload;

pub use dispatcher::*;
pub use metadata::*;
pub use payload::*;
