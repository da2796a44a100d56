//! switchboard-router: the subscription matching pipeline.
//!
//! Compiles the subscription table into an executable router that maps an
//! incoming (method, path) to the *visited set*: the peers whose declared
//! interest matches the request, together with their ordering requirements.
//! Compilation is lazy and cached; any table mutation invalidates the
//! cache and the next request recompiles.

pub mod cache;
pub mod compiler;
pub mod pattern;

pub use cache::RouterCache;
pub use compiler::{CompiledRouter, VisitedSet};
pub use pattern::PathPattern;
