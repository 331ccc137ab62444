//! Gremjob Lua engine
//!
//! Lua-backed implementation of the query-engine contract:
//! - A restricted sandbox with no I/O, OS, or module-loading access
//! - The script-facing job proxy exposing only progress controls
//! - An engine that evaluates submitted scripts into a lazy result stream
//!   or a single terminal value

pub mod engine;
pub mod proxy;
pub mod sandbox;

pub use engine::{LuaQueryEngine, LuaTraversal};
pub use proxy::register_job_binding;
pub use sandbox::create_sandbox;
