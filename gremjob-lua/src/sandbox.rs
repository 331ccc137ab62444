//! Lua sandbox creation
//!
//! Submitted query scripts are untrusted, so the sandbox excludes filesystem
//! I/O, network access, process execution, and external code loading. The
//! job proxy and the caller's bindings are registered on top of this by the
//! engine.

use mlua::{Lua, LuaOptions, Result as LuaResult, StdLib};

/// Create a restricted Lua sandbox
///
/// Includes only basic Lua functionality (tables, strings, math,
/// coroutines). IO, OS, PACKAGE and DEBUG are excluded, and the loader
/// globals are removed so scripts cannot pull in external code.
pub fn create_sandbox() -> LuaResult<Lua> {
    let lua = unsafe {
        Lua::unsafe_new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::COROUTINE,
            LuaOptions::default(),
        )
    };

    lua.globals().set("require", mlua::Nil)?;
    lua.globals().set("dofile", mlua::Nil)?;
    lua.globals().set("loadfile", mlua::Nil)?;

    Ok(lua)
}
