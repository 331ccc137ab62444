//! Lua-backed query engine
//!
//! Evaluates the submitted script inside a restricted sandbox with the
//! caller's bindings, aliases, and the job proxy installed as globals.
//!
//! Result shape follows the script's returned value:
//! - a function is treated as a lazy row iterator, called once per pull
//!   until it yields nil;
//! - nil produces an empty stream with no terminal value;
//! - anything else is the single terminal result.

use mlua::prelude::*;
use mlua::{Lua, LuaSerdeExt};
use serde_json::Value;
use tracing::debug;

use gremjob_core::engine::{QueryEngine, QueryRequest, ResultStream};
use gremjob_core::error::{JobError, Result};

use crate::proxy::register_job_binding;
use crate::sandbox::create_sandbox;

/// Script dialect identifiers this engine accepts
const SUPPORTED_LANGUAGES: &[&str] = &["lua", "gremlin-lua"];

fn eval_err(e: LuaError) -> JobError {
    JobError::Evaluation(e.to_string())
}

/// Query engine evaluating scripts in a sandboxed Lua state
#[derive(Debug, Default)]
pub struct LuaQueryEngine {}

impl LuaQueryEngine {
    pub fn new() -> Self {
        Self {}
    }

    fn check_language(language: Option<&str>) -> Result<()> {
        match language {
            None => Ok(()),
            Some(lang) if SUPPORTED_LANGUAGES.contains(&lang) => Ok(()),
            Some(lang) => Err(JobError::Evaluation(format!(
                "unsupported script language '{lang}'"
            ))),
        }
    }

    fn install_bindings(lua: &Lua, request: &QueryRequest) -> LuaResult<()> {
        for (name, value) in &request.bindings {
            let v = lua.to_value(value)?;
            lua.globals().set(name.as_str(), v)?;
        }

        // The proxy goes in last so a caller-supplied binding cannot shadow
        // the reserved name.
        register_job_binding(lua, request.job.clone())?;

        // Aliases remap one global name onto another's value.
        for (alias, target) in &request.aliases {
            let v: mlua::Value = lua.globals().get(target.as_str())?;
            lua.globals().set(alias.as_str(), v)?;
        }

        Ok(())
    }
}

impl QueryEngine for LuaQueryEngine {
    fn prepare(&self, request: QueryRequest) -> Result<Box<dyn ResultStream>> {
        Self::check_language(request.language.as_deref())?;

        let lua = create_sandbox().map_err(eval_err)?;
        Self::install_bindings(&lua, &request).map_err(eval_err)?;

        let evaluated: mlua::Value = lua
            .load(&request.script)
            .set_name("gremlin")
            .eval()
            .map_err(eval_err)?;

        let (iterator, terminal) = match evaluated {
            mlua::Value::Function(f) => {
                debug!("script evaluated to a row iterator");
                (Some(f), None)
            }
            mlua::Value::Nil => (None, None),
            other => {
                let value: Value = lua.from_value(other).map_err(eval_err)?;
                debug!("script evaluated to a terminal value");
                (None, Some(value))
            }
        };

        Ok(Box::new(LuaTraversal {
            lua,
            iterator,
            terminal,
            closed: false,
        }))
    }
}

/// One prepared script execution and its result stream
pub struct LuaTraversal {
    lua: Lua,
    iterator: Option<mlua::Function>,
    terminal: Option<Value>,
    closed: bool,
}

impl ResultStream for LuaTraversal {
    fn try_next(&mut self) -> Result<Option<Value>> {
        if self.closed {
            return Ok(None);
        }
        let Some(iterator) = &self.iterator else {
            return Ok(None);
        };

        let item: mlua::Value = iterator.call(()).map_err(eval_err)?;
        if item.is_nil() {
            self.iterator = None;
            return Ok(None);
        }

        let value = self.lua.from_value(item).map_err(eval_err)?;
        Ok(Some(value))
    }

    fn terminal(&self) -> Option<Value> {
        self.terminal.clone()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.iterator = None;
        self.lua.gc_collect().map_err(eval_err)
    }
}

impl Drop for LuaTraversal {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
