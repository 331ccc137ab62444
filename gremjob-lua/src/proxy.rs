//! Script-facing job proxy
//!
//! Running scripts get a single handle to the job executing them, bound
//! under the reserved `gremlinJob` global. The handle is a capability
//! boundary: it exposes exactly the three progress-control operations of
//! [`JobControl`] and nothing else of the job object.
//!
//! Method names keep the wire contract's casing since scripts are written
//! against that contract:
//!
//! ```lua
//! gremlinJob:setMinSaveInterval(30)
//! gremlinJob:updateProgress(50)
//! local p = gremlinJob:progress()
//! ```

use mlua::prelude::*;
use std::sync::Arc;

use gremjob_core::domain::job::JobControl;
use gremjob_core::engine::RESERVED_BINDING;

/// Userdata wrapper handed to the script
struct JobProxy(Arc<dyn JobControl>);

impl LuaUserData for JobProxy {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("updateProgress", |_, this, progress: i32| {
            this.0.update_progress(progress);
            Ok(())
        });

        methods.add_method("progress", |_, this, ()| Ok(this.0.progress()));

        methods.add_method("setMinSaveInterval", |_, this, seconds: u64| {
            this.0.set_min_save_interval(seconds);
            Ok(())
        });
    }
}

/// Binds the job proxy into the script's globals under [`RESERVED_BINDING`]
///
/// Overwrites any caller-supplied binding of the same name; the key is
/// documented as reserved.
pub fn register_job_binding(lua: &Lua, job: Arc<dyn JobControl>) -> LuaResult<()> {
    lua.globals().set(RESERVED_BINDING, JobProxy(job))
}
