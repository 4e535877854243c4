//! Pooled Lua interpreters.
//!
//! Each interpreter is isolated: a build worker borrows one for a single
//! entry (markup conversion plus page render) and returns it afterwards.
//! New interpreters replay the config load sequence so every instance holds
//! the same `CONFIG`, `THEME_CONFIG` and `moonlog` module.

mod api;
mod bridge;

pub use bridge::ScriptBridge;

use crate::{
    config::{self, CONFIG_FILE, ConfigError, SiteConfig},
    debug,
    render::Links,
};
use mlua::Lua;
use parking_lot::Mutex;
use std::{
    ops::Deref,
    path::PathBuf,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

#[derive(Debug)]
pub struct ScriptPool {
    root: PathBuf,
    idle: Mutex<Vec<Lua>>,
    /// Link templates handed to every interpreter once compiled.
    links: OnceLock<Arc<Links>>,
    created: AtomicUsize,
}

impl ScriptPool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            idle: Mutex::new(Vec::new()),
            links: OnceLock::new(),
            created: AtomicUsize::new(0),
        }
    }

    /// Create the first interpreter and return the config it loaded.
    pub fn bootstrap(&self) -> Result<SiteConfig, ConfigError> {
        let (lua, config) = self.spawn()?;
        self.idle.lock().push(lua);
        Ok(config)
    }

    /// Make `links` available to the `moonlog` link functions of every
    /// current and future interpreter.
    pub fn bind(&self, links: Arc<Links>) {
        for lua in self.idle.lock().iter() {
            lua.set_app_data(Arc::clone(&links));
        }
        let _ = self.links.set(links);
    }

    /// Borrow an idle interpreter, or create one when none is idle.
    ///
    /// Creation happens outside the idle lock.
    pub fn acquire(&self) -> Result<PooledLua<'_>, ConfigError> {
        let idle = self.idle.lock().pop();
        let lua = match idle {
            Some(lua) => lua,
            None => {
                let (lua, _) = self.spawn()?;
                if let Some(links) = self.links.get() {
                    lua.set_app_data(Arc::clone(links));
                }
                lua
            }
        };
        Ok(PooledLua { pool: self, lua })
    }

    /// Return `lua` to the idle set.
    pub fn release(&self, lua: Lua) {
        self.idle.lock().push(lua);
    }

    /// Close every idle interpreter; returns how many were closed.
    pub fn shutdown(&self) -> usize {
        let idle = std::mem::take(&mut *self.idle.lock());
        let closed = idle.len();
        drop(idle);
        debug!("lua"; "closed {} interpreters", closed);
        closed
    }

    /// Interpreters created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn spawn(&self) -> Result<(Lua, SiteConfig), ConfigError> {
        let lua = Lua::new();
        api::install(&lua, &self.root)
            .map_err(|e| ConfigError::Script(self.root.join(CONFIG_FILE), e))?;
        let config = config::load(&lua, &self.root)?;

        let n = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("lua"; "interpreter #{} ready", n);
        Ok((lua, config))
    }
}

/// An interpreter borrowed from a [`ScriptPool`], returned on drop.
pub struct PooledLua<'a> {
    pool: &'a ScriptPool,
    lua: Lua,
}

impl Deref for PooledLua<'_> {
    type Target = Lua;

    fn deref(&self) -> &Lua {
        &self.lua
    }
}

impl Drop for PooledLua<'_> {
    fn drop(&mut self) {
        self.pool.release(self.lua.clone());
    }
}
