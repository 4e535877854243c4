//! The `moonlog` Lua module.
//!
//! ```lua
//! local moonlog = require "moonlog"
//! local html, err = moonlog.runprocessor("pygmentize", "-l", "lua", "-f", "html", code)
//! local href = moonlog.url("Tag", { tag = "rust", page = 0 })
//! ```
//!
//! Operations that can fail return `nil, message` instead of raising.

use super::bridge::to_template;
use crate::{
    markup,
    render::{Links, RenderError},
    utils::{
        command::{pipe, to_cmd_vec},
        fs::{copy_file, copy_tree},
        text::{html_escape, html_unescape, url_encode_path},
    },
};
use anyhow::anyhow;
use minijinja::context;
use mlua::{Function, Lua, Table, Value, Variadic};
use std::{
    fmt::Display,
    path::{Path, PathBuf},
    sync::Arc,
};

pub const MODULE_NAME: &str = "moonlog";

/// `nil, message` on failure.
type Outcome<T> = (Option<T>, Option<String>);

fn outcome<T, E: Display>(result: Result<T, E>) -> Outcome<T> {
    match result {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(format!("{e:#}"))),
    }
}

/// Directory relative script paths resolve against.
struct ScriptHome(PathBuf);

/// Register `moonlog` in `package.preload` of `lua`.
pub fn install(lua: &Lua, root: &Path) -> mlua::Result<()> {
    lua.set_app_data(ScriptHome(root.to_path_buf()));

    let preload: Table = lua.globals().get::<Table>("package")?.get("preload")?;
    let loader = lua.create_function(|lua, ()| module(lua))?;
    preload.set(MODULE_NAME, loader)
}

fn module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    let add = |name: &str, f: Function| module.set(name, f);

    add("runprocessor", lua.create_function(run_processor)?)?;
    add("htmlescape", lua.create_function(|_, s: String| Ok(html_escape(&s)))?)?;
    add("htmlunescape", lua.create_function(|_, s: String| Ok(html_unescape(&s)))?)?;
    add("urlencode", lua.create_function(|_, s: String| Ok(url_encode_path(&s)))?)?;
    add("formatmarkup", lua.create_function(format_markup)?)?;

    add("title", link_function(lua, Links::title)?)?;
    add("path", link_function(lua, Links::path)?)?;
    add("url", link_function(lua, Links::url)?)?;
    add("fullurl", link_function(lua, Links::full_url)?)?;

    add(
        "copyfile",
        lua.create_function(|lua, (src, dst): (String, String)| {
            Ok(outcome(copy_file(&resolve(lua, &src), &resolve(lua, &dst)).map(|()| true)))
        })?,
    )?;
    add(
        "copytree",
        lua.create_function(|lua, (src, dst): (String, String)| {
            Ok(outcome(copy_tree(&resolve(lua, &src), &resolve(lua, &dst)).map(|()| true)))
        })?,
    )?;
    add("isdir", lua.create_function(|lua, p: String| Ok(resolve(lua, &p).is_dir()))?)?;
    add("isfile", lua.create_function(|lua, p: String| Ok(resolve(lua, &p).is_file()))?)?;
    add("pathexists", lua.create_function(|lua, p: String| Ok(resolve(lua, &p).exists()))?)?;

    Ok(module)
}

fn resolve(lua: &Lua, path: &str) -> PathBuf {
    match lua.app_data_ref::<ScriptHome>() {
        Some(home) => home.0.join(path),
        None => PathBuf::from(path),
    }
}

/// `runprocessor(cmd, arg..., text)`: pipe `text` through a process.
fn run_processor(_: &Lua, mut args: Variadic<String>) -> mlua::Result<Outcome<String>> {
    let Some(text) = args.pop() else {
        return Ok((None, Some("runprocessor: missing input text".into())));
    };
    if args.is_empty() {
        return Ok((None, Some("runprocessor: missing command".into())));
    }
    Ok(outcome(pipe(&to_cmd_vec(&args[..]), &text)))
}

fn format_markup(lua: &Lua, (text, format): (String, String)) -> mlua::Result<Outcome<String>> {
    Ok(outcome(markup::convert(lua, &text, &format)))
}

type LinkFn = fn(&Links, &str, minijinja::Value) -> Result<String, RenderError>;

/// `f(name, data)` against the link templates bound to this interpreter.
fn link_function(lua: &Lua, render: LinkFn) -> mlua::Result<Function> {
    lua.create_function(move |lua, (name, data): (String, Option<Table>)| {
        let links = lua.app_data_ref::<Arc<Links>>().map(|links| Arc::clone(&links));
        let Some(links) = links else {
            return Ok(outcome(Err(anyhow!("link templates are not compiled yet"))));
        };
        let data = match data {
            Some(table) => to_template(Value::Table(table)),
            None => context! {},
        };
        Ok(outcome(render(&links, &name, data)))
    })
}
