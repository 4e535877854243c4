//! Configuration load sequence.
//!
//! Runs `config.lua`, then the theme's `theme.lua`, inside one interpreter.
//! Every pooled interpreter replays this so all of them carry identical
//! `CONFIG` and `THEME_CONFIG` globals.

use super::{ConfigError, SiteConfig, ThemeConfig};
use mlua::{DeserializeOptions, Lua, LuaSerdeExt, Table, Value};
use serde::de::DeserializeOwned;
use std::{fs, path::Path};

/// Site config script, relative to the project root
pub const CONFIG_FILE: &str = "config.lua";

/// Theme config script, relative to the theme directory
const THEME_FILE: &str = "theme.lua";

/// Global holding the site table
const SITE_GLOBAL: &str = "CONFIG";

/// Global holding the theme table
const THEME_GLOBAL: &str = "THEME_CONFIG";

/// Execute the config scripts in `lua` and map the declared tables.
pub fn load(lua: &Lua, root: &Path) -> Result<SiteConfig, ConfigError> {
    let config_path = root.join(CONFIG_FILE);
    extend_package_path(lua, root).map_err(|e| ConfigError::Script(config_path.clone(), e))?;

    let table = run_declaration(lua, &config_path, SITE_GLOBAL)?;
    let mut config: SiteConfig = map_table(lua, &config_path, table)?;
    config.resolve_dirs(root);

    let theme_dir = config.theme_path();
    let theme_path = theme_dir.join(THEME_FILE);
    let theme = if theme_path.is_file() {
        extend_package_path(lua, &theme_dir)
            .map_err(|e| ConfigError::Script(theme_path.clone(), e))?;
        let table = run_declaration(lua, &theme_path, THEME_GLOBAL)?;
        map_table(lua, &theme_path, table)?
    } else {
        ThemeConfig::default()
    };

    config.finalize(root, theme)?;
    Ok(config)
}

/// Run `path` with a `config` function that stores its argument in `global`.
fn run_declaration(lua: &Lua, path: &Path, global: &'static str) -> Result<Table, ConfigError> {
    let source = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let script_err = |e| ConfigError::Script(path.to_path_buf(), e);

    let globals = lua.globals();
    let declare = lua
        .create_function(move |lua, table: Table| lua.globals().set(global, table))
        .map_err(script_err)?;
    globals.set("config", declare).map_err(script_err)?;
    globals.set(global, Value::Nil).map_err(script_err)?;

    lua.load(source)
        .set_name(path.display().to_string())
        .exec()
        .map_err(script_err)?;

    match globals.get::<Value>(global).map_err(script_err)? {
        Value::Table(table) => Ok(table),
        _ => Err(ConfigError::NotDeclared(path.to_path_buf())),
    }
}

fn map_table<T: DeserializeOwned>(lua: &Lua, path: &Path, table: Table) -> Result<T, ConfigError> {
    // functions (markup processors, helpers) are skipped rather than rejected
    let options = DeserializeOptions::new().deny_unsupported_types(false);
    lua.from_value_with(Value::Table(table), options)
        .map_err(|e| ConfigError::Mapping(path.to_path_buf(), e))
}

/// Let `require` find modules next to the config or theme scripts.
fn extend_package_path(lua: &Lua, dir: &Path) -> mlua::Result<()> {
    let package: Table = lua.globals().get("package")?;
    let current: String = package.get("path")?;
    let dir = dir.display();
    package.set("path", format!("{dir}/?.lua;{dir}/?/init.lua;{current}"))
}
