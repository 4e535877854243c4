//! Markup conversion dispatch.
//!
//! `CONFIG.markup_processors` maps a file extension (with its dot) to either
//! a Lua function taking the body text and returning HTML, or a table naming
//! a built-in converter and its options (see [`builtin`]).

mod builtin;

use builtin::{Converter, ConverterSpec, OptionGroup};
use mlua::{Function, Lua, Table, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("No markup processor for format `{0}`")]
    UnknownFormat(String),

    #[error("Markup processor for `{0}` must be a function or a table")]
    InvalidProcessor(String),

    #[error("Markup processor for `{format}` failed")]
    Script {
        format: String,
        #[source]
        source: mlua::Error,
    },

    #[error("Markup processor for `{format}`: `{group}` must be a list of strings")]
    NotAList { format: String, group: &'static str },

    #[error("Unknown markup converter `{0}`")]
    UnknownConverter(String),

    #[error("Invalid option '{option}' in {converter} {group}")]
    InvalidOption {
        option: String,
        converter: &'static str,
        group: &'static str,
    },

    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

/// Convert `text` written in `format` (e.g. `.md`) to HTML.
///
/// Runs on the caller's interpreter; the processor table is looked up on
/// every call, so processors may be swapped at runtime.
pub fn convert(lua: &Lua, text: &str, format: &str) -> Result<String, MarkupError> {
    match processor(lua, format)? {
        Value::Nil => Err(MarkupError::UnknownFormat(format.to_owned())),
        Value::Function(f) => call_processor(lua, &f, text, format),
        Value::Table(table) => {
            let (converter, spec) = read_spec(&table, format)?;
            converter.convert(&spec, text)
        }
        _ => Err(MarkupError::InvalidProcessor(format.to_owned())),
    }
}

fn processor(lua: &Lua, format: &str) -> Result<Value, MarkupError> {
    let Value::Table(config) = lua.globals().get::<Value>("CONFIG")? else {
        return Ok(Value::Nil);
    };
    let Value::Table(processors) = config.get::<Value>("markup_processors")? else {
        return Ok(Value::Nil);
    };
    Ok(processors.get(format)?)
}

fn call_processor(lua: &Lua, f: &Function, text: &str, format: &str) -> Result<String, MarkupError> {
    let script = |source| MarkupError::Script {
        format: format.to_owned(),
        source,
    };

    let result: Value = f.call(text).map_err(script)?;
    // non-string results are coerced the way Lua's `tostring` would
    let tostring: Function = lua.globals().get("tostring")?;
    tostring.call::<String>(result).map_err(script)
}

/// Read `{ name = ..., exts = {...}, parseopts = {...}, htmlopts = {...} }`.
///
/// A missing `name` selects pulldown.
fn read_spec(table: &Table, format: &str) -> Result<(Converter, ConverterSpec), MarkupError> {
    let converter = match table.get::<Option<String>>("name")? {
        Some(name) => name.parse()?,
        None => Converter::Pulldown,
    };

    let list = |group: OptionGroup| -> Result<Vec<String>, MarkupError> {
        let not_a_list = || MarkupError::NotAList {
            format: format.to_owned(),
            group: group.key(),
        };
        match table.get::<Value>(group.key())? {
            Value::Nil => Ok(Vec::new()),
            Value::Table(items) => items
                .sequence_values::<Value>()
                .map(|item| match item {
                    Ok(Value::String(s)) => s
                        .to_str()
                        .map(|text| (*text).to_owned())
                        .map_err(|_| not_a_list()),
                    _ => Err(not_a_list()),
                })
                .collect(),
            _ => Err(not_a_list()),
        }
    };

    let spec = ConverterSpec {
        exts: list(OptionGroup::Extension)?,
        parse_opts: list(OptionGroup::Parser)?,
        html_opts: list(OptionGroup::Html)?,
    };
    Ok((converter, spec))
}
