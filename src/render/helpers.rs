//! Functions and filters available to templates.
//!
//! [`register`] installs the pure helpers used by every environment;
//! [`register_page`] adds the helpers that need the page being rendered
//! (pagination, scripted functions, links).

use super::{RenderContext, RenderError};
use crate::{
    script::ScriptBridge,
    utils::text::{html_escape, html_unescape, substr, url_encode_path},
};
use minijinja::{
    Environment, Error, ErrorKind, State, Value, context,
    value::{Rest, ValueKind},
};
use std::collections::BTreeMap;

pub(crate) fn register(env: &mut Environment<'static>) {
    env.add_function("add", |a: i64, b: i64| checked(a.checked_add(b), "add"));
    env.add_function("sub", |a: i64, b: i64| checked(a.checked_sub(b), "sub"));
    env.add_function("mul", |a: i64, b: i64| checked(a.checked_mul(b), "mul"));
    env.add_function("div", |a: i64, b: i64| checked(a.checked_div(b), "div"));
    env.add_function("mod", |a: i64, b: i64| checked(a.checked_rem(b), "mod"));
    env.add_function("substr", substr_helper);
    env.add_function("pairs", pairs);
    env.add_function("raw", raw);
    env.add_function("toint", toint);
    env.add_function("htmlescape", htmlescape);
    env.add_function("htmlunescape", htmlunescape);
    env.add_function("urlencode", urlencode);

    env.add_filter("pad", pad);
    env.add_filter("substr", substr_helper);
    env.add_filter("htmlescape", htmlescape);
    env.add_filter("htmlunescape", htmlunescape);
    env.add_filter("urlencode", urlencode);
}

pub(crate) fn register_page(env: &mut Environment<'static>) {
    register(env);
    env.add_function("paginate", paginate);
    env.add_function("lua", lua);
    env.add_function("title", title);
    env.add_function("path", path);
    env.add_function("url", url);
    env.add_function("full_url", full_url);
}

pub(crate) fn template_error(e: RenderError) -> Error {
    Error::new(ErrorKind::InvalidOperation, e.to_string()).with_source(e)
}

// ============================================================================
// Pure Helpers
// ============================================================================

/// Overflow and division by zero become template errors.
fn checked(result: Option<i64>, op: &str) -> Result<i64, Error> {
    result.ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("`{op}` overflowed or divided by zero"),
        )
    })
}

fn substr_helper(text: &str, i: i64, j: i64) -> String {
    substr(text, i, j)
}

/// `pairs("tag", t, "page", 1)` → `{tag: t, page: 1}`
fn pairs(args: Rest<Value>) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "pairs expects an even number of arguments",
        ));
    }

    let map: BTreeMap<String, Value> = args
        .chunks(2)
        .map(|pair| {
            let key = match pair[0].as_str() {
                Some(key) => key.to_owned(),
                None => pair[0].to_string(),
            };
            (key, pair[1].clone())
        })
        .collect();
    Ok(Value::from_serialize(&map))
}

fn raw(value: Value) -> Value {
    Value::from_safe_string(value.to_string())
}

fn toint(value: Value) -> Result<i64, Error> {
    if let Some(n) = value.as_i64() {
        return Ok(n);
    }
    value
        .as_str()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot convert `{value}` to an integer"),
            )
        })
}

fn htmlescape(text: &str) -> Value {
    Value::from_safe_string(html_escape(text))
}

fn htmlunescape(text: &str) -> String {
    html_unescape(text)
}

fn urlencode(text: &str) -> Value {
    Value::from_safe_string(url_encode_path(text))
}

/// Left-pad with zeros: `3|pad(2)` → `03`.
fn pad(value: Value, width: usize) -> String {
    let text = value.to_string();
    format!("{text:0>width$}")
}

// ============================================================================
// Page Helpers
// ============================================================================

fn paginate(state: &State, anchor_class: Option<String>) -> Result<Value, Error> {
    let ctx = RenderContext::from_state(state)?;
    let html = ctx
        .paginate(anchor_class.as_deref().unwrap_or_default())
        .map_err(template_error)?;
    Ok(Value::from_safe_string(html))
}

/// `lua("helpers.greet", name)` calls a scripted function by dotted name.
fn lua(state: &State, name: &str, args: Rest<Value>) -> Result<Value, Error> {
    let ctx = RenderContext::from_state(state)?;
    ctx.lua().invoke(name, &args).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("lua function `{name}` failed"),
        )
        .with_source(e)
    })
}

fn link_data(data: Option<Value>) -> Value {
    match data {
        Some(data) if data.kind() == ValueKind::Map => data,
        _ => context! {},
    }
}

fn title(state: &State, name: &str, data: Option<Value>) -> Result<Value, Error> {
    let ctx = RenderContext::from_state(state)?;
    let title = ctx.app().links.title(name, link_data(data)).map_err(template_error)?;
    Ok(Value::from_safe_string(title))
}

fn path(state: &State, name: &str, data: Option<Value>) -> Result<String, Error> {
    let ctx = RenderContext::from_state(state)?;
    ctx.app().links.path(name, link_data(data)).map_err(template_error)
}

fn url(state: &State, name: &str, data: Option<Value>) -> Result<String, Error> {
    let ctx = RenderContext::from_state(state)?;
    ctx.app().links.url(name, link_data(data)).map_err(template_error)
}

fn full_url(state: &State, name: &str, data: Option<Value>) -> Result<String, Error> {
    let ctx = RenderContext::from_state(state)?;
    ctx.app().links.full_url(name, link_data(data)).map_err(template_error)
}
