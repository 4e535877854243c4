//! Template views of entries, timestamps, lists and the site.

use crate::{
    app::App,
    content::{Entries, Entry, GroupIndex, Timestamp},
};
use minijinja::{
    Error, ErrorKind, State, Value,
    value::{Enumerator, Object, ObjectRepr, from_args},
};
use mlua::Lua;
use std::{fmt, sync::Arc};

fn unknown_method(method: &str) -> Error {
    Error::new(ErrorKind::UnknownMethod, format!("no method named `{method}`"))
}

// ============================================================================
// Entry
// ============================================================================

/// An entry as templates see it.
///
/// With an interpreter attached, `body_html` converts the entry on first
/// access (memoized on the entry); detached views, used by path and title
/// templates, only see HTML converted earlier.
#[derive(Debug)]
pub struct EntryView {
    entry: Arc<Entry>,
    lua: Option<Lua>,
}

impl EntryView {
    pub fn new(entry: Arc<Entry>, lua: Lua) -> Self {
        Self {
            entry,
            lua: Some(lua),
        }
    }

    pub fn detached(entry: Arc<Entry>) -> Self {
        Self { entry, lua: None }
    }

    fn body_html(&self) -> Option<Value> {
        let html = match &self.lua {
            Some(lua) => match self.entry.html(lua) {
                Ok(html) => html,
                Err(e) => {
                    let message = format!("{}: {e}", self.entry.file_path.display());
                    return Some(Value::from(
                        Error::new(ErrorKind::InvalidOperation, message).with_source(e),
                    ));
                }
            },
            None => self.entry.cached_html()?,
        };
        Some(Value::from_safe_string(html.to_string()))
    }
}

impl Object for EntryView {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let entry = &self.entry;
        let permalink = entry.permalink();
        let value = match key.as_str()? {
            "file_path" => Value::from(entry.file_path.to_string_lossy().into_owned()),
            "format" => Value::from(entry.format.clone()),
            "title" => Value::from(entry.title.clone()),
            "slug" => Value::from(entry.slug.clone()),
            "body_text" => Value::from(entry.body_text.clone()),
            "body_html" => return self.body_html(),
            "status" => Value::from(entry.status.as_str()),
            "tags" => Value::from(entry.tags.clone()),
            "posted_at" => Value::from_object(entry.posted_at.clone()),
            "updated_at" => Value::from_object(entry.updated_at.clone()),
            "permalink_path" => Value::from(permalink?.path.clone()),
            "permalink_url" => Value::from(permalink?.url.clone()),
            _ => return None,
        };
        Some(value)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&[
            "file_path",
            "format",
            "title",
            "slug",
            "body_text",
            "body_html",
            "status",
            "tags",
            "posted_at",
            "updated_at",
            "permalink_path",
            "permalink_url",
        ])
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entry.title)
    }
}

// ============================================================================
// Timestamp
// ============================================================================

impl Object for Timestamp {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let value = match key.as_str()? {
            "year" => Value::from(self.year()),
            "month" => Value::from(self.month()),
            "day" => Value::from(self.day()),
            "hour" => Value::from(self.hour()),
            "minute" => Value::from(self.minute()),
            "second" => Value::from(self.second()),
            "tzname" => Value::from(self.zone()),
            "tzoffset" => Value::from(self.offset_seconds()),
            "unix" => Value::from(self.unix()),
            "rfc3339" => Value::from(self.rfc3339()),
            _ => return None,
        };
        Some(value)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&[
            "year", "month", "day", "hour", "minute", "second", "tzname", "tzoffset", "unix",
            "rfc3339",
        ])
    }

    /// `posted_at.format("%Y/%m/%d %Z")`
    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "format" => {
                let (layout,): (&str,) = from_args(args)?;
                self.format(layout).map(Value::from).ok_or_else(|| {
                    Error::new(
                        ErrorKind::InvalidOperation,
                        format!("invalid time format `{layout}`"),
                    )
                })
            }
            _ => Err(unknown_method(method)),
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

// ============================================================================
// Entry List
// ============================================================================

/// A sequence of entries with `sub_list(i, j)`.
#[derive(Debug, Clone)]
pub struct EntryList {
    entries: Entries,
    lua: Lua,
}

impl EntryList {
    pub fn new(entries: impl Into<Entries>, lua: Lua) -> Self {
        Self {
            entries: entries.into(),
            lua,
        }
    }
}

impl Object for EntryList {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Seq
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let entry = self.entries.get(key.as_usize()?)?;
        Some(Value::from_object(EntryView::new(
            Arc::clone(entry),
            self.lua.clone(),
        )))
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Seq(self.entries.len())
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "sub_list" => {
                let (i, j): (i64, i64) = from_args(args)?;
                let entries = self.entries.sub_list(i, j).to_vec();
                Ok(Value::from_object(Self::new(entries, self.lua.clone())))
            }
            _ => Err(unknown_method(method)),
        }
    }
}

// ============================================================================
// Groups
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum GroupKind {
    Tags,
    Years,
    Months,
}

/// One of the site's grouping indexes: key → entry list, plus `sorted_keys`.
#[derive(Debug)]
struct Group {
    app: Arc<App>,
    lua: Lua,
    kind: GroupKind,
}

impl Group {
    fn index(&self) -> &GroupIndex {
        let content = &self.app.content;
        match self.kind {
            GroupKind::Tags => &content.tags,
            GroupKind::Years => &content.years,
            GroupKind::Months => &content.months,
        }
    }
}

impl Object for Group {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let entries = self.index().get(key.as_str()?)?;
        Some(Value::from_object(EntryList::new(
            entries.to_vec(),
            self.lua.clone(),
        )))
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(
            self.index()
                .sorted_keys(false)
                .into_iter()
                .map(Value::from)
                .collect(),
        )
    }

    /// `site.tags.sorted_keys()`, `site.years.sorted_keys(true)`
    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "sorted_keys" => {
                let (reverse,): (Option<bool>,) = from_args(args)?;
                let keys = self.index().sorted_keys(reverse.unwrap_or(false));
                Ok(Value::from_iter(keys))
            }
            _ => Err(unknown_method(method)),
        }
    }
}

// ============================================================================
// Site
// ============================================================================

/// `site` in page templates.
#[derive(Debug)]
pub struct SiteObject {
    app: Arc<App>,
    lua: Lua,
}

impl SiteObject {
    pub fn new(app: Arc<App>, lua: Lua) -> Self {
        Self { app, lua }
    }

    fn group(&self, kind: GroupKind) -> Value {
        Value::from_object(Group {
            app: Arc::clone(&self.app),
            lua: self.lua.clone(),
            kind,
        })
    }
}

impl Object for SiteObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let config = &self.app.config;
        let value = match key.as_str()? {
            "url" => Value::from(config.site_url.clone()),
            "config" => Value::from_serialize(&**config),
            "params" => Value::from_serialize(config.merged_params()),
            "entries" => Value::from_object(EntryList::new(
                self.app.content.entries.to_vec(),
                self.lua.clone(),
            )),
            "tags" => self.group(GroupKind::Tags),
            "years" => self.group(GroupKind::Years),
            "months" => self.group(GroupKind::Months),
            _ => return None,
        };
        Some(value)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&["url", "config", "params", "entries", "tags", "years", "months"])
    }
}
