//! Content entries parsed from `:key: value` header files.
//!
//! ```text
//! :title: Hello world
//! :tags: rust, lua
//! :status: published
//! :posted_at: 2024-01-15 09:00:00
//!
//! Body text in the entry's markup format...
//! ```

use super::{LoadError, Timestamp};
use crate::{
    config::Timezone,
    markup::{self, MarkupError},
};
use mlua::Lua;
use parking_lot::Mutex;
use regex::Regex;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, LazyLock, OnceLock},
};

/// `05_my-slug.md` → `my-slug`
static SLUG_FROM_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+_(.+)\.\w+").unwrap());

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Draft,
    Published,
}

impl Status {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entry
// ============================================================================

/// Public location of an entry, known once link templates are compiled.
#[derive(Debug, Clone, Default)]
pub struct Permalink {
    /// Site-absolute path, e.g. `/articles/2024/01/hello.html`.
    pub path: String,
    /// `site_url` joined with `path`.
    pub url: String,
}

#[derive(Debug)]
pub struct Entry {
    pub file_path: PathBuf,
    /// Extension including the dot, e.g. `.md`.
    pub format: String,
    pub title: String,
    pub slug: String,
    pub body_text: String,
    pub status: Status,
    pub tags: Vec<String>,
    pub posted_at: Timestamp,
    pub updated_at: Timestamp,
    html: Mutex<Option<Arc<str>>>,
    permalink: OnceLock<Permalink>,
}

/// Header values collected before defaults are applied.
#[derive(Default)]
struct Header {
    title: String,
    slug: String,
    status: Option<Status>,
    tags: Vec<String>,
    posted_at: Option<Timestamp>,
    updated_at: Option<Timestamp>,
}

impl Entry {
    /// Parse entry `source` read from `path`.
    ///
    /// Entries without a `status` header are drafts.
    pub fn parse(path: &Path, source: &str, tz: &Timezone) -> Result<Self, LoadError> {
        let (header_lines, body_text) = split_source(source);

        let mut header = Header::default();
        for line in header_lines {
            header.apply(path, line, tz)?;
        }

        let format = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let slug = derive_slug(path, header.slug, &header.title);
        let posted_at = header.posted_at.unwrap_or_else(Timestamp::epoch);
        let updated_at = header.updated_at.unwrap_or_else(|| posted_at.clone());

        Ok(Self {
            file_path: path.to_path_buf(),
            format,
            title: header.title,
            slug,
            body_text,
            status: header.status.unwrap_or(Status::Draft),
            tags: header.tags,
            posted_at,
            updated_at,
            html: Mutex::new(None),
            permalink: OnceLock::new(),
        })
    }

    /// Rendered HTML, converting on first use.
    ///
    /// The entry lock is held while converting so concurrent callers wait for
    /// the first conversion instead of repeating it.
    pub fn html(&self, lua: &Lua) -> Result<Arc<str>, MarkupError> {
        let mut cached = self.html.lock();
        if let Some(html) = cached.as_ref() {
            return Ok(Arc::clone(html));
        }

        let html: Arc<str> = markup::convert(lua, &self.body_text, &self.format)?.into();
        *cached = Some(Arc::clone(&html));
        Ok(html)
    }

    /// HTML from an earlier [`Entry::html`] call, if any.
    pub fn cached_html(&self) -> Option<Arc<str>> {
        self.html.lock().clone()
    }

    pub fn permalink(&self) -> Option<&Permalink> {
        self.permalink.get()
    }

    pub(crate) fn set_permalink(&self, permalink: Permalink) {
        // first assignment wins; entries are linked exactly once by the loader
        let _ = self.permalink.set(permalink);
    }
}

impl Header {
    fn apply(&mut self, path: &Path, line: &str, tz: &Timezone) -> Result<(), LoadError> {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() < 3 {
            return Err(LoadError::Header {
                path: path.to_path_buf(),
                line: line.to_owned(),
            });
        }

        let key = parts[1].trim();
        let value = parts[2..].join(":").trim().to_owned();
        match key {
            "title" => self.title = value,
            "slug" => self.slug = value,
            "status" => {
                let status = value.parse().map_err(|()| LoadError::Status {
                    path: path.to_path_buf(),
                    value: value.clone(),
                })?;
                self.status = Some(status);
            }
            "tags" => {
                self.tags = value
                    .split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_owned)
                    .collect();
            }
            "posted_at" | "updated_at" => {
                let timestamp =
                    Timestamp::parse(&value, tz).ok_or_else(|| LoadError::Timestamp {
                        path: path.to_path_buf(),
                        key: key.to_owned(),
                        value: value.clone(),
                    })?;
                if key == "posted_at" {
                    self.posted_at = Some(timestamp);
                } else {
                    self.updated_at = Some(timestamp);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Header lines (before the first blank line) and the verbatim body after it.
fn split_source(source: &str) -> (Vec<&str>, String) {
    let mut lines = source.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

    let header = lines
        .by_ref()
        .take_while(|line| !line.is_empty())
        .collect();
    let body = lines.collect::<Vec<_>>().join("\n");
    (header, body)
}

/// Explicit slug, else the numbered file name, else the title, else the file stem.
fn derive_slug(path: &Path, explicit: String, title: &str) -> String {
    if !explicit.is_empty() {
        return explicit;
    }

    let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if let Some(caps) = SLUG_FROM_FILE.captures(&file_name) {
        return caps[1].to_owned();
    }
    if !title.is_empty() {
        return title.to_owned();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Barrier, thread};

    const SOURCE: &str = "\
:title: Hello: world
:tags: rust,  lua ,
:status: published
:posted_at: 2024-01-15 09:00:00

First paragraph.

Second paragraph.";

    fn parse(name: &str, source: &str) -> Result<Entry, LoadError> {
        Entry::parse(Path::new(name), source, &Timezone::default())
    }

    #[test]
    fn test_parse_entry() {
        let entry = parse("articles/2024/01/15_hello-world.md", SOURCE).unwrap();
        assert_eq!(entry.title, "Hello: world");
        assert_eq!(entry.slug, "hello-world");
        assert_eq!(entry.format, ".md");
        assert_eq!(entry.status, Status::Published);
        assert_eq!(entry.tags, vec!["rust", "lua"]);
        assert_eq!(entry.posted_at.to_string(), "2024-01-15 09:00:00");
        assert_eq!(entry.updated_at, entry.posted_at);
        assert_eq!(entry.body_text, "First paragraph.\n\nSecond paragraph.");
        assert!(entry.cached_html().is_none());
        assert!(entry.permalink().is_none());
    }

    #[test]
    fn test_header_order_independent() {
        let reordered = "\
:posted_at: 2024-01-15 09:00:00
:status: published
:tags: rust, lua
:title: Hello: world

First paragraph.

Second paragraph.";
        let a = parse("15_hello-world.md", SOURCE).unwrap();
        let b = parse("15_hello-world.md", reordered).unwrap();
        assert_eq!(a.title, b.title);
        assert_eq!(a.slug, b.slug);
        assert_eq!(a.tags, b.tags);
        assert_eq!(a.posted_at, b.posted_at);
        assert_eq!(a.updated_at, b.updated_at);
    }

    #[test]
    fn test_updated_at_after_posted_at() {
        // updated_at declared before posted_at still wins over the default
        let source = ":updated_at: 2024-02-01 00:00:00\n:posted_at: 2024-01-01 00:00:00\n\nbody";
        let entry = parse("a.md", source).unwrap();
        assert_eq!(entry.updated_at.to_string(), "2024-02-01 00:00:00");
        assert_eq!(entry.posted_at.to_string(), "2024-01-01 00:00:00");
    }

    #[test]
    fn test_slug_derivation() {
        let explicit = parse("01_file.md", ":slug: chosen\n:title: T\n\n").unwrap();
        assert_eq!(explicit.slug, "chosen");

        let from_title = parse("notes.md", ":title: From Title\n\n").unwrap();
        assert_eq!(from_title.slug, "From Title");

        // the title comes after the slug would have been derived line by line
        let late_title = parse("notes.md", ":status: draft\n:title: Late\n\n").unwrap();
        assert_eq!(late_title.slug, "Late");

        let from_stem = parse("notes.txt", ":status: draft\n\n").unwrap();
        assert_eq!(from_stem.slug, "notes");

        // the numbered part may follow other text
        let prefixed = parse("draft-12_late-night.md", ":title: T\n\n").unwrap();
        assert_eq!(prefixed.slug, "late-night");
    }

    #[test]
    fn test_malformed_header() {
        let err = parse("bad.md", ":title: ok\ntitle without colons\n\nbody").unwrap_err();
        match err {
            LoadError::Header { path, line } => {
                assert_eq!(path, PathBuf::from("bad.md"));
                assert_eq!(line, "title without colons");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_whitespace_line_is_not_a_separator() {
        let err = parse("spaced.md", ":title: ok\n   \n:status: draft\n\nbody").unwrap_err();
        assert!(matches!(err, LoadError::Header { line, .. } if line == "   "));
    }

    #[test]
    fn test_invalid_status() {
        let err = parse("bad.md", ":status: archived\n\n").unwrap_err();
        assert!(matches!(err, LoadError::Status { value, .. } if value == "archived"));
    }

    #[test]
    fn test_invalid_timestamp_names_value() {
        let err = parse("bad.md", ":posted_at: yesterday\n\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("yesterday"));
        assert!(message.contains("bad.md"));
    }

    #[test]
    fn test_no_blank_line() {
        let entry = parse("only-header.md", ":title: T").unwrap();
        assert_eq!(entry.body_text, "");
        assert_eq!(entry.status, Status::Draft);
        assert_eq!(entry.posted_at, Timestamp::epoch());
    }

    #[test]
    fn test_crlf_source() {
        let entry = parse("win.md", ":title: T\r\n\r\nline one\r\nline two").unwrap();
        assert_eq!(entry.title, "T");
        assert_eq!(entry.body_text, "line one\nline two");
    }

    /// `.txt` wraps text in `<p>`, counting calls in the global `calls`.
    fn counting_lua() -> Lua {
        let lua = Lua::new();
        lua.load(
            r#"
            calls = 0
            CONFIG = {
              markup_processors = {
                [".txt"] = function(text)
                  calls = calls + 1
                  local started = os.clock()
                  while os.clock() - started < 0.01 do end
                  return "<p>" .. text .. "</p>"
                end,
              },
            }
            "#,
        )
        .exec()
        .unwrap();
        lua
    }

    #[test]
    fn test_html_is_memoized() {
        let lua = counting_lua();
        let entry = parse("note.txt", ":title: T\n\nhello").unwrap();
        let first = entry.html(&lua).unwrap();
        let second = entry.html(&lua).unwrap();

        assert_eq!(&*first, "<p>hello</p>");
        assert_eq!(first, second);
        assert_eq!(lua.globals().get::<i64>("calls").unwrap(), 1);
        assert_eq!(entry.cached_html().as_deref(), Some("<p>hello</p>"));
    }

    #[test]
    fn test_concurrent_html_converts_once() {
        let lua = counting_lua();
        let entry = parse("note.txt", ":title: T\n\nhello").unwrap();
        let barrier = Barrier::new(4);

        let results: Vec<Arc<str>> = thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        entry.html(&lua).unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(results.iter().all(|html| &**html == "<p>hello</p>"));
        assert_eq!(lua.globals().get::<i64>("calls").unwrap(), 1);
    }

    #[test]
    fn test_failed_conversion_is_not_cached() {
        let lua = Lua::new();
        lua.load("CONFIG = { markup_processors = {} }").exec().unwrap();

        let entry = parse("note.rst", ":title: T\n\nhello").unwrap();
        assert!(matches!(entry.html(&lua), Err(MarkupError::UnknownFormat(f)) if f == ".rst"));
        assert!(entry.cached_html().is_none());
    }
}
