//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── build_entries()   ──► one page per entry, in parallel (num_threads)
//!     │                         first error cancels the rest, in-flight pages finish
//!     │
//!     ├── build_lists()     ──► index, tag, annual and monthly lists, paginated
//!     │
//!     ├── build_templates() ──► every file under <theme>/include and <theme>/feeds
//!     │
//!     └── copy_extras()     ──► content and theme extras, optionally rendered
//! ```
//!
//! Content is fully loaded and indexed before any of this starts, so every
//! phase reads immutable grouping indexes.

use crate::{
    app::{App, Unit},
    config::{ExtraFile, SiteConfig},
    content::Entry,
    debug, log,
    render::{Links, Listing, Pagination, Renderer, ViewModel},
    utils::fs::{copy_file, copy_tree, remove_path, write_file},
};
use anyhow::{Context, Result, anyhow};
use globset::GlobBuilder;
use minijinja::{Value, context};
use mlua::Lua;
use parking_lot::Mutex;
use rayon::{ThreadPoolBuilder, prelude::*};
use rustc_hash::FxHashSet;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};
use walkdir::WalkDir;

/// Build every output category of the site into `output_dir`.
pub fn build_site(app: &Arc<App>, renderer: &Renderer) -> Result<()> {
    let started = Instant::now();
    log!("build"; "start ({} entries)", app.content.entries.len());

    build_entries(app, renderer)?;
    log!("build"; "{} entries", app.stats.get(Unit::Entry));

    // the remaining phases run in order on one interpreter
    let lua = app.pool.acquire()?;

    build_lists(app, renderer, &lua)?;
    log!(
        "build";
        "{} index, {} tag, {} annual, {} monthly pages",
        app.stats.get(Unit::Index),
        app.stats.get(Unit::Tag),
        app.stats.get(Unit::Annual),
        app.stats.get(Unit::Monthly)
    );

    build_templates(app, renderer, &lua, "include", "Include", Unit::Include)?;
    build_templates(app, renderer, &lua, "feeds", "Feed", Unit::Feed)?;
    log!("build"; "{} includes, {} feeds", app.stats.get(Unit::Include), app.stats.get(Unit::Feed));

    let config = &app.config;
    copy_extras(app, renderer, &lua, &config.extra_files, &config.content_dir.join("extras"))?;
    copy_extras(
        app,
        renderer,
        &lua,
        &config.theme_config.extra_files,
        &config.theme_path().join("extras"),
    )?;
    log!("build"; "{} extra files", app.stats.get(Unit::Extra));

    debug!("build"; "{}; {} lua interpreters", app.stats, app.pool.created());
    log!("done"; "build: OK ({:.2?})", started.elapsed());
    Ok(())
}

/// Remove every `clean` target under `output_dir`; returns how many existed.
pub fn clean_site(config: &SiteConfig) -> Result<usize> {
    let mut removed = 0;
    for target in &config.clean {
        let path = config.output_dir.join(target.trim_start_matches('/'));
        if remove_path(&path)? {
            debug!("clean"; "removed {}", path.display());
            removed += 1;
        }
    }
    log!("clean"; "removed {} of {} targets", removed, config.clean.len());
    Ok(removed)
}

// ============================================================================
// Entries
// ============================================================================

/// Build every entry page on a pool of `num_threads` workers.
///
/// The first failure sets a shared cancel flag: entries not yet started are
/// skipped, entries already running finish writing, and the recorded error is
/// returned once all workers have joined.
fn build_entries(app: &Arc<App>, renderer: &Renderer) -> Result<()> {
    let workers = ThreadPoolBuilder::new()
        .num_threads(app.config.num_threads)
        .thread_name(|i| format!("moonlog-build-{i}"))
        .build()
        .context("Failed to start build workers")?;

    let entries: &[Arc<Entry>] = &app.content.entries;
    let cancelled = AtomicBool::new(false);
    let first_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);

    workers.install(|| {
        entries.par_iter().for_each(|entry| {
            if cancelled.load(Ordering::Relaxed) {
                return;
            }
            if let Err(e) = build_entry(app, renderer, entry) {
                let e = e.context(format!("Failed to build {}", entry.file_path.display()));
                if !cancelled.swap(true, Ordering::Relaxed) {
                    log!("error"; "{:#}", e);
                    *first_error.lock() = Some(e);
                } else {
                    debug!("error"; "{:#}", e);
                }
            }
        });
    });

    match first_error.into_inner() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn build_entry(app: &Arc<App>, renderer: &Renderer, entry: &Arc<Entry>) -> Result<()> {
    debug!("entry"; "{}", entry.file_path.display());
    let lua = app.pool.acquire()?;
    entry.html(&lua)?;

    let data = Links::entry_data(entry);
    let title = app.links.title("Article", data.clone())?;
    let path = app.config.output_dir.join(app.links.path("Article", data)?);

    let view = ViewModel {
        entry: Some(Arc::clone(entry)),
        ..ViewModel::with_title(title)
    };
    let html = renderer.render_page(app, &lua, "article", view)?;
    write_file(&path, html)?;

    app.stats.inc(Unit::Entry);
    Ok(())
}

// ============================================================================
// Lists
// ============================================================================

/// One paginated list: the entries it shows and how its pages are named.
struct List<'a> {
    /// Link template name.
    name: &'static str,
    unit: Unit,
    /// Page template name.
    page: &'static str,
    step: usize,
    entries: &'a [Arc<Entry>],
    path_data: BTreeMap<String, Value>,
    tag: Option<String>,
    year: Option<i32>,
    month: Option<u32>,
}

impl<'a> List<'a> {
    fn new(name: &'static str, unit: Unit, config: &SiteConfig, entries: &'a [Arc<Entry>]) -> Self {
        let (page, step) = match unit {
            Unit::Index => ("list1", config.pagination1),
            _ => ("list2", config.pagination2),
        };
        Self {
            name,
            unit,
            page,
            step,
            entries,
            path_data: BTreeMap::new(),
            tag: None,
            year: None,
            month: None,
        }
    }

    fn tag(mut self, tag: &str) -> Self {
        self.path_data.insert("tag".into(), Value::from(tag));
        self.tag = Some(tag.to_owned());
        self
    }

    fn year(mut self, year: i32) -> Self {
        self.path_data.insert("year".into(), Value::from(year));
        self.year = Some(year);
        self
    }

    fn month(mut self, month: u32) -> Self {
        self.path_data.insert("month".into(), Value::from(month));
        self.month = Some(month);
        self
    }
}

fn build_lists(app: &Arc<App>, renderer: &Renderer, lua: &Lua) -> Result<()> {
    let config = &app.config;
    let content = &app.content;

    build_list(app, renderer, lua, List::new("Index", Unit::Index, config, &content.entries))?;

    for (tag, entries) in content.tags.iter() {
        let list = List::new("Tag", Unit::Tag, config, entries).tag(tag);
        build_list(app, renderer, lua, list)?;
    }

    for (key, entries) in content.years.iter() {
        let year = parse_key(key, 0..4)?;
        let list = List::new("Annual", Unit::Annual, config, entries).year(year);
        build_list(app, renderer, lua, list)?;
    }

    for (key, entries) in content.months.iter() {
        let year = parse_key(key, 0..4)?;
        let month = parse_key(key, 4..6)?;
        let list = List::new("Monthly", Unit::Monthly, config, entries)
            .year(year)
            .month(month);
        build_list(app, renderer, lua, list)?;
    }

    Ok(())
}

/// Numeric part of a `YYYY` / `YYYYMM` group key.
fn parse_key<T: std::str::FromStr>(key: &str, range: std::ops::Range<usize>) -> Result<T> {
    key.get(range)
        .and_then(|part| part.parse().ok())
        .ok_or_else(|| anyhow!("Malformed archive key `{key}`"))
}

/// Write pages 1, 2, ... of `list` until the last one covers its tail.
///
/// Page 1 is also written to the page-0 path, the section's landing page.
fn build_list(app: &Arc<App>, renderer: &Renderer, lua: &Lua, list: List<'_>) -> Result<()> {
    let output_dir = &app.config.output_dir;

    for page in 1.. {
        let pagination = Pagination::new(page, list.step, list.entries.len());
        let listing = Listing {
            name: list.name,
            pagination,
            path_data: list.path_data.clone(),
        };

        let data = listing.link_data(page);
        let relative = app.links.path(list.name, data.clone())?;
        let landing = match page {
            1 => Some(app.links.path(list.name, listing.link_data(0))?),
            _ => None,
        };
        debug!("list"; "{}", relative);

        let view = ViewModel {
            title: app.links.title(list.name, data)?,
            entries: list.entries[pagination.start..pagination.end].to_vec(),
            tag: list.tag.clone(),
            year: list.year,
            month: list.month,
            listing: Some(listing),
            ..Default::default()
        };
        let html = renderer
            .render_page(app, lua, list.page, view)
            .with_context(|| format!("Failed to render {relative}"))?;

        write_file(&output_dir.join(&relative), &html)?;
        if let Some(landing) = landing.filter(|landing| *landing != relative) {
            write_file(&output_dir.join(landing), &html)?;
        }

        app.stats.inc(list.unit);
        if pagination.is_last {
            break;
        }
    }
    Ok(())
}

// ============================================================================
// Theme Templates
// ============================================================================

/// Render every file in `<theme>/<dir>` to the `link` path of its file name.
fn build_templates(
    app: &Arc<App>,
    renderer: &Renderer,
    lua: &Lua,
    dir: &str,
    link: &str,
    unit: Unit,
) -> Result<()> {
    let base = app.config.theme_path().join(dir);
    if !base.is_dir() {
        debug!("build"; "no {} directory in theme", dir);
        return Ok(());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(&base)
        .with_context(|| format!("Failed to read {}", base.display()))?
        .filter_map(|item| item.ok().map(|item| item.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    for file in files {
        let name = file.file_name().unwrap_or_default().to_string_lossy().into_owned();
        debug!("build"; "{}/{}", dir, name);

        let render = || -> Result<()> {
            let relative = app.links.path(link, context! { name => name.as_str() })?;
            let view = ViewModel::default();
            let html = renderer.render_page(app, lua, &file.to_string_lossy(), view)?;
            write_file(&app.config.output_dir.join(relative), html)
        };
        render().with_context(|| format!("Failed to build {dir}/{name}"))?;
        app.stats.inc(unit);
    }
    Ok(())
}

// ============================================================================
// Extras
// ============================================================================

/// Copy (or render, when `template` is set) files matching each extra's glob
/// under `base` to `<output_dir>/<dst>/<file name>`.
///
/// A file matched by several extras is processed once.
fn copy_extras(
    app: &Arc<App>,
    renderer: &Renderer,
    lua: &Lua,
    extras: &[ExtraFile],
    base: &Path,
) -> Result<()> {
    if extras.is_empty() || !base.is_dir() {
        return Ok(());
    }

    let mut done = FxHashSet::default();
    for extra in extras {
        for source in glob_matches(base, &extra.src)? {
            let key = fs::canonicalize(&source).unwrap_or_else(|_| source.clone());
            if !done.insert(key) {
                continue;
            }

            let dest = app
                .config
                .output_dir
                .join(extra.dst.trim_start_matches('/'))
                .join(source.file_name().unwrap_or_default());
            debug!("extra"; "{} -> {}", source.display(), dest.display());

            let copied = if extra.template && source.is_file() {
                renderer
                    .render_page(app, lua, &source.to_string_lossy(), ViewModel::default())
                    .map_err(anyhow::Error::from)
                    .and_then(|html| write_file(&dest, html))
            } else if source.is_dir() {
                copy_tree(&source, &dest)
            } else {
                copy_file(&source, &dest)
            };
            copied.with_context(|| format!("Failed to copy extra {}", source.display()))?;
            app.stats.inc(Unit::Extra);
        }
    }
    Ok(())
}

/// Paths under `base` whose base-relative path matches `pattern`.
///
/// `*` does not cross `/`, so `css/*` matches `css/site.css` but not
/// `css/vendor/lib.css`.
fn glob_matches(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(pattern.trim_start_matches('/'))
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid extra file pattern `{pattern}`"))?
        .compile_matcher();

    let mut matches = Vec::new();
    for item in WalkDir::new(base).min_depth(1).sort_by_file_name() {
        let item = item.with_context(|| format!("Failed to walk {}", base.display()))?;
        let relative = item.path().strip_prefix(base)?;
        if matcher.is_match(relative) {
            matches.push(item.into_path());
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::{Setup, tests::starter_site},
        content::StatusFilter,
    };

    fn open(root: &Path) -> (Arc<App>, Renderer) {
        let app = App::open(root, &StatusFilter::published()).unwrap();
        let renderer = Renderer::new(app.config.theme_path());
        (app, renderer)
    }

    fn read(app: &App, relative: &str) -> String {
        fs::read_to_string(app.config.output_dir.join(relative)).unwrap()
    }

    #[test]
    fn test_build_starter_site() {
        let dir = starter_site();
        let (app, renderer) = open(dir.path());
        build_site(&app, &renderer).unwrap();

        assert_eq!(app.stats.get(Unit::Entry), app.content.entries.len());
        assert!(app.stats.get(Unit::Index) >= 1);
        assert_eq!(app.stats.get(Unit::Tag), app.content.tags.iter().count());
        assert_eq!(app.stats.get(Unit::Annual), app.content.years.iter().count());
        assert_eq!(app.stats.get(Unit::Monthly), app.content.months.iter().count());
        assert_eq!(app.stats.get(Unit::Feed), 1);

        let entry = &app.content.entries[0];
        let relative = app.links.path("Article", Links::entry_data(entry)).unwrap();
        let page = read(&app, &relative);
        assert!(page.contains("<!DOCTYPE html>"));
        assert!(page.contains(&entry.title));
        assert!(page.contains(&*entry.cached_html().unwrap()));

        let feed = read(&app, "feeds/atom.xml");
        assert!(feed.contains("<feed"));
        assert_eq!(feed.matches("<entry>").count(), app.content.entries.len());

        assert!(read(&app, "style.css").contains("body"));
        assert!(read(&app, "robots.txt").contains("http://localhost:7000/"));
    }

    #[test]
    fn test_first_page_doubles_as_landing_page() {
        let dir = starter_site();
        let (app, renderer) = open(dir.path());
        build_site(&app, &renderer).unwrap();

        let tag = app.content.tags.sorted_keys(false)[0].to_owned();
        let first = app.links.path("Tag", context! { tag => tag.as_str(), page => 1 }).unwrap();
        let landing = app.links.path("Tag", context! { tag => tag.as_str(), page => 0 }).unwrap();
        assert_ne!(first, landing);
        assert_eq!(read(&app, &first), read(&app, &landing));
        assert_eq!(read(&app, "index.html"), read(&app, "page/1.html"));
    }

    #[test]
    fn test_written_page_matches_render() {
        let dir = starter_site();
        let (app, renderer) = open(dir.path());
        build_site(&app, &renderer).unwrap();

        let lua = app.pool.acquire().unwrap();
        let entry = &app.content.entries[0];
        let data = Links::entry_data(entry);
        let view = ViewModel {
            entry: Some(Arc::clone(entry)),
            ..ViewModel::with_title(app.links.title("Article", data.clone()).unwrap())
        };
        let rendered = renderer.render_page(&app, &lua, "article", view).unwrap();
        let relative = app.links.path("Article", data).unwrap();
        assert_eq!(read(&app, &relative), rendered);
    }

    #[test]
    fn test_failing_conversion_names_entry() {
        let dir = starter_site();
        let articles = dir.path().join("content/articles");
        fs::write(
            articles.join("broken.rst"),
            ":title: Broken\n:status: published\n:posted_at: 2020-01-01 00:00:00\n\nbody",
        )
        .unwrap();

        let (app, renderer) = open(dir.path());
        let err = build_site(&app, &renderer).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("broken.rst"), "{message}");
        assert!(message.contains(".rst"));
        // later phases never ran
        assert_eq!(app.stats.get(Unit::Index), 0);
    }

    #[test]
    fn test_first_failure_cancels_pending_entries() {
        let dir = starter_site();
        let config_path = dir.path().join("config.lua");
        let config = fs::read_to_string(&config_path)
            .unwrap()
            .replace("num_threads = 4", "num_threads = 2")
            .replace(
                "markup_processors = {",
                "markup_processors = {\n    [\".slow\"] = function(text)\n      \
                 local started = os.clock()\n      \
                 while os.clock() - started < 0.005 do end\n      \
                 return text\n    end,",
            );
        fs::write(&config_path, config).unwrap();

        let articles = dir.path().join("content/articles");
        for i in 0..40 {
            fs::write(
                articles.join(format!("{i:02}_slow-{i}.slow")),
                format!(":title: Slow {i}\n:status: published\n:posted_at: 2023-01-01 00:{i:02}:00\n\nbody"),
            )
            .unwrap();
        }
        // newest entry, and one near the middle of the sorted list
        fs::write(
            articles.join("first.rst"),
            ":title: First\n:status: published\n:posted_at: 2030-01-01 00:00:00\n\nbody",
        )
        .unwrap();
        fs::write(
            articles.join("middle.rst"),
            ":title: Middle\n:status: published\n:posted_at: 2023-01-01 00:19:30\n\nbody",
        )
        .unwrap();

        let (app, renderer) = open(dir.path());
        assert_eq!(app.config.num_threads, 2);
        assert_eq!(app.content.entries.len(), 44);

        let message = format!("{:#}", build_site(&app, &renderer).unwrap_err());
        let named = ["first.rst", "middle.rst"]
            .iter()
            .filter(|name| message.contains(*name))
            .count();
        assert_eq!(named, 1, "{message}");

        let built = app.stats.get(Unit::Entry);
        assert!(built < 20, "{built} entries built after the first failure");
        let written = WalkDir::new(app.config.output_dir.join("articles"))
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count();
        assert_eq!(written, built);
    }

    #[test]
    fn test_empty_site_has_one_index_page() {
        let dir = starter_site();
        fs::remove_dir_all(dir.path().join("content/articles")).unwrap();
        fs::create_dir_all(dir.path().join("content/articles")).unwrap();

        let (app, renderer) = open(dir.path());
        build_site(&app, &renderer).unwrap();
        assert_eq!(app.stats.get(Unit::Entry), 0);
        assert_eq!(app.stats.get(Unit::Index), 1);
        assert_eq!(app.stats.get(Unit::Tag), 0);
        assert!(read(&app, "index.html").contains("<!DOCTYPE html>"));
    }

    #[test]
    fn test_extras_dedupe_and_layout() {
        let dir = starter_site();
        let (app, renderer) = open(dir.path());
        let extras_dir = dir.path().join("content/extras");
        fs::create_dir_all(extras_dir.join("img/icons")).unwrap();
        fs::write(extras_dir.join("img/a.png"), "a").unwrap();
        fs::write(extras_dir.join("img/icons/b.png"), "b").unwrap();

        let extras = vec![
            ExtraFile { src: "img/*.png".into(), dst: "images".into(), template: false },
            ExtraFile { src: "img/a.png".into(), dst: "twice".into(), template: false },
            ExtraFile { src: "img/icons".into(), dst: "".into(), template: false },
        ];
        let lua = app.pool.acquire().unwrap();
        copy_extras(&app, &renderer, &lua, &extras, &extras_dir).unwrap();

        let out = &app.config.output_dir;
        assert_eq!(fs::read_to_string(out.join("images/a.png")).unwrap(), "a");
        assert!(!out.join("twice/a.png").exists());
        assert!(!out.join("images/b.png").exists());
        assert_eq!(fs::read_to_string(out.join("icons/b.png")).unwrap(), "b");
        assert_eq!(app.stats.get(Unit::Extra), 2);
    }

    #[test]
    fn test_clean_site() {
        let dir = starter_site();
        let setup = Setup::open(dir.path()).unwrap();
        let config = &setup.config;
        write_file(&config.output_dir.join("index.html"), "x").unwrap();
        write_file(&config.output_dir.join("tags/rust/index.html"), "x").unwrap();
        write_file(&config.output_dir.join("keep.txt"), "x").unwrap();

        let removed = clean_site(config).unwrap();
        assert_eq!(removed, 2);
        assert!(!config.output_dir.join("tags").exists());
        assert!(config.output_dir.join("keep.txt").exists());
    }

    #[test]
    fn test_glob_matches() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("css/vendor")).unwrap();
        fs::write(dir.path().join("css/site.css"), "").unwrap();
        fs::write(dir.path().join("css/vendor/lib.css"), "").unwrap();

        let found = glob_matches(dir.path(), "css/*.css").unwrap();
        assert_eq!(found, vec![dir.path().join("css/site.css")]);
        assert!(glob_matches(dir.path(), "[").is_err());
    }
}
