//! Page rendering with lazily loaded, cached theme templates.
//!
//! A page template may name a layout with a marker comment:
//!
//! ```jinja
//! {# layout: default #}
//! <article>{{ entry.body_html }}</article>
//! ```
//!
//! The page renders first; `<theme>/layouts/default.html` then renders with the
//! same context plus `yield()`, which returns the page output unescaped.

use super::{RenderContext, RenderError, ViewModel, helpers};
use crate::app::App;
use minijinja::{Environment, Value, path_loader};
use mlua::Lua;
use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
};

static LAYOUT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{#-?\s*layout:\s*(\S+?)\s*-?#\}").unwrap());

pub struct Renderer {
    theme_dir: PathBuf,
    cache: Mutex<TemplateCache>,
}

struct TemplateCache {
    env: Environment<'static>,
    /// Loaded template key → key of its layout, if it declared one.
    layouts: FxHashMap<String, Option<String>>,
}

impl Renderer {
    pub fn new(theme_dir: impl Into<PathBuf>) -> Self {
        let theme_dir = theme_dir.into();
        let mut env = Environment::new();
        // `{% include %}` / `{% extends %}` resolve against the theme
        env.set_loader(path_loader(&theme_dir));
        helpers::register_page(&mut env);

        Self {
            theme_dir,
            cache: Mutex::new(TemplateCache {
                env,
                layouts: FxHashMap::default(),
            }),
        }
    }

    /// `name` itself when it is an existing file, else `<theme>/pages/<name>.html`.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_file() {
            path.to_path_buf()
        } else {
            self.theme_dir.join("pages").join(format!("{name}.html"))
        }
    }

    /// Render page `name` (see [`Renderer::resolve`]) for `view`.
    ///
    /// The cache lock is held from lookup through execution.
    pub fn render_page(
        &self,
        app: &Arc<App>,
        lua: &Lua,
        name: &str,
        view: ViewModel,
    ) -> Result<String, RenderError> {
        let path = self.resolve(name);
        let key = path.to_string_lossy().into_owned();

        let mut cache = self.cache.lock();
        let layout = cache.load(&key, &path, &self.theme_dir)?;

        let ctx = Arc::new(RenderContext::new(Arc::clone(app), lua.clone(), view));
        let body = cache.render(&key, Value::from_dyn_object(Arc::clone(&ctx)))?;
        match layout {
            Some(layout) => cache.render(&layout, Value::from_object(ctx.with_yield(body))),
            None => Ok(body),
        }
    }
}

impl TemplateCache {
    /// Compile `path` (and its layout) on first use; return the layout key.
    fn load(&mut self, key: &str, path: &Path, theme_dir: &Path) -> Result<Option<String>, RenderError> {
        if let Some(layout) = self.layouts.get(key) {
            return Ok(layout.clone());
        }

        let source = read(path)?;
        let layout = match LAYOUT_MARKER.captures(&source) {
            Some(caps) => {
                let layout_path = theme_dir.join("layouts").join(format!("{}.html", &caps[1]));
                let layout_key = layout_path.to_string_lossy().into_owned();
                if !self.layouts.contains_key(&layout_key) {
                    let layout_source = read(&layout_path)?;
                    self.add(&layout_key, layout_source)?;
                    self.layouts.insert(layout_key.clone(), None);
                }
                Some(layout_key)
            }
            None => None,
        };

        self.add(key, source)?;
        self.layouts.insert(key.to_owned(), layout.clone());
        Ok(layout)
    }

    fn add(&mut self, key: &str, source: String) -> Result<(), RenderError> {
        self.env
            .add_template_owned(key.to_owned(), source)
            .map_err(RenderError::template(key))
    }

    fn render(&self, key: &str, root: Value) -> Result<String, RenderError> {
        let template = self.env.get_template(key).map_err(RenderError::template(key))?;
        template.render(root).map_err(RenderError::template(key))
    }
}

fn read(path: &Path) -> Result<String, RenderError> {
    fs::read_to_string(path).map_err(|e| RenderError::Io(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::{App, tests::starter_site},
        content::StatusFilter,
    };

    fn app(root: &Path) -> Arc<App> {
        App::open(root, &StatusFilter::published()).unwrap()
    }

    fn write_page(app: &App, name: &str, source: &str) {
        let path = app.config.theme_path().join("pages").join(format!("{name}.html"));
        fs::write(path, source).unwrap();
    }

    #[test]
    fn test_layout_wraps_page() {
        let dir = starter_site();
        let app = app(dir.path());
        write_page(&app, "plain", "{# layout: default #}<p>{{ page_title }}</p>");

        let renderer = Renderer::new(app.config.theme_path());
        let lua = app.pool.acquire().unwrap();
        let html = renderer
            .render_page(&app, &lua, "plain", ViewModel::with_title("A &amp; B".into()))
            .unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains("<main>\n<p>A &amp; B</p>\n</main>"));
        assert!(html.contains("&copy; Anonymous"));
    }

    #[test]
    fn test_page_without_layout() {
        let dir = starter_site();
        let app = app(dir.path());
        write_page(&app, "bare", "{{ site.entries|length }} entries, first: {{ site.entries[0].title }}");

        let renderer = Renderer::new(app.config.theme_path());
        let lua = app.pool.acquire().unwrap();
        let html = renderer.render_page(&app, &lua, "bare", ViewModel::default()).unwrap();
        assert_eq!(html, format!("2 entries, first: {}", app.content.entries[0].title));
    }

    #[test]
    fn test_templates_are_cached() {
        let dir = starter_site();
        let app = app(dir.path());
        write_page(&app, "cached", "first");

        let renderer = Renderer::new(app.config.theme_path());
        let lua = app.pool.acquire().unwrap();
        assert_eq!(renderer.render_page(&app, &lua, "cached", ViewModel::default()).unwrap(), "first");

        write_page(&app, "cached", "second");
        assert_eq!(renderer.render_page(&app, &lua, "cached", ViewModel::default()).unwrap(), "first");

        // a fresh renderer sees the change
        let fresh = Renderer::new(app.config.theme_path());
        assert_eq!(fresh.render_page(&app, &lua, "cached", ViewModel::default()).unwrap(), "second");
    }

    #[test]
    fn test_missing_page_and_layout() {
        let dir = starter_site();
        let app = app(dir.path());
        write_page(&app, "orphan", "{# layout: nowhere #}x");

        let renderer = Renderer::new(app.config.theme_path());
        let lua = app.pool.acquire().unwrap();
        let missing = renderer.render_page(&app, &lua, "nope", ViewModel::default());
        assert!(matches!(missing, Err(RenderError::Io(path, _)) if path.ends_with("pages/nope.html")));

        let orphan = renderer.render_page(&app, &lua, "orphan", ViewModel::default());
        assert!(matches!(orphan, Err(RenderError::Io(path, _)) if path.ends_with("layouts/nowhere.html")));
    }

    #[test]
    fn test_render_file_path_and_helpers() {
        let dir = starter_site();
        let app = app(dir.path());
        let file = dir.path().join("standalone.txt");
        fs::write(
            &file,
            "{{ url('Tag', pairs('tag', 'lua', 'page', 0)) }}|{{ lua('theme.footer', 'x') }}|{{ add(2, 3) }}",
        )
        .unwrap();

        let renderer = Renderer::new(app.config.theme_path());
        let lua = app.pool.acquire().unwrap();
        let out = renderer
            .render_page(&app, &lua, &file.to_string_lossy(), ViewModel::default())
            .unwrap();
        assert_eq!(out, "/tags/lua/|&copy; x|5");
    }

    #[test]
    fn test_execution_error_names_template() {
        let dir = starter_site();
        let app = app(dir.path());
        write_page(&app, "broken", "{{ div(1, 0) }}");

        let renderer = Renderer::new(app.config.theme_path());
        let lua = app.pool.acquire().unwrap();
        let err = renderer.render_page(&app, &lua, "broken", ViewModel::default()).unwrap_err();
        assert!(matches!(&err, RenderError::Template { name, .. } if name.ends_with("broken.html")));
    }
}
