//! Site configuration declared in `config.lua` and the theme's `theme.lua`.
//!
//! Both scripts call the global `config { ... }` function. The site table is
//! kept in the interpreter as `CONFIG` (markup processors stay there), the theme
//! table as `THEME_CONFIG`, and both are mapped into typed structs here.
//!
//! # Example
//!
//! ```lua
//! config {
//!   site_url = "https://example.com/",
//!   theme = "default",
//!   pagination1 = 10,
//!   params = { title = "My Blog" },
//!   article_url_path = "articles/{{ entry.slug }}.html",
//!   markup_processors = {
//!     [".md"] = { name = "pulldown", exts = { "tables" } },
//!   },
//! }
//! ```

pub mod defaults;
mod error;
mod load;
mod timezone;

pub use error::ConfigError;
pub use load::{CONFIG_FILE, load};
pub use timezone::Timezone;

use educe::Educe;
use serde::{Deserialize, Serialize, de::IgnoredAny};
use std::path::{Path, PathBuf};

/// Arbitrary user parameters exposed to templates as `site.params`.
pub type Params = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Site Config
// ============================================================================

/// Table passed to `config { ... }` in `config.lua`.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Print `debug!` lines.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub debug: bool,

    /// Absolute site URL, always ending with `/` after load.
    #[serde(default = "defaults::site::url")]
    #[educe(Default = defaults::site::url())]
    pub site_url: String,

    /// Command used by `new` to open the created entry.
    #[serde(default)]
    pub editor: Vec<String>,

    /// Upper bound of concurrently built entries.
    #[serde(default = "defaults::site::num_threads")]
    #[educe(Default = defaults::site::num_threads())]
    pub num_threads: usize,

    /// IANA name or `NAME ±HH:MM`.
    #[serde(default = "defaults::site::timezone")]
    #[educe(Default = defaults::site::timezone())]
    pub timezone: String,

    #[serde(default = "defaults::site::theme")]
    #[educe(Default = defaults::site::theme())]
    pub theme: String,

    /// Page size of the top index list.
    #[serde(default = "defaults::site::pagination1")]
    #[educe(Default = defaults::site::pagination1())]
    pub pagination1: usize,

    /// Page size of tag and archive lists.
    #[serde(default = "defaults::site::pagination2")]
    #[educe(Default = defaults::site::pagination2())]
    pub pagination2: usize,

    /// Drop `.html` from generated URLs.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub trim_html: bool,

    #[serde(default)]
    pub params: Params,

    #[serde(default = "defaults::paths::top")]
    #[educe(Default = defaults::paths::top())]
    pub top_url_path: String,

    #[serde(default = "defaults::paths::article")]
    #[educe(Default = defaults::paths::article())]
    pub article_url_path: String,

    #[serde(default = "defaults::titles::article")]
    #[educe(Default = defaults::titles::article())]
    pub article_title: String,

    #[serde(default = "defaults::paths::index")]
    #[educe(Default = defaults::paths::index())]
    pub index_url_path: String,

    #[serde(default = "defaults::titles::index")]
    #[educe(Default = defaults::titles::index())]
    pub index_title: String,

    #[serde(default = "defaults::paths::tag")]
    #[educe(Default = defaults::paths::tag())]
    pub tag_url_path: String,

    #[serde(default = "defaults::titles::tag")]
    #[educe(Default = defaults::titles::tag())]
    pub tag_title: String,

    #[serde(default = "defaults::paths::annual")]
    #[educe(Default = defaults::paths::annual())]
    pub annual_url_path: String,

    #[serde(default = "defaults::titles::annual")]
    #[educe(Default = defaults::titles::annual())]
    pub annual_title: String,

    #[serde(default = "defaults::paths::monthly")]
    #[educe(Default = defaults::paths::monthly())]
    pub monthly_url_path: String,

    #[serde(default = "defaults::titles::monthly")]
    #[educe(Default = defaults::titles::monthly())]
    pub monthly_title: String,

    #[serde(default = "defaults::paths::include")]
    #[educe(Default = defaults::paths::include())]
    pub include_url_path: String,

    #[serde(default = "defaults::paths::feed")]
    #[educe(Default = defaults::paths::feed())]
    pub feed_url_path: String,

    #[serde(default = "defaults::paths::file")]
    #[educe(Default = defaults::paths::file())]
    pub file_url_path: String,

    #[serde(default = "defaults::dirs::content")]
    #[educe(Default = defaults::dirs::content())]
    pub content_dir: PathBuf,

    #[serde(default = "defaults::dirs::theme")]
    #[educe(Default = defaults::dirs::theme())]
    pub theme_dir: PathBuf,

    #[serde(default = "defaults::dirs::output")]
    #[educe(Default = defaults::dirs::output())]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub extra_files: Vec<ExtraFile>,

    /// Output-relative paths removed by `clean`.
    #[serde(default)]
    pub clean: Vec<String>,

    /// Accepted so `deny_unknown_fields` lets the key through; processors
    /// hold Lua functions and are read from `CONFIG` at conversion time.
    #[serde(default, skip_serializing)]
    pub markup_processors: IgnoredAny,

    /// Project root every relative directory is resolved against.
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(skip)]
    pub theme_config: ThemeConfig,

    #[serde(skip)]
    pub tz: Timezone,
}

/// Table passed to `config { ... }` in `theme.lua`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemeConfig {
    #[serde(default)]
    pub extra_files: Vec<ExtraFile>,

    /// Defaults for `site.params`; site values win.
    #[serde(default)]
    pub params: Params,
}

/// Static files copied (or rendered) into the output tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraFile {
    /// Glob relative to the extras directory.
    pub src: String,

    /// Output-relative destination directory.
    #[serde(default)]
    pub dst: String,

    /// Render matched files as page templates.
    #[serde(default)]
    pub template: bool,
}

// ============================================================================
// Accessors
// ============================================================================

impl SiteConfig {
    /// Path templates by name, in declaration order.
    pub fn path_templates(&self) -> [(&'static str, &str); 9] {
        [
            ("Top", &self.top_url_path),
            ("Article", &self.article_url_path),
            ("Index", &self.index_url_path),
            ("Tag", &self.tag_url_path),
            ("Annual", &self.annual_url_path),
            ("Monthly", &self.monthly_url_path),
            ("Include", &self.include_url_path),
            ("Feed", &self.feed_url_path),
            ("File", &self.file_url_path),
        ]
    }

    /// Title templates by name.
    pub fn title_templates(&self) -> [(&'static str, &str); 5] {
        [
            ("Article", &self.article_title),
            ("Index", &self.index_title),
            ("Tag", &self.tag_title),
            ("Annual", &self.annual_title),
            ("Monthly", &self.monthly_title),
        ]
    }

    /// Directory of the active theme.
    pub fn theme_path(&self) -> PathBuf {
        self.theme_dir.join(&self.theme)
    }

    pub fn articles_dir(&self) -> PathBuf {
        self.content_dir.join("articles")
    }

    /// Site params layered over theme params.
    pub fn merged_params(&self) -> Params {
        let mut params = self.theme_config.params.clone();
        params.extend(self.params.clone());
        params
    }

    /// Normalize fields after both scripts ran.
    pub(crate) fn finalize(&mut self, root: &Path, theme: ThemeConfig) -> Result<(), ConfigError> {
        if self.pagination1 == 0 || self.pagination2 == 0 {
            return Err(ConfigError::Validation(
                "pagination1 and pagination2 must be positive".into(),
            ));
        }
        if self.num_threads == 0 {
            return Err(ConfigError::Validation("num_threads must be positive".into()));
        }
        if !self.site_url.ends_with('/') {
            self.site_url.push('/');
        }

        self.tz = self.timezone.parse()?;
        self.root = root.to_path_buf();
        self.theme_config = theme;
        Ok(())
    }

    /// Expand `~` and anchor relative directories at the project root.
    pub(crate) fn resolve_dirs(&mut self, root: &Path) {
        for dir in [&mut self.content_dir, &mut self.theme_dir, &mut self.output_dir] {
            *dir = resolve_dir(root, dir);
        }
    }
}

fn resolve_dir(root: &Path, dir: &Path) -> PathBuf {
    let raw = dir.to_string_lossy();
    let expanded = PathBuf::from(shellexpand::tilde(&raw).as_ref());
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}
