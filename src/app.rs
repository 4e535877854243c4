//! Application state shared by every build phase.
//!
//! One [`App`] is created per command run and handed around as `Arc<App>`:
//! render contexts, build tasks and the preview server all read the config,
//! link templates and loaded content through it.

use crate::{
    config::{ConfigError, SiteConfig},
    content::{self, Content, StatusFilter},
    logger,
    render::Links,
    script::ScriptPool,
};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::{
    fmt,
    path::Path,
    sync::Arc,
};

#[derive(Debug)]
pub struct App {
    pub config: Arc<SiteConfig>,
    pub pool: Arc<ScriptPool>,
    pub links: Arc<Links>,
    pub content: Content,
    pub stats: Stats,
}

/// Config, interpreters and link templates, before content is loaded.
#[derive(Debug)]
pub struct Setup {
    pub config: Arc<SiteConfig>,
    pub pool: Arc<ScriptPool>,
    pub links: Arc<Links>,
}

impl Setup {
    /// Load `config.lua` from `root` and compile the link templates.
    pub fn open(root: &Path) -> Result<Self, ConfigError> {
        let pool = Arc::new(ScriptPool::new(root));
        let config = pool.bootstrap()?;
        logger::set_debug(config.debug);

        let links = Arc::new(Links::compile(&config)?);
        pool.bind(Arc::clone(&links));

        Ok(Self {
            config: Arc::new(config),
            pool,
            links,
        })
    }

    /// Load every entry accepted by `filter` and finish the application state.
    pub fn load(self, filter: &StatusFilter) -> Result<App> {
        let content = content::load(&self.config, &self.links, filter).with_context(|| {
            format!("Failed to load entries from {}", self.config.articles_dir().display())
        })?;
        Ok(self.with_content(content))
    }

    pub fn with_content(self, content: Content) -> App {
        App {
            config: self.config,
            pool: self.pool,
            links: self.links,
            content,
            stats: Stats::default(),
        }
    }
}

impl App {
    /// [`Setup::open`] followed by [`Setup::load`].
    pub fn open(root: &Path, filter: &StatusFilter) -> Result<Arc<Self>> {
        let setup = Setup::open(root)?;
        Ok(Arc::new(setup.load(filter)?))
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Output categories counted during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Unit {
    Entry,
    Index,
    Tag,
    Annual,
    Monthly,
    Include,
    Feed,
    Extra,
}

impl Unit {
    pub const ALL: [Self; 8] = [
        Self::Entry,
        Self::Index,
        Self::Tag,
        Self::Annual,
        Self::Monthly,
        Self::Include,
        Self::Feed,
        Self::Extra,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Entry => "entries",
            Self::Index => "index pages",
            Self::Tag => "tag pages",
            Self::Annual => "annual pages",
            Self::Monthly => "monthly pages",
            Self::Include => "includes",
            Self::Feed => "feeds",
            Self::Extra => "extra files",
        }
    }
}

/// Per-run output counters.
#[derive(Debug, Default)]
pub struct Stats(Mutex<FxHashMap<Unit, usize>>);

impl Stats {
    pub fn inc(&self, unit: Unit) {
        *self.0.lock().entry(unit).or_default() += 1;
    }

    pub fn get(&self, unit: Unit) -> usize {
        self.0.lock().get(&unit).copied().unwrap_or(0)
    }
}

impl fmt::Display for Stats {
    /// `entries: 3, index pages: 1, ...` in [`Unit::ALL`] order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = self.0.lock();
        let parts: Vec<String> = Unit::ALL
            .iter()
            .map(|unit| format!("{}: {}", unit.label(), counts.get(unit).copied().unwrap_or(0)))
            .collect();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::init;
    use tempfile::TempDir;

    /// The starter site written into a fresh temp dir.
    pub(crate) fn starter_site() -> TempDir {
        let dir = TempDir::new().unwrap();
        init::write_starter(dir.path()).unwrap();
        dir
    }

    #[test]
    fn test_open_starter_site() {
        let dir = starter_site();
        let app = App::open(dir.path(), &StatusFilter::published()).unwrap();

        assert_eq!(app.config.root, dir.path());
        assert!(!app.content.entries.is_empty());
        assert!(app.content.entries.iter().all(|e| e.permalink().is_some()));
        assert_eq!(app.pool.created(), 1);
    }

    #[test]
    fn test_open_without_config() {
        let dir = TempDir::new().unwrap();
        let err = Setup::open(dir.path()).unwrap_err();
        assert!(err.to_string().contains("config.lua"));
    }

    #[test]
    fn test_stats() {
        let stats = Stats::default();
        stats.inc(Unit::Tag);
        stats.inc(Unit::Tag);
        stats.inc(Unit::Entry);
        assert_eq!(stats.get(Unit::Tag), 2);
        assert_eq!(stats.get(Unit::Feed), 0);

        let line = stats.to_string();
        assert!(line.starts_with("entries: 1, index pages: 0, tag pages: 2"));
        assert!(line.ends_with("extra files: 0"));
    }
}
