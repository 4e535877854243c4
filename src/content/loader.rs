//! Walks the articles directory into a sorted, indexed [`Content`].

use super::{Content, Entry, LoadError, Permalink, Status};
use crate::{config::SiteConfig, render::Links};
use std::{fs, path::Path, str::FromStr, sync::Arc};
use walkdir::{DirEntry, WalkDir};

/// Which statuses survive loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    /// `*`
    All,
    Only(Vec<Status>),
}

impl StatusFilter {
    pub fn published() -> Self {
        Self::Only(vec![Status::Published])
    }

    pub fn accepts(&self, status: Status) -> bool {
        match self {
            Self::All => true,
            Self::Only(allowed) => allowed.contains(&status),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    /// `*` or a comma separated status list, e.g. `draft,published`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "*" {
            return Ok(Self::All);
        }
        s.split(',')
            .map(str::trim)
            .map(|part| part.parse().map_err(|()| format!("invalid status: {part}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::Only)
    }
}

/// Load every entry accepted by `filter`.
///
/// Any failure aborts the whole load; nothing partial is returned.
pub fn load(config: &SiteConfig, links: &Links, filter: &StatusFilter) -> Result<Content, LoadError> {
    let base = config.articles_dir();
    let mut entries = Vec::new();

    let walker = WalkDir::new(&base)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for item in walker {
        let item = item.map_err(|e| LoadError::Walk(base.clone(), e))?;
        if !item.file_type().is_file() {
            continue;
        }

        let entry = read_entry(item.path(), config, links)?;
        if filter.accepts(entry.status) {
            entries.push(entry);
        }
    }

    Ok(Content::new(entries))
}

/// Read, parse and link a single entry file.
pub fn read_entry(path: &Path, config: &SiteConfig, links: &Links) -> Result<Arc<Entry>, LoadError> {
    let source = fs::read_to_string(path).map_err(|e| LoadError::Io(path.to_path_buf(), e))?;
    let entry = Arc::new(Entry::parse(path, &source, &config.tz)?);

    let url_path = links
        .url("Article", Links::entry_data(&entry))
        .map_err(|e| LoadError::Permalink(path.to_path_buf(), e))?;
    entry.set_permalink(Permalink {
        url: format!("{}{}", links.site_url(), url_path.trim_start_matches('/')),
        path: url_path,
    });

    Ok(entry)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn site() -> (TempDir, SiteConfig, Links) {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig {
            site_url: "https://example.com/".into(),
            article_url_path: "{{ entry.posted_at.year }}/{{ entry.slug }}.html".into(),
            ..Default::default()
        };
        config.resolve_dirs(dir.path());
        let links = Links::compile(&config).unwrap();
        (dir, config, links)
    }

    fn write(config: &SiteConfig, relative: &str, source: &str) -> PathBuf {
        let path = config.articles_dir().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_load_filters_and_sorts() {
        let (_dir, config, links) = site();
        write(&config, "2024/01/05_first.md", ":title: First\n:status: published\n:posted_at: 2024-01-05 10:00:00\n\nA");
        write(&config, "2024/02/01_second.md", ":title: Second\n:status: published\n:posted_at: 2024-02-01 10:00:00\n\nB");
        write(&config, "2024/03/01_draft.md", ":title: Draft\n:status: draft\n:posted_at: 2024-03-01 10:00:00\n\nC");

        let content = load(&config, &links, &StatusFilter::published()).unwrap();
        let slugs: Vec<_> = content.entries.iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["second", "first"]);

        let all = load(&config, &links, &StatusFilter::All).unwrap();
        assert_eq!(all.entries.len(), 3);
        assert_eq!(all.entries[0].slug, "draft");
    }

    #[test]
    fn test_permalink() {
        let (_dir, config, links) = site();
        let path = write(&config, "01_hello world.md", ":title: Hi\n:posted_at: 2024-01-05 10:00:00\n\n");

        let entry = read_entry(&path, &config, &links).unwrap();
        let permalink = entry.permalink().unwrap();
        assert_eq!(permalink.path, "/2024/hello%20world.html");
        assert_eq!(permalink.url, "https://example.com/2024/hello%20world.html");
    }

    #[test]
    fn test_hidden_files_skipped() {
        let (_dir, config, links) = site();
        write(&config, "visible.md", ":status: published\n\n");
        write(&config, ".hidden.md", "garbage without header colons\n\n");
        write(&config, ".drafts/inner.md", "garbage without header colons\n\n");

        let content = load(&config, &links, &StatusFilter::All).unwrap();
        assert_eq!(content.entries.len(), 1);
        assert_eq!(content.entries[0].slug, "visible");
    }

    #[test]
    fn test_error_names_file() {
        let (_dir, config, links) = site();
        write(&config, "good.md", ":status: published\n\n");
        write(&config, "broken.md", ":status: published\nnot a header\n\n");

        let err = load(&config, &links, &StatusFilter::All).unwrap_err();
        assert!(err.to_string().contains("broken.md"));
    }

    #[test]
    fn test_missing_articles_dir() {
        let (_dir, config, links) = site();
        assert!(matches!(
            load(&config, &links, &StatusFilter::All),
            Err(LoadError::Walk(..))
        ));
    }

    #[test]
    fn test_status_filter_from_str() {
        assert_eq!("*".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "draft, published".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(vec![Status::Draft, Status::Published])
        );
        assert!("draft,secret".parse::<StatusFilter>().is_err());
        assert!(!StatusFilter::published().accepts(Status::Draft));
    }
}
