//! Project and entry scaffolding.
//!
//! - `site`: writes the embedded starter project (config, default theme and
//!   two sample entries) into an empty directory
//! - `new`: prompts for entry metadata and writes a header-only entry file

use crate::{
    config::SiteConfig,
    content::HEADER_FORMAT,
    log,
    utils::{
        command::{run_interactive, to_cmd_vec},
        fs::write_file,
        text::make_slug,
    },
};
use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDateTime};
use std::{
    ffi::OsString,
    fs,
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

/// Starter project files, relative to the project root.
const STARTER: &[(&str, &str)] = &[
    ("config.lua", include_str!("embed/site/config.lua")),
    (
        "content/articles/2024/01/01_welcome.md",
        include_str!("embed/site/content/articles/2024/01/01_welcome.md"),
    ),
    (
        "content/articles/2024/02/14_plain-text.txt",
        include_str!("embed/site/content/articles/2024/02/14_plain-text.txt"),
    ),
    ("content/extras/robots.txt", include_str!("embed/site/content/extras/robots.txt")),
    ("themes/default/theme.lua", include_str!("embed/site/themes/default/theme.lua")),
    (
        "themes/default/layouts/default.html",
        include_str!("embed/site/themes/default/layouts/default.html"),
    ),
    (
        "themes/default/pages/article.html",
        include_str!("embed/site/themes/default/pages/article.html"),
    ),
    (
        "themes/default/pages/list1.html",
        include_str!("embed/site/themes/default/pages/list1.html"),
    ),
    (
        "themes/default/pages/list2.html",
        include_str!("embed/site/themes/default/pages/list2.html"),
    ),
    (
        "themes/default/include/about.html",
        include_str!("embed/site/themes/default/include/about.html"),
    ),
    (
        "themes/default/feeds/atom.xml",
        include_str!("embed/site/themes/default/feeds/atom.xml"),
    ),
    (
        "themes/default/extras/style.css",
        include_str!("embed/site/themes/default/extras/style.css"),
    ),
];

// ============================================================================
// Site
// ============================================================================

/// Create a new project at `path`, which must be missing or empty.
pub fn new_site(path: &Path) -> Result<()> {
    if !is_dir_empty(path)? {
        bail!(
            "`{}` is not empty. Use `moonlog site --path <DIR>` with a new directory.",
            path.display()
        );
    }
    write_starter(path)?;
    log!("site"; "new site was created under {}, enjoy!", path.display());
    Ok(())
}

/// Write every starter file under `root`.
pub fn write_starter(root: &Path) -> Result<()> {
    for (relative, content) in STARTER {
        write_file(&root.join(relative), content)?;
    }
    Ok(())
}

fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    let mut items = fs::read_dir(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(items.next().is_none())
}

// ============================================================================
// New Entry
// ============================================================================

/// Answers collected by [`prompt_entry`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub posted_at: NaiveDateTime,
    pub title: String,
    pub slug: String,
    pub tags: String,
    pub status: String,
    pub format: String,
}

impl NewEntry {
    /// `<articles>/YYYY/MM/DD_<slug><format>`
    pub fn path(&self, config: &SiteConfig) -> PathBuf {
        let date = self.posted_at.date();
        config
            .articles_dir()
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}_{}{}", date.day(), self.slug, self.format))
    }

    pub fn source(&self) -> String {
        let posted_at = self.posted_at.format(HEADER_FORMAT);
        format!(
            ":title: {}\n:tags: {}\n:status: {}\n:posted_at: {posted_at}\n:updated_at: {posted_at}\n\nhave fun!\n",
            self.title, self.tags, self.status
        )
    }
}

/// Ask for the new entry's metadata on `input`, echoing prompts to `output`.
///
/// An empty answer takes the default shown in the prompt.
pub fn prompt_entry(
    config: &SiteConfig,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<NewEntry> {
    let now = config.tz.now().format(HEADER_FORMAT).to_string();
    let posted_at = loop {
        let answer = ask(input, output, "Datetime (YYYY-MM-DD HH:MM:SS)", &now)?;
        match NaiveDateTime::parse_from_str(&answer, HEADER_FORMAT) {
            Ok(posted_at) => break posted_at,
            Err(_) => writeln!(output, "Invalid datetime format")?,
        }
    };

    let title = ask(input, output, "Title", "title")?;
    let slug = ask(input, output, "Slug", &make_slug(&title))?;
    let tags = ask(input, output, "Tags", "")?;
    let status = ask(input, output, "Status (published or draft)", "draft")?;
    let mut format = ask(input, output, "Markup", ".md")?;
    if !format.starts_with('.') {
        format.insert(0, '.');
    }

    Ok(NewEntry {
        posted_at,
        title,
        slug,
        tags,
        status,
        format,
    })
}

fn ask(input: &mut impl BufRead, output: &mut impl Write, label: &str, default: &str) -> Result<String> {
    if default.is_empty() {
        write!(output, "{label}: ")?;
    } else {
        write!(output, "{label} (default: {default}): ")?;
    }
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("Input closed before `{label}` was answered");
    }
    let answer = match line.trim() {
        "" => default,
        answer => answer,
    };
    Ok(answer.to_owned())
}

/// Prompt on the terminal, write the entry and open it in the editor.
pub fn new_entry(config: &SiteConfig) -> Result<PathBuf> {
    let entry = prompt_entry(config, &mut std::io::stdin().lock(), &mut std::io::stdout())?;
    let path = entry.path(config);
    if path.exists() {
        bail!("`{}` already exists", path.display());
    }
    write_file(&path, entry.source())?;
    log!("new"; "created {}", path.display());

    match editor(config) {
        Some(editor) => run_interactive(&editor, &[path.clone().into_os_string()])
            .context("Failed to start an editor process")?,
        None => log!("new"; "no editor configured; set `editor` in config.lua or $EDITOR"),
    }
    Ok(path)
}

/// `editor` from the config, else `$EDITOR` when it names an installed program.
fn editor(config: &SiteConfig) -> Option<Vec<OsString>> {
    let configured = to_cmd_vec(&config.editor);
    if !configured.is_empty() {
        return Some(configured);
    }
    let fallback = std::env::var("EDITOR").ok()?;
    let cmd = to_cmd_vec(&fallback.split_whitespace().collect::<Vec<_>>());
    which::which(cmd.first()?).ok()?;
    Some(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn answers(lines: &str) -> (Cursor<Vec<u8>>, Vec<u8>) {
        (Cursor::new(lines.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_write_starter() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("blog");
        new_site(&root).unwrap();
        for (relative, content) in STARTER {
            assert_eq!(fs::read_to_string(root.join(relative)).unwrap(), *content);
        }
    }

    #[test]
    fn test_new_site_refuses_non_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "mine").unwrap();
        assert!(new_site(dir.path()).is_err());
        assert!(!dir.path().join("config.lua").exists());
    }

    #[test]
    fn test_prompt_entry() {
        let config = SiteConfig::default();
        let (mut input, mut output) = answers("not a date\n2024-03-05 08:00:00\nHello World\n\nrust, lua\n\nmd\n");
        let entry = prompt_entry(&config, &mut input, &mut output).unwrap();

        assert_eq!(
            entry.posted_at,
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(8, 0, 0).unwrap()
        );
        assert_eq!(entry.title, "Hello World");
        assert_eq!(entry.slug, "hello-world");
        assert_eq!(entry.tags, "rust, lua");
        assert_eq!(entry.status, "draft");
        assert_eq!(entry.format, ".md");
        assert!(String::from_utf8(output).unwrap().contains("Invalid datetime format"));
    }

    #[test]
    fn test_prompt_entry_closed_input() {
        let config = SiteConfig::default();
        let (mut input, mut output) = answers("2024-03-05 08:00:00\n");
        assert!(prompt_entry(&config, &mut input, &mut output).is_err());
    }

    #[test]
    fn test_new_entry_path_and_source() {
        let mut config = SiteConfig::default();
        config.resolve_dirs(Path::new("/site"));
        let entry = NewEntry {
            posted_at: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(8, 0, 0).unwrap(),
            title: "Hello".into(),
            slug: "hello".into(),
            tags: "".into(),
            status: "draft".into(),
            format: ".md".into(),
        };
        assert_eq!(
            entry.path(&config),
            PathBuf::from("/site/content/articles/2024/03/05_hello.md")
        );

        let source = entry.source();
        assert!(source.starts_with(":title: Hello\n"));
        assert!(source.contains(":posted_at: 2024-03-05 08:00:00\n:updated_at: 2024-03-05 08:00:00\n\n"));
    }
}
