//! Built-in markdown converters configured from declarative option lists.
//!
//! ```lua
//! [".md"] = {
//!   name = "comrak",
//!   exts = { "table", "footnotes" },
//!   parseopts = { "smart" },
//!   htmlopts = { "unsafe", "prettyprint" },
//! }
//! ```

use super::MarkupError;
use comrak::options::Options as ComrakOptions;
use pulldown_cmark::{Options as PulldownOptions, Parser, html};
use regex::Regex;
use std::{str::FromStr, sync::LazyLock};

/// Opening `<pre>` tag, with or without attributes.
static PRE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<pre(\s|>)").unwrap());

/// Option list keys of a processor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionGroup {
    Extension,
    Parser,
    Html,
}

impl OptionGroup {
    pub const ALL: [Self; 3] = [Self::Extension, Self::Parser, Self::Html];

    pub const fn key(self) -> &'static str {
        match self {
            Self::Extension => "exts",
            Self::Parser => "parseopts",
            Self::Html => "htmlopts",
        }
    }
}

/// Option lists read from a processor table.
#[derive(Debug, Clone, Default)]
pub struct ConverterSpec {
    pub exts: Vec<String>,
    pub parse_opts: Vec<String>,
    pub html_opts: Vec<String>,
}

impl ConverterSpec {
    fn options(&self, group: OptionGroup) -> &[String] {
        match group {
            OptionGroup::Extension => &self.exts,
            OptionGroup::Parser => &self.parse_opts,
            OptionGroup::Html => &self.html_opts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    Pulldown,
    Comrak,
}

impl FromStr for Converter {
    type Err = MarkupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pulldown" => Ok(Self::Pulldown),
            "comrak" => Ok(Self::Comrak),
            _ => Err(MarkupError::UnknownConverter(s.to_owned())),
        }
    }
}

// ============================================================================
// Option Tables
// ============================================================================

type Setter<S> = fn(&mut S);

struct PulldownSettings {
    options: PulldownOptions,
    prettyprint: bool,
}

impl Default for PulldownSettings {
    fn default() -> Self {
        Self {
            options: PulldownOptions::empty(),
            prettyprint: false,
        }
    }
}

#[derive(Default)]
struct ComrakSettings {
    options: ComrakOptions<'static>,
    prettyprint: bool,
}

const PULLDOWN_EXTS: &[(&str, Setter<PulldownSettings>)] = &[
    ("tables", |s| s.options.insert(PulldownOptions::ENABLE_TABLES)),
    ("footnotes", |s| s.options.insert(PulldownOptions::ENABLE_FOOTNOTES)),
    ("strikethrough", |s| s.options.insert(PulldownOptions::ENABLE_STRIKETHROUGH)),
    ("tasklists", |s| s.options.insert(PulldownOptions::ENABLE_TASKLISTS)),
    ("smart_punctuation", |s| s.options.insert(PulldownOptions::ENABLE_SMART_PUNCTUATION)),
    ("heading_attributes", |s| s.options.insert(PulldownOptions::ENABLE_HEADING_ATTRIBUTES)),
];

const PULLDOWN_PARSE: &[(&str, Setter<PulldownSettings>)] = &[];

const PULLDOWN_HTML: &[(&str, Setter<PulldownSettings>)] = &[("prettyprint", |s| s.prettyprint = true)];

const COMRAK_EXTS: &[(&str, Setter<ComrakSettings>)] = &[
    ("table", |s| s.options.extension.table = true),
    ("strikethrough", |s| s.options.extension.strikethrough = true),
    ("autolink", |s| s.options.extension.autolink = true),
    ("tasklist", |s| s.options.extension.tasklist = true),
    ("superscript", |s| s.options.extension.superscript = true),
    ("footnotes", |s| s.options.extension.footnotes = true),
    ("description_lists", |s| s.options.extension.description_lists = true),
    ("tagfilter", |s| s.options.extension.tagfilter = true),
];

const COMRAK_PARSE: &[(&str, Setter<ComrakSettings>)] = &[
    ("smart", |s| s.options.parse.smart = true),
    ("relaxed_tasklist_matching", |s| s.options.parse.relaxed_tasklist_matching = true),
];

const COMRAK_HTML: &[(&str, Setter<ComrakSettings>)] = &[
    ("unsafe", |s| s.options.render.r#unsafe = true),
    ("hardbreaks", |s| s.options.render.hardbreaks = true),
    ("github_pre_lang", |s| s.options.render.github_pre_lang = true),
    ("full_info_string", |s| s.options.render.full_info_string = true),
    ("sourcepos", |s| s.options.render.sourcepos = true),
    ("prettyprint", |s| s.prettyprint = true),
];

// ============================================================================
// Conversion
// ============================================================================

impl Converter {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pulldown => "pulldown",
            Self::Comrak => "comrak",
        }
    }

    /// Validate every option in `spec`, then convert `text`.
    pub fn convert(self, spec: &ConverterSpec, text: &str) -> Result<String, MarkupError> {
        match self {
            Self::Pulldown => {
                let mut settings = PulldownSettings::default();
                self.configure(&mut settings, spec, [PULLDOWN_EXTS, PULLDOWN_PARSE, PULLDOWN_HTML])?;

                let parser = Parser::new_ext(text, settings.options);
                let mut out = String::with_capacity(text.len() * 3 / 2);
                html::push_html(&mut out, parser);
                Ok(finish(out, settings.prettyprint))
            }
            Self::Comrak => {
                let mut settings = ComrakSettings::default();
                self.configure(&mut settings, spec, [COMRAK_EXTS, COMRAK_PARSE, COMRAK_HTML])?;

                let out = comrak::markdown_to_html(text, &settings.options);
                Ok(finish(out, settings.prettyprint))
            }
        }
    }

    /// Apply option lists in [`OptionGroup::ALL`] order using matching tables.
    fn configure<S>(
        self,
        settings: &mut S,
        spec: &ConverterSpec,
        tables: [&[(&str, Setter<S>)]; 3],
    ) -> Result<(), MarkupError> {
        for (group, table) in OptionGroup::ALL.into_iter().zip(tables) {
            for option in spec.options(group) {
                let (_, apply) = table
                    .iter()
                    .find(|(name, _)| *name == option.as_str())
                    .ok_or_else(|| MarkupError::InvalidOption {
                        option: option.clone(),
                        converter: self.name(),
                        group: group.key(),
                    })?;
                apply(settings);
            }
        }
        Ok(())
    }
}

fn finish(html: String, prettyprint: bool) -> String {
    if !prettyprint {
        return html;
    }
    PRE_TAG
        .replace_all(&html, r#"<pre class="prettyprint"$1"#)
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(exts: &[&str], parse_opts: &[&str], html_opts: &[&str]) -> ConverterSpec {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        ConverterSpec {
            exts: owned(exts),
            parse_opts: owned(parse_opts),
            html_opts: owned(html_opts),
        }
    }

    #[test]
    fn test_pulldown_basic() {
        let html = Converter::Pulldown
            .convert(&ConverterSpec::default(), "# Title\n\nsome *text*")
            .unwrap();
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>text</em>"));
    }

    #[test]
    fn test_pulldown_tables_extension() {
        let table = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        let plain = Converter::Pulldown.convert(&ConverterSpec::default(), table).unwrap();
        assert!(!plain.contains("<table>"));

        let with_ext = Converter::Pulldown.convert(&spec(&["tables"], &[], &[]), table).unwrap();
        assert!(with_ext.contains("<table>"));
    }

    #[test]
    fn test_comrak_options() {
        let html = Converter::Comrak
            .convert(&spec(&["strikethrough"], &["smart"], &["unsafe"]), "~~gone~~ <b>raw</b>")
            .unwrap();
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("<b>raw</b>"));
    }

    #[test]
    fn test_prettyprint() {
        let source = "```\nlet x = 1;\n```\n";
        let html = Converter::Pulldown.convert(&spec(&[], &[], &["prettyprint"]), source).unwrap();
        assert!(html.starts_with(r#"<pre class="prettyprint"><code>"#));
        assert_eq!(html.matches("class=").count(), 1);

        let html = Converter::Comrak
            .convert(&spec(&[], &[], &["github_pre_lang", "prettyprint"]), "```rust\nx\n```\n")
            .unwrap();
        assert!(html.contains(r#"<pre class="prettyprint" lang="rust">"#));
        assert_eq!(html.matches("prettyprint").count(), 1);
    }

    #[test]
    fn test_invalid_option_names_option_and_group() {
        let err = Converter::Comrak
            .convert(&spec(&["table"], &["tables"], &[]), "x")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'tables'"));
        assert!(message.contains("parseopts"));

        // pulldown has no parser options at all
        let err = Converter::Pulldown.convert(&spec(&[], &["smart"], &[]), "x").unwrap_err();
        assert!(matches!(
            err,
            MarkupError::InvalidOption { converter: "pulldown", group: "parseopts", .. }
        ));
    }

    #[test]
    fn test_empty_body() {
        for converter in [Converter::Pulldown, Converter::Comrak] {
            let html = converter.convert(&ConverterSpec::default(), "").unwrap();
            assert!(html.trim().is_empty());
        }
    }

    #[test]
    fn test_converter_from_str() {
        assert_eq!("comrak".parse::<Converter>().unwrap(), Converter::Comrak);
        assert!(matches!(
            "blackfriday".parse::<Converter>(),
            Err(MarkupError::UnknownConverter(name)) if name == "blackfriday"
        ));
    }
}
