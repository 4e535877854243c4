//! Path and title templates compiled from the site config.
//!
//! Every `*_url_path` field becomes a plain-text path template, every `*_title`
//! field an HTML-escaping title template. Both receive the caller's data merged
//! with `site` (`url`, `params`).

use super::{RenderError, helpers, objects::EntryView};
use crate::{
    config::{ConfigError, SiteConfig},
    content::Entry,
    utils::text::url_encode_path,
};
use minijinja::{AutoEscape, Environment, ErrorKind, Value, context};
use std::sync::Arc;

#[derive(Debug)]
pub struct Links {
    paths: Environment<'static>,
    titles: Environment<'static>,
    site: Value,
    site_url: String,
    trim_html: bool,
}

impl Links {
    /// Compile every path and title template. Any syntax error is fatal.
    pub fn compile(config: &SiteConfig) -> Result<Self, ConfigError> {
        let mut paths = Environment::new();
        paths.set_auto_escape_callback(|_| AutoEscape::None);
        helpers::register(&mut paths);
        for (name, source) in config.path_templates() {
            paths
                .add_template_owned(name, source.to_owned())
                .map_err(|source| ConfigError::Template {
                    name: format!("{}_url_path", name.to_lowercase()),
                    source,
                })?;
        }

        let mut titles = Environment::new();
        titles.set_auto_escape_callback(|_| AutoEscape::Html);
        helpers::register(&mut titles);
        for (name, source) in config.title_templates() {
            titles
                .add_template_owned(name, source.to_owned())
                .map_err(|source| ConfigError::Template {
                    name: format!("{}_title", name.to_lowercase()),
                    source,
                })?;
        }

        Ok(Self {
            paths,
            titles,
            site: context! {
                url => &config.site_url,
                params => config.merged_params(),
            },
            site_url: config.site_url.clone(),
            trim_html: config.trim_html,
        })
    }

    /// Data for templates that only need `entry`.
    pub fn entry_data(entry: &Arc<Entry>) -> Value {
        context! { entry => Value::from_object(EntryView::detached(Arc::clone(entry))) }
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Page title, already HTML-escaped.
    pub fn title(&self, name: &str, data: Value) -> Result<String, RenderError> {
        self.render(&self.titles, "title", name, data)
    }

    /// Output path relative to the output directory.
    pub fn path(&self, name: &str, data: Value) -> Result<String, RenderError> {
        let path = self.render(&self.paths, "path", name, data)?;
        Ok(path.trim_start_matches('/').to_owned())
    }

    /// [`Links::path`] without `index.html` (and `.html` when trimming),
    /// percent-encoded per segment.
    pub fn rel_url(&self, name: &str, data: Value) -> Result<String, RenderError> {
        let path = self.path(name, data)?;
        let mut url = path.strip_suffix("index.html").unwrap_or(&path);
        if self.trim_html {
            url = url.strip_suffix(".html").unwrap_or(url);
        }
        Ok(url_encode_path(url))
    }

    /// Site-absolute URL, e.g. `/tags/rust/`.
    pub fn url(&self, name: &str, data: Value) -> Result<String, RenderError> {
        Ok(format!("/{}", self.rel_url(name, data)?))
    }

    pub fn full_url(&self, name: &str, data: Value) -> Result<String, RenderError> {
        Ok(format!("{}{}", self.site_url, self.rel_url(name, data)?))
    }

    fn render(
        &self,
        env: &Environment<'static>,
        kind: &'static str,
        name: &str,
        data: Value,
    ) -> Result<String, RenderError> {
        let template = env.get_template(name).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => RenderError::UnknownTemplate {
                kind,
                name: name.to_owned(),
            },
            _ => RenderError::template(name)(e),
        })?;

        template
            .render(context! { site => self.site.clone(), ..data })
            .map_err(RenderError::template(name))
    }
}
