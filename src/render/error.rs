use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("`{name}` is not a known {kind} template")]
    UnknownTemplate { kind: &'static str, name: String },

    #[error("Failed to read template `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Template `{name}` failed")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

impl RenderError {
    pub(crate) fn template(name: impl Into<String>) -> impl FnOnce(minijinja::Error) -> Self {
        let name = name.into();
        move |source| Self::Template { name, source }
    }
}
