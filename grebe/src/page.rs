//! # Browsing page
//!
//! Renders the HTML page served on `GET` requests with `minijinja`.
//!
//! The template receives a single variable, `json`: the documentation of every
//! registered method, as a JSON object.
use grebe_core::bridge::PageRenderer;
use minijinja::{Environment, context};
use std::borrow::Cow;
use std::path::PathBuf;
use tracing::{error, warn};

const INDEX_TEMPLATE: &str = include_str!("template.html");

pub struct PageTemplate {
    /// Read on every render when set.
    path: Option<PathBuf>,
}

impl PageTemplate {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    fn source(&self) -> Cow<'static, str> {
        let Some(path) = &self.path else {
            return Cow::Borrowed(INDEX_TEMPLATE);
        };

        match std::fs::read_to_string(path) {
            Ok(source) => Cow::Owned(source),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Falling back to the embedded template");
                Cow::Borrowed(INDEX_TEMPLATE)
            }
        }
    }
}

impl PageRenderer for PageTemplate {
    fn render(&self, documentation_json: &str) -> String {
        let source = self.source();

        // Rendered from a nameless string, so the JSON is not HTML-escaped
        Environment::new()
            .render_str(&source, context! { json => documentation_json })
            .unwrap_or_else(|err| {
                error!(error = %err, "Failed to render the browsing page");
                format!("Failed to render the browsing page: {err}")
            })
    }
}
