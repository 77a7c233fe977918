//! Server-side HTML rendering.
//!
//! Templates are compiled into the binary and registered once at startup.
//! Every render call takes an explicit, per-request context value; there is
//! no shared mutable rendering state.

use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

pub const UPLOAD_FORM: &str = "upload_form";
pub const SUCCESS: &str = "success";
pub const WATCH: &str = "watch";
pub const LOGIN: &str = "login";

const TEMPLATES: [(&str, &str); 5] = [
    ("layout", include_str!("../../templates/layout.hbs")),
    (UPLOAD_FORM, include_str!("../../templates/upload_form.hbs")),
    (SUCCESS, include_str!("../../templates/success.hbs")),
    (WATCH, include_str!("../../templates/watch.hbs")),
    (LOGIN, include_str!("../../templates/login.hbs")),
];

pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        for (name, source) in TEMPLATES {
            if name == "layout" {
                registry.register_partial(name, source)?;
            } else {
                registry.register_template_string(name, source)?;
            }
        }
        Ok(Self { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String, RenderError> {
        self.registry.render(name, context)
    }
}

/// Serialize a value for embedding inside a `<script>` block.
///
/// `<` is escaped so user-provided strings cannot close the script element.
pub fn script_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace('<', "\\u003c"))
}
