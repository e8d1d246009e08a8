//! Template rendering for `set` parameter values and ID token claims.
//!
//! Templates are Handlebars against [`TemplateView`](crate::services::request_input::TemplateView):
//!
//! - `https://{{domain}}/callback`
//! - `{{#if session}}{{session.client_id}}{{/if}}`
//! - `{{add_days time.unix 1}}` (tomorrow, as a unix timestamp)
//!
//! Output is not HTML-escaped; rendered values end up in JSON bodies and URLs.
//! A template that fails to parse or render is an error, never an empty value.
use handlebars::{Handlebars, handlebars_helper, no_escape};

use crate::services::error::{EngineError, EngineResult};
use crate::services::request_input::RequestInput;

const SECONDS_PER_DAY: i64 = 86_400;

handlebars_helper!(add_days: |unix: i64, days: i64| unix + days * SECONDS_PER_DAY);
handlebars_helper!(add_seconds: |unix: i64, seconds: i64| unix + seconds);

#[derive(Debug)]
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_helper("add_days", Box::new(add_days));
        registry.register_helper("add_seconds", Box::new(add_seconds));
        Self { registry }
    }

    pub fn render(&self, template: &str, input: &RequestInput) -> EngineResult<String> {
        self.registry
            .render_template(template, &input.template_view())
            .map_err(|e| EngineError::Template(e.to_string()))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
