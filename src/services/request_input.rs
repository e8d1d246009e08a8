/*
 * Responsibility
 * - Immutable per-request context handed to the resolver
 * - Source of `passthrough` values and the template rendering context
 */
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::session::Session;

/// Multi-valued parameter map (query string, form body, headers).
pub type ParamMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct RequestInput {
    /// Host name the IdP was reached at.
    pub domain: String,
    pub method: String,
    pub path: String,
    /// Value of `X-Forwarded-Proto`, empty when absent.
    pub proto: String,
    pub headers: ParamMap,
    pub url_params: ParamMap,
    pub form_params: ParamMap,
    pub session: Option<Session>,
    pub time: DateTime<Utc>,
}

impl RequestInput {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            method: "GET".to_string(),
            path: "/".to_string(),
            proto: String::new(),
            headers: ParamMap::new(),
            url_params: ParamMap::new(),
            form_params: ParamMap::new(),
            session: None,
            time: Utc::now(),
        }
    }

    pub fn with_url_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_form_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_params
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    /// Values for `id`, preferring the query string over the form body.
    pub fn input_values(&self, id: &str) -> Vec<String> {
        self.url_params
            .get(id)
            .or_else(|| self.form_params.get(id))
            .cloned()
            .unwrap_or_default()
    }

    /// First query-string value for `id`, empty when absent.
    pub fn url_param(&self, id: &str) -> &str {
        self.url_params
            .get(id)
            .and_then(|v| v.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The `code` carried by a token request, from the query or the form body.
    pub fn code(&self) -> Option<&str> {
        [&self.url_params, &self.form_params]
            .into_iter()
            .filter_map(|params| params.get("code").and_then(|v| v.first()))
            .map(String::as_str)
            .find(|code| !code.is_empty())
    }

    pub fn template_view(&self) -> TemplateView<'_> {
        TemplateView {
            domain: &self.domain,
            method: &self.method,
            path: &self.path,
            proto: &self.proto,
            headers: &self.headers,
            url_params: &self.url_params,
            form_params: &self.form_params,
            session: self.session.as_ref(),
            time: TimeView {
                unix: self.time.timestamp(),
                rfc3339: self.time.to_rfc3339(),
            },
        }
    }
}

/// What templates see: `{{domain}}`, `{{session.client_id}}`, `{{time.unix}}`, ...
#[derive(Debug, Serialize)]
pub struct TemplateView<'a> {
    pub domain: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub proto: &'a str,
    pub headers: &'a ParamMap,
    pub url_params: &'a ParamMap,
    pub form_params: &'a ParamMap,
    pub session: Option<&'a Session>,
    pub time: TimeView,
}

#[derive(Debug, Serialize)]
pub struct TimeView {
    pub unix: i64,
    pub rfc3339: String,
}

/// Decode an `application/x-www-form-urlencoded` payload into a multi-map.
pub fn parse_urlencoded(raw: &[u8]) -> ParamMap {
    let mut params = ParamMap::new();
    for (key, value) in url::form_urlencoded::parse(raw) {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    params
}
