//! Renders handler templates against an event.
//!
//! Templates are Tera templates (`{{ Entity.Name }}`). The legacy dot-rooted
//! form used by Sensu's Go handlers (`{{ .Entity.Name }}`) is accepted too.
//! Only the fields listed in the tables below are visible to templates.
use serde_json::{json, Map, Value};
use tera::{Context, Tera};
use thiserror::Error;

use crate::event::{Check, Entity, Event};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Failed to parse template '{name}': {cause}")]
    Parse { name: String, cause: String },
    #[error("Failed to evaluate template '{name}': {cause}")]
    FieldResolution { name: String, cause: String },
}

impl RenderError {
    pub fn template_name(&self) -> &str {
        match self {
            RenderError::Parse { name, .. } | RenderError::FieldResolution { name, .. } => name,
        }
    }
}

type Accessor<T> = fn(&T) -> Value;

const EVENT_FIELDS: &[(&str, Accessor<Event>)] = &[
    ("Timestamp", |e: &Event| json!(e.timestamp)),
    ("ID", |e: &Event| json!(e.id.as_deref().unwrap_or_default())),
];

const ENTITY_FIELDS: &[(&str, Accessor<Entity>)] = &[
    ("Name", |e: &Entity| json!(e.metadata.name)),
    ("Namespace", |e: &Entity| json!(e.metadata.namespace)),
    ("EntityClass", |e: &Entity| json!(e.entity_class)),
    ("Subscriptions", |e: &Entity| json!(e.subscriptions)),
    ("LastSeen", |e: &Entity| json!(e.last_seen)),
    ("Labels", |e: &Entity| json!(e.metadata.labels)),
    ("Annotations", |e: &Entity| json!(e.metadata.annotations)),
    ("System", system),
];

const SYSTEM_FIELDS: &[(&str, &str)] = &[
    ("Hostname", "hostname"),
    ("OS", "os"),
    ("Platform", "platform"),
    ("PlatformFamily", "platform_family"),
    ("PlatformVersion", "platform_version"),
    ("Arch", "arch"),
];

const CHECK_FIELDS: &[(&str, Accessor<Check>)] = &[
    ("Name", |c: &Check| json!(c.metadata.name)),
    ("Namespace", |c: &Check| json!(c.metadata.namespace)),
    ("Command", |c: &Check| json!(c.command)),
    ("Interval", |c: &Check| json!(c.interval)),
    ("Status", |c: &Check| json!(c.status)),
    ("Output", |c: &Check| json!(c.output)),
    ("State", |c: &Check| json!(c.state)),
    ("Occurrences", |c: &Check| json!(c.occurrences)),
    ("Issued", |c: &Check| json!(c.issued)),
    ("Executed", |c: &Check| json!(c.executed)),
    ("Duration", |c: &Check| json!(c.duration)),
    ("Handlers", |c: &Check| json!(c.handlers)),
    ("Labels", |c: &Check| json!(c.metadata.labels)),
    ("Annotations", |c: &Check| json!(c.metadata.annotations)),
    ("History", history),
    ("LastOK", |c: &Check| json!(int_or_zero(c.extra.get("last_ok")))),
    ("TotalStateChange", |c: &Check| json!(int_or_zero(c.extra.get("total_state_change")))),
];

// Untyped parts of the event resolve to zero values when absent, as in Go.
fn int_or_zero(value: Option<&Value>) -> i64 {
    value.and_then(Value::as_i64).unwrap_or_default()
}

fn system(entity: &Entity) -> Value {
    let raw = entity.extra.get("system");
    SYSTEM_FIELDS
        .iter()
        .map(|(name, key)| {
            let value = raw
                .and_then(|system| system.get(*key))
                .and_then(Value::as_str)
                .unwrap_or_default();
            (name.to_string(), json!(value))
        })
        .collect::<Map<String, Value>>()
        .into()
}

fn history(check: &Check) -> Value {
    let entries = check
        .extra
        .get("history")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    entries
        .iter()
        .map(|entry| {
            json!({
                "Status": int_or_zero(entry.get("status")),
                "Executed": int_or_zero(entry.get("executed")),
            })
        })
        .collect()
}

fn project<T>(value: &T, fields: &[(&str, Accessor<T>)]) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, get)| (name.to_string(), get(value)))
        .collect()
}

/// Builds the template context. `Entity` and `Check` are left out when the
/// event has none, so templates referencing them fail to resolve.
pub fn template_context(event: &Event) -> Context {
    let mut context = Context::new();
    for (key, value) in project(event, EVENT_FIELDS) {
        context.insert(key, &value);
    }
    if let Some(entity) = &event.entity {
        context.insert("Entity", &project(entity, ENTITY_FIELDS));
    }
    if let Some(check) = &event.check {
        context.insert("Check", &project(check, CHECK_FIELDS));
    }
    context
}

/// Renders `template` under the logical `name` used in error reports.
pub fn render(name: &str, template: &str, event: &Event) -> Result<String, RenderError> {
    let source = strip_leading_dots(template);

    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_template(name, &source)
        .map_err(|e| RenderError::Parse {
            name: name.to_string(),
            cause: error_chain(&e),
        })?;

    tera.render(name, &template_context(event))
        .map_err(|e| RenderError::FieldResolution {
            name: name.to_string(),
            cause: error_chain(&e),
        })
}

/// Rewrites `{{ .Check.Output }}` to `{{ Check.Output }}`.
fn strip_leading_dots(template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let (head, tail) = rest.split_at(start + 2);
        out.push_str(head);

        let after_trim = tail.strip_prefix('-').unwrap_or(tail).trim_start();
        let prefix_len = tail.len() - after_trim.len();
        let dotted_path = after_trim
            .strip_prefix('.')
            .filter(|path| path.starts_with(|c: char| c.is_ascii_alphabetic()));

        match dotted_path {
            Some(path) => {
                out.push_str(&tail[..prefix_len]);
                rest = path;
            }
            None => rest = tail,
        }
    }
    out.push_str(rest);
    out
}

// Tera reports the interesting part of an error in its source chain.
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
