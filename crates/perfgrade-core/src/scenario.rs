//! Expansion of an API document into benchmark scenarios.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::errors::{BenchError, Result};
use crate::model::Scenario;
use crate::spec::ApiDocument;

/// Path-item keys that name an operation. Anything else (`parameters`,
/// `summary`, `servers`, extensions) is ignored.
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Placeholder value for path parameters without an override.
pub const DEFAULT_PARAM_VALUE: &str = "1";

/// Parse `name=value` entries into an override map.
pub fn parse_param_overrides<I, S>(entries: I) -> Result<HashMap<String, String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = HashMap::new();
    for entry in entries {
        let entry = entry.as_ref();
        let Some((name, value)) = entry.split_once('=') else {
            return Err(BenchError::config(format!(
                "invalid parameter override '{entry}' (expected name=value)"
            )));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(BenchError::config(format!(
                "invalid parameter override '{entry}': empty name"
            )));
        }
        out.insert(name.to_string(), value.trim().to_string());
    }
    Ok(out)
}

/// Glob filter over `METHOD PATH` and bare `PATH`.
#[derive(Debug, Clone)]
pub struct SkipFilter {
    set: GlobSet,
    empty: bool,
}

impl SkipFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for p in patterns {
            let p = p.as_ref();
            let glob = Glob::new(p)
                .map_err(|e| BenchError::config(format!("invalid skip pattern '{p}': {e}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| BenchError::config(format!("invalid skip patterns: {e}")))?;
        Ok(Self {
            set,
            empty: patterns.is_empty(),
        })
    }

    pub fn none() -> Self {
        Self {
            set: GlobSet::empty(),
            empty: true,
        }
    }

    pub fn matches(&self, method: &str, path: &str) -> bool {
        if self.empty {
            return false;
        }
        self.set.is_match(format!("{} {}", method.to_ascii_uppercase(), path)) || self.set.is_match(path)
    }
}

impl Default for SkipFilter {
    fn default() -> Self {
        Self::none()
    }
}

/// Replace every `{name}` in `template` with its override or the default value.
pub fn substitute_path(template: &str, params: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &rest[open + 1..open + close];
        out.push_str(
            params
                .get(name)
                .map(String::as_str)
                .unwrap_or(DEFAULT_PARAM_VALUE),
        );
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

/// JSON example for `requestBody.content["application/json"]`, if the operation has one.
fn json_body_example(operation: &Value) -> Option<String> {
    let media = operation
        .get("requestBody")?
        .get("content")?
        .get("application/json")?;
    let example = match media.get("example") {
        Some(v) => v,
        None => {
            let examples = media.get("examples")?.as_object()?;
            if examples.len() != 1 {
                return None;
            }
            examples.values().next()?.get("value")?
        }
    };
    serde_json::to_string(example).ok()
}

/// Compile one scenario per (path, method) pair in document order.
pub fn compile_scenarios(
    doc: &ApiDocument,
    params: &HashMap<String, String>,
    base_url: &str,
    skip: &SkipFilter,
) -> Result<Vec<Scenario>> {
    let paths = doc.paths().ok_or_else(|| {
        BenchError::SpecResolution(format!("{}: document has no 'paths' object", doc.source))
    })?;
    let base = base_url.trim_end_matches('/');

    let mut scenarios = Vec::new();
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            continue;
        };
        for (key, operation) in item {
            let method = key.to_ascii_lowercase();
            if !HTTP_METHODS.contains(&method.as_str()) {
                continue;
            }
            let method = method.to_ascii_uppercase();
            if skip.matches(&method, path) {
                tracing::info!(method = %method, path = %path, "skipping endpoint");
                continue;
            }

            let body = json_body_example(operation);
            let headers = body.as_ref().map(|_| {
                BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())])
            });
            let operation_id = operation
                .get("operationId")
                .and_then(Value::as_str)
                .map(str::to_string);

            scenarios.push(Scenario {
                url: format!("{base}{}", substitute_path(path, params)),
                method,
                path: path.clone(),
                headers,
                body,
                operation_id,
            });
        }
    }
    tracing::debug!(count = scenarios.len(), "compiled scenarios");
    Ok(scenarios)
}
