//! API document resolution and base-URL discovery.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use url::Url;

use crate::errors::{BenchError, Result};

/// Nesting limit for `$ref` expansion; cyclic references stop here and are left as-is.
const MAX_REF_DEPTH: usize = 32;

pub fn is_url(v: &str) -> bool {
    let lower = v.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// A parsed and dereferenced OpenAPI / Swagger document.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiDocument {
    pub source: String,
    pub root: Value,
}

impl ApiDocument {
    pub fn new(source: impl Into<String>, root: Value) -> Self {
        Self {
            source: source.into(),
            root,
        }
    }

    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.root.get("paths").and_then(Value::as_object)
    }
}

#[async_trait]
pub trait SpecResolver: Send + Sync {
    async fn resolve(&self, source: &str) -> Result<ApiDocument>;
}

/// Loads JSON or YAML documents from http(s) URLs or local files and expands
/// internal `#/...` references.
#[derive(Debug, Clone, Default)]
pub struct DocumentResolver {
    client: reqwest::Client,
}

impl DocumentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch(&self, source: &str) -> Result<String> {
        if is_url(source) {
            let resp = self
                .client
                .get(source)
                .send()
                .await
                .map_err(|e| BenchError::SpecResolution(format!("GET {source}: {e}")))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(BenchError::SpecResolution(format!(
                    "GET {source}: HTTP {status}"
                )));
            }
            resp.text()
                .await
                .map_err(|e| BenchError::SpecResolution(format!("reading {source}: {e}")))
        } else {
            tokio::fs::read_to_string(source)
                .await
                .map_err(|e| BenchError::SpecResolution(format!("reading {source}: {e}")))
        }
    }
}

#[async_trait]
impl SpecResolver for DocumentResolver {
    async fn resolve(&self, source: &str) -> Result<ApiDocument> {
        let raw = self.fetch(source).await?;
        let root = parse_document(source, &raw)?;
        tracing::debug!(source, "resolved API document");
        Ok(ApiDocument::new(source, dereference(&root)))
    }
}

/// Parse a document body; JSON when it looks like JSON, YAML otherwise.
pub fn parse_document(source: &str, raw: &str) -> Result<Value> {
    let looks_json = raw.trim_start().starts_with('{')
        || Path::new(source.split('?').next().unwrap_or(source))
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let parsed: Value = if looks_json {
        serde_json::from_str(raw).map_err(|e| {
            BenchError::SpecResolution(format!(
                "{source}: invalid JSON at line {} column {}: {e}",
                e.line(),
                e.column()
            ))
        })?
    } else {
        let yaml: serde_yaml::Value = serde_yaml::from_str(raw)
            .map_err(|e| BenchError::SpecResolution(format!("{source}: invalid YAML: {e}")))?;
        yaml_to_json(yaml)
    };
    if !parsed.is_object() {
        return Err(BenchError::SpecResolution(format!(
            "{source}: document root is not an object"
        )));
    }
    Ok(parsed)
}

/// YAML allows non-string keys (`200:` under `responses`); JSON keys are always strings.
fn yaml_to_json(v: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;
    match v {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    Y::String(s) => s,
                    Y::Number(n) => n.to_string(),
                    Y::Bool(b) => b.to_string(),
                    other => serde_yaml::to_string(&other)
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                };
                out.insert(key, yaml_to_json(v));
            }
            Value::Object(out)
        }
        Y::Tagged(tagged) => {
            let serde_yaml::value::TaggedValue { value, .. } = *tagged;
            yaml_to_json(value)
        }
    }
}

/// Expand internal `$ref` pointers against the document root.
pub fn dereference(root: &Value) -> Value {
    expand(root, root, 0)
}

fn expand(node: &Value, root: &Value, depth: usize) -> Value {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if depth < MAX_REF_DEPTH {
                    if let Some(target) = reference
                        .strip_prefix('#')
                        .and_then(|pointer| root.pointer(pointer))
                    {
                        return expand(target, root, depth + 1);
                    }
                }
                tracing::debug!(reference = %reference, "left unresolved $ref in place");
                return node.clone();
            }
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), expand(v, root, depth));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| expand(v, root, depth)).collect()),
        other => other.clone(),
    }
}

fn trim_slash(s: &str) -> String {
    s.trim_end_matches('/').to_string()
}

/// Join a possibly relative location onto the spec URL; absolute URLs pass through.
fn absolutize(location: &str, spec_source: Option<&str>) -> Option<String> {
    if is_url(location) {
        return Some(trim_slash(location));
    }
    let base = Url::parse(spec_source.filter(|s| is_url(s))?).ok()?;
    base.join(location).ok().map(|u| trim_slash(u.as_str()))
}

fn substitute_server_variables(server: &Value, url: &str) -> String {
    let Some(vars) = server.get("variables").and_then(Value::as_object) else {
        return url.to_string();
    };
    let mut out = url.to_string();
    for (name, var) in vars {
        if let Some(default) = var.get("default").and_then(Value::as_str) {
            out = out.replace(&format!("{{{name}}}"), default);
        }
    }
    out
}

/// Derive the target base URL.
///
/// Precedence: explicit URL, OpenAPI 3 `servers[0].url`, Swagger 2
/// `host` + `basePath` + `schemes[0]`, legacy top-level `basePath`, then the
/// directory of the spec URL.
pub fn resolve_base_url(
    explicit: Option<&str>,
    doc: Option<&ApiDocument>,
    spec_source: Option<&str>,
) -> Result<String> {
    if let Some(url) = explicit.filter(|u| is_url(u)) {
        return Ok(trim_slash(url));
    }

    if let Some(root) = doc.map(|d| &d.root) {
        if let Some(server) = root
            .get("servers")
            .and_then(Value::as_array)
            .and_then(|s| s.first())
        {
            if let Some(url) = server.get("url").and_then(Value::as_str).filter(|u| !u.is_empty()) {
                let url = substitute_server_variables(server, url);
                if let Some(resolved) = absolutize(&url, spec_source) {
                    return Ok(resolved);
                }
            }
        }

        if let Some(host) = root.get("host").and_then(Value::as_str) {
            let scheme = root
                .get("schemes")
                .and_then(Value::as_array)
                .and_then(|s| s.first())
                .and_then(Value::as_str)
                .unwrap_or("http");
            let base_path = root.get("basePath").and_then(Value::as_str).unwrap_or("");
            return Ok(trim_slash(&format!("{scheme}://{host}{base_path}")));
        }

        if let Some(base_path) = root.get("basePath").and_then(Value::as_str) {
            if let Some(resolved) = absolutize(base_path, spec_source) {
                return Ok(resolved);
            }
        }
    }

    if let Some(spec) = spec_source.filter(|s| is_url(s)) {
        let mut url = Url::parse(spec).map_err(|e| {
            BenchError::BaseUrlResolution(format!("spec URL '{spec}' is not a valid URL: {e}"))
        })?;
        let dir = url
            .path()
            .rfind('/')
            .map(|i| url.path()[..i].to_string())
            .unwrap_or_default();
        url.set_path(&dir);
        url.set_query(None);
        url.set_fragment(None);
        return Ok(trim_slash(url.as_str()));
    }

    Err(BenchError::BaseUrlResolution(
        "no --url given, and the document declares no servers, host or basePath".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(root: Value) -> ApiDocument {
        ApiDocument::new("https://api.example.com/v1/openapi.json", root)
    }

    #[test]
    fn explicit_url_wins() {
        let d = doc(json!({"servers": [{"url": "https://other.example.com"}]}));
        let url = resolve_base_url(Some("http://localhost:8080/"), Some(&d), Some(&d.source)).unwrap();
        assert_eq!(url, "http://localhost:8080");
    }

    #[test]
    fn openapi3_server_url() {
        let d = doc(json!({"openapi": "3.0.0", "servers": [{"url": "https://api.example.com/v2/"}]}));
        assert_eq!(
            resolve_base_url(None, Some(&d), Some(&d.source)).unwrap(),
            "https://api.example.com/v2"
        );
    }

    #[test]
    fn relative_server_url_joins_spec_url() {
        let d = doc(json!({"servers": [{"url": "/api"}]}));
        assert_eq!(
            resolve_base_url(None, Some(&d), Some(&d.source)).unwrap(),
            "https://api.example.com/api"
        );
    }

    #[test]
    fn server_variables_use_defaults() {
        let d = doc(json!({"servers": [{
            "url": "https://{env}.example.com",
            "variables": {"env": {"default": "staging"}}
        }]}));
        assert_eq!(
            resolve_base_url(None, Some(&d), None).unwrap(),
            "https://staging.example.com"
        );
    }

    #[test]
    fn swagger2_host_base_path_and_scheme() {
        let d = doc(json!({"swagger": "2.0", "host": "petstore.io", "basePath": "/v2", "schemes": ["https"]}));
        assert_eq!(
            resolve_base_url(None, Some(&d), None).unwrap(),
            "https://petstore.io/v2"
        );
        let d = doc(json!({"swagger": "2.0", "host": "petstore.io"}));
        assert_eq!(resolve_base_url(None, Some(&d), None).unwrap(), "http://petstore.io");
    }

    #[test]
    fn legacy_base_path() {
        let d = doc(json!({"swaggerVersion": "1.2", "basePath": "http://legacy.example.com/api/"}));
        assert_eq!(
            resolve_base_url(None, Some(&d), None).unwrap(),
            "http://legacy.example.com/api"
        );
    }

    #[test]
    fn falls_back_to_spec_directory() {
        let d = doc(json!({"openapi": "3.0.0"}));
        assert_eq!(
            resolve_base_url(None, Some(&d), Some("https://api.example.com/v1/openapi.json?x=1")).unwrap(),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn no_source_is_an_error() {
        let err = resolve_base_url(None, None, Some("spec.yaml")).unwrap_err();
        assert!(matches!(err, BenchError::BaseUrlResolution(_)));
    }

    #[test]
    fn dereference_expands_internal_refs() {
        let root = json!({
            "paths": {"/pets": {"$ref": "#/x-items/pets"}},
            "x-items": {"pets": {"get": {"operationId": "listPets"}}}
        });
        let expanded = dereference(&root);
        assert_eq!(expanded["paths"]["/pets"]["get"]["operationId"], "listPets");
    }

    #[test]
    fn dereference_stops_on_cycles() {
        let root = json!({"a": {"$ref": "#/b"}, "b": {"$ref": "#/a"}});
        let expanded = dereference(&root);
        assert!(expanded["a"].get("$ref").is_some());
    }

    #[test]
    fn yaml_and_json_documents_parse() {
        let yaml = "openapi: 3.0.0\npaths:\n  /pets:\n    get:\n      responses:\n        200:\n          description: ok\n";
        let v = parse_document("api.yaml", yaml).unwrap();
        assert!(v["paths"]["/pets"]["get"].is_object());
        assert_eq!(v["paths"]["/pets"]["get"]["responses"]["200"]["description"], "ok");
        let err = parse_document("api.json", "{ nope").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn resolver_reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.yaml");
        std::fs::write(&path, "openapi: 3.0.0\npaths:\n  /a:\n    get: {}\n").unwrap();
        let doc = DocumentResolver::new()
            .resolve(path.to_str().unwrap())
            .await
            .unwrap();
        assert!(doc.paths().unwrap().contains_key("/a"));

        let missing = DocumentResolver::new().resolve("/nonexistent/api.yaml").await;
        assert!(matches!(missing, Err(BenchError::SpecResolution(_))));
    }
}
