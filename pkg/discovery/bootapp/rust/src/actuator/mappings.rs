// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Request mappings reported by the mappings endpoint.
//!
//! The two generations are structurally different and must be told apart by
//! the caller. 1.x reports an object keyed by the mapping predicate:
//!
//! ```json
//! {"{[/hello || /hi],methods=[GET]}": {"bean": "...", "method": "public java.lang.String com.example.HelloController.hello()"}}
//! ```
//!
//! 2.x reports descriptors, either as a bare array or nested in the full
//! `contexts -> <id> -> mappings -> dispatcherServlets -> <name>` document.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::actuator::ApiGeneration;
use crate::errors::{Error, Result};

/// Dispatchers whose descriptors are request mappings, for servlet and
/// reactive applications respectively.
const DISPATCHERS: [&str; 2] = ["dispatcherServlets", "dispatcherHandlers"];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RequestMapping {
    /// The predicate as reported, e.g. `{[/hello],methods=[GET]}`.
    pub predicate: String,
    pub patterns: Vec<String>,
    pub methods: Vec<String>,
    pub handler_class: Option<String>,
    pub handler_method: Option<String>,
}

impl RequestMapping {
    fn from_predicate(predicate: &str) -> Self {
        let (patterns, methods) = parse_predicate(predicate);
        Self {
            predicate: predicate.to_string(),
            patterns,
            methods,
            ..Default::default()
        }
    }

    fn with_method_signature(mut self, signature: Option<&str>) -> Self {
        if let Some((class, method)) = signature.and_then(parse_method_signature) {
            self.handler_class = Some(class);
            self.handler_method = Some(method);
        }
        self
    }
}

pub fn parse_request_mappings(
    value: &Value,
    generation: ApiGeneration,
) -> Result<Vec<RequestMapping>> {
    match generation {
        ApiGeneration::V1 => parse_v1(value),
        ApiGeneration::V2 => parse_v2(value),
    }
}

/// Parses a JSON document tagged `"1.x"` or `"2.x"`.
pub fn parse_request_mappings_json(json: &str, generation: &str) -> Result<Vec<RequestMapping>> {
    let generation: ApiGeneration = generation.parse()?;
    let value: Value = serde_json::from_str(json)?;
    parse_request_mappings(&value, generation)
}

fn parse_v1(value: &Value) -> Result<Vec<RequestMapping>> {
    let mappings = value.as_object().ok_or_else(|| Error::Payload {
        what: "1.x request mappings",
        context: "expected an object keyed by mapping".to_string(),
    })?;

    Ok(mappings
        .iter()
        .map(|(key, details)| {
            RequestMapping::from_predicate(key)
                .with_method_signature(details.get("method").and_then(Value::as_str))
        })
        .collect())
}

fn parse_v2(value: &Value) -> Result<Vec<RequestMapping>> {
    match value {
        Value::Array(descriptors) => Ok(descriptors.iter().map(parse_v2_descriptor).collect()),
        Value::Object(document) if document.contains_key("contexts") => {
            Ok(v2_context_descriptors(document)
                .map(parse_v2_descriptor)
                .collect())
        }
        _ => Err(Error::Payload {
            what: "2.x request mappings",
            context: "expected a descriptor array or a contexts document".to_string(),
        }),
    }
}

fn v2_context_descriptors(document: &Map<String, Value>) -> impl Iterator<Item = &Value> {
    document
        .get("contexts")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|contexts| contexts.values())
        .filter_map(|context| context.get("mappings"))
        .flat_map(|mappings| DISPATCHERS.iter().filter_map(move |d| mappings.get(*d)))
        .filter_map(Value::as_object)
        .flat_map(|dispatchers| dispatchers.values())
        .filter_map(Value::as_array)
        .flatten()
}

fn parse_v2_descriptor(descriptor: &Value) -> RequestMapping {
    let predicate = descriptor
        .get("predicate")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mut mapping = RequestMapping::from_predicate(predicate);

    let details = descriptor.get("details");
    if let Some(conditions) = details.and_then(|d| d.get("requestMappingConditions")) {
        mapping.patterns = string_array(conditions.get("patterns"));
        mapping.methods = string_array(conditions.get("methods"));
    }

    if let Some(handler) = details.and_then(|d| d.get("handlerMethod"))
        && let (Some(class), Some(name)) = (
            handler.get("className").and_then(Value::as_str),
            handler.get("name").and_then(Value::as_str),
        )
    {
        mapping.handler_class = Some(class.to_string());
        mapping.handler_method = Some(name.to_string());
        return mapping;
    }

    mapping.with_method_signature(descriptor.get("handler").and_then(Value::as_str))
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Splits a predicate into its path patterns and HTTP methods.
///
/// Handles the 1.x/2.x form `{[/a || /b],methods=[GET || POST]}`, the 3.x
/// form `{GET [/a, /b]}` / `{GET /a}` and plain paths like `/webjars/**`.
fn parse_predicate(predicate: &str) -> (Vec<String>, Vec<String>) {
    let predicate = predicate.trim();
    if predicate.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let Some(inner) = predicate
        .strip_prefix('{')
        .and_then(|p| p.strip_suffix('}'))
    else {
        return (vec![predicate.to_string()], Vec::new());
    };

    let mut patterns = Vec::new();
    let mut methods = Vec::new();
    for condition in split_top_level(inner) {
        let condition = condition.trim();
        if condition.starts_with('[') {
            patterns.extend(bracketed_list(condition));
        } else if let Some(list) = condition.strip_prefix("methods=") {
            methods.extend(bracketed_list(list));
        } else if !condition.contains('=')
            && let Some((method, paths)) = condition.split_once(' ')
        {
            methods.push(method.to_string());
            let paths = paths.trim();
            if paths.starts_with('[') {
                patterns.extend(bracketed_list(paths));
            } else {
                patterns.push(paths.to_string());
            }
        } else if condition.starts_with('/') {
            patterns.push(condition.to_string());
        }
    }
    (patterns, methods)
}

/// Splits on commas that are not inside square brackets.
fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// `[a || b]` and `[a, b]` lists.
fn bracketed_list(s: &str) -> Vec<String> {
    let Some(inner) = s.trim().strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
        return Vec::new();
    };
    let separator = if inner.contains("||") { "||" } else { "," };
    inner
        .split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// `public java.lang.String com.example.HelloController.hello(java.lang.String)`
/// gives `("com.example.HelloController", "hello")`.
fn parse_method_signature(signature: &str) -> Option<(String, String)> {
    let (head, _) = signature.split_once('(')?;
    let qualified = head.split_whitespace().next_back()?;
    let (class, method) = qualified.rsplit_once('.')?;
    if class.is_empty() || method.is_empty() {
        return None;
    }
    Some((class.to_string(), method.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_v1_single_plain_route() {
        let payload = json!({"/foo": {"bean": "fooHandler"}});
        let mappings = parse_request_mappings(&payload, ApiGeneration::V1).unwrap();

        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].predicate, "/foo");
        assert_eq!(mappings[0].patterns, vec!["/foo".to_string()]);
        assert!(mappings[0].methods.is_empty());
    }

    #[test]
    fn test_v1_predicate_and_handler() {
        let payload = json!({
            "{[/hello || /hi],methods=[GET || HEAD],produces=[text/plain]}": {
                "bean": "requestMappingHandlerMapping",
                "method": "public java.lang.String com.example.HelloController.hello(java.lang.String)"
            }
        });
        let mappings = parse_request_mappings(&payload, ApiGeneration::V1).unwrap();

        let mapping = &mappings[0];
        assert_eq!(mapping.patterns, vec!["/hello".to_string(), "/hi".to_string()]);
        assert_eq!(mapping.methods, vec!["GET".to_string(), "HEAD".to_string()]);
        assert_eq!(mapping.handler_class.as_deref(), Some("com.example.HelloController"));
        assert_eq!(mapping.handler_method.as_deref(), Some("hello"));
    }

    #[test]
    fn test_v2_descriptor_array() {
        let payload = json!([
            {
                "handler": "public java.lang.String com.example.HelloController.hello()",
                "predicate": "{[/hello],methods=[GET]}",
                "details": {
                    "handlerMethod": {
                        "className": "com.example.HelloController",
                        "name": "hello",
                        "descriptor": "()Ljava/lang/String;"
                    },
                    "requestMappingConditions": {
                        "methods": ["GET"],
                        "patterns": ["/hello"]
                    }
                }
            },
            {
                "handler": "ResourceHttpRequestHandler [classpath [META-INF/resources/webjars/]]",
                "predicate": "/webjars/**",
                "details": null
            }
        ]);
        let mappings = parse_request_mappings(&payload, ApiGeneration::V2).unwrap();

        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].patterns, vec!["/hello".to_string()]);
        assert_eq!(mappings[0].methods, vec!["GET".to_string()]);
        assert_eq!(mappings[0].handler_method.as_deref(), Some("hello"));
        assert_eq!(mappings[1].patterns, vec!["/webjars/**".to_string()]);
        assert_eq!(mappings[1].handler_class, None);
    }

    #[test]
    fn test_v2_contexts_document() {
        let payload = json!({
            "contexts": {
                "application": {
                    "mappings": {
                        "dispatcherServlets": {
                            "dispatcherServlet": [
                                {"handler": "public java.lang.String com.example.A.a()", "predicate": "{GET [/a, /b]}"},
                                {"handler": "public void com.example.B.b()", "predicate": "{POST /b}"}
                            ]
                        },
                        "servletFilters": [{"name": "requestContextFilter"}],
                        "servlets": [{"name": "dispatcherServlet"}]
                    },
                    "parentId": null
                }
            }
        });
        let mappings = parse_request_mappings(&payload, ApiGeneration::V2).unwrap();

        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[0].methods, vec!["GET".to_string()]);
        assert_eq!(mappings[0].patterns, vec!["/a".to_string(), "/b".to_string()]);
        assert_eq!(mappings[0].handler_class.as_deref(), Some("com.example.A"));
        assert_eq!(mappings[1].patterns, vec!["/b".to_string()]);
        assert_eq!(mappings[1].handler_method.as_deref(), Some("b"));
    }

    #[test]
    fn test_shapes_are_not_sniffed() {
        assert!(parse_request_mappings(&json!([{"predicate": "/a"}]), ApiGeneration::V1).is_err());
        assert!(parse_request_mappings(&json!({"/a": {}}), ApiGeneration::V2).is_err());
    }

    #[test]
    fn test_json_entry_point() {
        let mappings = parse_request_mappings_json(r#"{"/foo": {}}"#, "1.x").unwrap();
        assert_eq!(mappings.len(), 1);

        let mappings = parse_request_mappings_json(r#"[{}, {}]"#, "2.x").unwrap();
        assert_eq!(mappings.len(), 2);

        let err = parse_request_mappings_json(r#"{"/foo": {}}"#, "3.x").unwrap_err();
        assert!(matches!(err, Error::UnknownApiGeneration(_)));
    }

    #[test]
    fn test_method_signature() {
        assert_eq!(
            parse_method_signature("public void com.example.Foo.bar(int,long)"),
            Some(("com.example.Foo".to_string(), "bar".to_string()))
        );
        assert_eq!(parse_method_signature("ResourceHttpRequestHandler [x]"), None);
    }
}
