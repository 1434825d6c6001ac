// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! The bean graph reported by the beans endpoint.
//!
//! 1.x reports an array of application contexts, each with a `beans`
//! array whose entries carry their own `bean` id:
//!
//! ```json
//! [{"context": "application", "beans": [{"bean": "fooController", "type": "..."}]}]
//! ```
//!
//! 2.x reports a `contexts` object keyed by context id, each with a `beans`
//! object keyed by bean id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LiveBean {
    pub id: String,
    pub context: Option<String>,
    pub aliases: Vec<String>,
    pub scope: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub resource: Option<String>,
    pub dependencies: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LiveBeansModel {
    beans: Vec<LiveBean>,
}

#[derive(Deserialize)]
struct RawBean {
    bean: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
    scope: Option<String>,
    #[serde(rename = "type")]
    type_name: Option<String>,
    resource: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

impl RawBean {
    fn into_bean(self, id: String, context: Option<String>) -> LiveBean {
        LiveBean {
            id,
            context,
            aliases: self.aliases,
            scope: self.scope,
            type_name: self.type_name,
            resource: self.resource,
            dependencies: self.dependencies,
        }
    }
}

#[derive(Deserialize)]
struct V1Context {
    context: Option<String>,
    #[serde(default)]
    beans: Vec<RawBean>,
}

#[derive(Deserialize)]
struct V2Document {
    contexts: BTreeMap<String, V2Context>,
}

#[derive(Deserialize)]
struct V2Context {
    #[serde(default)]
    beans: BTreeMap<String, RawBean>,
}

impl LiveBeansModel {
    /// Parses either generation's payload; the shapes do not overlap.
    pub fn parse(value: &Value) -> Result<Self> {
        let beans = match value {
            Value::Array(_) => {
                let contexts: Vec<V1Context> = serde_json::from_value(value.clone())?;
                contexts
                    .into_iter()
                    .flat_map(|ctx| {
                        let context = ctx.context;
                        ctx.beans.into_iter().filter_map(move |raw| {
                            let id = raw.bean.clone()?;
                            Some(raw.into_bean(id, context.clone()))
                        })
                    })
                    .collect()
            }
            Value::Object(map) if map.contains_key("contexts") => {
                let document: V2Document = serde_json::from_value(value.clone())?;
                document
                    .contexts
                    .into_iter()
                    .flat_map(|(context, ctx)| {
                        ctx.beans
                            .into_iter()
                            .map(move |(id, raw)| raw.into_bean(id, Some(context.clone())))
                    })
                    .collect()
            }
            other => {
                return Err(Error::Payload {
                    what: "beans",
                    context: format!("unexpected payload shape: {other}"),
                });
            }
        };

        Ok(Self { beans })
    }

    pub fn beans(&self) -> &[LiveBean] {
        &self.beans
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn beans_of_name<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a LiveBean> {
        self.beans.iter().filter(move |b| b.id == id)
    }

    /// Beans whose type is `fq_type`. CGLIB proxies (`Foo$$EnhancerBySpringCGLIB$$...`)
    /// count as their target type.
    pub fn beans_of_type<'a>(&'a self, fq_type: &'a str) -> impl Iterator<Item = &'a LiveBean> {
        self.beans.iter().filter(move |b| {
            b.type_name
                .as_deref()
                .map(|t| t.split_once("$$").map_or(t, |(base, _)| base))
                == Some(fq_type)
        })
    }
}
