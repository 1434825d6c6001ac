// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Connector for agents exposing the management server over Jolokia's
//! JSON-over-HTTP protocol.

use std::time::Duration;

use log::debug;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::errors::{Error, Result};
use crate::management::{Connection, Connector, ManagementAddress, ObjectName};

const INSTANCE_NOT_FOUND: &str = "InstanceNotFoundException";

#[derive(Debug, Default)]
pub struct JolokiaConnector {
    timeout: Option<Duration>,
}

impl JolokiaConnector {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Connector for JolokiaConnector {
    fn supports(&self, address: &ManagementAddress) -> bool {
        let url = address.as_str();
        url.starts_with("http://") || url.starts_with("https://")
    }

    fn connect(&self, address: &ManagementAddress) -> Result<Box<dyn Connection>> {
        if !self.supports(address) {
            return Err(Error::UnsupportedAddress(address.to_string()));
        }
        let url = address.as_str();

        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Box::new(JolokiaConnection {
            agent: Some(builder.build()),
            url: format!("{}/", url.trim_end_matches('/')),
        }))
    }
}

struct JolokiaConnection {
    agent: Option<ureq::Agent>,
    url: String,
}

#[derive(Debug, Deserialize)]
struct Reply {
    status: u16,
    #[serde(default)]
    value: Value,
    error_type: Option<String>,
    error: Option<String>,
}

impl Reply {
    fn into_value(self, target: &str) -> Result<Value> {
        if self.status == 200 {
            return Ok(self.value);
        }

        let error_type = self.error_type.unwrap_or_default();
        if error_type.ends_with(INSTANCE_NOT_FOUND) || (self.status == 404 && error_type.is_empty())
        {
            return Err(Error::TargetNotFound(target.to_string()));
        }

        Err(Error::Protocol(format!(
            "{target}: status {} {error_type}: {}",
            self.status,
            self.error.unwrap_or_default()
        )))
    }
}

impl JolokiaConnection {
    fn request(&self, target: &str, body: Value) -> Result<Value> {
        let Some(agent) = &self.agent else {
            return Err(Error::Protocol("connection is closed".to_string()));
        };

        debug!("jolokia request to {}: {body}", self.url);
        let response = match agent.post(&self.url).send_json(body) {
            Ok(response) => response,
            // Jolokia reports errors in the body, sometimes with a matching
            // HTTP status.
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => return Err(Box::new(e).into()),
        };

        let reply: Reply = response.into_json()?;
        reply.into_value(target)
    }
}

impl Connection for JolokiaConnection {
    fn get_attribute(&mut self, target: &ObjectName, attribute: &str) -> Result<Value> {
        self.request(
            target.as_str(),
            json!({"type": "read", "mbean": target.as_str(), "attribute": attribute}),
        )
    }

    fn invoke(&mut self, target: &ObjectName, operation: &str, args: &[Value]) -> Result<Value> {
        self.request(
            target.as_str(),
            json!({
                "type": "exec",
                "mbean": target.as_str(),
                "operation": operation,
                "arguments": args,
            }),
        )
    }

    fn query_names(&mut self) -> Result<Vec<ObjectName>> {
        let value = self.request("*:*", json!({"type": "search", "mbean": "*:*"}))?;
        let names = value.as_array().ok_or_else(|| Error::Payload {
            what: "search reply",
            context: format!("expected an array, got {value}"),
        })?;

        Ok(names
            .iter()
            .filter_map(Value::as_str)
            .map(ObjectName::new)
            .collect())
    }

    fn close(&mut self) -> Result<()> {
        self.agent = None;
        Ok(())
    }
}
