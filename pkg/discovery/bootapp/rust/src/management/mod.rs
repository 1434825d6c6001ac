// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! The management channel: connectors, connections and the scoped
//! acquisition helper every query goes through.
//!
//! Connections are never pooled or kept between queries. `with_connection`
//! opens one, runs the query body and closes it exactly once, whether the
//! body succeeds, fails or panics.

pub mod jolokia;

use std::fmt;

use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::errors::Result;

/// Address of a process's management agent, as published by the agent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ManagementAddress(String);

impl ManagementAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The host part of the address, e.g. `127.0.0.1` for both
    /// `service:jmx:rmi://127.0.0.1/stub/...` and `http://127.0.0.1:8778/jolokia`.
    pub fn host(&self) -> Option<&str> {
        let (_, rest) = self.0.split_once("://")?;
        let authority = rest.split('/').next()?;
        let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

        let host = if let Some(bracketed) = authority.strip_prefix('[') {
            bracketed.split(']').next()?
        } else {
            authority.split(':').next()?
        };

        (!host.is_empty()).then_some(host)
    }
}

impl fmt::Display for ManagementAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a management target, `<domain>:<key>=<value>,...`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ObjectName(String);

impl ObjectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split_once(':').map_or("", |(domain, _)| domain)
    }

    pub fn key_property(&self, key: &str) -> Option<&str> {
        let (_, properties) = self.0.split_once(':')?;
        properties
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Whether this names the servlet container's HTTP connector.
    pub fn is_web_connector(&self) -> bool {
        self.domain().starts_with("Tomcat") && self.key_property("type") == Some("Connector")
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single open session with a management agent.
///
/// Implementations report an unregistered target as
/// `Error::TargetNotFound`; every other failure is a real error.
pub trait Connection {
    fn get_attribute(&mut self, target: &ObjectName, attribute: &str) -> Result<Value>;

    fn invoke(&mut self, target: &ObjectName, operation: &str, args: &[Value]) -> Result<Value>;

    fn query_names(&mut self) -> Result<Vec<ObjectName>>;

    fn close(&mut self) -> Result<()>;
}

pub trait Connector: Send + Sync {
    /// Whether `connect` can reach an agent listening on `address`.
    fn supports(&self, _address: &ManagementAddress) -> bool {
        true
    }

    fn connect(&self, address: &ManagementAddress) -> Result<Box<dyn Connection>>;
}

struct ConnectionGuard {
    connection: Box<dyn Connection>,
    closed: bool,
}

impl ConnectionGuard {
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.connection.close() {
            warn!("failed to close management connection: {e}");
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a connection to `address`, runs `body` with it and closes it.
pub fn with_connection<T>(
    connector: &dyn Connector,
    address: &ManagementAddress,
    body: impl FnOnce(&mut dyn Connection) -> Result<T>,
) -> Result<T> {
    let mut guard = ConnectionGuard {
        connection: connector.connect(address)?,
        closed: false,
    };
    let result = body(guard.connection.as_mut());
    guard.close();
    result
}
