// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use log::debug;
use serde_json::Value;

use crate::errors::Result;
use crate::management::{Connector, ManagementAddress, ObjectName, with_connection};

/// Attribute reads and operation invocations against a management agent.
///
/// Every call uses its own connection. A target that is not registered, or
/// a `null` result, is reported as `Ok(None)`: querying the endpoint of the
/// wrong API generation looks exactly like that.
pub struct ManagementClient<'a> {
    connector: &'a dyn Connector,
    address: &'a ManagementAddress,
}

impl<'a> ManagementClient<'a> {
    pub fn new(connector: &'a dyn Connector, address: &'a ManagementAddress) -> Self {
        Self { connector, address }
    }

    pub fn address(&self) -> &ManagementAddress {
        self.address
    }

    pub fn read_attribute(&self, target: &ObjectName, attribute: &str) -> Result<Option<Value>> {
        with_connection(self.connector, self.address, |conn| {
            present(conn.get_attribute(target, attribute))
        })
    }

    pub fn invoke(
        &self,
        target: &ObjectName,
        operation: &str,
        args: &[Value],
    ) -> Result<Option<Value>> {
        with_connection(self.connector, self.address, |conn| {
            present(conn.invoke(target, operation, args))
        })
    }

    pub fn query_names(&self) -> Result<Vec<ObjectName>> {
        with_connection(self.connector, self.address, |conn| conn.query_names())
    }
}

fn present(result: Result<Value>) -> Result<Option<Value>> {
    match result {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_target_not_found() => {
            debug!("{e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
