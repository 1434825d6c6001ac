// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Listening port lookup.
//!
//! No single source reports the port on every version, so several
//! strategies are tried in order and the first one to find a port wins.

use log::debug;
use serde_json::json;

use crate::actuator::env::{LOCAL_SERVER_PORT, port_from_value, server_port};
use crate::actuator::{self, Capability};
use crate::errors::Result;
use crate::management::ObjectName;
use crate::query::ManagementClient;

const ADMIN_TARGET: &str = "org.springframework.boot:type=Admin,name=SpringApplication";

pub trait PortStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means this strategy has no answer and the next one should
    /// be tried.
    fn find_port(&self, client: &ManagementClient<'_>) -> Result<Option<u16>>;
}

/// Asks the admin target for the `local.server.port` property.
pub struct AdminProperty;

impl PortStrategy for AdminProperty {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn find_port(&self, client: &ManagementClient<'_>) -> Result<Option<u16>> {
        let value = client.invoke(
            &ObjectName::new(ADMIN_TARGET),
            "getProperty",
            &[json!(LOCAL_SERVER_PORT)],
        )?;
        Ok(value.as_ref().and_then(port_from_value))
    }
}

/// Looks for the `server.ports` property source in the environment.
pub struct EnvironmentPorts;

impl PortStrategy for EnvironmentPorts {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn find_port(&self, client: &ManagementClient<'_>) -> Result<Option<u16>> {
        let env = actuator::fetch(client, Capability::Environment)?;
        Ok(env.as_ref().and_then(server_port))
    }
}

/// Reads the bound port of the servlet container's HTTP connector.
pub struct WebConnector;

impl PortStrategy for WebConnector {
    fn name(&self) -> &'static str {
        "web connector"
    }

    fn find_port(&self, client: &ManagementClient<'_>) -> Result<Option<u16>> {
        for name in client.query_names()? {
            if !name.is_web_connector() {
                continue;
            }
            if let Some(port) = client
                .read_attribute(&name, "localPort")?
                .as_ref()
                .and_then(port_from_value)
            {
                return Ok(Some(port));
            }
        }
        Ok(None)
    }
}

pub const DEFAULT_STRATEGIES: [&dyn PortStrategy; 3] =
    [&AdminProperty, &EnvironmentPorts, &WebConnector];

/// Runs `strategies` in order and returns the first port found.
pub fn resolve(
    client: &ManagementClient<'_>,
    strategies: &[&dyn PortStrategy],
) -> Result<Option<u16>> {
    for strategy in strategies {
        if let Some(port) = strategy.find_port(client)? {
            debug!("found port {port} with the {} strategy", strategy.name());
            return Ok(Some(port));
        }
    }
    Ok(None)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::management::ManagementAddress;
    use crate::test_utils::FakeConnector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStrategy {
        port: Option<u16>,
        calls: AtomicUsize,
    }

    impl CountingStrategy {
        fn new(port: Option<u16>) -> Self {
            Self {
                port,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PortStrategy for CountingStrategy {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn find_port(&self, _client: &ManagementClient<'_>) -> Result<Option<u16>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.port)
        }
    }

    fn address() -> ManagementAddress {
        ManagementAddress::new("http://127.0.0.1:8778/jolokia")
    }

    #[test]
    fn test_first_strategy_short_circuits() {
        let connector = FakeConnector::new();
        let address = address();
        let client = ManagementClient::new(&connector, &address);

        let first = CountingStrategy::new(Some(8080));
        let second = CountingStrategy::new(Some(9090));
        let third = CountingStrategy::new(Some(7070));

        let port = resolve(&client, &[&first, &second, &third]).unwrap();
        assert_eq!(port, Some(8080));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);
        assert_eq!(third.calls(), 0);
    }

    #[test]
    fn test_web_connector_fallback() {
        let connector = FakeConnector::new()
            .with_names(&[
                "java.lang:type=Memory",
                "Tomcat:type=ThreadPool,name=\"http-nio-8080\"",
                "Tomcat:type=Connector,port=8443",
            ])
            .with_attribute("Tomcat:type=Connector,port=8443", "localPort", json!(8443));
        let address = address();
        let client = ManagementClient::new(&connector, &address);

        let first = CountingStrategy::new(None);
        let second = CountingStrategy::new(None);

        let port = resolve(&client, &[&first, &second, &WebConnector]).unwrap();
        assert_eq!(port, Some(8443));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[test]
    fn test_default_chain_with_nothing_registered() {
        let connector = FakeConnector::new();
        let address = address();
        let client = ManagementClient::new(&connector, &address);

        assert_eq!(resolve(&client, &DEFAULT_STRATEGIES).unwrap(), None);
    }

    #[test]
    fn test_admin_property() {
        let connector =
            FakeConnector::new().with_operation(ADMIN_TARGET, "getProperty", json!("8080"));
        let address = address();
        let client = ManagementClient::new(&connector, &address);

        assert_eq!(resolve(&client, &DEFAULT_STRATEGIES).unwrap(), Some(8080));
        assert_eq!(connector.opened(), 1);
    }

    #[test]
    fn test_environment_ports() {
        let connector = FakeConnector::new().with_operation(
            Capability::Environment.v2_target().as_str(),
            "environment",
            json!({
                "activeProfiles": [],
                "propertySources": [
                    {"name": "server.ports", "properties": {"local.server.port": {"value": 9000}}}
                ]
            }),
        );
        let address = address();
        let client = ManagementClient::new(&connector, &address);

        assert_eq!(resolve(&client, &DEFAULT_STRATEGIES).unwrap(), Some(9000));
    }

    #[test]
    fn test_strategy_failure_propagates() {
        let connector = FakeConnector::new().with_broken_target(ADMIN_TARGET);
        let address = address();
        let client = ManagementClient::new(&connector, &address);

        assert!(resolve(&client, &DEFAULT_STRATEGIES).is_err());
    }
}
