// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use log::{debug, warn};

use crate::attach::{Properties, VirtualMachine};
use crate::errors::Result;
use crate::management::{Connector, ManagementAddress};

/// Agent property under which a running local management agent publishes
/// its connector address.
pub const LOCAL_CONNECTOR_ADDRESS: &str = "com.sun.management.jmxremote.localConnectorAddress";

/// System property under which the Jolokia JVM agent publishes its URL.
pub const JOLOKIA_AGENT_URL: &str = "jolokia.agent";

/// Shape of the address a local management agent publishes once started.
const LOCAL_AGENT_ADDRESS: &str = "service:jmx:rmi://127.0.0.1/";

/// Finds a management address of an attached process that `connector` can
/// use.
///
/// `property` is looked up first in the agent properties, then in the
/// system properties, followed by the Jolokia agent URL. When none of them
/// holds a usable address and the connector speaks to local management
/// agents, the process is asked to start its own.
///
/// Returns `None` when no usable address can be obtained.
pub fn resolve(
    vm: &dyn VirtualMachine,
    connector: &dyn Connector,
    property: &str,
    pid: i32,
) -> Option<ManagementAddress> {
    let mut keys = vec![property];
    if property != JOLOKIA_AGENT_URL {
        keys.push(JOLOKIA_AGENT_URL);
    }

    let sources: [(&str, fn(&dyn VirtualMachine) -> Result<Properties>); 2] = [
        ("agent", |vm| vm.agent_properties()),
        ("system", |vm| vm.system_properties()),
    ];
    for (kind, read) in sources {
        let props = match read(vm) {
            Ok(props) => props,
            Err(e) => {
                debug!("pid {pid}: unable to read {kind} properties: {e}");
                continue;
            }
        };
        for key in &keys {
            let Some(value) = props.get(key).filter(|v| !v.is_empty()) else {
                continue;
            };
            let address = ManagementAddress::new(value);
            if connector.supports(&address) {
                debug!("pid {pid}: management agent already listening on {address}");
                return Some(address);
            }
            debug!("pid {pid}: ignoring {key}={address}, not reachable by the connector");
        }
    }

    if !connector.supports(&ManagementAddress::new(LOCAL_AGENT_ADDRESS)) {
        debug!("pid {pid}: no management address usable by the connector");
        return None;
    }

    match vm.start_local_management_agent() {
        Ok(address) if address.is_empty() => {
            warn!("pid {pid}: management agent started without publishing an address");
            None
        }
        Ok(address) => {
            let address = ManagementAddress::new(address);
            if !connector.supports(&address) {
                warn!("pid {pid}: started management agent on unusable address {address}");
                return None;
            }
            debug!("pid {pid}: started management agent on {address}");
            Some(address)
        }
        Err(e) => {
            warn!("pid {pid}: unable to start management agent: {e}");
            None
        }
    }
}
