// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Actuator endpoints exposed over the management channel.
//!
//! Two generations of the actuator API publish the same data under
//! different targets. 1.x exposes a `Data` attribute on
//! `org.springframework.boot:type=Endpoint,name=<feature>Endpoint`; 2.x
//! exposes an operation on `org.springframework.boot:type=Endpoint,name=<Feature>`.
//! A process only ever registers one of them, so the first non-null answer
//! wins and the two are never combined.

pub mod beans;
pub mod conditions;
pub mod env;
pub mod mappings;

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{Error, Result};
use crate::management::ObjectName;
use crate::query::ManagementClient;

const ENDPOINT_DOMAIN: &str = "org.springframework.boot";

/// Generation of the actuator endpoint API a payload came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ApiGeneration {
    #[serde(rename = "1.x")]
    V1,
    #[serde(rename = "2.x")]
    V2,
}

impl FromStr for ApiGeneration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1.x" => Ok(Self::V1),
            "2.x" => Ok(Self::V2),
            other => Err(Error::UnknownApiGeneration(other.to_string())),
        }
    }
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("1.x"),
            Self::V2 => f.write_str("2.x"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Environment,
    Beans,
    Mappings,
    Conditions,
}

impl Capability {
    fn v1_name(self) -> &'static str {
        match self {
            Self::Environment => "environmentEndpoint",
            Self::Beans => "beansEndpoint",
            Self::Mappings => "requestMappingEndpoint",
            Self::Conditions => "autoConfigurationReportEndpoint",
        }
    }

    fn v2_name(self) -> &'static str {
        match self {
            Self::Environment => "Env",
            Self::Beans => "Beans",
            Self::Mappings => "Mappings",
            Self::Conditions => "Conditions",
        }
    }

    pub fn v1_target(self) -> ObjectName {
        ObjectName::new(format!(
            "{ENDPOINT_DOMAIN}:type=Endpoint,name={}",
            self.v1_name()
        ))
    }

    pub fn v2_target(self) -> ObjectName {
        ObjectName::new(format!(
            "{ENDPOINT_DOMAIN}:type=Endpoint,name={}",
            self.v2_name()
        ))
    }

    pub fn v2_operation(self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Beans => "beans",
            Self::Mappings => "mappings",
            Self::Conditions => "applicationConditionEvaluation",
        }
    }
}

/// Attribute read on 1.x endpoints.
pub const V1_ATTRIBUTE: &str = "Data";

/// Fetches `capability`, trying the 1.x attribute before the 2.x operation,
/// and reports which generation answered.
pub fn fetch_versioned(
    client: &ManagementClient<'_>,
    capability: Capability,
) -> Result<Option<(ApiGeneration, Value)>> {
    if let Some(value) = client.read_attribute(&capability.v1_target(), V1_ATTRIBUTE)? {
        return Ok(Some((ApiGeneration::V1, value)));
    }

    if let Some(value) = client.invoke(&capability.v2_target(), capability.v2_operation(), &[])? {
        return Ok(Some((ApiGeneration::V2, value)));
    }

    debug!("{capability:?} endpoint not available at {}", client.address());
    Ok(None)
}

/// Same as [`fetch_versioned`] without the generation tag.
pub fn fetch(client: &ManagementClient<'_>, capability: Capability) -> Result<Option<Value>> {
    Ok(fetch_versioned(client, capability)?.map(|(_, value)| value))
}
