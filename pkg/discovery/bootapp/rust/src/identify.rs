// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Spring Boot application heuristic, based on the system properties of an
//! attached process.

use crate::attach::{Properties, VirtualMachine};
use crate::config::IdentificationConfig;
use crate::errors::Result;

const CLASS_PATH: &str = "java.class.path";
const PROTOCOL_HANDLER_PKGS: &str = "java.protocol.handler.pkgs";

#[cfg(unix)]
const PATH_SEPARATOR: char = ':';
#[cfg(not(unix))]
const PATH_SEPARATOR: char = ';';

/// Whether `props` describe a Spring Boot application that is not one of our
/// own tooling processes.
pub fn matches(props: &Properties, cfg: &IdentificationConfig) -> bool {
    if props.contains_key(&cfg.self_marker_property) {
        return false;
    }

    let on_class_path = props.get(CLASS_PATH).is_some_and(|class_path| {
        class_path
            .split(PATH_SEPARATOR)
            .filter(|element| !element.is_empty())
            .any(|element| element.contains(cfg.classpath_marker.as_str()))
    });

    on_class_path || props.get(PROTOCOL_HANDLER_PKGS) == Some(cfg.loader_marker.as_str())
}

/// Reads the system properties of `vm` and classifies it.
pub fn check(vm: &dyn VirtualMachine, cfg: &IdentificationConfig) -> Result<bool> {
    Ok(matches(&vm.system_properties()?, cfg))
}
