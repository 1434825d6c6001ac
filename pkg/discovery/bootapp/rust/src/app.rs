// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::actuator::beans::LiveBeansModel;
use crate::actuator::conditions::{self, LiveConditional};
use crate::actuator::env;
use crate::actuator::mappings::{RequestMapping, parse_request_mappings};
use crate::actuator::{self, ApiGeneration, Capability};
use crate::address;
use crate::attach::{ProcessDescriptor, Properties, VirtualMachine};
use crate::config::Config;
use crate::errors::Result;
use crate::identify;
use crate::management::{Connector, ManagementAddress};
use crate::port::{self, DEFAULT_STRATEGIES, PortStrategy};
use crate::query::ManagementClient;

/// An attached process.
///
/// Handles are created and detached by [`crate::cache::ProcessCache`] only.
/// Everything learned about the process that cannot change during its
/// lifetime (its management address, a positive identification) is kept
/// here so it survives across refreshes.
pub struct AppHandle {
    pid: i32,
    display_name: RwLock<String>,
    vm: Box<dyn VirtualMachine>,
    connector: Arc<dyn Connector>,
    config: Arc<Config>,
    address: OnceLock<Option<ManagementAddress>>,
    identified: AtomicBool,
    last_negative: Mutex<Option<Instant>>,
    detached: AtomicBool,
}

/// Everything the attach mechanism alone reports about a process.
#[derive(Debug, Serialize)]
pub struct JvmInfo {
    pub pid: i32,
    pub display_name: String,
    pub agent_properties: Properties,
    pub system_properties: Properties,
}

impl AppHandle {
    pub(crate) fn new(
        descriptor: &ProcessDescriptor,
        vm: Box<dyn VirtualMachine>,
        connector: Arc<dyn Connector>,
        config: Arc<Config>,
    ) -> Self {
        let handle = Self {
            pid: descriptor.pid,
            display_name: RwLock::new(descriptor.display_name.clone()),
            vm,
            connector,
            config,
            address: OnceLock::new(),
            identified: AtomicBool::new(false),
            last_negative: Mutex::new(None),
            detached: AtomicBool::new(false),
        };
        info!("Attached to {handle}");
        handle
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn process_id(&self) -> String {
        self.pid.to_string()
    }

    pub fn display_name(&self) -> String {
        self.display_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_display_name(&self, name: &str) {
        let mut current = self
            .display_name
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != name {
            *current = name.to_string();
        }
    }

    /// Whether this process is a Spring Boot application.
    ///
    /// A positive answer is remembered for the lifetime of the handle. A
    /// negative one, including a failure to read the process properties, is
    /// re-checked on the next call unless `identification.retry_interval`
    /// is set.
    pub fn is_spring_boot_app(&self) -> bool {
        if self.identified.load(Ordering::Acquire) {
            return true;
        }

        let retry_interval = self.config.identification.retry_interval();
        if let Some(interval) = retry_interval {
            let last = self
                .last_negative
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.is_some_and(|at| at.elapsed() < interval) {
                return false;
            }
        }

        match identify::check(self.vm.as_ref(), &self.config.identification) {
            Ok(true) => {
                self.identified.store(true, Ordering::Release);
                return true;
            }
            Ok(false) => {}
            Err(e) => debug!("{self}: unable to read system properties: {e}"),
        }

        if retry_interval.is_some() {
            *self
                .last_negative
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        }
        false
    }

    /// The process's management address, resolved on first use. Concurrent
    /// first callers wait for a single resolution. A failed resolution is
    /// remembered as well.
    pub fn management_address(&self) -> Option<&ManagementAddress> {
        self.address
            .get_or_init(|| {
                address::resolve(
                    self.vm.as_ref(),
                    self.connector.as_ref(),
                    &self.config.address_property,
                    self.pid,
                )
            })
            .as_ref()
    }

    pub fn host(&self) -> Option<String> {
        self.management_address()?.host().map(str::to_string)
    }

    fn client(&self) -> Option<ManagementClient<'_>> {
        let address = self.management_address()?;
        Some(ManagementClient::new(self.connector.as_ref(), address))
    }

    fn fetch_versioned(&self, capability: Capability) -> Result<Option<(ApiGeneration, Value)>> {
        match self.client() {
            Some(client) => actuator::fetch_versioned(&client, capability),
            None => Ok(None),
        }
    }

    /// The environment endpoint payload, as reported by the process.
    pub fn environment(&self) -> Result<Option<Value>> {
        Ok(self
            .fetch_versioned(Capability::Environment)?
            .map(|(_, env)| env))
    }

    /// The bean graph. Empty when it cannot be obtained.
    pub fn beans(&self) -> LiveBeansModel {
        let payload = match self.fetch_versioned(Capability::Beans) {
            Ok(Some((_, payload))) => payload,
            Ok(None) => return LiveBeansModel::default(),
            Err(e) => {
                warn!("{self}: unable to fetch beans: {e}");
                return LiveBeansModel::default();
            }
        };

        LiveBeansModel::parse(&payload).unwrap_or_else(|e| {
            warn!("{self}: {e}");
            LiveBeansModel::default()
        })
    }

    pub fn request_mappings(&self) -> Result<Option<Vec<RequestMapping>>> {
        let Some((generation, payload)) = self.fetch_versioned(Capability::Mappings)? else {
            return Ok(None);
        };

        match parse_request_mappings(&payload, generation) {
            Ok(mappings) => Ok(Some(mappings)),
            Err(e) => {
                warn!("{self}: {e}");
                Ok(None)
            }
        }
    }

    /// Positive matches of the auto-configuration report.
    pub fn live_conditionals(&self) -> Result<Option<Vec<LiveConditional>>> {
        let Some((_, report)) = self.fetch_versioned(Capability::Conditions)? else {
            return Ok(None);
        };

        let conditionals = conditions::parse(&report, &self.process_id(), &self.display_name());
        if conditionals.is_none() {
            warn!("{self}: unrecognized condition report");
        }
        Ok(conditionals)
    }

    /// Active profiles, `None` when the environment is unavailable or does
    /// not list any.
    pub fn active_profiles(&self) -> Option<Vec<String>> {
        match self.environment() {
            Ok(payload) => payload.as_ref().and_then(env::active_profiles),
            Err(e) => {
                warn!("{self}: unable to fetch environment: {e}");
                None
            }
        }
    }

    pub fn port(&self) -> Result<Option<u16>> {
        self.port_with(&DEFAULT_STRATEGIES)
    }

    pub fn port_with(&self, strategies: &[&dyn PortStrategy]) -> Result<Option<u16>> {
        match self.client() {
            Some(client) => port::resolve(&client, strategies),
            None => Ok(None),
        }
    }

    pub fn jvm_info(&self) -> Result<JvmInfo> {
        Ok(JvmInfo {
            pid: self.pid,
            display_name: self.display_name(),
            agent_properties: self.vm.agent_properties()?,
            system_properties: self.vm.system_properties()?,
        })
    }

    pub(crate) fn detach(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Detaching from {self}");
        if let Err(e) = self.vm.detach() {
            debug!("{self}: detach failed: {e}");
        }
    }
}

impl Drop for AppHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Display for AppHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process [id={}, name=`{}`]", self.pid, self.display_name())
    }
}

impl fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppHandle")
            .field("pid", &self.pid)
            .field("display_name", &self.display_name())
            .field("identified", &self.identified.load(Ordering::Relaxed))
            .field("detached", &self.detached.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
