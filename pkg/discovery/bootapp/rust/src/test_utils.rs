// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! In-memory stand-ins for the attach and management layers.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::attach::{Attacher, ProcessDescriptor, Properties, VirtualMachine};
use crate::errors::{Error, Result};
use crate::management::{Connection, Connector, ManagementAddress, ObjectName};

#[derive(Default)]
struct ConnectorState {
    attributes: HashMap<(String, String), Value>,
    operations: HashMap<(String, String), Value>,
    broken: HashSet<String>,
    names: Vec<String>,
    refuse: bool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

/// A management agent answering from fixed tables. Unknown targets are
/// reported as not registered, "broken" targets fail with a protocol error.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<ConnectorState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut ConnectorState {
        Arc::get_mut(&mut self.state).expect("configure the fake before sharing it")
    }

    pub fn with_attribute(mut self, target: &str, attribute: &str, value: Value) -> Self {
        self.state_mut()
            .attributes
            .insert((target.to_string(), attribute.to_string()), value);
        self
    }

    pub fn with_operation(mut self, target: &str, operation: &str, value: Value) -> Self {
        self.state_mut()
            .operations
            .insert((target.to_string(), operation.to_string()), value);
        self
    }

    pub fn with_broken_target(mut self, target: &str) -> Self {
        self.state_mut().broken.insert(target.to_string());
        self
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.state_mut().names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn refusing_connections(mut self) -> Self {
        self.state_mut().refuse = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Calls made so far, formatted as `<kind> <target> <member>`.
    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _address: &ManagementAddress) -> Result<Box<dyn Connection>> {
        if self.state.refuse {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused).into());
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            state: self.state.clone(),
        }))
    }
}

struct FakeConnection {
    state: Arc<ConnectorState>,
}

impl FakeConnection {
    fn lookup(
        &self,
        table: &HashMap<(String, String), Value>,
        kind: &str,
        target: &ObjectName,
        member: &str,
    ) -> Result<Value> {
        self.state
            .calls
            .lock()
            .unwrap()
            .push(format!("{kind} {target} {member}"));

        if self.state.broken.contains(target.as_str()) {
            return Err(Error::Protocol(format!("{target} is broken")));
        }
        table
            .get(&(target.to_string(), member.to_string()))
            .cloned()
            .ok_or_else(|| Error::TargetNotFound(target.to_string()))
    }
}

impl Connection for FakeConnection {
    fn get_attribute(&mut self, target: &ObjectName, attribute: &str) -> Result<Value> {
        self.lookup(&self.state.attributes, "read", target, attribute)
    }

    fn invoke(&mut self, target: &ObjectName, operation: &str, _args: &[Value]) -> Result<Value> {
        self.lookup(&self.state.operations, "exec", target, operation)
    }

    fn query_names(&mut self) -> Result<Vec<ObjectName>> {
        self.state.calls.lock().unwrap().push("search *:*".to_string());
        Ok(self.state.names.iter().map(ObjectName::new).collect())
    }

    fn close(&mut self) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Counters shared between a `FakeVm` and the test that created it.
#[derive(Default)]
pub struct VmCounters {
    pub system_properties: AtomicUsize,
    pub agent_properties: AtomicUsize,
    pub agent_starts: AtomicUsize,
    pub detaches: AtomicUsize,
}

impl VmCounters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub struct FakeVm {
    system: Mutex<Properties>,
    agent: Properties,
    agent_address: Option<String>,
    unreadable: AtomicBool,
    pub counters: Arc<VmCounters>,
}

impl FakeVm {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(Properties::default()),
            agent: Properties::default(),
            agent_address: None,
            unreadable: AtomicBool::new(false),
            counters: Arc::new(VmCounters::default()),
        }
    }

    pub fn spring_boot() -> Self {
        Self::new().with_system_property(
            "java.class.path",
            "/app/BOOT-INF/classes:/app/BOOT-INF/lib/spring-boot-3.2.0.jar",
        )
    }

    pub fn with_system_property(self, key: &str, value: &str) -> Self {
        self.system.lock().unwrap().insert(key, value);
        self
    }

    pub fn with_agent_property(mut self, key: &str, value: &str) -> Self {
        self.agent.insert(key, value);
        self
    }

    /// Address returned when the test asks the VM to start its agent.
    pub fn with_startable_agent(mut self, address: &str) -> Self {
        self.agent_address = Some(address.to_string());
        self
    }

    pub fn set_system_property(&self, key: &str, value: &str) {
        self.system.lock().unwrap().insert(key, value);
    }

    /// Makes every property read fail, like a process that just died.
    pub fn set_unreadable(&self, unreadable: bool) {
        self.unreadable.store(unreadable, Ordering::SeqCst);
    }

    fn check_readable(&self) -> Result<()> {
        if self.unreadable.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::ConnectionReset).into());
        }
        Ok(())
    }
}

impl VirtualMachine for FakeVm {
    fn system_properties(&self) -> Result<Properties> {
        self.counters.system_properties.fetch_add(1, Ordering::SeqCst);
        self.check_readable()?;
        Ok(self.system.lock().unwrap().clone())
    }

    fn agent_properties(&self) -> Result<Properties> {
        self.counters.agent_properties.fetch_add(1, Ordering::SeqCst);
        self.check_readable()?;
        Ok(self.agent.clone())
    }

    fn start_local_management_agent(&self) -> Result<String> {
        self.counters.agent_starts.fetch_add(1, Ordering::SeqCst);
        self.agent_address.clone().ok_or_else(|| Error::AttachCommand {
            command: "jcmd ManagementAgent.start_local".to_string(),
            status: 0,
            output: "agent could not be started".to_string(),
        })
    }

    fn detach(&self) -> Result<()> {
        self.counters.detaches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl VirtualMachine for Arc<FakeVm> {
    fn system_properties(&self) -> Result<Properties> {
        self.as_ref().system_properties()
    }

    fn agent_properties(&self) -> Result<Properties> {
        self.as_ref().agent_properties()
    }

    fn start_local_management_agent(&self) -> Result<String> {
        self.as_ref().start_local_management_agent()
    }

    fn detach(&self) -> Result<()> {
        self.as_ref().detach()
    }
}

/// Hands out VMs for a mutable process table. Processes listed in
/// `unattachable` fail to attach.
#[derive(Default)]
pub struct FakeAttacher {
    processes: Mutex<Vec<ProcessDescriptor>>,
    unattachable: Mutex<HashSet<i32>>,
    spring_boot: Mutex<HashSet<i32>>,
    counters: Mutex<HashMap<i32, Arc<VmCounters>>>,
    pub attaches: AtomicUsize,
}

impl FakeAttacher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_processes(&self, processes: &[(i32, &str)]) {
        *self.processes.lock().unwrap() = processes
            .iter()
            .map(|(pid, name)| ProcessDescriptor {
                pid: *pid,
                display_name: name.to_string(),
            })
            .collect();
    }

    pub fn set_unattachable(&self, pid: i32) {
        self.unattachable.lock().unwrap().insert(pid);
    }

    pub fn set_spring_boot(&self, pid: i32) {
        self.spring_boot.lock().unwrap().insert(pid);
    }

    pub fn counters(&self, pid: i32) -> Arc<VmCounters> {
        self.counters.lock().unwrap().get(&pid).cloned().unwrap()
    }
}

impl Attacher for Arc<FakeAttacher> {
    fn list(&self) -> Result<Vec<ProcessDescriptor>> {
        Ok(self.processes.lock().unwrap().clone())
    }

    fn describe(&self, pid: i32) -> Option<ProcessDescriptor> {
        self.processes
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.pid == pid)
            .cloned()
    }

    fn attach(&self, descriptor: &ProcessDescriptor) -> Result<Box<dyn VirtualMachine>> {
        if self.unattachable.lock().unwrap().contains(&descriptor.pid) {
            return Err(Error::AttachNotSupported {
                pid: descriptor.pid.to_string(),
                reason: "not attachable".to_string(),
            });
        }
        self.attaches.fetch_add(1, Ordering::SeqCst);

        let vm = if self.spring_boot.lock().unwrap().contains(&descriptor.pid) {
            FakeVm::spring_boot()
        } else {
            FakeVm::new()
        };
        self.counters
            .lock()
            .unwrap()
            .insert(descriptor.pid, vm.counters.clone());
        Ok(Box::new(vm))
    }
}
