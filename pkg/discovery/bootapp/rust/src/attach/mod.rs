// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Process enumeration and the attach primitive.
//!
//! `Attacher` lists the local processes that can be attached to and hands out
//! `VirtualMachine` handles. Only the process cache calls into this module;
//! everything else works on the handles the cache owns.

pub mod hotspot;
pub mod properties;

use serde::Serialize;

use crate::errors::Result;
pub use properties::Properties;

/// A process that the platform reports as attachable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessDescriptor {
    pub pid: i32,
    pub display_name: String,
}

/// An attached virtual machine.
pub trait VirtualMachine: Send + Sync {
    fn system_properties(&self) -> Result<Properties>;

    fn agent_properties(&self) -> Result<Properties>;

    /// Asks the process to start its local management agent and returns the
    /// address the agent listens on.
    fn start_local_management_agent(&self) -> Result<String>;

    fn detach(&self) -> Result<()>;
}

pub trait Attacher: Send + Sync {
    fn list(&self) -> Result<Vec<ProcessDescriptor>>;

    /// Describes a single process, `None` when it cannot be attached to.
    fn describe(&self, pid: i32) -> Option<ProcessDescriptor>;

    fn attach(&self, descriptor: &ProcessDescriptor) -> Result<Box<dyn VirtualMachine>>;
}
