// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod actuator;
pub mod address;
mod app;
pub mod attach;
mod cache;
pub mod config;
mod errors;
pub mod identify;
pub mod management;
pub mod port;
mod procfs;
pub mod query;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export the public API
pub use actuator::ApiGeneration;
pub use actuator::beans::{LiveBean, LiveBeansModel};
pub use actuator::conditions::LiveConditional;
pub use actuator::mappings::{RequestMapping, parse_request_mappings, parse_request_mappings_json};
pub use app::{AppHandle, JvmInfo};
pub use cache::ProcessCache;
pub use errors::{Error, Result};
pub use management::ManagementAddress;
