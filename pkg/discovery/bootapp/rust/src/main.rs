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

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dd_bootapp::config::{self, Config};
use dd_bootapp::{
    AppHandle, JvmInfo, LiveBean, LiveBeansModel, LiveConditional, ProcessCache, RequestMapping,
};
use log::{debug, info, warn};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "bootapp-probe")]
#[command(about = "Inspects the Spring Boot applications running on this host", long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List attachable JVMs identified as Spring Boot applications
    List {
        /// Include JVMs that are not Spring Boot applications
        #[arg(long)]
        all: bool,
    },
    /// Report the live state of one application
    Info {
        #[arg(short, long)]
        pid: i32,
    },
    /// Dump the agent and system properties of one JVM
    Dump {
        #[arg(short, long)]
        pid: i32,
    },
    /// List the beans of one application, optionally filtered
    Beans {
        #[arg(short, long)]
        pid: i32,
        /// Only the bean with this id
        #[arg(long)]
        name: Option<String>,
        /// Only beans of this fully qualified type, proxies included
        #[arg(long = "type")]
        type_name: Option<String>,
    },
    /// Poll and report applications as they start and stop
    Watch {
        /// Seconds between polls, overrides `poll_interval`
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[derive(Serialize)]
struct AppSummary {
    pid: i32,
    name: String,
    spring_boot: bool,
}

impl AppSummary {
    fn new(app: &AppHandle) -> Self {
        Self {
            pid: app.pid(),
            name: app.display_name(),
            spring_boot: app.is_spring_boot_app(),
        }
    }
}

#[derive(Serialize)]
struct AppReport {
    pid: i32,
    name: String,
    spring_boot: bool,
    host: Option<String>,
    port: Option<u16>,
    active_profiles: Option<Vec<String>>,
    request_mappings: Option<Vec<RequestMapping>>,
    live_conditionals: Option<Vec<LiveConditional>>,
    beans: LiveBeansModel,
}

impl AppReport {
    fn new(app: &AppHandle) -> Self {
        Self {
            pid: app.pid(),
            name: app.display_name(),
            spring_boot: app.is_spring_boot_app(),
            host: app.host(),
            port: or_warn(app, "port", app.port()),
            active_profiles: app.active_profiles(),
            request_mappings: or_warn(app, "request mappings", app.request_mappings()),
            live_conditionals: or_warn(app, "condition report", app.live_conditionals()),
            beans: app.beans(),
        }
    }
}

/// A capability that failed is reported as missing; the others still are.
fn or_warn<T>(app: &AppHandle, what: &str, result: dd_bootapp::Result<Option<T>>) -> Option<T> {
    result.unwrap_or_else(|e| {
        warn!("{app}: unable to fetch {what}: {e}");
        None
    })
}

#[allow(clippy::print_stdout)]
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn find(cache: &ProcessCache, pid: i32) -> Result<Arc<AppHandle>> {
    cache
        .attach_pid(pid)
        .with_context(|| format!("No attachable JVM with pid {pid}"))
}

fn beans(app: &AppHandle, name: Option<&str>, type_name: Option<&str>) -> Result<()> {
    let model = app.beans();
    let selected: Vec<&LiveBean> = match (name, type_name) {
        (Some(name), Some(type_name)) => model
            .beans_of_type(type_name)
            .filter(|bean| bean.id == name)
            .collect(),
        (Some(name), None) => model.beans_of_name(name).collect(),
        (None, Some(type_name)) => model.beans_of_type(type_name).collect(),
        (None, None) => model.beans().iter().collect(),
    };
    print_json(&selected)
}

fn list(cache: &ProcessCache, all: bool) -> Result<()> {
    let apps = if all {
        cache.all_attached()
    } else {
        cache.spring_boot_apps()
    }
    .context("Failed to list processes")?;

    let summaries: Vec<AppSummary> = apps.iter().map(|app| AppSummary::new(app)).collect();
    print_json(&summaries)
}

fn watch(cache: &ProcessCache, interval: Duration) -> Result<()> {
    info!("Polling every {}s", interval.as_secs());
    let mut known = BTreeSet::new();
    loop {
        let apps = match cache.spring_boot_apps() {
            Ok(apps) => apps,
            Err(e) => {
                warn!("Failed to list processes: {e}");
                sleep(interval);
                continue;
            }
        };
        let current: BTreeSet<i32> = apps.iter().map(|app| app.pid()).collect();

        for app in apps.iter().filter(|app| !known.contains(&app.pid())) {
            info!("Spring Boot application started: {app}");
            print_json(&AppReport::new(app))?;
        }
        for pid in known.difference(&current) {
            info!("Spring Boot application stopped: pid {pid}");
        }

        known = current;
        sleep(interval);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::load_config(args.config);
    let log_level = match &config {
        Ok(config) => config::get_log_level(config),
        Err(_) => config::get_log_level(&Config::default()),
    };
    simple_logger::init_with_level(log_level)?;
    info!("Log level set to: {:?}", log_level);

    let config = config.context("Failed to load configuration")?;
    let poll_interval = config.poll_interval();
    let cache = ProcessCache::with_hotspot(config);

    match args.command {
        Command::List { all } => list(&cache, all),
        Command::Info { pid } => {
            let app = find(&cache, pid)?;
            print_json(&AppReport::new(&app))
        }
        Command::Dump { pid } => {
            let info: JvmInfo = find(&cache, pid)?
                .jvm_info()
                .with_context(|| format!("Failed to read properties of pid {pid}"))?;
            debug!(
                "pid {pid}: {} agent properties, {} system properties",
                info.agent_properties.len(),
                info.system_properties.len()
            );
            print_json(&info)
        }
        Command::Beans {
            pid,
            name,
            type_name,
        } => {
            let app = find(&cache, pid)?;
            beans(&app, name.as_deref(), type_name.as_deref())
        }
        Command::Watch { interval } => watch(
            &cache,
            interval.map_or(poll_interval, Duration::from_secs),
        ),
    }
}
