// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! HotSpot dynamic attach over the attach listener's UNIX domain socket.
//!
//! The JVM only starts its attach listener on demand: we drop an
//! `.attach_pid<nspid>` trigger file where the JVM looks for it, send
//! `SIGQUIT`, and wait for `.java_pid<nspid>` to show up in the process's
//! `/tmp`. Each command is then a fresh connection carrying
//! `1\0<cmd>\0<arg1>\0<arg2>\0<arg3>\0`; the reply starts with an integer
//! status line.
//!
//! Processes are only considered attachable when they look like a Java
//! launcher *and* publish an `hsperfdata_<user>/<nspid>` file. Sending
//! `SIGQUIT` to anything else would terminate it.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

use log::debug;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::address::LOCAL_CONNECTOR_ADDRESS;
use crate::attach::{Attacher, ProcessDescriptor, Properties, VirtualMachine};
use crate::errors::{Error, Result};
use crate::procfs::{self, Cmdline, Exe};

const PROTOCOL_VERSION: &str = "1";
const ARG_COUNT: usize = 3;
const PERF_DATA_PREFIX: &str = "hsperfdata_";
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Options that consume the following argument on a `java` command line.
const OPTIONS_WITH_VALUE: &[&str] = &[
    "-cp",
    "-classpath",
    "--class-path",
    "-p",
    "--module-path",
    "--upgrade-module-path",
    "--add-modules",
    "--add-opens",
    "--add-exports",
    "--add-reads",
    "--patch-module",
    "--limit-modules",
];

pub struct HotSpotAttacher {
    attach_timeout: Duration,
    read_timeout: Option<Duration>,
}

impl HotSpotAttacher {
    pub fn new(attach_timeout: Duration, read_timeout: Option<Duration>) -> Self {
        Self {
            attach_timeout,
            read_timeout,
        }
    }
}

impl Attacher for HotSpotAttacher {
    fn list(&self) -> Result<Vec<ProcessDescriptor>> {
        Ok(procfs::list_pids()?
            .into_iter()
            .filter_map(|pid| self.describe(pid))
            .collect())
    }

    fn describe(&self, pid: i32) -> Option<ProcessDescriptor> {
        if pid == std::process::id().cast_signed() {
            return None;
        }
        describe(pid)
    }

    fn attach(&self, descriptor: &ProcessDescriptor) -> Result<Box<dyn VirtualMachine>> {
        let vm = HotSpotVm::attach(descriptor.pid, self.attach_timeout, self.read_timeout)?;
        Ok(Box::new(vm))
    }
}

fn describe(pid: i32) -> Option<ProcessDescriptor> {
    let cmdline = Cmdline::get(pid).ok()?;
    if cmdline.is_empty() {
        // Kernel threads and zombies.
        return None;
    }

    let exe_is_java = Exe::get(pid)
        .ok()
        .and_then(|exe| exe.basename().map(is_java_command))
        .unwrap_or(false);
    let arg0_is_java = cmdline
        .args()
        .next()
        .and_then(|arg| Path::new(arg).file_name()?.to_str())
        .is_some_and(is_java_command);

    if !(exe_is_java || arg0_is_java) || !has_perf_data(pid) {
        return None;
    }

    Some(ProcessDescriptor {
        pid,
        display_name: java_command(&cmdline),
    })
}

fn is_java_command(comm: &str) -> bool {
    comm.starts_with("java") && comm != "javac"
}

fn has_perf_data(pid: i32) -> bool {
    let nspid = procfs::ns_pid(pid).to_string();
    let Ok(entries) = fs::read_dir(procfs::tmp_dir(pid)) else {
        return false;
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(PERF_DATA_PREFIX))
        })
        .any(|entry| entry.path().join(&nspid).exists())
}

/// Rebuilds the Java command (main class or archive, followed by the
/// application arguments) from a launcher command line. Falls back to the
/// whole command line when no main class can be found.
fn java_command(cmdline: &Cmdline) -> String {
    let mut args = cmdline.args().skip(1);

    while let Some(arg) = args.next() {
        match arg {
            "-jar" | "-m" | "--module" => {
                let rest: Vec<&str> = args.collect();
                return rest.join(" ");
            }
            _ if OPTIONS_WITH_VALUE.contains(&arg) => {
                args.next();
            }
            // Argument files are expanded by the launcher, we can't see them.
            _ if arg.starts_with('-') || arg.starts_with('@') => {}
            _ => {
                let rest: Vec<&str> = std::iter::once(arg).chain(args).collect();
                return rest.join(" ");
            }
        }
    }

    cmdline.args().collect::<Vec<_>>().join(" ")
}

pub struct HotSpotVm {
    pid: i32,
    socket: PathBuf,
    read_timeout: Option<Duration>,
    detached: AtomicBool,
}

impl HotSpotVm {
    pub fn attach(
        pid: i32,
        attach_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<Self> {
        let nspid = procfs::ns_pid(pid);
        let socket = procfs::tmp_dir(pid).join(format!(".java_pid{nspid}"));

        if !is_socket(&socket) {
            start_attach_listener(pid, nspid, &socket, attach_timeout)?;
        }

        debug!("attach listener of {pid} is {}", socket.display());
        Ok(Self::with_socket(pid, socket, read_timeout))
    }

    fn with_socket(pid: i32, socket: PathBuf, read_timeout: Option<Duration>) -> Self {
        Self {
            pid,
            socket,
            read_timeout,
            detached: AtomicBool::new(false),
        }
    }

    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        if self.detached.load(Ordering::Acquire) {
            return Err(Error::Detached {
                pid: self.pid.to_string(),
            });
        }

        let mut stream = UnixStream::connect(&self.socket)?;
        stream.set_read_timeout(self.read_timeout)?;

        let mut request = Vec::new();
        for part in [PROTOCOL_VERSION, command]
            .into_iter()
            .chain((0..ARG_COUNT).map(|i| args.get(i).copied().unwrap_or("")))
        {
            request.extend_from_slice(part.as_bytes());
            request.push(0);
        }
        stream.write_all(&request)?;

        let mut response = String::new();
        stream.read_to_string(&mut response)?;

        let (status_line, output) = response
            .split_once('\n')
            .unwrap_or((response.as_str(), ""));
        let status: i32 = status_line.trim().parse().map_err(|_| {
            Error::Protocol(format!("unexpected attach listener reply: {status_line:?}"))
        })?;

        if status != 0 {
            return Err(Error::AttachCommand {
                command: command.to_string(),
                status,
                output: output.trim().to_string(),
            });
        }

        debug!("[{}] `{command}` returned {} bytes", self.pid, output.len());
        Ok(output.to_string())
    }
}

impl VirtualMachine for HotSpotVm {
    fn system_properties(&self) -> Result<Properties> {
        Ok(Properties::parse(&self.execute("properties", &[])?))
    }

    fn agent_properties(&self) -> Result<Properties> {
        Ok(Properties::parse(&self.execute("agentProperties", &[])?))
    }

    fn start_local_management_agent(&self) -> Result<String> {
        let output = self.execute("jcmd", &["ManagementAgent.start_local"])?;
        self.agent_properties()?
            .get(LOCAL_CONNECTOR_ADDRESS)
            .map(str::to_string)
            .ok_or_else(|| Error::AttachCommand {
                command: "jcmd ManagementAgent.start_local".to_string(),
                status: 0,
                output: output.trim().to_string(),
            })
    }

    fn detach(&self) -> Result<()> {
        // Commands use one connection each, so there is nothing to close.
        if !self.detached.swap(true, Ordering::AcqRel) {
            debug!("detached from JVM {}", self.pid);
        }
        Ok(())
    }
}

fn is_socket(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.file_type().is_socket())
}

fn create_trigger_file(pid: i32, nspid: i32) -> Result<PathBuf> {
    let name = format!(".attach_pid{nspid}");
    let in_cwd = procfs::cwd(pid).join(&name);
    if File::create(&in_cwd).is_ok() {
        return Ok(in_cwd);
    }

    let in_tmp = procfs::tmp_dir(pid).join(&name);
    File::create(&in_tmp)?;
    Ok(in_tmp)
}

fn start_attach_listener(pid: i32, nspid: i32, socket: &Path, timeout: Duration) -> Result<()> {
    let trigger = create_trigger_file(pid, nspid)?;
    let result = signal_and_wait(pid, socket, timeout);
    if let Err(e) = fs::remove_file(&trigger) {
        debug!("could not remove {}: {e}", trigger.display());
    }
    result
}

fn signal_and_wait(pid: i32, socket: &Path, timeout: Duration) -> Result<()> {
    signal::kill(Pid::from_raw(pid), Signal::SIGQUIT).map_err(|e| Error::AttachNotSupported {
        pid: pid.to_string(),
        reason: format!("could not signal process: {e}"),
    })?;

    let start = Instant::now();
    let mut interval = Duration::from_millis(20);
    while start.elapsed() < timeout {
        sleep(interval);
        if is_socket(socket) {
            return Ok(());
        }
        interval = (interval * 2).min(MAX_POLL_INTERVAL);
    }

    Err(Error::AttachNotSupported {
        pid: pid.to_string(),
        reason: format!("attach listener did not start within {timeout:?}"),
    })
}
