// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static PROC_ROOT: OnceLock<PathBuf> = OnceLock::new();

pub fn root_path() -> &'static Path {
    PROC_ROOT.get_or_init(|| {
        if let Ok(v) = env::var("HOST_PROC") {
            return v.into();
        }

        if env::var("DOCKER_DD_AGENT").is_ok() && Path::new("/host").exists() {
            return "/host/proc".into();
        }

        "/proc".into()
    })
}

pub fn pid_path(pid: i32) -> PathBuf {
    root_path().join(pid.to_string())
}

/// Lists the numeric entries of the proc root. Entries that vanish while
/// iterating are skipped.
pub fn list_pids() -> Result<Vec<i32>, std::io::Error> {
    let mut pids: Vec<i32> = fs::read_dir(root_path())?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
        .collect();
    pids.sort_unstable();
    Ok(pids)
}

/// Returns the pid of the process as seen from its own (innermost) pid
/// namespace, falling back to the host pid when the kernel does not report
/// `NSpid`.
pub fn ns_pid(pid: i32) -> i32 {
    let Ok(status) = fs::read_to_string(pid_path(pid).join("status")) else {
        return pid;
    };
    parse_ns_pid(&status).unwrap_or(pid)
}

fn parse_ns_pid(status: &str) -> Option<i32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("NSpid:"))
        .and_then(|rest| rest.split_whitespace().last())
        .and_then(|last| last.parse().ok())
}

/// The `/tmp` directory as seen by the process, through its root link.
pub fn tmp_dir(pid: i32) -> PathBuf {
    pid_path(pid).join("root").join("tmp")
}

/// The working directory of the process, through its cwd link.
pub fn cwd(pid: i32) -> PathBuf {
    pid_path(pid).join("cwd")
}

#[derive(Debug)]
pub struct Cmdline {
    cmdline: String,
    separator: char,
}

impl Cmdline {
    pub fn new(mut cmdline: String) -> Self {
        // Command lines from proc can have trailing null bytes if the process
        // has replaced part of it.
        let trim_len = cmdline.trim_end_matches('\0').len();
        cmdline.truncate(trim_len);

        // A rewritten command line is packed into a single string with
        // spaces; split it so callers see separate arguments.
        let mut args = cmdline.split_terminator('\0');
        let separator = if let (Some(first), None) = (args.next(), args.next())
            && first.contains(' ')
        {
            ' '
        } else {
            '\0'
        };

        Cmdline { cmdline, separator }
    }

    pub fn get(pid: i32) -> Result<Self, std::io::Error> {
        let path = pid_path(pid).join("cmdline");
        Ok(Self::new(fs::read_to_string(path)?))
    }

    pub fn args(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.cmdline.split_terminator(self.separator)
    }

    pub fn is_empty(&self) -> bool {
        self.cmdline.is_empty()
    }
}

impl From<&[&str]> for Cmdline {
    fn from(value: &[&str]) -> Self {
        let joined = value.join("\0");
        Self::new(joined)
    }
}

/// Creates a `Cmdline` from a list of arguments, joined with null bytes the
/// way `/proc/<pid>/cmdline` stores them.
#[macro_export]
macro_rules! cmdline {
    () => {
        Cmdline::new(String::new())
    };
    ($($arg:expr),* $(,)?) => { Cmdline::from(&[$($arg),*][..]) };
}

#[derive(Debug)]
pub struct Exe(pub PathBuf);

impl Exe {
    pub fn get(pid: i32) -> Result<Self, std::io::Error> {
        let path = pid_path(pid).join("exe");
        Ok(Exe(fs::read_link(path)?))
    }

    pub fn basename(&self) -> Option<&str> {
        self.0.file_name().and_then(|name| name.to_str())
    }
}
