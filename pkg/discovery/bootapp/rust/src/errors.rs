// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("process {pid} is not attachable: {reason}")]
    AttachNotSupported { pid: String, reason: String },

    #[error("attach command `{command}` failed with status {status}: {output}")]
    AttachCommand {
        command: String,
        status: i32,
        output: String,
    },

    #[error("process {pid} has been detached")]
    Detached { pid: String },

    #[error("management target not registered: {0}")]
    TargetNotFound(String),

    #[error("unsupported management address: {0}")]
    UnsupportedAddress(String),

    #[error("management protocol error: {0}")]
    Protocol(String),

    #[error("unknown API generation: {0:?}")]
    UnknownApiGeneration(String),

    #[error("could not parse {what}: {context}")]
    Payload { what: &'static str, context: String },

    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Http(#[from] Box<ureq::Error>),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_target_not_found(&self) -> bool {
        matches!(self, Error::TargetNotFound(_))
    }
}
