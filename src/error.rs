// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::model::status::SessionState;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("placement is frozen after the first load, cannot set {field}")]
    Frozen { field: &'static str },
    #[error("{field} has already been set on this placement")]
    AlreadySet { field: &'static str },
    #[error("placement needs either site_id/page_id/format_id or test_ad")]
    MissingIdentity,
    #[error("placement cannot combine site/page/format ids with a test ad")]
    ConflictingIdentity,
    #[error("unknown test ad variant: {0}")]
    UnknownTestVariant(String),
}

/// 调用方同步收到的错误；加载/展示失败走观察者回调，不在这里
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("sdk is not configured, call SdkConfiguration::configure() before loading ads")]
    NotConfigured,
    #[error("no tokio runtime is available, load must be called from within a runtime")]
    NoRuntime,
    #[error("{operation} is not allowed while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("placement error: {0}")]
    Placement(#[from] PlacementError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
