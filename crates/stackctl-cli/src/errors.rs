//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use stackctl_config::RuntimePathsError;
use stackctl_lifecycle::{CatalogError, LockError};
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    /// Sentinel for bare invocation; usage has already been written.
    #[error("bare invocation")]
    BareInvocation,
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    RuntimePaths(#[from] RuntimePathsError),
    #[error("invalid unit catalogue: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("failed to serialise status report: {0}")]
    SerialiseStatus(serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
