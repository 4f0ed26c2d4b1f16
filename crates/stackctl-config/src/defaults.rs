use camino::Utf8PathBuf;

use crate::command::CommandLine;
use crate::logging::LogFormat;

/// Default grace period after spawning the API server.
pub const DEFAULT_API_GRACE_SECONDS: u64 = 3;

/// Default grace period after spawning the background worker.
pub const DEFAULT_WORKER_GRACE_SECONDS: u64 = 2;

/// Default grace period after spawning the frontend dev server.
pub const DEFAULT_FRONTEND_GRACE_SECONDS: u64 = 5;

/// Default upper bound on waiting for the cache container to settle.
pub const DEFAULT_CONTAINER_SETTLE_SECONDS: u64 = 2;

/// Default wait between SIGTERM and SIGKILL.
pub const DEFAULT_STOP_TIMEOUT_SECONDS: u64 = 2;

/// Default pause between the stop and start halves of a restart.
pub const DEFAULT_RESTART_COOLDOWN_SECONDS: u64 = 2;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binary.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

pub(crate) fn default_project_root() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

pub(crate) fn default_runtime_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(".stackctl/run")
}

pub(crate) fn default_log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(".stackctl/logs")
}

pub(crate) fn default_env_file() -> Utf8PathBuf {
    Utf8PathBuf::from("backend/.env")
}

pub(crate) fn default_backing_store_key() -> String {
    String::from("SUPABASE_URL")
}

pub(crate) fn default_sidecar_program() -> String {
    String::from("supabase")
}

pub(crate) fn default_sidecar_marker() -> Utf8PathBuf {
    Utf8PathBuf::from("supabase/config.toml")
}

pub(crate) fn default_container_engine() -> String {
    String::from("docker")
}

pub(crate) fn default_cache_container() -> String {
    String::from("stackctl-redis")
}

pub(crate) fn default_cache_image() -> String {
    String::from("redis:7-alpine")
}

pub(crate) fn default_cache_ports() -> String {
    String::from("6379:6379")
}

pub(crate) fn default_api_command() -> CommandLine {
    CommandLine::from_parts(
        "uvicorn",
        ["app.main:app", "--host", "127.0.0.1", "--port", "8000"],
    )
}

pub(crate) fn default_api_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("backend")
}

pub(crate) fn default_worker_command() -> CommandLine {
    CommandLine::from_parts("python", ["-m", "app.worker"])
}

pub(crate) fn default_worker_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("backend")
}

pub(crate) fn default_frontend_command() -> CommandLine {
    CommandLine::from_parts("npm", ["run", "dev"])
}

pub(crate) fn default_frontend_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("frontend")
}
