//! Shared configuration for the `stackctl` service supervisor.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, an
//! optional `stackctl.toml` (or `--config-path`), `STACKCTL_*` environment
//! variables, and finally command-line flags. The resolved [`Config`] is the
//! single source for unit commands, working directories, grace periods and
//! the runtime/log directory layout consumed by the lifecycle crate.

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod command;
mod defaults;
mod logging;
mod runtime;

pub use command::{CommandLine, CommandLineParseError};
pub use defaults::{
    DEFAULT_API_GRACE_SECONDS, DEFAULT_CONTAINER_SETTLE_SECONDS, DEFAULT_FRONTEND_GRACE_SECONDS,
    DEFAULT_LOG_FILTER, DEFAULT_RESTART_COOLDOWN_SECONDS, DEFAULT_STOP_TIMEOUT_SECONDS,
    DEFAULT_WORKER_GRACE_SECONDS, default_log_filter, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimeLayout, RuntimePathsError};

/// Resolved supervisor configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "STACKCTL")]
pub struct Config {
    /// Root directory that relative paths are resolved against.
    #[ortho_config(default = defaults::default_project_root())]
    pub project_root: Utf8PathBuf,
    /// Directory holding liveness records and the run lock.
    #[ortho_config(default = defaults::default_runtime_dir())]
    pub runtime_dir: Utf8PathBuf,
    /// Directory holding one append-only log per unit.
    #[ortho_config(default = defaults::default_log_dir())]
    pub log_dir: Utf8PathBuf,
    /// Environment file inspected to classify the backing store.
    #[ortho_config(default = defaults::default_env_file())]
    pub env_file: Utf8PathBuf,
    /// Key within the environment file naming the backing store URL.
    #[ortho_config(default = defaults::default_backing_store_key())]
    pub backing_store_key: String,
    /// Sidecar CLI managing the local backing store.
    #[ortho_config(default = defaults::default_sidecar_program())]
    pub sidecar_program: String,
    /// File whose presence proves the sidecar project was initialised.
    #[ortho_config(default = defaults::default_sidecar_marker())]
    pub sidecar_marker: Utf8PathBuf,
    /// Container engine CLI used for the cache unit.
    #[ortho_config(default = defaults::default_container_engine())]
    pub container_engine: String,
    /// Exact container name used for the cache unit.
    #[ortho_config(default = defaults::default_cache_container())]
    pub cache_container: String,
    /// Image the cache container runs.
    #[ortho_config(default = defaults::default_cache_image())]
    pub cache_image: String,
    /// Port mapping published by the cache container; empty disables it.
    #[ortho_config(default = defaults::default_cache_ports())]
    pub cache_ports: String,
    /// Command line launching the API server.
    #[ortho_config(default = defaults::default_api_command())]
    pub api_command: CommandLine,
    /// Working directory for the API server.
    #[ortho_config(default = defaults::default_api_dir())]
    pub api_dir: Utf8PathBuf,
    /// Command line launching the background worker.
    #[ortho_config(default = defaults::default_worker_command())]
    pub worker_command: CommandLine,
    /// Working directory for the background worker.
    #[ortho_config(default = defaults::default_worker_dir())]
    pub worker_dir: Utf8PathBuf,
    /// Command line launching the frontend dev server.
    #[ortho_config(default = defaults::default_frontend_command())]
    pub frontend_command: CommandLine,
    /// Working directory for the frontend dev server.
    #[ortho_config(default = defaults::default_frontend_dir())]
    pub frontend_dir: Utf8PathBuf,
    /// Seconds the API must survive after spawning.
    #[ortho_config(default = DEFAULT_API_GRACE_SECONDS)]
    pub api_grace_seconds: u64,
    /// Seconds the worker must survive after spawning.
    #[ortho_config(default = DEFAULT_WORKER_GRACE_SECONDS)]
    pub worker_grace_seconds: u64,
    /// Seconds the frontend must survive after spawning.
    #[ortho_config(default = DEFAULT_FRONTEND_GRACE_SECONDS)]
    pub frontend_grace_seconds: u64,
    /// Upper bound on waiting for a freshly run container to report running.
    #[ortho_config(default = DEFAULT_CONTAINER_SETTLE_SECONDS)]
    pub container_settle_seconds: u64,
    /// Seconds between the graceful and forceful termination signals.
    #[ortho_config(default = DEFAULT_STOP_TIMEOUT_SECONDS)]
    pub stop_timeout_seconds: u64,
    /// Pause between the stop and start phases of a restart.
    #[ortho_config(default = DEFAULT_RESTART_COOLDOWN_SECONDS)]
    pub restart_cooldown_seconds: u64,
    /// Tracing filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Tracing output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: defaults::default_project_root(),
            runtime_dir: defaults::default_runtime_dir(),
            log_dir: defaults::default_log_dir(),
            env_file: defaults::default_env_file(),
            backing_store_key: defaults::default_backing_store_key(),
            sidecar_program: defaults::default_sidecar_program(),
            sidecar_marker: defaults::default_sidecar_marker(),
            container_engine: defaults::default_container_engine(),
            cache_container: defaults::default_cache_container(),
            cache_image: defaults::default_cache_image(),
            cache_ports: defaults::default_cache_ports(),
            api_command: defaults::default_api_command(),
            api_dir: defaults::default_api_dir(),
            worker_command: defaults::default_worker_command(),
            worker_dir: defaults::default_worker_dir(),
            frontend_command: defaults::default_frontend_command(),
            frontend_dir: defaults::default_frontend_dir(),
            api_grace_seconds: DEFAULT_API_GRACE_SECONDS,
            worker_grace_seconds: DEFAULT_WORKER_GRACE_SECONDS,
            frontend_grace_seconds: DEFAULT_FRONTEND_GRACE_SECONDS,
            container_settle_seconds: DEFAULT_CONTAINER_SETTLE_SECONDS,
            stop_timeout_seconds: DEFAULT_STOP_TIMEOUT_SECONDS,
            restart_cooldown_seconds: DEFAULT_RESTART_COOLDOWN_SECONDS,
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
        }
    }
}

impl Config {
    /// Resolves a configured path against the project root.
    ///
    /// Absolute paths are returned unchanged.
    #[must_use]
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Environment file consulted by the mode resolver.
    #[must_use]
    pub fn env_file_path(&self) -> Utf8PathBuf {
        self.resolve(&self.env_file)
    }

    /// Marker proving the sidecar project has been initialised.
    #[must_use]
    pub fn sidecar_marker_path(&self) -> Utf8PathBuf {
        self.resolve(&self.sidecar_marker)
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_project_root() {
        let config = Config {
            project_root: Utf8PathBuf::from("/srv/app"),
            ..Config::default()
        };
        assert_eq!(
            config.env_file_path(),
            Utf8PathBuf::from("/srv/app/backend/.env")
        );
        assert_eq!(
            config.resolve(Utf8Path::new("/etc/stack.env")),
            Utf8PathBuf::from("/etc/stack.env")
        );
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.api_grace_seconds, DEFAULT_API_GRACE_SECONDS);
        assert_eq!(config.log_filter(), default_log_filter());
        assert_eq!(config.log_format(), default_log_format());
        assert_eq!(config.api_command.program(), "uvicorn");
    }
}
