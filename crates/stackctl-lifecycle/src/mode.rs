//! Classification of the backing store as locally or externally hosted.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};
use url::{Host, Url};

const MODE_TARGET: &str = "stackctl::mode";

/// Where the backing store lives for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// The backing store runs on this host and is managed here.
    Local,
    /// The backing store is hosted elsewhere; local-only units are skipped.
    Remote,
}

impl OperatingMode {
    /// Returns true when local-only units participate.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Source of the operating mode, consulted once per run.
pub trait ModeSource: Send + Sync {
    /// Classifies the backing store.
    fn resolve(&self) -> OperatingMode;
}

/// Reads the backing-store URL from a dotenv-style file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvFileModeResolver {
    path: PathBuf,
    key: String,
}

impl EnvFileModeResolver {
    /// Creates a resolver reading `key` from the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }
}

impl ModeSource for EnvFileModeResolver {
    fn resolve(&self) -> OperatingMode {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) => {
                if error.kind() == io::ErrorKind::NotFound {
                    debug!(
                        target: MODE_TARGET,
                        file = %self.path.display(),
                        "environment file absent; assuming remote backing store"
                    );
                } else {
                    warn!(
                        target: MODE_TARGET,
                        file = %self.path.display(),
                        error = %error,
                        "environment file unreadable; assuming remote backing store"
                    );
                }
                return OperatingMode::Remote;
            }
        };

        let mode = lookup(&contents, &self.key).map_or(OperatingMode::Remote, classify);
        debug!(target: MODE_TARGET, key = %self.key, %mode, "resolved operating mode");
        mode
    }
}

/// Finds the last assignment of `key`, tolerating comments, blank lines,
/// an `export ` prefix and surrounding quotes.
fn lookup<'a>(contents: &'a str, key: &str) -> Option<&'a str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").map_or(line, str::trim_start);
            let (name, value) = line.split_once('=')?;
            (name.trim() == key).then(|| unquote(value.trim()))
        })
        .last()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Classifies a backing-store location by its host alone.
///
/// Values without a scheme are read as `http://` authorities; a value with
/// no recognisable host is remote.
fn classify(value: &str) -> OperatingMode {
    if backing_store_host(value).is_some_and(|host| is_loopback_host(&host)) {
        OperatingMode::Local
    } else {
        OperatingMode::Remote
    }
}

fn backing_store_host(value: &str) -> Option<Host<String>> {
    let host_of = |url: Url| url.host().map(|host| host.to_owned());
    Url::parse(value)
        .ok()
        .and_then(host_of)
        .or_else(|| Url::parse(&format!("http://{value}")).ok().and_then(host_of))
}

fn is_loopback_host(host: &Host<String>) -> bool {
    match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(address) => address.is_loopback() || address.is_unspecified(),
        Host::Ipv6(address) => address.is_loopback(),
    }
}
