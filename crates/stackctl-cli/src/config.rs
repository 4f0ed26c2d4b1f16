//! Configuration loading helpers for the `stackctl` CLI.
//!
//! Leading configuration flags are separated from the lifecycle command so
//! `ortho-config` only sees the flags it understands while clap parses the
//! remaining tokens.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use stackctl_config::Config;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration for the CLI.
    ///
    /// Configuration flags (listed in `CONFIG_CLI_FLAGS`) must appear before
    /// the lifecycle command; later tokens are left for clap.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

#[derive(Debug, Clone, Copy)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

fn classify_flag(argument: &OsStr) -> FlagAction {
    let argument_text = argument.to_string_lossy();
    let Some(body) = argument_text.strip_prefix("--") else {
        return FlagAction::Skip;
    };
    let (name, inline_value) = match body.split_once('=') {
        Some((name, _)) => (name, true),
        None => (body, false),
    };
    let flag = format!("--{name}");
    if super::CONFIG_CLI_FLAGS.contains(&flag.as_str()) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Skip
    }
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut filtered = vec![program.clone()];
    let mut command_start = 1usize;
    let mut pending_value = false;

    for argument in &args[1..] {
        if pending_value {
            filtered.push(argument.clone());
            pending_value = false;
            command_start += 1;
            continue;
        }
        match classify_flag(argument) {
            FlagAction::Include { needs_value } => {
                filtered.push(argument.clone());
                pending_value = needs_value;
                command_start += 1;
            }
            FlagAction::Skip => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments: filtered,
        command_start,
    }
}
