// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// User-facing CLI errors with stable codes.
///
/// These cover the recoverable taxonomy: bad input, unresolved identity,
/// unknown targets. Store corruption and I/O failures propagate as
/// `anyhow::Error` and are treated as fatal by `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Malformed arguments, invalid envelope combinations, duplicate flags.
    Input(String),
    /// A command needed a registered identity and none was resolved.
    Identity(String),
    /// A named instance or event does not exist.
    NotFound(String),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Input(_) => "INPUT",
            Self::Identity(_) => "IDENTITY",
            Self::NotFound(_) => "NOT_FOUND",
        }
    }

    /// All recoverable CLI errors map to exit code 1.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Extra guidance printed under the error message, when any applies.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Identity(_) => {
                Some("run 'huddle start' to register, or pass --name <instance>")
            }
            _ => None,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(msg) | Self::Identity(msg) | Self::NotFound(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
