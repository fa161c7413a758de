//! Plugin options recognized at activation.
//!
//! The host hands over `-fplugin-arg-<plugin>-<key>[=<value>]` pairs:
//!
//! - `verbose-decl=<0|1|2>`: qualification level of rendered function names
//!   (default `1`).
//! - `disable-version-check`: skip the host version compatibility check.
//!
//! Anything else is a configuration error and halts activation.

use crate::names::Verbosity;
use anyhow::{bail, Result};
use std::str::FromStr;

/// A single plugin argument: `key` or `key=value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginArg {
    /// Option name.
    pub key: String,
    /// Option value, if one was given.
    pub value: Option<String>,
}

impl PluginArg {
    /// Argument with a value.
    #[must_use]
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: Some(value.into()) }
    }

    /// Bare flag.
    #[must_use]
    pub fn flag(key: impl Into<String>) -> Self {
        Self { key: key.into(), value: None }
    }
}

impl FromStr for PluginArg {
    type Err = std::convert::Infallible;

    /// Split at the first `=`; no `=` means a bare flag.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw.split_once('=') {
            Some((key, value)) => Self::with_value(key, value),
            None => Self::flag(raw),
        })
    }
}

/// Activation-time options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceOptions {
    /// Verbosity forwarded to the decl name lookup.
    pub decl_verbosity: Verbosity,
    /// Whether the host version must match the one the plugin was built for.
    pub version_check: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self { decl_verbosity: Verbosity::Scoped, version_check: true }
    }
}

impl TraceOptions {
    /// Parse plugin arguments for the plugin registered as `plugin`.
    ///
    /// The first invalid argument aborts parsing.
    pub fn from_plugin_args(plugin: &str, args: &[PluginArg]) -> Result<Self> {
        let mut opts = Self::default();
        for arg in args {
            let flag = format!("-fplugin-arg-{plugin}-{}", arg.key);
            match arg.key.as_str() {
                "verbose-decl" => {
                    let Some(value) = arg.value.as_deref() else {
                        bail!("missing argument to '{flag}'");
                    };
                    opts.decl_verbosity = match value {
                        "0" => Verbosity::Name,
                        "1" => Verbosity::Scoped,
                        "2" => Verbosity::Full,
                        _ => bail!("argument of '{flag}' must be 0, 1, or 2"),
                    };
                }
                "disable-version-check" => {
                    if arg.value.is_some() {
                        bail!("unexpected argument to '{flag}'");
                    }
                    opts.version_check = false;
                }
                _ => bail!("unrecognized timetrace plugin option '{flag}'"),
            }
        }
        Ok(opts)
    }

    /// Reject a host whose version differs from `built_for`, unless disabled.
    pub fn check_version(&self, plugin: &str, built_for: &str, host: &str) -> Result<()> {
        if self.version_check && built_for != host {
            bail!("plugin '{plugin}' is built for a different compiler version ({built_for}, host is {host})");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<TraceOptions> {
        let args: Vec<PluginArg> = args.iter().map(|a| a.parse().unwrap()).collect();
        TraceOptions::from_plugin_args("timetrace", &args)
    }

    #[test]
    fn defaults() {
        let o = parse(&[]).unwrap();
        assert_eq!(o.decl_verbosity, Verbosity::Scoped);
        assert!(o.version_check);
    }

    #[test]
    fn accepts_known_options() {
        let o = parse(&["verbose-decl=2", "disable-version-check"]).unwrap();
        assert_eq!(o.decl_verbosity, Verbosity::Full);
        assert!(!o.version_check);
        assert!(o.check_version("timetrace", "14.1", "13.2").is_ok());
    }

    #[test]
    fn rejects_bad_verbosity() {
        let err = parse(&["verbose-decl=3"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument of '-fplugin-arg-timetrace-verbose-decl' must be 0, 1, or 2"
        );
        assert!(parse(&["verbose-decl"]).unwrap_err().to_string().starts_with("missing argument"));
    }

    #[test]
    fn rejects_unknown_and_valued_flags() {
        assert!(parse(&["disable-version-check=yes"])
            .unwrap_err()
            .to_string()
            .starts_with("unexpected argument"));
        assert!(parse(&["colour"]).unwrap_err().to_string().contains("unrecognized"));
    }

    #[test]
    fn version_mismatch_is_fatal_by_default() {
        let o = TraceOptions::default();
        assert!(o.check_version("timetrace", "14.1", "14.1").is_ok());
        assert!(o.check_version("timetrace", "14.1", "13.2").is_err());
    }
}
