//! Browser override: substitute the driver launcher and its binary.
//!
//! An override is checked for shape before anything is launched or
//! navigated, so a malformed one fails fast.

use crate::driver::{DriverLauncher, LaunchConfig};
use crate::result::{ExtractError, ExtractResult};
use std::sync::Arc;

/// A caller-supplied browser to use instead of the default launcher
#[derive(Debug, Clone, Default)]
pub struct BrowserOverride {
    /// Browser binary
    pub executable_path: Option<String>,
    /// Browser command-line arguments
    pub args: Option<Vec<String>>,
    /// Launcher to use
    pub launcher: Option<Arc<dyn DriverLauncher>>,
}

impl BrowserOverride {
    /// Create a complete override
    #[must_use]
    pub fn new(
        executable_path: impl Into<String>,
        args: Vec<String>,
        launcher: Arc<dyn DriverLauncher>,
    ) -> Self {
        Self {
            executable_path: Some(executable_path.into()),
            args: Some(args),
            launcher: Some(launcher),
        }
    }

    /// Build an override from its JSON shape
    /// (`{"executablePath": "...", "args": [...]}`), checking field types
    pub fn from_json(
        value: &serde_json::Value,
        launcher: Option<Arc<dyn DriverLauncher>>,
    ) -> ExtractResult<Self> {
        let executable_path = match value.get("executablePath") {
            Some(serde_json::Value::String(path)) if !path.is_empty() => path.clone(),
            other => return Err(bad_executable_path(other.map(ToString::to_string))),
        };
        let args = match value.get("args") {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(bad_args)?,
            _ => return Err(bad_args()),
        };
        let candidate = Self {
            executable_path: Some(executable_path),
            args: Some(args),
            launcher,
        };
        candidate.validate()?;
        Ok(candidate)
    }

    /// Check that every part of the override is present and usable
    pub fn validate(&self) -> ExtractResult<()> {
        match self.executable_path.as_deref() {
            Some(path) if !path.is_empty() => {}
            other => {
                return Err(bad_executable_path(
                    other.map(|p| serde_json::Value::String(p.to_string()).to_string()),
                ))
            }
        }
        if self.args.is_none() {
            return Err(bad_args());
        }
        if self.launcher.is_none() {
            return Err(ExtractError::invalid_override(
                "Check that launch is a function.",
            ));
        }
        Ok(())
    }

    /// Validate, then yield the launcher and the launch configuration
    /// carrying this override's binary and arguments
    pub fn resolve(&self, base: LaunchConfig) -> ExtractResult<(Arc<dyn DriverLauncher>, LaunchConfig)> {
        self.validate()?;
        let (Some(path), Some(args), Some(launcher)) =
            (&self.executable_path, &self.args, &self.launcher)
        else {
            return Err(ExtractError::invalid_override("incomplete override"));
        };
        let config = base
            .with_executable_path(path.clone())
            .with_args(args.iter().cloned());
        Ok((Arc::clone(launcher), config))
    }
}

fn bad_executable_path(got: Option<String>) -> ExtractError {
    ExtractError::invalid_override(format!(
        "Check that executablePath is a valid string, got \"{}\"",
        got.unwrap_or_else(|| "undefined".to_string())
    ))
}

fn bad_args() -> ExtractError {
    ExtractError::invalid_override("Check that args is an Array.")
}
