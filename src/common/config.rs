use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout_engine::{Corner, LayoutParams, Orientation};

pub(crate) const MAX_WORKSPACES: usize = 32;

pub fn config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("mantle")
}

pub fn config_file() -> PathBuf { config_dir().join("mantle.toml") }

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub workspaces: WorkspaceSettings,
    #[serde(default)]
    pub startup: StartupSettings,
    #[serde(default)]
    pub hot_corners: HotCornerSettings,
    #[serde(default)]
    pub debug: DebugSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Take over from a running window manager.
    #[serde(default = "no")]
    pub replace: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSettings {
    #[serde(default = "default_workspace_count")]
    pub count: usize,
    /// Names by index. Missing or empty entries fall back to "Workspace N".
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub layout: LayoutSettings,
}

/// Shape of the workspace grid. Zero or negative rows or columns are derived
/// from the other dimension.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    #[serde(default = "default_rows")]
    pub rows: i64,
    #[serde(default)]
    pub columns: i64,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub starting_corner: Corner,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StartupSettings {
    #[serde(default = "default_startup_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HotCornerSettings {
    #[serde(default = "default_corner_size")]
    pub base_size: i32,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct DebugSettings {
    /// Pretend to have two side by side monitors when the server reports
    /// none. Ignored in release builds.
    #[serde(default = "no")]
    pub split_synthetic_monitor: bool,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            count: default_workspace_count(),
            names: Vec::new(),
            layout: LayoutSettings::default(),
        }
    }
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            columns: 0,
            orientation: Orientation::Horizontal,
            starting_corner: Corner::TopLeft,
        }
    }
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_startup_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for HotCornerSettings {
    fn default() -> Self {
        Self {
            base_size: default_corner_size(),
            scale: default_scale(),
        }
    }
}

impl WorkspaceSettings {
    pub fn name(&self, index: usize) -> String {
        match self.names.get(index) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("Workspace {}", index + 1),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.count == 0 {
            issues.push("workspaces.count must be at least 1".to_string());
        }
        if self.count > MAX_WORKSPACES {
            issues.push(format!(
                "workspaces.count should not exceed {}, got {}",
                MAX_WORKSPACES, self.count
            ));
        }
        if self.names.len() > self.count {
            issues.push("more workspace names provided than workspaces.count".to_string());
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let clamped = self.count.clamp(1, MAX_WORKSPACES);
        if clamped != self.count {
            self.count = clamped;
            return 1;
        }
        0
    }
}

impl LayoutSettings {
    pub fn params(&self) -> LayoutParams {
        LayoutParams::from_raw(self.rows, self.columns, self.orientation, self.starting_corner)
    }
}

impl StartupSettings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }

    pub fn poll_interval(&self) -> Duration { Duration::from_millis(self.poll_interval_ms) }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.timeout_ms == 0 {
            issues.push("startup.timeout_ms must be positive".to_string());
        }
        if self.poll_interval_ms == 0 {
            issues.push("startup.poll_interval_ms must be positive".to_string());
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.timeout_ms == 0 {
            self.timeout_ms = default_startup_timeout_ms();
            fixes += 1;
        }
        if self.poll_interval_ms == 0 {
            self.poll_interval_ms = default_poll_interval_ms();
            fixes += 1;
        }

        fixes
    }
}

impl HotCornerSettings {
    /// Edge length of a hot-corner square in pixels.
    pub fn size(&self) -> i32 { (f64::from(self.base_size) * self.scale) as i32 }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.base_size <= 0 {
            issues.push(format!("hot_corners.base_size must be positive, got {}", self.base_size));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            issues.push(format!("hot_corners.scale must be positive, got {}", self.scale));
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.base_size <= 0 {
            self.base_size = default_corner_size();
            fixes += 1;
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            self.scale = default_scale();
            fixes += 1;
        }

        fixes
    }
}

fn no() -> bool { false }

fn default_workspace_count() -> usize { 4 }

fn default_rows() -> i64 { 1 }

fn default_startup_timeout_ms() -> u64 { 15000 }

fn default_poll_interval_ms() -> u64 { 1000 }

fn default_corner_size() -> i32 { 39 }

fn default_scale() -> f64 { 1.0 }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Ok(Config::default()) }
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> { Ok(toml::from_str(buf)?) }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.workspaces.validate());
        issues.extend(self.startup.validate());
        issues.extend(self.hot_corners.validate());

        issues
    }

    /// Attempts to fix configuration values automatically.
    /// Returns the number of fixes applied.
    pub fn auto_fix_values(&mut self) -> usize {
        self.workspaces.auto_fix_values()
            + self.startup.auto_fix_values()
            + self.hot_corners.auto_fix_values()
    }
}
