use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use super::collections::{HashMap, HashSet};
use crate::layout_engine::LayoutKind;
use crate::sys::geometry::Size;

const MAX_WORKSPACE_NAMES: usize = 32;
const DEFAULT_CONFIG: &str = include_str!("../../trellis.default.toml");

pub fn config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trellis")
        .join("config.toml")
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    /// Seat names. The first seat is the one commands act on when they do
    /// not name a seat.
    #[serde(default = "default_seats")]
    pub seats: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub floating: FloatingSettings,
    #[serde(default)]
    pub transactions: TransactionSettings,
    #[serde(default)]
    pub workspaces: WorkspaceSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    /// Layout given to new workspaces and to containers created by `split`.
    #[serde(default)]
    pub default_layout: LayoutKind,
    /// Tiled children are never shrunk below this width while their siblings
    /// can still give up space.
    #[serde(default = "default_min_sane_width")]
    pub min_sane_width: f64,
    #[serde(default = "default_min_sane_height")]
    pub min_sane_height: f64,
    /// Height of one title bar in tabbed and stacked containers.
    #[serde(default = "default_titlebar_height")]
    pub titlebar_height: f64,
    #[serde(default = "default_border_thickness")]
    pub border_thickness: f64,
    #[serde(default)]
    pub border: BorderStyle,
    #[serde(default)]
    pub gaps: GapSettings,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum BorderStyle {
    /// Border on every side plus a title bar.
    #[default]
    Normal,
    /// Border on every side, no title bar.
    Pixel,
    None,
}

/// Gap configuration for window spacing
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct GapSettings {
    /// Space between the workspace and the output edges
    #[serde(default)]
    pub outer: OuterGaps,
    /// Space between tiled siblings
    #[serde(default)]
    pub inner: InnerGaps,
    /// Output-specific overrides keyed by output name
    #[serde(default)]
    pub per_output: HashMap<String, GapOverride>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct OuterGaps {
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub bottom: f64,
    #[serde(default)]
    pub right: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct InnerGaps {
    /// Gap between children of a horizontal split
    #[serde(default)]
    pub horizontal: f64,
    /// Gap between children of a vertical split
    #[serde(default)]
    pub vertical: f64,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct GapOverride {
    #[serde(default)]
    pub outer: Option<OuterGaps>,
    #[serde(default)]
    pub inner: Option<InnerGaps>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct FloatingSettings {
    /// `-1` disables the minimum.
    #[serde(default = "default_floating_min_width")]
    pub min_width: f64,
    #[serde(default = "default_floating_min_height")]
    pub min_height: f64,
    /// `0` means the workspace size, `-1` disables the maximum.
    #[serde(default)]
    pub max_width: f64,
    #[serde(default)]
    pub max_height: f64,
    /// Keep floating containers inside their output.
    #[serde(default = "yes")]
    pub clamp_to_output: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct TransactionSettings {
    /// How long a transaction waits for clients before committing anyway.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Apply every transaction immediately without waiting for clients.
    #[serde(default = "no")]
    pub no_atomic: bool,
    /// Always wait for the full timeout, even once every client has answered.
    #[serde(default = "no")]
    pub wait_full_deadline: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSettings {
    /// Names handed out, in order, to workspaces created for new outputs.
    /// Once exhausted, the first unused number is used.
    #[serde(default)]
    pub names: Vec<String>,
    /// Destroy a workspace when it is left while empty.
    #[serde(default = "yes")]
    pub destroy_empty_on_leave: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            settings: Settings::default(),
            seats: default_seats(),
        }
    }
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            default_layout: LayoutKind::default(),
            min_sane_width: default_min_sane_width(),
            min_sane_height: default_min_sane_height(),
            titlebar_height: default_titlebar_height(),
            border_thickness: default_border_thickness(),
            border: BorderStyle::default(),
            gaps: GapSettings::default(),
        }
    }
}

impl Default for FloatingSettings {
    fn default() -> Self {
        Self {
            min_width: default_floating_min_width(),
            min_height: default_floating_min_height(),
            max_width: 0.0,
            max_height: 0.0,
            clamp_to_output: true,
        }
    }
}

impl Default for TransactionSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            no_atomic: false,
            wait_full_deadline: false,
        }
    }
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            destroy_empty_on_leave: true,
        }
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<Config>(buf) {
            Ok(config) => Ok(config),
            Err(e) => bail!("{e}"),
        }
    }

    /// The commented default configuration shipped with the binary.
    pub fn default_toml() -> &'static str { DEFAULT_CONFIG }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        issues.extend(self.settings.validate());

        if self.seats.is_empty() {
            issues.push("at least one seat must be configured".to_string());
        }
        let mut seen = HashSet::default();
        for seat in &self.seats {
            if !seen.insert(seat.as_str()) {
                issues.push(format!("duplicate seat name `{seat}`"));
            }
        }

        issues
    }

    pub fn default_seat(&self) -> &str {
        self.seats.first().map(String::as_str).unwrap_or("seat0")
    }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.layout.validate());
        issues.extend(self.floating.validate());
        issues.extend(self.transactions.validate());
        issues.extend(self.workspaces.validate());
        issues
    }
}

impl LayoutSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.min_sane_width <= 0.0 {
            issues.push(format!(
                "layout.min_sane_width must be positive, got {}",
                self.min_sane_width
            ));
        }
        if self.min_sane_height <= 0.0 {
            issues.push(format!(
                "layout.min_sane_height must be positive, got {}",
                self.min_sane_height
            ));
        }
        if self.titlebar_height < 0.0 {
            issues.push(format!(
                "layout.titlebar_height must be non-negative, got {}",
                self.titlebar_height
            ));
        }
        if self.border_thickness < 0.0 {
            issues.push(format!(
                "layout.border_thickness must be non-negative, got {}",
                self.border_thickness
            ));
        }
        if self.default_layout == LayoutKind::Floating {
            issues.push("layout.default_layout cannot be floating".to_string());
        }

        issues.extend(self.gaps.validate());
        issues
    }

    /// Space taken from a leaf container before its view: `(top, sides)`.
    pub fn decoration(&self) -> (f64, f64) {
        match self.border {
            BorderStyle::Normal => (self.titlebar_height, self.border_thickness),
            BorderStyle::Pixel => (self.border_thickness, self.border_thickness),
            BorderStyle::None => (0.0, 0.0),
        }
    }
}

impl GapSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.outer.validate());
        issues.extend(self.inner.validate());

        for (name, overrides) in &self.per_output {
            if let Some(outer) = &overrides.outer {
                for issue in outer.validate() {
                    issues.push(format!("per_output[{name}] {issue}"));
                }
            }
            if let Some(inner) = &overrides.inner {
                for issue in inner.validate() {
                    issues.push(format!("per_output[{name}] {issue}"));
                }
            }
        }

        issues
    }

    pub fn effective_for_output(&self, output: Option<&str>) -> GapSettings {
        let mut resolved = GapSettings {
            outer: self.outer.clone(),
            inner: self.inner.clone(),
            per_output: HashMap::default(),
        };
        if let Some(overrides) = output.and_then(|name| self.per_output.get(name)) {
            if let Some(outer) = &overrides.outer {
                resolved.outer = outer.clone();
            }
            if let Some(inner) = &overrides.inner {
                resolved.inner = inner.clone();
            }
        }
        resolved
    }
}

impl OuterGaps {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for (name, value) in [
            ("top", self.top),
            ("left", self.left),
            ("bottom", self.bottom),
            ("right", self.right),
        ] {
            if value < 0.0 {
                issues.push(format!("outer.{name} gap must be non-negative, got {value}"));
            }
        }
        issues
    }
}

impl InnerGaps {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.horizontal < 0.0 {
            issues.push(format!(
                "inner.horizontal gap must be non-negative, got {}",
                self.horizontal
            ));
        }
        if self.vertical < 0.0 {
            issues.push(format!(
                "inner.vertical gap must be non-negative, got {}",
                self.vertical
            ));
        }
        issues
    }
}

impl FloatingSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for (name, value) in [
            ("min_width", self.min_width),
            ("min_height", self.min_height),
            ("max_width", self.max_width),
            ("max_height", self.max_height),
        ] {
            if value < -1.0 {
                issues.push(format!("floating.{name} must be -1 or larger, got {value}"));
            }
        }
        issues
    }

    /// Resolves the `(minimum, maximum)` floating size for a workspace of the
    /// given size.
    pub fn constraints(&self, workspace: Size) -> (Size, Size) {
        let min = |value: f64| if value < 0.0 { 0.0 } else { value };
        let max = |value: f64, whole: f64| {
            if value < 0.0 {
                f64::INFINITY
            } else if value == 0.0 {
                whole
            } else {
                value
            }
        };
        (
            Size::new(min(self.min_width), min(self.min_height)),
            Size::new(
                max(self.max_width, workspace.width),
                max(self.max_height, workspace.height),
            ),
        )
    }
}

impl TransactionSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.timeout_ms == 0 {
            issues.push("transactions.timeout_ms must be at least 1".to_string());
        }
        issues
    }

    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

impl WorkspaceSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.names.len() > MAX_WORKSPACE_NAMES {
            issues.push(format!(
                "workspaces.names should not list more than {MAX_WORKSPACE_NAMES} names"
            ));
        }
        let mut seen = HashSet::default();
        for name in &self.names {
            if name.trim().is_empty() {
                issues.push("workspaces.names must not contain empty names".to_string());
            } else if !seen.insert(name.as_str()) {
                issues.push(format!("duplicate workspace name `{name}`"));
            }
        }
        issues
    }
}

fn yes() -> bool { true }

fn no() -> bool { false }

fn default_seats() -> Vec<String> { vec!["seat0".to_string()] }

fn default_min_sane_width() -> f64 { 100.0 }

fn default_min_sane_height() -> f64 { 60.0 }

fn default_titlebar_height() -> f64 { 24.0 }

fn default_border_thickness() -> f64 { 2.0 }

fn default_floating_min_width() -> f64 { 75.0 }

fn default_floating_min_height() -> f64 { 50.0 }

fn default_timeout_ms() -> u64 { 200 }
