use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Zoom at or below which the map counts as the "big map" overview.
pub const BIG_MAP_MAX_ZOOM: f64 = 3.0;
pub const DASH_PATTERN: &str = "5, 10";
pub const DEFAULT_POLYLINE_PRECISION: u32 = 5;

pub const DEFAULT_TOTAL_DURATION_MS: u64 = 3000;
pub const DEFAULT_MIN_STEP_MS: u64 = 5;
pub const DEFAULT_MAX_STEP_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Zh,
    En,
}

impl Locale {
    pub fn loading_text(&self) -> &'static str {
        match self {
            Self::Zh => "加载中...",
            Self::En => "Loading...",
        }
    }

    pub fn single_run_title(&self) -> &'static str {
        match self {
            Self::Zh => "单次骑行",
            Self::En => "Single run",
        }
    }

    pub fn all_runs_title(&self) -> &'static str {
        match self {
            Self::Zh => "所有",
            Self::En => "All",
        }
    }
}

/// How fast the single-run playback reveals points.
///
/// The per-tick delay is `total_duration_ms / (points - 1)` clamped to
/// `[min_step_ms, max_step_ms]`, so long routes finish in roughly the same
/// time as short ones. Setting both bounds to the same value gives a fixed
/// interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnimationPacing {
    pub total_duration_ms: u64,
    pub min_step_ms: u64,
    pub max_step_ms: u64,
}

impl Default for AnimationPacing {
    fn default() -> Self {
        Self {
            total_duration_ms: DEFAULT_TOTAL_DURATION_MS,
            min_step_ms: DEFAULT_MIN_STEP_MS,
            max_step_ms: DEFAULT_MAX_STEP_MS,
        }
    }
}

impl AnimationPacing {
    pub fn fixed(step: Duration) -> Self {
        let ms = step.as_millis() as u64;
        Self {
            total_duration_ms: 0,
            min_step_ms: ms,
            max_step_ms: ms,
        }
    }

    /// Delay between two ticks for a route of `points` points.
    pub fn step_delay(&self, points: usize) -> Duration {
        if points < 2 {
            return Duration::ZERO;
        }
        let steps = (points - 1) as u64;
        let ms = (self.total_duration_ms / steps)
            .max(self.min_step_ms)
            .min(self.max_step_ms);
        Duration::from_millis(ms)
    }

    /// Wall time from the first tick to the last one.
    pub fn total_duration(&self, points: usize) -> Duration {
        if points < 2 {
            return Duration::ZERO;
        }
        self.step_delay(points) * (points - 2) as u32
    }
}

/// View configuration, passed explicitly to whoever renders the run map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapConfig {
    pub dashed_route: bool,
    pub line_opacity: f64,
    pub map_height_px: u32,
    pub privacy_mode: bool,
    pub lights_on: bool,
    pub locale: Locale,
    pub animation: AnimationPacing,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            dashed_route: true,
            line_opacity: 0.4,
            map_height_px: 600,
            privacy_mode: false,
            lights_on: true,
            locale: Locale::Zh,
            animation: AnimationPacing::default(),
        }
    }
}

impl MapConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: MapConfig = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.line_opacity) {
            anyhow::bail!("line_opacity must be within [0, 1], got {}", self.line_opacity);
        }
        let pacing = &self.animation;
        if pacing.max_step_ms == 0 {
            anyhow::bail!("animation.max_step_ms must be positive");
        }
        if pacing.min_step_ms > pacing.max_step_ms {
            anyhow::bail!(
                "animation.min_step_ms ({}) exceeds animation.max_step_ms ({})",
                pacing.min_step_ms,
                pacing.max_step_ms,
            );
        }
        Ok(())
    }

    /// Lights are always off in privacy mode.
    pub fn initial_lights(&self) -> bool {
        !self.privacy_mode && self.lights_on
    }

    pub fn lights_control_visible(&self) -> bool {
        !self.privacy_mode
    }

    pub fn dash_pattern(&self, is_single_run: bool, is_big_map: bool) -> Option<&'static str> {
        (self.dashed_route && !is_single_run && !is_big_map).then_some(DASH_PATTERN)
    }
}

pub fn is_big_map(zoom: f64) -> bool {
    zoom <= BIG_MAP_MAX_ZOOM
}
