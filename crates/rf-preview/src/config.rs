//! Engine configuration
//!
//! `EngineConfig` is a plain value handed to the engine at construction and
//! again on every `apply`. The engine never reads configuration from
//! anywhere else.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::animation::AnimationTiming;
use crate::error::{PreviewError, PreviewResult};
use crate::layout::{ContainerSize, MAX_CONTAINER_DIM, ResizeConfig};
use crate::pool::DEFAULT_TEXTURE_BUDGET;
use crate::scene::SceneConfig;
use crate::symbols::SymbolDescriptor;

/// Upper bound for reels and rows
pub const MAX_GRID_DIMENSION: u8 = 12;

/// Largest backing store per axis, physical pixels
pub const MAX_SURFACE_DIM: u32 = 16384;

/// Upper bound for the device pixel ratio
pub const MAX_DEVICE_PIXEL_RATIO: f32 = 8.0;

/// Screen orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

/// Device profile selecting coverage and centering ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceProfile {
    #[default]
    Desktop,
    MobileLandscape,
    MobilePortrait,
}

impl DeviceProfile {
    pub const ALL: [DeviceProfile; 3] = [
        DeviceProfile::Desktop,
        DeviceProfile::MobileLandscape,
        DeviceProfile::MobilePortrait,
    ];

    /// Derive profile and orientation from observed container geometry
    pub fn from_container(width: f32, height: f32, is_mobile: bool) -> (Self, Orientation) {
        let orientation = if height > width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        };
        let profile = match (is_mobile, orientation) {
            (false, _) => DeviceProfile::Desktop,
            (true, Orientation::Landscape) => DeviceProfile::MobileLandscape,
            (true, Orientation::Portrait) => DeviceProfile::MobilePortrait,
        };
        (profile, orientation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceProfile::Desktop => "desktop",
            DeviceProfile::MobileLandscape => "mobileLandscape",
            DeviceProfile::MobilePortrait => "mobilePortrait",
        }
    }
}

/// Grid shape plus the device it is previewed on.
///
/// Immutable once applied: changes always build a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfiguration {
    /// Number of reels (columns)
    pub reels: u8,
    /// Number of visible rows per reel
    pub rows: u8,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub device_profile: DeviceProfile,
}

impl GridConfiguration {
    pub const fn new(reels: u8, rows: u8) -> Self {
        Self {
            reels,
            rows,
            orientation: Orientation::Landscape,
            device_profile: DeviceProfile::Desktop,
        }
    }

    /// Standard 5×3
    pub const fn standard_5x3() -> Self {
        Self::new(5, 3)
    }

    pub fn with_shape(self, reels: u8, rows: u8) -> Self {
        Self { reels, rows, ..self }
    }

    pub fn with_device_profile(self, device_profile: DeviceProfile) -> Self {
        Self {
            device_profile,
            ..self
        }
    }

    pub fn with_orientation(self, orientation: Orientation) -> Self {
        Self {
            orientation,
            ..self
        }
    }

    /// Total grid positions
    pub fn total_positions(&self) -> usize {
        self.reels as usize * self.rows as usize
    }

    /// True when reels and rows differ from `other`
    pub fn shape_differs(&self, other: &Self) -> bool {
        self.reels != other.reels || self.rows != other.rows
    }

    pub fn validate(&self) -> PreviewResult<()> {
        let valid = 1..=MAX_GRID_DIMENSION;
        if !valid.contains(&self.reels) || !valid.contains(&self.rows) {
            return Err(PreviewError::InvalidConfig(format!(
                "grid {}x{} outside 1..={}",
                self.reels, self.rows, MAX_GRID_DIMENSION
            )));
        }
        Ok(())
    }
}

impl Default for GridConfiguration {
    fn default() -> Self {
        Self::standard_5x3()
    }
}

/// Viewport in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f32,
}

fn default_dpr() -> f32 {
    1.0
}

impl Viewport {
    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// Pixel ratio the surface is actually rendered at.
    ///
    /// Lowered below `device_pixel_ratio` when the backing store would
    /// exceed `MAX_SURFACE_DIM` on either axis.
    pub fn effective_pixel_ratio(&self) -> f32 {
        let dpr = self.device_pixel_ratio.max(0.1);
        let longest = self.width.max(self.height).max(1.0);
        dpr.min(MAX_SURFACE_DIM as f32 / longest)
    }

    /// Backing-store size in physical pixels, at most `MAX_SURFACE_DIM` per axis
    pub fn physical_size(&self) -> (u32, u32) {
        let dpr = self.effective_pixel_ratio();
        let axis = |v: f32| ((v.max(1.0) * dpr).ceil() as u32).clamp(1, MAX_SURFACE_DIM);
        (axis(self.width), axis(self.height))
    }

    /// Size in CSS pixels as a layout container
    pub fn container(&self) -> ContainerSize {
        ContainerSize::new(self.width, self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0, 1.0)
    }
}

/// Sprite pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Maximum simultaneously allocated sprite instances
    pub max_pool_size: usize,
    /// Texture loader worker threads (0 = deferred, resolved during frames)
    pub loader_workers: usize,
    /// Cached textures kept beyond those bound to sprites or symbols
    pub texture_budget: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 256,
            loader_workers: 2,
            texture_budget: DEFAULT_TEXTURE_BUDGET,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub grid: GridConfiguration,
    #[serde(default)]
    pub symbols: Vec<SymbolDescriptor>,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub resize: ResizeConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub timing: AnimationTiming,
    /// Seed for preview landing stops (None = entropy)
    #[serde(default)]
    pub seed: Option<u64>,
}

impl EngineConfig {
    pub fn new(grid: GridConfiguration, symbols: Vec<SymbolDescriptor>) -> Self {
        Self {
            grid,
            symbols,
            viewport: Viewport::default(),
            pool: PoolConfig::default(),
            resize: ResizeConfig::default(),
            scene: SceneConfig::default(),
            timing: AnimationTiming::default(),
            seed: None,
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse from JSON and validate
    pub fn from_json_str(json: &str) -> PreviewResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file and validate
    pub fn from_file(path: impl AsRef<Path>) -> PreviewResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> PreviewResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> PreviewResult<()> {
        self.grid.validate()?;

        let vp = &self.viewport;
        if !vp.container().is_valid() {
            return Err(PreviewError::InvalidConfig(format!(
                "viewport {}x{} outside (0, {}]",
                vp.width, vp.height, MAX_CONTAINER_DIM
            )));
        }
        if !(vp.device_pixel_ratio > 0.0 && vp.device_pixel_ratio <= MAX_DEVICE_PIXEL_RATIO) {
            return Err(PreviewError::InvalidConfig(format!(
                "device pixel ratio {} outside (0, {}]",
                vp.device_pixel_ratio, MAX_DEVICE_PIXEL_RATIO
            )));
        }
        if self.pool.max_pool_size < self.grid.total_positions() {
            return Err(PreviewError::InvalidConfig(format!(
                "pool of {} cannot hold a {}x{} grid",
                self.pool.max_pool_size, self.grid.reels, self.grid.rows
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolCategory;
    use std::io::Write;

    #[test]
    fn test_grid_validation() {
        assert!(GridConfiguration::new(5, 3).validate().is_ok());
        assert!(GridConfiguration::new(0, 3).validate().is_err());
        assert!(GridConfiguration::new(5, 13).validate().is_err());
        assert!(GridConfiguration::new(12, 12).validate().is_ok());
    }

    #[test]
    fn test_with_shape_builds_new_value() {
        let base = GridConfiguration::standard_5x3();
        let wide = base.with_shape(6, 4);
        assert_eq!(base.reels, 5);
        assert_eq!(wide.reels, 6);
        assert!(base.shape_differs(&wide));
        assert!(!base.shape_differs(&base.with_device_profile(DeviceProfile::MobilePortrait)));
    }

    #[test]
    fn test_profile_from_container() {
        assert_eq!(
            DeviceProfile::from_container(390.0, 844.0, true),
            (DeviceProfile::MobilePortrait, Orientation::Portrait)
        );
        assert_eq!(
            DeviceProfile::from_container(844.0, 390.0, true),
            (DeviceProfile::MobileLandscape, Orientation::Landscape)
        );
        assert_eq!(
            DeviceProfile::from_container(800.0, 1000.0, false).0,
            DeviceProfile::Desktop
        );
    }

    #[test]
    fn test_engine_config_defaults_from_json() {
        let config = EngineConfig::from_json_str(
            r#"{
                "grid": {"reels": 5, "rows": 3, "deviceProfile": "mobilePortrait"},
                "symbols": [{"id": "wild", "imageRef": "wild.png", "category": "wild"}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.grid.device_profile, DeviceProfile::MobilePortrait);
        assert_eq!(config.symbols[0].category, SymbolCategory::Wild);
        assert_eq!(config.pool.max_pool_size, 256);
        assert_eq!(config.viewport.device_pixel_ratio, 1.0);
    }

    #[test]
    fn test_engine_config_rejects_small_pool() {
        let mut config = EngineConfig::new(GridConfiguration::new(12, 12), Vec::new());
        config.pool.max_pool_size = 100;
        assert!(matches!(config.validate(), Err(PreviewError::InvalidConfig(_))));
    }

    #[test]
    fn test_engine_config_from_file() {
        let config = EngineConfig::new(GridConfiguration::new(3, 3), Vec::new()).with_seed(7);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json().unwrap().as_bytes()).unwrap();

        let loaded = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.grid, config.grid);
        assert_eq!(loaded.seed, Some(7));
    }

    #[test]
    fn test_physical_size_rounds_up() {
        let vp = Viewport::new(100.5, 50.0, 2.0);
        assert_eq!(vp.physical_size(), (201, 100));
        assert_eq!(vp.effective_pixel_ratio(), 2.0);
    }

    #[test]
    fn test_physical_size_capped_at_surface_limit() {
        let vp = Viewport::new(4000.0, 3000.0, 5.0);
        let (width, height) = vp.physical_size();
        assert!(width <= MAX_SURFACE_DIM && height <= MAX_SURFACE_DIM);
        assert!(width >= MAX_SURFACE_DIM - 1);
        assert!(vp.effective_pixel_ratio() < 5.0);

        let max = Viewport::new(MAX_CONTAINER_DIM, MAX_CONTAINER_DIM, MAX_DEVICE_PIXEL_RATIO);
        assert!(max.physical_size().0 <= MAX_SURFACE_DIM);
    }

    #[test]
    fn test_viewport_bounds_match_container_limit() {
        let mut config = EngineConfig::new(GridConfiguration::standard_5x3(), Vec::new());
        config.viewport = Viewport::new(12000.0, 700.0, 1.0);
        assert!(matches!(config.validate(), Err(PreviewError::InvalidConfig(_))));

        config.viewport = Viewport::new(MAX_CONTAINER_DIM, 700.0, 1.0);
        assert!(config.validate().is_ok());

        config.viewport = Viewport::new(f32::NAN, 700.0, 1.0);
        assert!(config.validate().is_err());

        config.viewport = Viewport::new(1280.0, 720.0, 9.0);
        assert!(config.validate().is_err());
    }
}
