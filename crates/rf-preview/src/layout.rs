//! Resize and centering layout
//!
//! Layout is a pure function of the grid configuration, the device profile
//! ratios and the last accepted container size. Container notifications are
//! validated, debounced and deduplicated before they can change anything.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{DeviceProfile, GridConfiguration};
use crate::render::Rect;

/// Largest accepted container dimension (CSS pixels)
pub const MAX_CONTAINER_DIM: f32 = 10000.0;

/// Observed container size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: f32,
    pub height: f32,
}

impl ContainerSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Both axes in (0, MAX_CONTAINER_DIM]
    pub fn is_valid(&self) -> bool {
        let ok = |v: f32| v.is_finite() && v > 0.0 && v <= MAX_CONTAINER_DIM;
        ok(self.width) && ok(self.height)
    }
}

/// Per-device layout ratios and limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLayoutProfile {
    /// Fraction of container width/height the grid may occupy
    pub coverage: (f32, f32),
    /// Anchor of the grid centre within the container (0-1 per axis)
    pub centering: (f32, f32),
    pub min_cell_size: f32,
    pub max_cell_size: f32,
    /// Gap between adjacent cells
    pub cell_padding: f32,
    /// Minimum distance between grid and container edge
    pub margin: f32,
}

impl DeviceLayoutProfile {
    pub fn desktop() -> Self {
        Self {
            coverage: (0.70, 0.70),
            centering: (0.5, 0.5),
            min_cell_size: 48.0,
            max_cell_size: 220.0,
            cell_padding: 8.0,
            margin: 16.0,
        }
    }

    pub fn mobile_landscape() -> Self {
        Self {
            coverage: (0.60, 0.80),
            centering: (0.5, 0.5),
            min_cell_size: 32.0,
            max_cell_size: 160.0,
            cell_padding: 6.0,
            margin: 8.0,
        }
    }

    pub fn mobile_portrait() -> Self {
        Self {
            coverage: (0.80, 0.50),
            centering: (0.5, 0.45),
            min_cell_size: 28.0,
            max_cell_size: 140.0,
            cell_padding: 4.0,
            margin: 8.0,
        }
    }

    pub fn for_profile(profile: DeviceProfile) -> Self {
        match profile {
            DeviceProfile::Desktop => Self::desktop(),
            DeviceProfile::MobileLandscape => Self::mobile_landscape(),
            DeviceProfile::MobilePortrait => Self::mobile_portrait(),
        }
    }
}

/// Resize behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResizeConfig {
    /// Window in which successive resize signals are coalesced
    pub debounce_ms: f64,
    /// Overrides of the built-in device profiles
    pub profiles: HashMap<DeviceProfile, DeviceLayoutProfile>,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100.0,
            profiles: HashMap::new(),
        }
    }
}

impl ResizeConfig {
    pub fn profile(&self, profile: DeviceProfile) -> DeviceLayoutProfile {
        self.profiles
            .get(&profile)
            .copied()
            .unwrap_or_else(|| DeviceLayoutProfile::for_profile(profile))
    }
}

/// Computed grid placement
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutResult {
    pub cell_size: f32,
    pub grid_origin_x: f32,
    pub grid_origin_y: f32,
    pub grid_width: f32,
    pub grid_height: f32,
    pub cell_padding: f32,
}

impl LayoutResult {
    /// Pixel rectangle of the cell at (col, row)
    pub fn cell_rect(&self, col: usize, row: usize) -> Rect {
        let pitch = self.cell_pitch();
        Rect::new(
            self.grid_origin_x + col as f32 * pitch,
            self.grid_origin_y + row as f32 * pitch,
            self.cell_size,
            self.cell_size,
        )
    }

    /// Distance between the top-left corners of adjacent cells
    pub fn cell_pitch(&self) -> f32 {
        self.cell_size + self.cell_padding
    }

    pub fn grid_rect(&self) -> Rect {
        Rect::new(
            self.grid_origin_x,
            self.grid_origin_y,
            self.grid_width,
            self.grid_height,
        )
    }

    /// Clip rectangle of one reel column
    pub fn column_rect(&self, col: usize) -> Rect {
        let cell = self.cell_rect(col, 0);
        Rect::new(cell.x, self.grid_origin_y, self.cell_size, self.grid_height)
    }
}

/// Result of a resize proposal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeProposal {
    /// Queued; applied once the debounce window elapses
    Accepted,
    /// Outside (0, 10000] on some axis; previous layout kept
    Rejected,
}

/// Computes layouts and filters container notifications
pub struct ResizeController {
    config: ResizeConfig,
    /// Runtime centering overrides
    centering: HashMap<DeviceProfile, (f32, f32)>,
    applied: ContainerSize,
    pending: Option<(ContainerSize, f64)>,
    last_layout: Option<LayoutResult>,
    rejected: u64,
}

impl ResizeController {
    pub fn new(config: ResizeConfig, initial: ContainerSize) -> Self {
        let applied = if initial.is_valid() {
            initial
        } else {
            log::warn!(
                "Initial container {}x{} invalid, using 1280x720",
                initial.width,
                initial.height
            );
            ContainerSize::new(1280.0, 720.0)
        };
        Self {
            config,
            centering: HashMap::new(),
            applied,
            pending: None,
            last_layout: None,
            rejected: 0,
        }
    }

    pub fn set_config(&mut self, config: ResizeConfig) {
        self.config = config;
    }

    /// Last applied container size
    pub fn container(&self) -> ContainerSize {
        self.applied
    }

    /// Last computed layout
    pub fn layout(&self) -> Option<LayoutResult> {
        self.last_layout
    }

    /// Number of rejected proposals so far
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Effective profile for `profile`, centering overrides included
    pub fn profile(&self, profile: DeviceProfile) -> DeviceLayoutProfile {
        let mut p = self.config.profile(profile);
        if let Some(centering) = self.centering.get(&profile) {
            p.centering = *centering;
        }
        p
    }

    /// Override the centering ratio for one profile, or all of them.
    /// Non-finite ratios are rejected.
    pub fn set_centering_ratio(&mut self, x: f32, y: f32, profile: Option<DeviceProfile>) -> bool {
        if !(x.is_finite() && y.is_finite()) {
            log::warn!("Centering ratio ({}, {}) ignored", x, y);
            return false;
        }
        let ratio = (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0));
        match profile {
            Some(profile) => {
                self.centering.insert(profile, ratio);
            }
            None => {
                for profile in DeviceProfile::ALL {
                    self.centering.insert(profile, ratio);
                }
            }
        }
        log::debug!("Centering ratio set to {:?} for {:?}", ratio, profile);
        true
    }

    /// Compute and remember the layout for the applied container
    pub fn compute_layout(&mut self, grid: &GridConfiguration) -> LayoutResult {
        let layout = compute_layout(grid, self.applied, &self.profile(grid.device_profile));
        self.last_layout = Some(layout);
        layout
    }

    /// Offer a container size observed at `now_ms`
    pub fn propose(&mut self, size: ContainerSize, now_ms: f64) -> ResizeProposal {
        if !size.is_valid() {
            self.rejected += 1;
            log::debug!(
                "Rejected container size {}x{}, keeping {}x{}",
                size.width,
                size.height,
                self.applied.width,
                self.applied.height
            );
            return ResizeProposal::Rejected;
        }
        self.pending = Some((size, now_ms));
        ResizeProposal::Accepted
    }

    /// Apply the last proposal once it has been stable for the debounce
    /// window. Returns the new size if it changed.
    pub fn poll(&mut self, now_ms: f64) -> Option<ContainerSize> {
        let (size, at) = self.pending?;
        if now_ms - at < self.config.debounce_ms {
            return None;
        }
        self.pending = None;
        if size == self.applied {
            return None;
        }
        self.applied = size;
        Some(size)
    }

    /// Apply a host-driven size at once (no debounce). Returns true if it
    /// changed the applied size.
    pub fn apply_immediately(&mut self, size: ContainerSize) -> bool {
        if !size.is_valid() {
            self.rejected += 1;
            return false;
        }
        self.pending = None;
        if size == self.applied {
            return false;
        }
        self.applied = size;
        true
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Place a `reels x rows` grid of square cells inside `container`
pub fn compute_layout(
    grid: &GridConfiguration,
    container: ContainerSize,
    profile: &DeviceLayoutProfile,
) -> LayoutResult {
    let reels = grid.reels.max(1) as f32;
    let rows = grid.rows.max(1) as f32;
    let padding = profile.cell_padding.max(0.0);

    let available_w = container.width * profile.coverage.0 - padding * (reels - 1.0);
    let available_h = container.height * profile.coverage.1 - padding * (rows - 1.0);
    let fit = (available_w / reels).min(available_h / rows);
    let cell_size = fit
        .max(profile.min_cell_size)
        .min(profile.max_cell_size.max(profile.min_cell_size));

    let grid_width = cell_size * reels + padding * (reels - 1.0);
    let grid_height = cell_size * rows + padding * (rows - 1.0);

    let center_x = container.width * profile.centering.0;
    let center_y = container.height * profile.centering.1;

    LayoutResult {
        cell_size,
        grid_origin_x: place_axis(center_x - grid_width / 2.0, grid_width, container.width, profile.margin),
        grid_origin_y: place_axis(center_y - grid_height / 2.0, grid_height, container.height, profile.margin),
        grid_width,
        grid_height,
        cell_padding: padding,
    }
}

/// Clamp an origin so the span stays inside the margins; centre it when it
/// cannot fit.
fn place_axis(origin: f32, span: f32, extent: f32, margin: f32) -> f32 {
    let lo = margin;
    let hi = extent - margin - span;
    if hi < lo {
        (extent - span) / 2.0
    } else {
        origin.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(reels: u8, rows: u8, profile: DeviceProfile) -> GridConfiguration {
        GridConfiguration::new(reels, rows).with_device_profile(profile)
    }

    #[test]
    fn test_desktop_layout_centered() {
        let layout = compute_layout(
            &grid(5, 3, DeviceProfile::Desktop),
            ContainerSize::new(1280.0, 720.0),
            &DeviceLayoutProfile::desktop(),
        );
        // 720 * 0.7 = 504 - 16 = 488 / 3 = 162.67 vs (896 - 32) / 5 = 172.8
        assert_relative_eq!(layout.cell_size, 488.0 / 3.0, epsilon = 1e-3);
        assert_relative_eq!(layout.grid_height, 504.0, epsilon = 1e-3);
        assert_relative_eq!(
            layout.grid_origin_x + layout.grid_width / 2.0,
            640.0,
            epsilon = 1e-3
        );
        assert_relative_eq!(
            layout.grid_origin_y + layout.grid_height / 2.0,
            360.0,
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_cells_are_clamped() {
        let tiny = compute_layout(
            &grid(5, 3, DeviceProfile::Desktop),
            ContainerSize::new(200.0, 100.0),
            &DeviceLayoutProfile::desktop(),
        );
        assert_eq!(tiny.cell_size, 48.0);

        let huge = compute_layout(
            &grid(1, 1, DeviceProfile::Desktop),
            ContainerSize::new(5000.0, 5000.0),
            &DeviceLayoutProfile::desktop(),
        );
        assert_eq!(huge.cell_size, 220.0);
    }

    #[test]
    fn test_oversized_grid_is_centered() {
        let layout = compute_layout(
            &grid(5, 3, DeviceProfile::Desktop),
            ContainerSize::new(200.0, 100.0),
            &DeviceLayoutProfile::desktop(),
        );
        assert_relative_eq!(layout.grid_origin_x, (200.0 - layout.grid_width) / 2.0);
    }

    #[test]
    fn test_portrait_anchor_above_center() {
        let layout = compute_layout(
            &grid(5, 3, DeviceProfile::MobilePortrait),
            ContainerSize::new(390.0, 844.0),
            &DeviceLayoutProfile::mobile_portrait(),
        );
        let center_y = layout.grid_origin_y + layout.grid_height / 2.0;
        assert_relative_eq!(center_y, 844.0 * 0.45, epsilon = 1e-3);
    }

    #[test]
    fn test_anchor_clamped_inside_margins() {
        let mut profile = DeviceLayoutProfile::desktop();
        profile.centering = (0.0, 0.0);
        let layout = compute_layout(
            &grid(3, 3, DeviceProfile::Desktop),
            ContainerSize::new(1000.0, 1000.0),
            &profile,
        );
        assert_eq!(layout.grid_origin_x, profile.margin);
        assert_eq!(layout.grid_origin_y, profile.margin);
    }

    #[test]
    fn test_cell_rect_pitch() {
        let layout = LayoutResult {
            cell_size: 100.0,
            grid_origin_x: 10.0,
            grid_origin_y: 20.0,
            grid_width: 316.0,
            grid_height: 208.0,
            cell_padding: 8.0,
        };
        assert_eq!(layout.cell_rect(2, 1), Rect::new(226.0, 128.0, 100.0, 100.0));
        assert_eq!(layout.column_rect(1), Rect::new(118.0, 20.0, 100.0, 208.0));
    }

    #[test]
    fn test_invalid_proposals_rejected() {
        let mut ctl = ResizeController::new(ResizeConfig::default(), ContainerSize::new(800.0, 600.0));
        let g = grid(5, 3, DeviceProfile::Desktop);
        let before = ctl.compute_layout(&g);

        assert_eq!(ctl.propose(ContainerSize::new(0.0, 480.0), 0.0), ResizeProposal::Rejected);
        assert_eq!(ctl.propose(ContainerSize::new(640.0, 10001.0), 0.0), ResizeProposal::Rejected);
        assert_eq!(ctl.propose(ContainerSize::new(f32::NAN, 480.0), 0.0), ResizeProposal::Rejected);
        assert_eq!(ctl.poll(1000.0), None);
        assert_eq!(ctl.compute_layout(&g), before);
        assert_eq!(ctl.rejected_count(), 3);
    }

    #[test]
    fn test_upper_bound_is_inclusive() {
        assert!(ContainerSize::new(10000.0, 10000.0).is_valid());
        assert!(!ContainerSize::new(10000.5, 100.0).is_valid());
    }

    #[test]
    fn test_debounce_applies_last_only() {
        let mut ctl = ResizeController::new(ResizeConfig::default(), ContainerSize::new(800.0, 600.0));
        ctl.propose(ContainerSize::new(900.0, 600.0), 0.0);
        ctl.propose(ContainerSize::new(1000.0, 600.0), 40.0);
        assert_eq!(ctl.poll(90.0), None);
        assert_eq!(ctl.poll(140.0), Some(ContainerSize::new(1000.0, 600.0)));
        assert_eq!(ctl.poll(500.0), None);
    }

    #[test]
    fn test_same_size_not_reapplied() {
        let mut ctl = ResizeController::new(ResizeConfig::default(), ContainerSize::new(800.0, 600.0));
        ctl.propose(ContainerSize::new(800.0, 600.0), 0.0);
        assert_eq!(ctl.poll(200.0), None);
        assert!(!ctl.has_pending());
        assert!(!ctl.apply_immediately(ContainerSize::new(800.0, 600.0)));
        assert!(ctl.apply_immediately(ContainerSize::new(801.0, 600.0)));
    }

    #[test]
    fn test_centering_override() {
        let mut ctl = ResizeController::new(ResizeConfig::default(), ContainerSize::new(1000.0, 1000.0));
        ctl.set_centering_ratio(0.5, 0.3, Some(DeviceProfile::Desktop));
        assert_eq!(ctl.profile(DeviceProfile::Desktop).centering, (0.5, 0.3));
        assert_eq!(ctl.profile(DeviceProfile::MobilePortrait).centering, (0.5, 0.45));

        ctl.set_centering_ratio(2.0, -1.0, None);
        assert_eq!(ctl.profile(DeviceProfile::MobilePortrait).centering, (1.0, 0.0));
    }

    #[test]
    fn test_non_finite_centering_rejected() {
        let mut ctl = ResizeController::new(ResizeConfig::default(), ContainerSize::new(1000.0, 1000.0));
        assert!(ctl.set_centering_ratio(0.5, 0.3, None));
        assert!(!ctl.set_centering_ratio(f32::NAN, 0.5, None));
        assert!(!ctl.set_centering_ratio(0.5, f32::INFINITY, Some(DeviceProfile::Desktop)));
        assert_eq!(ctl.profile(DeviceProfile::Desktop).centering, (0.5, 0.3));

        let grid = GridConfiguration::standard_5x3();
        let layout = ctl.compute_layout(&grid);
        assert!(layout.grid_origin_x.is_finite() && layout.grid_origin_y.is_finite());
    }
}
