//! Layered scene graph and grid reconfiguration
//!
//! Four layers, painted in z order:
//!
//! | Layer      | z  | Content                                  |
//! |------------|----|------------------------------------------|
//! | Background | 0  | container fill, reel window panel        |
//! | Grid       | 10 | one pooled sprite per cell               |
//! | Frame      | 20 | border around the reel window            |
//! | Overlay    | 30 | win highlight                            |
//!
//! Grid changes are serialized: one transition in flight, the rest queued in
//! call order. A transition fades the grid out, swaps sprites (release all,
//! relayout, acquire) and fades back in.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::animation::AnimationController;
use crate::config::GridConfiguration;
use crate::easing::Easing;
use crate::events::PreviewEvent;
use crate::layout::{ContainerSize, LayoutResult, ResizeController};
use crate::pool::{SpriteId, SymbolPool};
use crate::render::{Color, DrawCommand, DrawList, Rect};
use crate::symbols::{GridPosition, SymbolCategory, SymbolDescriptor, symbol_index_for};
use crate::texture::{Texture, TextureKey};

/// Scale applied to highlighted sprites at full pulse
const HIGHLIGHT_SCALE: f32 = 0.06;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Scene appearance and transition timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneConfig {
    /// Grid fade out / fade in, each (ms)
    pub fade_duration_ms: f64,
    pub fade_easing: Easing,
    pub background_color: Color,
    /// Reel window behind the sprites
    pub panel_color: Color,
    pub frame_color: Color,
    pub frame_thickness: f32,
    pub highlight_color: Color,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: 150.0,
            fade_easing: Easing::Sine,
            background_color: Color::from_hex(0x0A0A0C),
            panel_color: Color::from_hex(0x16161C),
            frame_color: Color::from_hex(0xD4AF37),
            frame_thickness: 4.0,
            highlight_color: Color::from_hex(0xFFD700),
        }
    }
}

/// Scene layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Background,
    Grid,
    Frame,
    Overlay,
}

impl Layer {
    /// Paint order
    pub const ALL: [Layer; 4] = [Layer::Background, Layer::Grid, Layer::Frame, Layer::Overlay];

    pub fn z(&self) -> i32 {
        match self {
            Layer::Background => 0,
            Layer::Grid => 10,
            Layer::Frame => 20,
            Layer::Overlay => 30,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// One grid cell and the sprite filling it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub position: GridPosition,
    pub sprite: SpriteId,
    /// Index into the symbol list
    pub symbol_index: usize,
}

/// Outcome of a grid request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridRequest {
    /// Same as the latest applied, in-flight or queued target
    Unchanged,
    Queued,
}

/// Outcome of a symbol update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolUpdate {
    Unchanged,
    /// Textures rebound in place
    Rebound,
    /// Held until the grid settles
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransitionPhase {
    FadingOut { since: f64 },
    FadingIn { since: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    target: GridConfiguration,
    phase: TransitionPhase,
}

/// Reel motion copied from the animation for composition
#[derive(Debug, Clone, Copy, Default)]
struct ColumnMotion {
    moving: bool,
    /// Downward shift in pixels
    offset: f32,
    /// Symbol scrolling in above row 0
    incoming: Option<usize>,
}

/// Owns the grid layer and composes all layers into a draw list
pub struct SceneManager {
    config: SceneConfig,
    grid: Option<GridConfiguration>,
    symbols: Vec<SymbolDescriptor>,
    pending_symbols: Option<Vec<SymbolDescriptor>>,
    /// Column-major
    cells: Vec<Cell>,
    layout: Option<LayoutResult>,
    container: ContainerSize,
    transition: Option<Transition>,
    queue: VecDeque<GridConfiguration>,
    grid_alpha: f32,
    motion: Vec<ColumnMotion>,
    highlight: Option<(Vec<GridPosition>, f32)>,
}

impl SceneManager {
    pub fn new(config: SceneConfig, symbols: Vec<SymbolDescriptor>, container: ContainerSize) -> Self {
        Self {
            config,
            grid: None,
            symbols,
            pending_symbols: None,
            cells: Vec::new(),
            layout: None,
            container,
            transition: None,
            queue: VecDeque::new(),
            grid_alpha: 0.0,
            motion: Vec::new(),
            highlight: None,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SceneConfig) {
        self.config = config;
    }

    /// Applied grid (the in-flight target once its sprites are swapped)
    pub fn grid(&self) -> Option<GridConfiguration> {
        self.grid
    }

    pub fn symbols(&self) -> &[SymbolDescriptor] {
        &self.symbols
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn layout(&self) -> Option<LayoutResult> {
        self.layout
    }

    pub fn grid_alpha(&self) -> f32 {
        self.grid_alpha
    }

    /// No transition in flight and nothing queued
    pub fn is_settled(&self) -> bool {
        self.transition.is_none() && self.queue.is_empty()
    }

    pub fn queued_grids(&self) -> usize {
        self.queue.len()
    }

    pub fn has_pending_symbols(&self) -> bool {
        self.pending_symbols.is_some()
    }

    /// Latest grid the scene will end up with
    fn latest_target(&self) -> Option<GridConfiguration> {
        self.queue
            .back()
            .copied()
            .or(self.transition.map(|t| t.target))
            .or(self.grid)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // GRID RECONFIGURATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Queue a grid change; a no-op when it matches the latest target
    pub fn request_grid(&mut self, grid: GridConfiguration) -> GridRequest {
        if self.latest_target() == Some(grid) {
            log::trace!("Grid {}x{} already applied or pending", grid.reels, grid.rows);
            return GridRequest::Unchanged;
        }
        log::debug!(
            "Grid {}x{} ({}) queued behind {} request(s)",
            grid.reels,
            grid.rows,
            grid.device_profile.name(),
            self.queue.len() + usize::from(self.transition.is_some())
        );
        self.queue.push_back(grid);
        GridRequest::Queued
    }

    /// Advance transitions. New transitions (and deferred symbol updates)
    /// only start when `may_start` is set, i.e. no spin is running.
    pub fn tick(
        &mut self,
        now_ms: f64,
        pool: &mut SymbolPool,
        resize: &mut ResizeController,
        may_start: bool,
    ) -> Vec<PreviewEvent> {
        let mut events = Vec::new();
        let fade = self.config.fade_duration_ms.max(0.0);
        let easing = self.config.fade_easing;

        loop {
            let Some(Transition { target, phase }) = self.transition else {
                if !may_start {
                    break;
                }
                match self.queue.pop_front() {
                    Some(target) => {
                        // Nothing on screen yet: go straight to the swap
                        let since = if self.cells.is_empty() { now_ms - fade } else { now_ms };
                        self.transition = Some(Transition {
                            target,
                            phase: TransitionPhase::FadingOut { since },
                        });
                        continue;
                    }
                    None => {
                        if let Some(symbols) = self.pending_symbols.take() {
                            self.rebind_symbols(symbols, pool);
                        }
                        break;
                    }
                }
            };

            match phase {
                TransitionPhase::FadingOut { since } => {
                    let elapsed = now_ms - since;
                    self.grid_alpha = self.grid_alpha.min(1.0 - easing.progress(elapsed, fade));
                    if fade > 0.0 && elapsed < fade {
                        break;
                    }
                    self.swap(target, pool, resize);
                    self.transition = Some(Transition {
                        target,
                        phase: TransitionPhase::FadingIn { since: since + fade },
                    });
                }
                TransitionPhase::FadingIn { since } => {
                    let elapsed = now_ms - since;
                    self.grid_alpha = easing.progress(elapsed, fade);
                    if fade > 0.0 && elapsed < fade {
                        break;
                    }
                    self.grid_alpha = 1.0;
                    self.transition = None;
                    log::info!(
                        "Grid {}x{} ready ({} sprites)",
                        target.reels,
                        target.rows,
                        self.cells.len()
                    );
                    events.push(PreviewEvent::GridUpdated {
                        reels: target.reels,
                        rows: target.rows,
                    });
                }
            }
        }
        events
    }

    /// Release every sprite, lay out `target` and fill it again
    fn swap(&mut self, target: GridConfiguration, pool: &mut SymbolPool, resize: &mut ResizeController) {
        pool.release_all();
        self.cells.clear();
        if let Some(symbols) = self.pending_symbols.take() {
            self.symbols = symbols;
        }

        self.retain_symbol_textures(pool);

        let layout = resize.compute_layout(&target);
        self.grid = Some(target);
        self.layout = Some(layout);
        self.motion = vec![ColumnMotion::default(); target.reels as usize];
        self.highlight = None;

        let n = self.symbols.len();
        for col in 0..target.reels {
            for row in 0..target.rows {
                let symbol_index = symbol_index_for(col as usize, row as usize, n);
                let key = key_for(&self.symbols, symbol_index);
                match pool.acquire(&key) {
                    Ok(sprite) => self.cells.push(Cell {
                        position: GridPosition::new(col, row),
                        sprite,
                        symbol_index,
                    }),
                    Err(err) => log::warn!("Cell ({}, {}) left empty: {}", col, row, err),
                }
            }
        }
        self.position_cells(pool);
        log::debug!(
            "Swapped to {}x{}: cell {:.1}px at ({:.1}, {:.1})",
            target.reels,
            target.rows,
            layout.cell_size,
            layout.grid_origin_x,
            layout.grid_origin_y
        );
    }

    fn position_cells(&self, pool: &mut SymbolPool) {
        let Some(layout) = self.layout else {
            return;
        };
        for cell in &self.cells {
            let rect = layout.cell_rect(cell.position.col as usize, cell.position.row as usize);
            if let Some(sprite) = pool.sprite_mut(cell.sprite) {
                sprite.position = cell.position;
                sprite.pixel_position = Vec2::new(rect.x, rect.y);
                sprite.size = layout.cell_size;
            }
        }
    }

    /// Move cells to a new layout without touching the pool
    pub fn relayout(&mut self, layout: LayoutResult, container: ContainerSize, pool: &mut SymbolPool) {
        self.layout = Some(layout);
        self.container = container;
        self.position_cells(pool);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SYMBOLS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Swap the symbol list. Rebinds in place when the grid is settled and
    /// `defer` is false; otherwise held until the grid settles.
    pub fn update_symbols(&mut self, symbols: Vec<SymbolDescriptor>, pool: &mut SymbolPool, defer: bool) -> SymbolUpdate {
        let busy = defer || !self.is_settled() || self.grid.is_none();
        if busy {
            // A later list always replaces an earlier deferred one
            if symbols == self.symbols {
                self.pending_symbols = None;
                return SymbolUpdate::Unchanged;
            }
            self.pending_symbols = Some(symbols);
            return SymbolUpdate::Deferred;
        }
        if symbols == self.symbols {
            return SymbolUpdate::Unchanged;
        }
        self.rebind_symbols(symbols, pool);
        SymbolUpdate::Rebound
    }

    fn rebind_symbols(&mut self, symbols: Vec<SymbolDescriptor>, pool: &mut SymbolPool) {
        if symbols == self.symbols {
            return;
        }
        self.symbols = symbols;
        self.retain_symbol_textures(pool);
        let n = self.symbols.len();
        for cell in &mut self.cells {
            let index = symbol_index_for(cell.position.col as usize, cell.position.row as usize, n);
            cell.symbol_index = index;
            pool.rebind(cell.sprite, &key_for(&self.symbols, index));
        }
        log::debug!("Rebound {} cells to {} symbols", self.cells.len(), n);
    }

    /// Every symbol can scroll through a reel, so all of their textures stay cached
    fn retain_symbol_textures(&self, pool: &mut SymbolPool) {
        let keys: Vec<TextureKey> = self.symbols.iter().map(SymbolDescriptor::texture_key).collect();
        pool.retain_textures(&keys);
    }

    /// Texture key of every cell, column-major
    pub fn bound_keys(&self, pool: &SymbolPool) -> Vec<TextureKey> {
        self.cells
            .iter()
            .filter_map(|cell| pool.sprite(cell.sprite))
            .map(|sprite| sprite.texture_key.clone())
            .collect()
    }

    /// Drawable texture of every cell, column-major
    pub fn bound_textures(&self, pool: &SymbolPool) -> Vec<Arc<Texture>> {
        self.cells
            .iter()
            .filter_map(|cell| pool.texture_for(cell.sprite))
            .collect()
    }

    /// Symbol index per reel, per row
    pub fn symbol_grid(&self) -> Vec<Vec<usize>> {
        let Some(grid) = self.grid else {
            return Vec::new();
        };
        let mut out = vec![vec![0; grid.rows as usize]; grid.reels as usize];
        for cell in &self.cells {
            out[cell.position.col as usize][cell.position.row as usize] = cell.symbol_index;
        }
        out
    }

    pub fn categories(&self) -> Vec<SymbolCategory> {
        self.symbols.iter().map(|s| s.category).collect()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ANIMATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Copy reel motion and highlight state onto the grid sprites
    pub fn apply_motion(&mut self, animation: &AnimationController, now_ms: f64, pool: &mut SymbolPool) {
        let Some(layout) = self.layout else {
            return;
        };
        let pitch = layout.cell_pitch();
        let spinning = animation.current_spin_id().is_some();

        for (col, motion) in self.motion.iter_mut().enumerate() {
            let offset = if spinning { animation.reel_offset(col, now_ms) } else { 0.0 };
            let moving = spinning && (animation.reel_in_motion(col, now_ms) || offset > 0.0);
            *motion = ColumnMotion {
                moving,
                offset: offset * pitch,
                incoming: moving.then(|| animation.displayed_symbol(col, -1, now_ms)),
            };
        }

        self.highlight = animation
            .highlight(now_ms)
            .map(|(positions, intensity)| (positions.to_vec(), intensity));

        let idle_grid = animation.grid();
        for cell in &mut self.cells {
            let (col, row) = (cell.position.col as usize, cell.position.row as usize);
            let symbol = if spinning {
                animation.displayed_symbol(col, row as i64, now_ms)
            } else {
                idle_grid
                    .get(col)
                    .and_then(|reel| reel.get(row))
                    .copied()
                    .unwrap_or(cell.symbol_index)
            };
            if symbol != cell.symbol_index {
                cell.symbol_index = symbol;
                pool.rebind(cell.sprite, &key_for(&self.symbols, symbol));
            }

            let offset = self.motion.get(col).map_or(0.0, |m| m.offset);
            let scale = match &self.highlight {
                Some((positions, intensity)) if positions.contains(&cell.position) => 1.0 + HIGHLIGHT_SCALE * intensity,
                _ => 1.0,
            };
            if let Some(sprite) = pool.sprite_mut(cell.sprite) {
                sprite.offset = Vec2::new(0.0, offset);
                sprite.scale = scale;
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPOSITION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Flatten all layers into a draw list
    pub fn compose(&self, pool: &SymbolPool) -> DrawList {
        let mut list = DrawList::new(self.config.background_color);
        let mut layers = Layer::ALL;
        layers.sort_by_key(Layer::z);
        for layer in layers {
            match layer {
                Layer::Background => self.compose_background(&mut list),
                Layer::Grid => self.compose_grid(&mut list, pool),
                Layer::Frame => self.compose_frame(&mut list),
                Layer::Overlay => self.compose_overlay(&mut list),
            }
        }
        list
    }

    fn compose_background(&self, list: &mut DrawList) {
        list.push(DrawCommand::FillRect {
            rect: Rect::new(0.0, 0.0, self.container.width, self.container.height),
            color: self.config.background_color,
        });
        if let Some(layout) = self.layout {
            list.push(DrawCommand::FillRect {
                rect: layout.grid_rect().inflate(layout.cell_padding),
                color: self.config.panel_color,
            });
        }
    }

    fn compose_grid(&self, list: &mut DrawList, pool: &SymbolPool) {
        let Some(layout) = self.layout else {
            return;
        };
        let pitch = layout.cell_pitch();

        for (col, motion) in self.motion.iter().enumerate() {
            let (true, Some(symbol)) = (motion.moving, motion.incoming) else {
                continue;
            };
            let top = layout.cell_rect(col, 0);
            list.push(DrawCommand::Sprite {
                texture: pool.texture(&key_for(&self.symbols, symbol)),
                rect: Rect::new(top.x, top.y - pitch + motion.offset, top.width, top.height),
                alpha: self.grid_alpha,
                clip: Some(layout.column_rect(col)),
            });
        }

        for cell in &self.cells {
            let Some(sprite) = pool.sprite(cell.sprite).filter(|s| s.visible) else {
                continue;
            };
            let col = cell.position.col as usize;
            let position = sprite.pixel_position + sprite.offset;
            let rect = Rect::new(position.x, position.y, sprite.size, sprite.size).scaled(sprite.scale);
            let clip = self
                .motion
                .get(col)
                .filter(|m| m.moving)
                .map(|_| layout.column_rect(col));
            list.push(DrawCommand::Sprite {
                texture: pool.texture(&sprite.texture_key),
                rect,
                alpha: sprite.alpha * self.grid_alpha,
                clip,
            });
        }
    }

    fn compose_frame(&self, list: &mut DrawList) {
        let Some(layout) = self.layout else {
            return;
        };
        let thickness = self.config.frame_thickness;
        if thickness <= 0.0 {
            return;
        }
        list.push(DrawCommand::StrokeRect {
            rect: layout.grid_rect().inflate(layout.cell_padding + thickness),
            color: self.config.frame_color,
            thickness,
        });
    }

    fn compose_overlay(&self, list: &mut DrawList) {
        let (Some(grid), Some(layout), Some((positions, intensity))) =
            (self.grid, self.layout, &self.highlight)
        else {
            return;
        };
        let color = self.config.highlight_color;
        let on_grid = |pos: &&GridPosition| pos.col < grid.reels && pos.row < grid.rows;
        for pos in positions.iter().filter(on_grid) {
            let rect = layout.cell_rect(pos.col as usize, pos.row as usize);
            list.push(DrawCommand::FillRect {
                rect,
                color: color.with_alpha(0.2 * intensity),
            });
            list.push(DrawCommand::StrokeRect {
                rect: rect.inflate(2.0),
                color: color.with_alpha(intensity.max(0.35)),
                thickness: 3.0,
            });
        }
    }

    /// Return every sprite and forget the grid
    pub fn clear(&mut self, pool: &mut SymbolPool) {
        pool.release_all();
        self.cells.clear();
        self.queue.clear();
        self.transition = None;
        self.pending_symbols = None;
        self.highlight = None;
        self.motion.clear();
    }
}

/// Texture key for a symbol index; wraps around short lists
fn key_for(symbols: &[SymbolDescriptor], index: usize) -> TextureKey {
    if symbols.is_empty() {
        return TextureKey::new("empty", None, SymbolCategory::Other);
    }
    symbols[index % symbols.len()].texture_key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ResizeConfig;
    use crate::symbols::SymbolCategory;
    use crate::texture::{MemoryTextureSource, TextureLoader};

    fn symbols(n: usize) -> Vec<SymbolDescriptor> {
        (0..n)
            .map(|i| SymbolDescriptor::new(format!("s{}", i), None, SymbolCategory::Low))
            .collect()
    }

    struct Fixture {
        scene: SceneManager,
        pool: SymbolPool,
        resize: ResizeController,
    }

    fn fixture(fade_ms: f64, n: usize) -> Fixture {
        let container = ContainerSize::new(1280.0, 720.0);
        let config = SceneConfig {
            fade_duration_ms: fade_ms,
            ..SceneConfig::default()
        };
        Fixture {
            scene: SceneManager::new(config, symbols(n), container),
            pool: SymbolPool::new(256, TextureLoader::deferred(Arc::new(MemoryTextureSource::default()))),
            resize: ResizeController::new(ResizeConfig::default(), container),
        }
    }

    impl Fixture {
        fn tick(&mut self, now: f64) -> Vec<PreviewEvent> {
            self.scene.tick(now, &mut self.pool, &mut self.resize, true)
        }
    }

    #[test]
    fn test_layers_strictly_ordered() {
        let zs: Vec<i32> = Layer::ALL.iter().map(Layer::z).collect();
        assert_eq!(zs, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_zero_fade_completes_in_one_tick() {
        let mut f = fixture(0.0, 9);
        f.scene.request_grid(GridConfiguration::standard_5x3());
        let events = f.tick(0.0);
        assert_eq!(events, vec![PreviewEvent::GridUpdated { reels: 5, rows: 3 }]);
        assert_eq!(f.scene.cells().len(), 15);
        assert_eq!(f.pool.in_use_count(), 15);
        assert_eq!(f.scene.grid_alpha(), 1.0);
    }

    #[test]
    fn test_fades_out_then_in() {
        let mut f = fixture(100.0, 4);
        f.scene.request_grid(GridConfiguration::new(3, 3));
        f.tick(0.0);
        assert!(f.tick(100.0).contains(&PreviewEvent::GridUpdated { reels: 3, rows: 3 }));

        f.scene.request_grid(GridConfiguration::new(4, 3));
        f.tick(200.0);
        f.tick(250.0);
        assert!(f.scene.grid_alpha() < 1.0);
        assert_eq!(f.scene.grid().map(|g| g.reels), Some(3));

        f.tick(300.0);
        assert_eq!(f.scene.grid().map(|g| g.reels), Some(4));
        let events = f.tick(400.0);
        assert_eq!(events, vec![PreviewEvent::GridUpdated { reels: 4, rows: 3 }]);
        assert!(f.scene.is_settled());
    }

    #[test]
    fn test_requests_serialized_in_order() {
        let mut f = fixture(50.0, 4);
        f.scene.request_grid(GridConfiguration::new(3, 3));
        f.tick(0.0);
        f.scene.request_grid(GridConfiguration::new(4, 4));
        f.scene.request_grid(GridConfiguration::new(6, 4));
        assert_eq!(f.scene.queued_grids(), 2);

        let mut updates = Vec::new();
        let mut now = 0.0;
        while !f.scene.is_settled() || updates.is_empty() {
            now += 16.0;
            updates.extend(f.tick(now));
        }
        assert_eq!(
            updates,
            vec![
                PreviewEvent::GridUpdated { reels: 3, rows: 3 },
                PreviewEvent::GridUpdated { reels: 4, rows: 4 },
                PreviewEvent::GridUpdated { reels: 6, rows: 4 },
            ]
        );
        assert_eq!(f.pool.in_use_count(), 24);
    }

    #[test]
    fn test_identical_request_is_noop() {
        let mut f = fixture(0.0, 4);
        let grid = GridConfiguration::new(3, 3);
        assert_eq!(f.scene.request_grid(grid), GridRequest::Queued);
        f.tick(0.0);
        let before = f.pool.stats();
        assert_eq!(f.scene.request_grid(grid), GridRequest::Unchanged);
        f.tick(16.0);
        assert_eq!(f.pool.stats(), before);
    }

    #[test]
    fn test_waits_while_start_not_allowed() {
        let mut f = fixture(0.0, 4);
        f.scene.request_grid(GridConfiguration::new(3, 3));
        let events = f.scene.tick(0.0, &mut f.pool, &mut f.resize, false);
        assert!(events.is_empty());
        assert_eq!(f.scene.queued_grids(), 1);
        assert_eq!(f.tick(16.0).len(), 1);
    }

    #[test]
    fn test_symbol_mapping_cycles() {
        let mut f = fixture(0.0, 9);
        f.scene.request_grid(GridConfiguration::standard_5x3());
        f.tick(0.0);
        let keys = f.scene.bound_keys(&f.pool);
        for (i, key) in keys.iter().enumerate() {
            let (col, row) = (i / 3, i % 3);
            assert_eq!(key.symbol_id, format!("s{}", (col + row) % 9));
        }
    }

    #[test]
    fn test_update_symbols_rebinds_in_place() {
        let mut f = fixture(0.0, 4);
        f.scene.request_grid(GridConfiguration::new(3, 3));
        f.tick(0.0);
        let layout = f.scene.layout();
        let stats = f.pool.stats();

        let replacement: Vec<SymbolDescriptor> = (0..4)
            .map(|i| SymbolDescriptor::new(format!("n{}", i), None, SymbolCategory::High))
            .collect();
        assert_eq!(
            f.scene.update_symbols(replacement, &mut f.pool, false),
            SymbolUpdate::Rebound
        );

        let after = f.pool.stats();
        assert_eq!(after.acquisitions, stats.acquisitions);
        assert_eq!(after.releases, stats.releases);
        assert_eq!(f.scene.layout(), layout);
        assert!(f.scene.bound_keys(&f.pool).iter().all(|k| k.symbol_id.starts_with('n')));
    }

    #[test]
    fn test_update_symbols_deferred_during_transition() {
        let mut f = fixture(100.0, 4);
        f.scene.request_grid(GridConfiguration::new(3, 3));
        f.tick(0.0);
        f.tick(100.0);
        f.scene.request_grid(GridConfiguration::new(4, 3));
        f.tick(120.0);

        let replacement = symbols(2);
        assert_eq!(
            f.scene.update_symbols(replacement.clone(), &mut f.pool, false),
            SymbolUpdate::Deferred
        );
        f.tick(400.0);
        f.tick(600.0);
        assert!(f.scene.is_settled());
        assert_eq!(f.scene.symbols(), replacement.as_slice());
        assert_eq!(f.scene.cells().len(), 12);
    }

    #[test]
    fn test_relayout_keeps_pool() {
        let mut f = fixture(0.0, 4);
        let grid = GridConfiguration::new(3, 3);
        f.scene.request_grid(grid);
        f.tick(0.0);
        let stats = f.pool.stats();

        let container = ContainerSize::new(800.0, 600.0);
        f.resize.apply_immediately(container);
        let layout = f.resize.compute_layout(&grid);
        f.scene.relayout(layout, container, &mut f.pool);

        assert_eq!(f.pool.stats(), stats);
        let first = f.scene.cells()[0].sprite;
        let sprite = f.pool.sprite(first).unwrap();
        assert_eq!(sprite.pixel_position.x, layout.grid_origin_x);
        assert_eq!(sprite.size, layout.cell_size);
    }

    #[test]
    fn test_compose_layers() {
        let mut f = fixture(0.0, 4);
        f.scene.request_grid(GridConfiguration::new(3, 3));
        f.tick(0.0);
        let list = f.scene.compose(&f.pool);

        assert_eq!(list.sprite_count(), 9);
        assert!(matches!(list.commands.first(), Some(DrawCommand::FillRect { .. })));
        assert!(matches!(list.commands.last(), Some(DrawCommand::StrokeRect { .. })));
    }

    #[test]
    fn test_every_symbol_texture_cached_for_reel_strips() {
        let mut f = fixture(0.0, 9);
        f.scene.request_grid(GridConfiguration::new(3, 1));
        f.tick(0.0);
        assert_eq!(f.pool.in_use_count(), 3);
        for symbol in symbols(9) {
            assert!(f.pool.texture_origin(&symbol.texture_key()).is_some());
        }

        let replacement: Vec<SymbolDescriptor> = (0..6)
            .map(|i| SymbolDescriptor::new(format!("n{}", i), None, SymbolCategory::High))
            .collect();
        f.scene.update_symbols(replacement.clone(), &mut f.pool, false);
        for symbol in &replacement {
            assert!(f.pool.texture_origin(&symbol.texture_key()).is_some());
        }
    }

    #[test]
    fn test_overlay_skips_positions_off_grid() {
        let mut f = fixture(0.0, 4);
        f.scene.request_grid(GridConfiguration::new(3, 3));
        f.tick(0.0);

        f.scene.highlight = Some((vec![GridPosition::new(1, 1)], 1.0));
        let on_grid = f.scene.compose(&f.pool).len();

        f.scene.highlight = Some((
            vec![GridPosition::new(1, 1), GridPosition::new(7, 1), GridPosition::new(0, 5)],
            1.0,
        ));
        assert_eq!(f.scene.compose(&f.pool).len(), on_grid);
    }
}
