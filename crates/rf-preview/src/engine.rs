//! Preview engine: the public boundary
//!
//! Owns the pool, layout, scene, animation and render host of one preview and
//! drives them from the host's frame callback. Every command is absorbed:
//! invalid input is logged and ignored, texture problems become fallbacks and
//! only the loss of rendering is escalated (as `RenderUnavailable`).

use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::animation::{AnimationController, AnimationEvent, AnimationState, SpinOutcome};
use crate::config::{DeviceProfile, EngineConfig, GridConfiguration, MAX_DEVICE_PIXEL_RATIO, Viewport};
use crate::error::PreviewResult;
use crate::events::{EventBus, PreviewEvent};
use crate::host::{FrameOutcome, RendererHost};
use crate::layout::{ContainerSize, LayoutResult, ResizeController, ResizeProposal};
use crate::pool::{PoolStats, SymbolPool};
use crate::render::{BackendFactory, DrawList, SoftwareFactory, SurfaceInfo, default_factories};
use crate::scene::{GridRequest, SceneManager, SymbolUpdate};
use crate::symbols::SymbolDescriptor;
use crate::texture::{FileTextureSource, LoadMode, Texture, TextureKey, TextureLoader, TextureSource};

/// Undrained events kept for `drain_events`
const MAX_EVENT_HISTORY: usize = 4096;

/// What `apply` changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigChanges {
    pub grid: bool,
    pub symbols: bool,
    pub viewport: bool,
    pub layout: bool,
    pub scene: bool,
    pub timing: bool,
}

impl ConfigChanges {
    pub fn any(&self) -> bool {
        self.grid || self.symbols || self.viewport || self.layout || self.scene || self.timing
    }
}

/// Real-time reel grid preview
pub struct PreviewEngine {
    config: EngineConfig,
    pool: SymbolPool,
    resize: ResizeController,
    scene: SceneManager,
    animation: AnimationController,
    host: RendererHost,
    events: EventBus,
    history: Receiver<PreviewEvent>,
    clock_ms: f64,
    running: bool,
}

impl PreviewEngine {
    /// Build an engine; fails only on an invalid configuration
    pub fn new(
        config: EngineConfig,
        factories: Vec<Box<dyn BackendFactory>>,
        source: Arc<dyn TextureSource>,
    ) -> PreviewResult<Self> {
        config.validate()?;

        let loader = TextureLoader::new(source, LoadMode::from_workers(config.pool.loader_workers));
        let pool = SymbolPool::new(config.pool.max_pool_size, loader)
            .with_texture_budget(config.pool.texture_budget);
        let container = config.viewport.container();
        let resize = ResizeController::new(config.resize.clone(), container);
        let scene = SceneManager::new(config.scene.clone(), config.symbols.clone(), container);
        let animation = AnimationController::new(config.timing.clone(), config.seed);
        let host = RendererHost::negotiate(factories, config.viewport);

        let events = EventBus::new();
        let history = events.subscribe();

        let mut engine = Self {
            config,
            pool,
            resize,
            scene,
            animation,
            host,
            events,
            history,
            clock_ms: 0.0,
            running: true,
        };

        if let Some(reason) = engine.host.unavailable_reason() {
            let reason = reason.to_owned();
            engine.emit(PreviewEvent::RenderUnavailable { reason });
        }

        let grid = engine.config.grid;
        engine.scene.request_grid(grid);
        engine.advance_scene(0.0);
        log::info!(
            "Preview engine ready: {}x{} grid, {} symbols, {:?} backend",
            grid.reels,
            grid.rows,
            engine.config.symbols.len(),
            engine.host.backend_kind()
        );
        Ok(engine)
    }

    /// Software rendering, images read from disk
    pub fn with_software(config: EngineConfig) -> PreviewResult<Self> {
        Self::new(
            config,
            vec![Box::new(SoftwareFactory)],
            Arc::new(FileTextureSource::new()),
        )
    }

    /// Best backend compiled in, images read from disk
    pub fn with_default_backends(config: EngineConfig) -> PreviewResult<Self> {
        Self::new(config, default_factories(), Arc::new(FileTextureSource::new()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMMANDS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Apply a whole configuration, doing only the work its changes need
    pub fn apply(&mut self, config: EngineConfig) -> PreviewResult<ConfigChanges> {
        config.validate()?;
        let mut changes = ConfigChanges::default();

        if config.pool != self.config.pool {
            log::warn!("Pool settings are fixed for the engine's lifetime; ignoring change");
        }
        if config.seed != self.config.seed {
            log::debug!("Seed change ignored after construction");
        }

        if config.resize != self.config.resize {
            self.resize.set_config(config.resize.clone());
            self.config.resize = config.resize.clone();
            changes.layout = true;
        }
        if config.scene != self.config.scene {
            self.scene.set_config(config.scene.clone());
            self.config.scene = config.scene.clone();
            changes.scene = true;
        }
        if config.timing != self.config.timing {
            self.animation.set_timing(config.timing.clone());
            self.config.timing = config.timing.clone();
            changes.timing = true;
        }
        if config.viewport != self.config.viewport {
            self.set_viewport(config.viewport);
            changes.viewport = true;
        }
        if changes.layout {
            self.relayout();
        }

        // Grid first so a symbol list for the new shape waits for the swap
        if config.grid != self.config.grid {
            changes.grid = self.update_grid(config.grid);
        }
        if config.symbols != self.config.symbols {
            self.update_symbols(config.symbols);
            changes.symbols = true;
        }

        if changes.any() {
            log::debug!("Applied configuration: {:?}", changes);
        }
        Ok(changes)
    }

    /// Reconfigure the grid; returns false if the configuration was rejected
    pub fn update_grid(&mut self, grid: GridConfiguration) -> bool {
        if !self.running {
            return false;
        }
        if let Err(err) = grid.validate() {
            log::warn!("Grid update ignored: {}", err);
            return false;
        }
        if grid.total_positions() > self.pool.max_pool_size() {
            log::warn!(
                "Grid update ignored: {}x{} needs more than {} sprites",
                grid.reels,
                grid.rows,
                self.pool.max_pool_size()
            );
            return false;
        }
        self.config.grid = grid;
        if self.scene.request_grid(grid) == GridRequest::Queued {
            self.advance_scene(self.clock_ms);
        }
        true
    }

    /// Replace the symbol list
    pub fn update_symbols(&mut self, symbols: Vec<SymbolDescriptor>) -> SymbolUpdate {
        if !self.running {
            return SymbolUpdate::Unchanged;
        }
        self.config.symbols = symbols.clone();
        let spinning = !self.animation.is_idle();
        let update = self.scene.update_symbols(symbols, &mut self.pool, spinning);
        if update == SymbolUpdate::Rebound {
            self.sync_animation_grid();
        }
        update
    }

    /// Start a spin, or queue it behind the running cycle / grid change
    pub fn spin(&mut self) {
        self.request_spin(None);
    }

    /// Spin that lands on host-chosen symbols
    pub fn spin_with_outcome(&mut self, outcome: SpinOutcome) {
        self.request_spin(Some(outcome));
    }

    fn request_spin(&mut self, outcome: Option<SpinOutcome>) {
        if !self.running {
            return;
        }
        if !self.animation.is_idle() {
            let events = match outcome {
                Some(outcome) => self.animation.spin_with_outcome(self.clock_ms, outcome),
                None => self.animation.spin(self.clock_ms),
            };
            self.emit_animation(events);
            return;
        }
        if !self.scene.is_settled() || self.scene.has_pending_symbols() {
            log::debug!("Spin queued until the grid settles");
            self.animation.queue_spin(outcome);
            return;
        }
        self.sync_animation_grid();
        let events = match outcome {
            Some(outcome) => self.animation.spin_with_outcome(self.clock_ms, outcome),
            None => self.animation.spin(self.clock_ms),
        };
        self.emit_animation(events);
    }

    /// Override the grid anchor for one device profile (or all)
    pub fn set_centering_ratio(&mut self, x: f32, y: f32, profile: Option<DeviceProfile>) {
        if self.resize.set_centering_ratio(x, y, profile) {
            self.relayout();
        }
    }

    /// Report the observed container size; applied after the debounce window
    pub fn notify_resize(&mut self, width: f32, height: f32, now_ms: f64) -> ResizeProposal {
        let proposal = self.resize.propose(ContainerSize::new(width, height), now_ms);
        if proposal == ResizeProposal::Rejected {
            log::debug!("Resize to {}x{} rejected", width, height);
        }
        proposal
    }

    /// Change the device pixel ratio of the surface
    pub fn set_device_pixel_ratio(&mut self, device_pixel_ratio: f32) {
        if !(device_pixel_ratio > 0.0 && device_pixel_ratio <= MAX_DEVICE_PIXEL_RATIO) {
            log::warn!("Device pixel ratio {} ignored", device_pixel_ratio);
            return;
        }
        let viewport = Viewport {
            device_pixel_ratio,
            ..self.config.viewport
        };
        self.config.viewport = viewport;
        let outcome = self.host.resize(viewport);
        self.report(outcome);
    }

    /// Start loading textures ahead of use; never blocks
    pub fn preload_textures(&mut self, keys: &[TextureKey]) {
        self.pool.preload_textures(keys);
    }

    pub fn preload_symbols(&mut self, symbols: &[SymbolDescriptor]) {
        let keys: Vec<TextureKey> = symbols.iter().map(SymbolDescriptor::texture_key).collect();
        self.pool.preload_textures(&keys);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FRAME
    // ═══════════════════════════════════════════════════════════════════════════

    /// Advance everything to `now_ms` and render one frame
    pub fn frame(&mut self, now_ms: f64) -> FrameOutcome {
        if !self.running {
            return FrameOutcome::Skipped;
        }
        self.clock_ms = self.clock_ms.max(now_ms);
        let now = self.clock_ms;

        self.pool.pump();

        if let Some(size) = self.resize.poll(now) {
            self.apply_container(size);
        }

        self.advance_scene(now);

        if self.animation.is_idle()
            && self.animation.state().queued_spin
            && self.scene.is_settled()
            && !self.scene.has_pending_symbols()
        {
            self.sync_animation_grid();
            let events = self.animation.start_queued(now);
            self.emit_animation(events);
        }

        let events = self.animation.tick(now);
        self.emit_animation(events);
        self.scene.apply_motion(&self.animation, now, &mut self.pool);

        let list = self.scene.compose(&self.pool);
        let outcome = self.host.render(&list);
        self.report(outcome.clone());
        self.trim_history();
        outcome
    }

    /// Cancel loads, drop the surface and return the animation to idle
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.pool.shutdown();
        self.animation.reset();
        self.host.shutdown();
        log::info!("Preview engine shut down at {:.1}ms", self.clock_ms);
    }

    fn advance_scene(&mut self, now_ms: f64) {
        let may_start = self.animation.is_idle();
        let events = self
            .scene
            .tick(now_ms, &mut self.pool, &mut self.resize, may_start);
        let changed = !events.is_empty() || may_start;
        for event in events {
            self.emit(event);
        }
        if changed && self.animation.is_idle() {
            self.sync_animation_grid();
        }
    }

    fn sync_animation_grid(&mut self) {
        if self.scene.grid().is_some() {
            self.animation
                .set_grid(self.scene.symbol_grid(), self.scene.categories());
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        let size = viewport.container();
        if !size.is_valid() {
            log::warn!("Viewport {}x{} ignored", viewport.width, viewport.height);
            return;
        }
        self.config.viewport = viewport;
        if self.resize.apply_immediately(size) {
            self.relayout();
        }
        let outcome = self.host.resize(viewport);
        self.report(outcome);
    }

    /// A debounced container size was accepted
    fn apply_container(&mut self, size: ContainerSize) {
        log::debug!("Container resized to {}x{}", size.width, size.height);
        self.config.viewport.width = size.width;
        self.config.viewport.height = size.height;
        self.relayout();
        let outcome = self.host.resize(self.config.viewport);
        self.report(outcome);
    }

    fn relayout(&mut self) {
        let Some(grid) = self.scene.grid() else {
            return;
        };
        let layout = self.resize.compute_layout(&grid);
        let container = self.resize.container();
        self.scene.relayout(layout, container, &mut self.pool);
    }

    fn report(&mut self, outcome: FrameOutcome) {
        if let FrameOutcome::Unavailable { reason } = outcome {
            self.emit(PreviewEvent::RenderUnavailable { reason });
        }
    }

    fn emit(&self, event: PreviewEvent) {
        self.events.emit(event);
    }

    fn emit_animation(&self, events: Vec<AnimationEvent>) {
        for event in events {
            self.emit(event.into());
        }
    }

    fn trim_history(&self) {
        while self.history.len() > MAX_EVENT_HISTORY {
            if self.history.try_recv().is_err() {
                break;
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Grid currently on screen
    pub fn grid(&self) -> Option<GridConfiguration> {
        self.scene.grid()
    }

    pub fn layout(&self) -> Option<LayoutResult> {
        self.scene.layout()
    }

    pub fn container(&self) -> ContainerSize {
        self.resize.container()
    }

    pub fn animation_state(&self) -> AnimationState {
        self.animation.state()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Textures currently held by the pool cache
    pub fn cached_textures(&self) -> usize {
        self.pool.cached_textures()
    }

    /// Sprites currently placed in the grid
    pub fn sprite_count(&self) -> usize {
        self.pool.in_use_count()
    }

    /// Sprite instances ever allocated
    pub fn allocated_sprites(&self) -> usize {
        self.pool.allocated()
    }

    /// Texture key of each cell, column-major
    pub fn bound_keys(&self) -> Vec<TextureKey> {
        self.scene.bound_keys(&self.pool)
    }

    /// Drawable texture of each cell, column-major
    pub fn bound_textures(&self) -> Vec<Arc<Texture>> {
        self.scene.bound_textures(&self.pool)
    }

    pub fn is_grid_settled(&self) -> bool {
        self.scene.is_settled()
    }

    /// Draw list for the current state, without rendering it
    pub fn compose(&self) -> DrawList {
        self.scene.compose(&self.pool)
    }

    pub fn surface(&self) -> Option<SurfaceInfo> {
        self.host.surface()
    }

    pub fn host(&self) -> &RendererHost {
        &self.host
    }

    pub fn is_render_available(&self) -> bool {
        self.host.is_available()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Last rendered frame as RGBA8 at the physical surface size
    pub fn read_pixels(&mut self) -> PreviewResult<Vec<u8>> {
        self.host.read_pixels()
    }

    /// Wait for background texture loads; headless drivers only
    pub fn wait_for_textures(&mut self, timeout: std::time::Duration) -> bool {
        let idle = self.pool.loader_mut().wait_idle(timeout);
        self.pool.pump();
        idle
    }

    /// New receiver for every event emitted from now on
    pub fn subscribe(&self) -> Receiver<PreviewEvent> {
        self.events.subscribe()
    }

    /// Events emitted since the last drain, oldest first
    pub fn drain_events(&mut self) -> Vec<PreviewEvent> {
        self.history.try_iter().collect()
    }
}

impl Drop for PreviewEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
