//! Render surface ownership and backend recovery
//!
//! The backend is chosen once, by trying factories in preference order. After
//! that the host only ever goes back to the factory it committed to, and only
//! to recover from a failed frame:
//!
//! ```text
//! Ready ──failure──▶ reinit ──ok──▶ Ready (failures = 1)
//!                      │                 │
//!                      err          next frame fails
//!                      ▼                 ▼
//!                  Unavailable ◀─────────┘
//! ```
//!
//! A successful frame clears the failure count.

use crate::config::Viewport;
use crate::error::{PreviewError, PreviewResult};
use crate::render::{BackendFactory, BackendKind, DrawList, RenderBackend, SurfaceInfo};

/// Failures in a row that end rendering
const MAX_CONSECUTIVE_FAILURES: u32 = 2;

/// Host lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostState {
    Ready,
    /// Terminal; the host shows a non-graphical fallback
    Unavailable { reason: String },
    /// Shut down by the owner
    Stopped,
}

/// What happened to one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    /// Frame lost, surface recreated for the next one
    Recovered { generation: u32 },
    /// Rendering just became unavailable
    Unavailable { reason: String },
    /// Not rendering (unavailable or stopped)
    Skipped,
}

/// Owns the one render surface of an engine
pub struct RendererHost {
    factories: Vec<Box<dyn BackendFactory>>,
    committed: Option<usize>,
    backend: Option<Box<dyn RenderBackend>>,
    viewport: Viewport,
    generation: u32,
    consecutive_failures: u32,
    state: HostState,
    frames_rendered: u64,
    reinitializations: u32,
}

impl RendererHost {
    /// Try `factories` in order and commit to the first that works
    pub fn negotiate(factories: Vec<Box<dyn BackendFactory>>, viewport: Viewport) -> Self {
        let mut committed = None;
        let mut backend = None;
        let mut errors = Vec::new();

        for (index, factory) in factories.iter().enumerate() {
            match factory.create(&viewport, 0) {
                Ok(created) => {
                    log::info!(
                        "Render backend: {:?} ({}x{} @ {}x)",
                        factory.kind(),
                        created.surface().width,
                        created.surface().height,
                        viewport.effective_pixel_ratio()
                    );
                    committed = Some(index);
                    backend = Some(created);
                    break;
                }
                Err(err) => {
                    log::warn!("{:?} backend unavailable: {}", factory.kind(), err);
                    errors.push(format!("{:?}: {}", factory.kind(), err));
                }
            }
        }

        let state = if backend.is_some() {
            HostState::Ready
        } else {
            let reason = if errors.is_empty() {
                "no render backends configured".to_owned()
            } else {
                errors.join("; ")
            };
            log::error!("No render backend available: {}", reason);
            HostState::Unavailable { reason }
        };

        Self {
            factories,
            committed,
            backend,
            viewport,
            generation: 0,
            consecutive_failures: 0,
            state,
            frames_rendered: 0,
            reinitializations: 0,
        }
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    pub fn is_available(&self) -> bool {
        self.state == HostState::Ready
    }

    /// Reason rendering stopped, if it did
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            HostState::Unavailable { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.committed.and_then(|i| self.factories.get(i)).map(|f| f.kind())
    }

    pub fn surface(&self) -> Option<SurfaceInfo> {
        self.backend.as_ref().map(|b| b.surface())
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn reinitializations(&self) -> u32 {
        self.reinitializations
    }

    /// Resize the existing surface; never recreates it unless the context is gone
    pub fn resize(&mut self, viewport: Viewport) -> FrameOutcome {
        if viewport == self.viewport {
            return FrameOutcome::Skipped;
        }
        let (width, height) = viewport.physical_size();
        let Some(backend) = self.backend.as_mut() else {
            self.viewport = viewport;
            return FrameOutcome::Skipped;
        };
        let dpr = viewport.effective_pixel_ratio();
        match backend.resize(width, height, dpr) {
            Ok(()) => {
                log::debug!("Surface resized to {}x{} @ {}x", width, height, dpr);
                self.viewport = viewport;
                FrameOutcome::Skipped
            }
            Err(PreviewError::ContextLost) => {
                self.viewport = viewport;
                self.fail(PreviewError::ContextLost)
            }
            Err(err) => {
                log::warn!("Surface keeps its previous size: {}", err);
                FrameOutcome::Skipped
            }
        }
    }

    /// Draw one frame
    pub fn render(&mut self, list: &DrawList) -> FrameOutcome {
        if self.state != HostState::Ready {
            return FrameOutcome::Skipped;
        }
        let Some(backend) = self.backend.as_mut() else {
            return FrameOutcome::Skipped;
        };
        match backend.render(list) {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.frames_rendered += 1;
                FrameOutcome::Rendered
            }
            Err(err) => self.fail(err),
        }
    }

    /// Count a failure and either reinitialise once or give up
    fn fail(&mut self, err: PreviewError) -> FrameOutcome {
        self.consecutive_failures += 1;
        log::warn!(
            "Render failure {} of {}: {}",
            self.consecutive_failures,
            MAX_CONSECUTIVE_FAILURES,
            err
        );
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            return self.give_up(format!("rendering failed twice in a row: {}", err));
        }

        let Some(factory) = self.committed.and_then(|i| self.factories.get(i)) else {
            return self.give_up(format!("no backend to recover: {}", err));
        };
        self.generation += 1;
        self.backend = None;
        match factory.create(&self.viewport, self.generation) {
            Ok(backend) => {
                self.reinitializations += 1;
                log::info!(
                    "Render surface recreated (generation {})",
                    self.generation
                );
                self.backend = Some(backend);
                FrameOutcome::Recovered {
                    generation: self.generation,
                }
            }
            Err(reinit) => self.give_up(format!(
                "reinitialisation after '{}' failed: {}",
                err, reinit
            )),
        }
    }

    fn give_up(&mut self, reason: String) -> FrameOutcome {
        log::error!("Render unavailable: {}", reason);
        self.backend = None;
        self.state = HostState::Unavailable {
            reason: reason.clone(),
        };
        FrameOutcome::Unavailable { reason }
    }

    /// Copy of the last rendered frame (RGBA8, physical size)
    pub fn read_pixels(&mut self) -> PreviewResult<Vec<u8>> {
        match self.backend.as_mut() {
            Some(backend) => backend.read_pixels(),
            None => Err(PreviewError::RenderUnavailable(
                self.unavailable_reason()
                    .unwrap_or("render surface released")
                    .to_owned(),
            )),
        }
    }

    /// Release the surface; later frames are skipped
    pub fn shutdown(&mut self) {
        if self.backend.take().is_some() {
            log::info!("Render surface released after {} frames", self.frames_rendered);
        }
        if self.state == HostState::Ready {
            self.state = HostState::Stopped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Color, SoftwareFactory};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Factory whose backends lose their context on scripted frames
    struct FlakyFactory {
        kind: BackendKind,
        fail_create: bool,
        /// Frames (counted across all backends) that report ContextLost
        lose_on: Vec<u32>,
        frames: Arc<AtomicU32>,
        creations: Arc<AtomicU32>,
    }

    impl FlakyFactory {
        fn new(lose_on: Vec<u32>) -> Self {
            Self {
                kind: BackendKind::Gpu,
                fail_create: false,
                lose_on,
                frames: Arc::new(AtomicU32::new(0)),
                creations: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    struct FlakyBackend {
        lose_on: Vec<u32>,
        frames: Arc<AtomicU32>,
        generation: u32,
    }

    impl RenderBackend for FlakyBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Gpu
        }
        fn resize(&mut self, _: u32, _: u32, _: f32) -> PreviewResult<()> {
            Ok(())
        }
        fn render(&mut self, _: &DrawList) -> PreviewResult<()> {
            let frame = self.frames.fetch_add(1, Ordering::SeqCst);
            if self.lose_on.contains(&frame) {
                Err(PreviewError::ContextLost)
            } else {
                Ok(())
            }
        }
        fn surface(&self) -> SurfaceInfo {
            SurfaceInfo {
                kind: BackendKind::Gpu,
                width: 1,
                height: 1,
                device_pixel_ratio: 1.0,
                generation: self.generation,
            }
        }
        fn read_pixels(&mut self) -> PreviewResult<Vec<u8>> {
            Ok(vec![0; 4])
        }
    }

    impl BackendFactory for FlakyFactory {
        fn kind(&self) -> BackendKind {
            self.kind
        }
        fn create(&self, _: &Viewport, generation: u32) -> PreviewResult<Box<dyn RenderBackend>> {
            self.creations.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(PreviewError::BackendInit("no adapter".into()));
            }
            Ok(Box::new(FlakyBackend {
                lose_on: self.lose_on.clone(),
                frames: Arc::clone(&self.frames),
                generation,
            }))
        }
    }

    fn frame() -> DrawList {
        DrawList::new(Color::BLACK)
    }

    fn viewport() -> Viewport {
        Viewport::new(64.0, 32.0, 1.0)
    }

    #[test]
    fn test_prefers_first_working_factory() {
        let broken = FlakyFactory {
            fail_create: true,
            ..FlakyFactory::new(vec![])
        };
        let host = RendererHost::negotiate(vec![Box::new(broken), Box::new(SoftwareFactory)], viewport());
        assert!(host.is_available());
        assert_eq!(host.backend_kind(), Some(BackendKind::Software));
    }

    #[test]
    fn test_no_backend_is_unavailable() {
        let host = RendererHost::negotiate(Vec::new(), viewport());
        assert!(!host.is_available());
        assert!(host.unavailable_reason().is_some());
    }

    #[test]
    fn test_single_loss_recovers() {
        let factory = FlakyFactory::new(vec![1]);
        let creations = Arc::clone(&factory.creations);
        let mut host = RendererHost::negotiate(vec![Box::new(factory)], viewport());

        assert_eq!(host.render(&frame()), FrameOutcome::Rendered);
        assert_eq!(host.render(&frame()), FrameOutcome::Recovered { generation: 1 });
        assert_eq!(host.render(&frame()), FrameOutcome::Rendered);
        assert_eq!(host.surface().map(|s| s.generation), Some(1));
        assert_eq!(creations.load(Ordering::SeqCst), 2);
        assert!(host.is_available());
    }

    #[test]
    fn test_loss_on_next_frame_is_fatal() {
        let factory = FlakyFactory::new(vec![0, 1]);
        let mut host = RendererHost::negotiate(vec![Box::new(factory)], viewport());

        assert!(matches!(host.render(&frame()), FrameOutcome::Recovered { .. }));
        assert!(matches!(host.render(&frame()), FrameOutcome::Unavailable { .. }));
        assert_eq!(host.render(&frame()), FrameOutcome::Skipped);
        assert!(!host.is_available());
        assert!(host.read_pixels().is_err());
    }

    #[test]
    fn test_separated_losses_each_recover() {
        let factory = FlakyFactory::new(vec![0, 2, 4]);
        let mut host = RendererHost::negotiate(vec![Box::new(factory)], viewport());
        for _ in 0..6 {
            host.render(&frame());
        }
        assert!(host.is_available());
        assert_eq!(host.reinitializations(), 3);
    }

    #[test]
    fn test_resize_keeps_surface() {
        let mut host = RendererHost::negotiate(vec![Box::new(SoftwareFactory)], viewport());
        host.resize(Viewport::new(100.5, 50.0, 2.0));
        let surface = host.surface().unwrap();
        assert_eq!((surface.width, surface.height), (201, 100));
        assert_eq!(surface.generation, 0);
    }

    #[test]
    fn test_shutdown_skips_frames() {
        let mut host = RendererHost::negotiate(vec![Box::new(SoftwareFactory)], viewport());
        host.shutdown();
        assert_eq!(host.state(), &HostState::Stopped);
        assert_eq!(host.render(&frame()), FrameOutcome::Skipped);
    }
}
