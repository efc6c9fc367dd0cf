//! # rf-preview — Live Reel-Grid Preview
//!
//! Renders a slot machine's reel grid while a designer edits it: grid shape,
//! symbol art, timing and layout changes show up within a frame or a short
//! fade, and spins play through start, spin, anticipation, landing and stop.
//!
//! ## Parts
//!
//! 1. **SymbolPool** - capped sprite instances, shared texture cache, async loads
//! 2. **ResizeController** - debounced container sizes, per-device layout
//! 3. **SceneManager** - grid transitions, layer ordering, draw list
//! 4. **AnimationController** - deterministic spin state machine
//! 5. **RendererHost** - backend negotiation and context-loss recovery
//!
//! [`PreviewEngine`] ties them together behind one command/event surface.
//! Nothing in it panics on bad input; only the loss of rendering is reported
//! to the host, as [`PreviewEvent::RenderUnavailable`].

pub mod animation;
pub mod config;
pub mod easing;
pub mod engine;
pub mod error;
pub mod events;
pub mod host;
pub mod layout;
pub mod pool;
pub mod render;
pub mod scene;
pub mod symbols;
pub mod texture;

pub use animation::{
    AnimationController, AnimationEvent, AnimationPhase, AnimationState, AnimationTiming,
    SpinOutcome, TimingProfile,
};
pub use config::*;
pub use easing::Easing;
pub use engine::{ConfigChanges, PreviewEngine};
pub use error::{PreviewError, PreviewResult};
pub use events::{EventBus, PreviewEvent};
pub use host::{FrameOutcome, HostState, RendererHost};
pub use layout::{
    ContainerSize, DeviceLayoutProfile, LayoutResult, ResizeConfig, ResizeController,
    ResizeProposal,
};
pub use pool::{PoolStats, SpriteId, SpriteInstance, SymbolPool};
pub use render::{
    BackendFactory, BackendKind, Color, DrawCommand, DrawList, Rect, RenderBackend,
    SoftwareBackend, SoftwareFactory, SurfaceInfo,
};
pub use scene::{GridRequest, Layer, SceneConfig, SceneManager, SymbolUpdate};
pub use symbols::{GridPosition, SymbolCategory, SymbolDescriptor};
pub use texture::{
    FileTextureSource, LoadMode, MemoryTextureSource, Texture, TextureKey, TextureLoader,
    TextureOrigin, TextureSource,
};

#[cfg(feature = "gpu")]
pub use render::{GpuBackend, GpuFactory};
