//! Symbol sprite pool
//!
//! Sprites are created lazily up to `max_pool_size` and then recycled for
//! the lifetime of the engine. A sprite is owned by the pool while free and
//! by the grid while in use; textures are cached per key and shared by
//! every sprite bound to that key. Keys no sprite is bound to are evicted,
//! least recently used first, once the cache holds more than its budget.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use glam::Vec2;

use crate::error::{PreviewError, PreviewResult};
use crate::symbols::GridPosition;
use crate::texture::{
    Texture, TextureKey, TextureLoader, TextureOrigin, generate_fallback, generate_pending,
};

/// Cached textures kept beyond those bound to sprites
pub const DEFAULT_TEXTURE_BUDGET: usize = 64;

/// Handle to a pooled sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpriteId(u32);

impl SpriteId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Pooled drawable unit
#[derive(Debug, Clone)]
pub struct SpriteInstance {
    pub id: SpriteId,
    pub texture_key: TextureKey,
    /// Cell this sprite occupies while in use
    pub position: GridPosition,
    /// Top-left corner in CSS pixels
    pub pixel_position: Vec2,
    /// Edge length (cells are square)
    pub size: f32,
    pub visible: bool,
    pub in_use: bool,
    pub alpha: f32,
    /// Animation offset added to `pixel_position`
    pub offset: Vec2,
    pub scale: f32,
}

impl SpriteInstance {
    fn new(id: SpriteId, texture_key: TextureKey) -> Self {
        Self {
            id,
            texture_key,
            position: GridPosition::new(0, 0),
            pixel_position: Vec2::ZERO,
            size: 0.0,
            visible: false,
            in_use: false,
            alpha: 1.0,
            offset: Vec2::ZERO,
            scale: 1.0,
        }
    }

    fn reset_transform(&mut self) {
        self.alpha = 1.0;
        self.offset = Vec2::ZERO;
        self.scale = 1.0;
    }
}

/// Pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Sprite instances ever created
    pub allocations: u64,
    pub acquisitions: u64,
    pub releases: u64,
    /// Texture rebinds of a sprite to a different key
    pub rebinds: u64,
    pub texture_loads: u64,
    pub texture_failures: u64,
    /// Unbound textures dropped from the cache
    pub texture_evictions: u64,
}

#[derive(Debug, Clone)]
enum CachedTexture {
    Pending(Arc<Texture>),
    Ready(Arc<Texture>),
    Failed(Arc<Texture>),
}

impl CachedTexture {
    fn texture(&self) -> &Arc<Texture> {
        match self {
            CachedTexture::Pending(t) | CachedTexture::Ready(t) | CachedTexture::Failed(t) => t,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheSlot {
    entry: CachedTexture,
    last_used: u64,
}

/// Symbol sprite pool with a shared texture cache
pub struct SymbolPool {
    max_pool_size: usize,
    sprites: Vec<SpriteInstance>,
    /// Released sprites, least recently released first
    free: VecDeque<SpriteId>,
    cache: HashMap<TextureKey, CacheSlot>,
    /// Keys never evicted (the current symbol list)
    retained: HashSet<TextureKey>,
    texture_budget: usize,
    use_clock: u64,
    loader: TextureLoader,
    stats: PoolStats,
}

impl SymbolPool {
    pub fn new(max_pool_size: usize, loader: TextureLoader) -> Self {
        Self {
            max_pool_size: max_pool_size.max(1),
            sprites: Vec::new(),
            free: VecDeque::new(),
            cache: HashMap::new(),
            retained: HashSet::new(),
            texture_budget: DEFAULT_TEXTURE_BUDGET,
            use_clock: 0,
            loader,
            stats: PoolStats::default(),
        }
    }

    pub fn with_texture_budget(mut self, texture_budget: usize) -> Self {
        self.texture_budget = texture_budget;
        self
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SPRITES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Hand out a sprite bound to `key`.
    ///
    /// Prefers a released sprite already bound to `key`, then a new
    /// allocation below the cap, then the least recently released sprite
    /// (rebound). Fails only when every sprite is in use at the cap.
    pub fn acquire(&mut self, key: &TextureKey) -> PreviewResult<SpriteId> {
        self.ensure_texture(key);

        let same_key = self
            .free
            .iter()
            .rposition(|id| self.sprites[id.index()].texture_key == *key);

        let id = if let Some(pos) = same_key {
            self.free.remove(pos).ok_or(PreviewError::PoolExhausted {
                max: self.max_pool_size,
            })?
        } else if self.sprites.len() < self.max_pool_size {
            let id = SpriteId(self.sprites.len() as u32);
            self.sprites.push(SpriteInstance::new(id, key.clone()));
            self.stats.allocations += 1;
            id
        } else if let Some(id) = self.free.pop_front() {
            let sprite = &mut self.sprites[id.index()];
            log::trace!("Rebinding LRU sprite {:?}: {} -> {}", id, sprite.texture_key, key);
            sprite.texture_key = key.clone();
            self.stats.rebinds += 1;
            id
        } else {
            log::warn!("Sprite pool exhausted at {} instances", self.max_pool_size);
            return Err(PreviewError::PoolExhausted {
                max: self.max_pool_size,
            });
        };

        let sprite = &mut self.sprites[id.index()];
        sprite.in_use = true;
        sprite.visible = true;
        sprite.reset_transform();
        self.stats.acquisitions += 1;
        Ok(id)
    }

    /// Return a sprite to the pool; its texture stays cached
    pub fn release(&mut self, id: SpriteId) {
        let Some(sprite) = self.sprites.get_mut(id.index()) else {
            return;
        };
        if !sprite.in_use {
            log::debug!("Ignoring release of free sprite {:?}", id);
            return;
        }
        sprite.in_use = false;
        sprite.visible = false;
        self.free.push_back(id);
        self.stats.releases += 1;
    }

    /// Release every in-use sprite
    pub fn release_all(&mut self) {
        let in_use: Vec<SpriteId> = self
            .sprites
            .iter()
            .filter(|s| s.in_use)
            .map(|s| s.id)
            .collect();
        for id in in_use {
            self.release(id);
        }
        self.evict_unused(0);
    }

    /// Bind an in-use sprite to another texture without touching its place
    pub fn rebind(&mut self, id: SpriteId, key: &TextureKey) {
        let bound = match self.sprites.get(id.index()) {
            Some(sprite) if sprite.in_use => sprite.texture_key == *key,
            _ => return,
        };
        if bound {
            return;
        }
        self.ensure_texture(key);
        self.sprites[id.index()].texture_key = key.clone();
        self.stats.rebinds += 1;
        self.evict_unused(0);
    }

    pub fn sprite(&self, id: SpriteId) -> Option<&SpriteInstance> {
        self.sprites.get(id.index())
    }

    /// Mutable access, only while the sprite is in use
    pub fn sprite_mut(&mut self, id: SpriteId) -> Option<&mut SpriteInstance> {
        self.sprites.get_mut(id.index()).filter(|s| s.in_use)
    }

    pub fn in_use(&self) -> impl Iterator<Item = &SpriteInstance> {
        self.sprites.iter().filter(|s| s.in_use)
    }

    /// Sprite instances currently allocated
    pub fn allocated(&self) -> usize {
        self.sprites.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.sprites.iter().filter(|s| s.in_use).count()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TEXTURES
    // ═══════════════════════════════════════════════════════════════════════════

    fn ensure_texture(&mut self, key: &TextureKey) {
        self.use_clock += 1;
        if let Some(slot) = self.cache.get_mut(key) {
            slot.last_used = self.use_clock;
            return;
        }
        self.evict_unused(1);
        let entry = if key.uri().is_some() {
            self.loader.request(key.clone());
            CachedTexture::Pending(Arc::new(generate_pending(key)))
        } else {
            log::debug!("No image for symbol {}, using fallback", key.symbol_id);
            CachedTexture::Failed(Arc::new(generate_fallback(key)))
        };
        self.cache.insert(
            key.clone(),
            CacheSlot {
                entry,
                last_used: self.use_clock,
            },
        );
    }

    /// Drop least recently used textures no sprite is bound to until
    /// `room` more fit within the budget
    fn evict_unused(&mut self, room: usize) {
        if self.cache.len() + room <= self.texture_budget {
            return;
        }
        let bound: HashSet<&TextureKey> = self.sprites.iter().map(|s| &s.texture_key).collect();
        let mut candidates: Vec<(u64, TextureKey)> = self
            .cache
            .iter()
            .filter(|(key, _)| !bound.contains(key) && !self.retained.contains(*key))
            .map(|(key, slot)| (slot.last_used, key.clone()))
            .collect();
        candidates.sort_unstable_by_key(|(last_used, _)| *last_used);

        let excess = (self.cache.len() + room).saturating_sub(self.texture_budget);
        for (_, key) in candidates.into_iter().take(excess) {
            log::trace!("Evicting texture {}", key);
            self.cache.remove(&key);
            self.stats.texture_evictions += 1;
        }
    }

    /// Start loading textures without binding them; never blocks
    pub fn preload_textures(&mut self, keys: &[TextureKey]) {
        for key in keys {
            self.ensure_texture(key);
        }
    }

    /// Keep exactly `keys` resident regardless of the budget, loading any
    /// that are missing. Keys retained before and not listed become
    /// evictable again.
    pub fn retain_textures(&mut self, keys: &[TextureKey]) {
        self.retained = keys.iter().cloned().collect();
        for key in keys {
            self.ensure_texture(key);
        }
        self.evict_unused(0);
    }

    /// Textures currently cached
    pub fn cached_textures(&self) -> usize {
        self.cache.len()
    }

    pub fn texture_budget(&self) -> usize {
        self.texture_budget
    }

    /// Apply finished loads; returns how many keys resolved
    pub fn pump(&mut self) -> usize {
        let completions = self.loader.poll();
        let resolved = completions.len();
        for done in completions {
            let Some(slot) = self.cache.get_mut(&done.key) else {
                log::trace!("Dropping load of evicted texture {}", done.key);
                continue;
            };
            slot.entry = match done.result {
                Ok(texture) => {
                    self.stats.texture_loads += 1;
                    log::debug!(
                        "Loaded texture {} ({}x{})",
                        done.key,
                        texture.width,
                        texture.height
                    );
                    CachedTexture::Ready(Arc::new(texture))
                }
                Err(err) => {
                    self.stats.texture_failures += 1;
                    log::warn!("Texture {} unavailable, using fallback: {}", done.key, err);
                    CachedTexture::Failed(Arc::new(generate_fallback(&done.key)))
                }
            };
        }
        resolved
    }

    /// Drawable texture for a key (pending placeholder until resolved)
    pub fn texture(&self, key: &TextureKey) -> Arc<Texture> {
        match self.cache.get(key) {
            Some(slot) => Arc::clone(slot.entry.texture()),
            None => Arc::new(generate_fallback(key)),
        }
    }

    /// Drawable texture currently bound to a sprite
    pub fn texture_for(&self, id: SpriteId) -> Option<Arc<Texture>> {
        self.sprite(id).map(|s| self.texture(&s.texture_key))
    }

    pub fn texture_origin(&self, key: &TextureKey) -> Option<TextureOrigin> {
        self.cache.get(key).map(|slot| slot.entry.texture().origin)
    }

    pub fn has_pending_loads(&self) -> bool {
        self.cache
            .values()
            .any(|slot| matches!(slot.entry, CachedTexture::Pending(_)))
    }

    pub fn loader_mut(&mut self) -> &mut TextureLoader {
        &mut self.loader
    }

    /// Cancel in-flight loads
    pub fn shutdown(&mut self) {
        self.loader.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Color;
    use crate::symbols::SymbolCategory;
    use crate::texture::MemoryTextureSource;

    fn key(id: &str, uri: Option<&str>) -> TextureKey {
        TextureKey::new(id, uri, SymbolCategory::Low)
    }

    fn pool(max: usize) -> SymbolPool {
        let source = MemoryTextureSource::new()
            .with_texture("a.png", Texture::solid(2, 2, Color::RED, TextureOrigin::Loaded))
            .with_texture("b.png", Texture::solid(2, 2, Color::GREEN, TextureOrigin::Loaded));
        SymbolPool::new(max, TextureLoader::deferred(Arc::new(source)))
    }

    #[test]
    fn test_acquire_never_exceeds_cap() {
        let mut pool = pool(4);
        let ids: Vec<_> = (0..4)
            .map(|_| pool.acquire(&key("a", Some("a.png"))).unwrap())
            .collect();
        assert_eq!(pool.allocated(), 4);
        assert!(matches!(
            pool.acquire(&key("a", Some("a.png"))),
            Err(PreviewError::PoolExhausted { max: 4 })
        ));

        pool.release(ids[1]);
        let again = pool.acquire(&key("b", Some("b.png"))).unwrap();
        assert_eq!(again, ids[1]);
        assert_eq!(pool.allocated(), 4);
    }

    #[test]
    fn test_released_same_key_is_reused() {
        let mut pool = pool(8);
        let a = pool.acquire(&key("a", Some("a.png"))).unwrap();
        let b = pool.acquire(&key("b", Some("b.png"))).unwrap();
        pool.release(a);
        pool.release(b);

        let reused = pool.acquire(&key("a", Some("a.png"))).unwrap();
        assert_eq!(reused, a);
        assert_eq!(pool.stats().rebinds, 0);
    }

    #[test]
    fn test_cap_reuses_least_recently_released() {
        let mut pool = pool(2);
        let a = pool.acquire(&key("a", Some("a.png"))).unwrap();
        let b = pool.acquire(&key("b", Some("b.png"))).unwrap();
        pool.release(b);
        pool.release(a);

        let c = pool.acquire(&key("c", None)).unwrap();
        assert_eq!(c, b);
        assert_eq!(pool.sprite(c).unwrap().texture_key.symbol_id, "c");
        assert_eq!(pool.stats().rebinds, 1);
    }

    #[test]
    fn test_release_clears_visibility_and_keeps_texture() {
        let mut pool = pool(4);
        let k = key("a", Some("a.png"));
        let id = pool.acquire(&k).unwrap();
        pool.pump();
        pool.release(id);

        let sprite = pool.sprite(id).unwrap();
        assert!(!sprite.visible);
        assert!(!sprite.in_use);
        assert_eq!(pool.texture_origin(&k), Some(TextureOrigin::Loaded));
        assert!(pool.sprite_mut(id).is_none());
    }

    #[test]
    fn test_double_release_is_ignored() {
        let mut pool = pool(4);
        let id = pool.acquire(&key("a", Some("a.png"))).unwrap();
        pool.release(id);
        pool.release(id);
        assert_eq!(pool.stats().releases, 1);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_failed_load_resolves_to_fallback() {
        let mut pool = pool(4);
        let k = TextureKey::new("wild", Some("wild.png"), SymbolCategory::Wild);
        let id = pool.acquire(&k).unwrap();
        assert_eq!(
            pool.texture_for(id).map(|t| t.origin),
            Some(TextureOrigin::Pending)
        );

        assert_eq!(pool.pump(), 1);
        let tex = pool.texture_for(id).unwrap();
        assert_eq!(tex.origin, TextureOrigin::Fallback);
        assert_eq!(tex.label.as_deref(), Some("WILD"));
        assert_eq!(pool.stats().texture_failures, 1);
    }

    #[test]
    fn test_missing_image_ref_is_immediate_fallback() {
        let mut pool = pool(4);
        let k = key("blank", None);
        let id = pool.acquire(&k).unwrap();
        assert_eq!(
            pool.texture_for(id).map(|t| t.origin),
            Some(TextureOrigin::Fallback)
        );
        assert!(!pool.has_pending_loads());
    }

    #[test]
    fn test_preload_failure_does_not_fail_batch() {
        let mut pool = pool(4);
        let keys = [key("a", Some("a.png")), key("x", Some("broken.png")), key("b", Some("b.png"))];
        pool.preload_textures(&keys);
        assert!(pool.has_pending_loads());
        assert_eq!(pool.allocated(), 0);

        assert_eq!(pool.pump(), 3);
        assert_eq!(pool.texture_origin(&keys[0]), Some(TextureOrigin::Loaded));
        assert_eq!(pool.texture_origin(&keys[1]), Some(TextureOrigin::Fallback));
        assert_eq!(pool.texture_origin(&keys[2]), Some(TextureOrigin::Loaded));
    }

    #[test]
    fn test_rebind_only_applies_to_in_use() {
        let mut pool = pool(4);
        let id = pool.acquire(&key("a", Some("a.png"))).unwrap();
        pool.rebind(id, &key("b", Some("b.png")));
        assert_eq!(pool.sprite(id).unwrap().texture_key.symbol_id, "b");

        pool.release(id);
        pool.rebind(id, &key("a", Some("a.png")));
        assert_eq!(pool.sprite(id).unwrap().texture_key.symbol_id, "b");
        assert_eq!(pool.stats().rebinds, 1);
    }

    #[test]
    fn test_texture_cache_stays_within_budget() {
        let mut pool = pool(16);
        for round in 0..50 {
            for i in 0..9 {
                let k = key(&format!("sym{}_{}", round, i), None);
                pool.acquire(&k).unwrap();
            }
            pool.release_all();
            assert!(pool.cached_textures() <= DEFAULT_TEXTURE_BUDGET);
        }
        assert_eq!(pool.allocated(), 16);
        assert!(pool.stats().texture_evictions > 0);

        // Every sprite's texture is still resident
        for id in (0..16).map(SpriteId) {
            let sprite = pool.sprite(id).unwrap();
            assert!(pool.texture_origin(&sprite.texture_key).is_some());
        }
    }

    #[test]
    fn test_eviction_skips_bound_and_retained_keys() {
        let mut pool = pool(4).with_texture_budget(3);
        let bound = key("a", Some("a.png"));
        let kept = key("kept", None);
        let id = pool.acquire(&bound).unwrap();
        pool.retain_textures(std::slice::from_ref(&kept));

        pool.preload_textures(&[key("x", None), key("y", None), key("z", None)]);
        assert!(pool.cached_textures() <= 3);
        assert!(pool.texture_origin(&bound).is_some());
        assert!(pool.texture_origin(&kept).is_some());
        assert!(pool.texture_origin(&key("z", None)).is_some());
        assert!(pool.texture_origin(&key("x", None)).is_none());

        assert_eq!(pool.pump(), 1);
        assert_eq!(pool.texture_for(id).map(|t| t.origin), Some(TextureOrigin::Loaded));
    }

    #[test]
    fn test_load_of_evicted_texture_is_dropped() {
        let mut pool = pool(4).with_texture_budget(1);
        let a = key("a", Some("a.png"));
        pool.preload_textures(std::slice::from_ref(&a));
        pool.preload_textures(&[key("b", None)]);
        assert!(pool.texture_origin(&a).is_none());

        assert_eq!(pool.pump(), 1);
        assert!(pool.texture_origin(&a).is_none());
        assert_eq!(pool.cached_textures(), 1);
    }
}
