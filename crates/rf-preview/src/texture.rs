//! Symbol textures: loading, caching inputs and generated fallbacks
//!
//! Loads never block the caller. Requests go into a `TextureLoader`, which
//! resolves them either on worker threads or on the frame thread during the
//! next `poll`, and completions are applied per key in whatever order they
//! arrive. A key that cannot be loaded is replaced by a generated fallback
//! block labelled with the symbol's category (or id).

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::error::{PreviewError, PreviewResult};
use crate::render::Color;
use crate::symbols::SymbolCategory;

/// Fallback placeholder size in texels
pub const FALLBACK_SIZE: u32 = 128;

/// Longest label drawn on a fallback placeholder
const MAX_LABEL_CHARS: usize = 8;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

// ═══════════════════════════════════════════════════════════════════════════════
// TEXTURE
// ═══════════════════════════════════════════════════════════════════════════════

/// Where a texture's pixels came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureOrigin {
    /// Decoded from the symbol's image
    Loaded,
    /// Generated because the image was missing or broken
    Fallback,
    /// Shown while a load is outstanding
    Pending,
}

/// RGBA8 texture
#[derive(Clone)]
pub struct Texture {
    id: u64,
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, `width * height * 4` bytes
    pub pixels: Vec<u8>,
    pub origin: TextureOrigin,
    /// Text drawn onto generated placeholders
    pub label: Option<String>,
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("origin", &self.origin)
            .field("label", &self.label)
            .finish()
    }
}

impl Texture {
    /// Wrap decoded RGBA8 pixels
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> PreviewResult<Self> {
        if width == 0 || height == 0 || pixels.len() != (width as usize * height as usize * 4) {
            return Err(PreviewError::TextureLoad {
                key: format!("{}x{}", width, height),
                reason: format!("invalid RGBA buffer of {} bytes", pixels.len()),
            });
        }
        Ok(Self::with_origin(width, height, pixels, TextureOrigin::Loaded))
    }

    /// Single-colour texture
    pub fn solid(width: u32, height: u32, color: Color, origin: TextureOrigin) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let rgba = color.to_rgba8();
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::with_origin(width, height, pixels, origin)
    }

    fn with_origin(width: u32, height: u32, pixels: Vec<u8>, origin: TextureOrigin) -> Self {
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            pixels,
            origin,
            label: None,
        }
    }

    /// Process-unique identity (GPU upload caches key on this)
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Texel at (x, y), clamped to the edges
    #[inline]
    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        let idx = (y * self.width as usize + x) * 4;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Nearest-neighbour sample at normalized (u, v)
    #[inline]
    pub fn sample(&self, u: f32, v: f32) -> [u8; 4] {
        let x = (u.clamp(0.0, 1.0) * self.width as f32) as u32;
        let y = (v.clamp(0.0, 1.0) * self.height as f32) as u32;
        self.texel(x, y)
    }

    fn fill_rect(&mut self, x0: u32, y0: u32, w: u32, h: u32, rgba: [u8; 4]) {
        let x1 = (x0 + w).min(self.width);
        let y1 = (y0 + h).min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                let idx = ((y * self.width + x) * 4) as usize;
                self.pixels[idx..idx + 4].copy_from_slice(&rgba);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXTURE KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Identifies one symbol's texture
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub symbol_id: String,
    pub image_ref: Option<String>,
    pub category: SymbolCategory,
}

impl TextureKey {
    pub fn new(symbol_id: &str, image_ref: Option<&str>, category: SymbolCategory) -> Self {
        Self {
            symbol_id: symbol_id.to_owned(),
            image_ref: image_ref.map(str::to_owned),
            category,
        }
    }

    /// Loadable URI, if any (blank refs count as absent)
    pub fn uri(&self) -> Option<&str> {
        self.image_ref
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    /// Text drawn on this key's fallback block
    pub fn fallback_label(&self) -> String {
        let label = match self.category {
            SymbolCategory::Other => self.symbol_id.to_uppercase(),
            category => category.label().to_owned(),
        };
        label.chars().take(MAX_LABEL_CHARS).collect()
    }
}

impl fmt::Display for TextureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uri() {
            Some(uri) => write!(f, "{} ({})", self.symbol_id, uri),
            None => write!(f, "{} (no image)", self.symbol_id),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FALLBACKS
// ═══════════════════════════════════════════════════════════════════════════════

fn category_color(key: &TextureKey) -> Color {
    match key.category {
        SymbolCategory::Wild => Color::from_hex(0xE8B020),
        SymbolCategory::Scatter => Color::from_hex(0xC040E0),
        SymbolCategory::High => Color::from_hex(0xE04050),
        SymbolCategory::Medium => Color::BLUE,
        SymbolCategory::Low => Color::from_hex(0x40C890),
        SymbolCategory::Other => {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            key.symbol_id.hash(&mut hasher);
            let hash = hasher.finish() as u32;
            // Keep channels in the mid range so white text stays readable
            let r = 0x40 + (hash & 0x7F);
            let g = 0x40 + ((hash >> 8) & 0x7F);
            let b = 0x40 + ((hash >> 16) & 0x7F);
            Color::from_hex((r << 16) | (g << 8) | b)
        }
    }
}

/// Solid block labelled with the symbol's category or id
pub fn generate_fallback(key: &TextureKey) -> Texture {
    let base = category_color(key);
    let mut texture = Texture::solid(FALLBACK_SIZE, FALLBACK_SIZE, base, TextureOrigin::Fallback);

    let border = Color::new(base.r * 0.5, base.g * 0.5, base.b * 0.5, 1.0).to_rgba8();
    let b = FALLBACK_SIZE / 16;
    texture.fill_rect(0, 0, FALLBACK_SIZE, b, border);
    texture.fill_rect(0, FALLBACK_SIZE - b, FALLBACK_SIZE, b, border);
    texture.fill_rect(0, 0, b, FALLBACK_SIZE, border);
    texture.fill_rect(FALLBACK_SIZE - b, 0, b, FALLBACK_SIZE, border);

    let label = key.fallback_label();
    draw_label(&mut texture, &label, [0xFF, 0xFF, 0xFF, 0xFF]);
    texture.label = Some(label);
    texture
}

/// Neutral placeholder shown until a load resolves
pub fn generate_pending(key: &TextureKey) -> Texture {
    let mut texture = Texture::solid(8, 8, Color::from_hex(0x303038), TextureOrigin::Pending);
    texture.label = Some(key.symbol_id.clone());
    texture
}

// 5x7 glyphs, one byte per row, low five bits used
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ' ' => [0; 7],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        _ => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0, 0b00100],
    }
}

/// Centre `label` on the texture, scaled to fit
fn draw_label(texture: &mut Texture, label: &str, rgba: [u8; 4]) {
    let count = label.chars().count() as u32;
    if count == 0 {
        return;
    }
    let pad = texture.width / 8;
    let text_w = count * (GLYPH_W + 1) - 1;
    let scale_x = (texture.width - 2 * pad) / text_w;
    let scale_y = (texture.height * 2 / 5) / GLYPH_H;
    let scale = scale_x.min(scale_y).max(1);

    let total_w = text_w * scale;
    let total_h = GLYPH_H * scale;
    let x0 = texture.width.saturating_sub(total_w) / 2;
    let y0 = texture.height.saturating_sub(total_h) / 2;

    for (i, c) in label.chars().enumerate() {
        let gx = x0 + i as u32 * (GLYPH_W + 1) * scale;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) != 0 {
                    texture.fill_rect(
                        gx + col * scale,
                        y0 + row as u32 * scale,
                        scale,
                        scale,
                        rgba,
                    );
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCES
// ═══════════════════════════════════════════════════════════════════════════════

/// Host-supplied asset access
pub trait TextureSource: Send + Sync {
    fn load(&self, uri: &str) -> PreviewResult<Texture>;
}

fn decode_error(uri: &str, err: impl fmt::Display) -> PreviewError {
    PreviewError::TextureLoad {
        key: uri.to_owned(),
        reason: err.to_string(),
    }
}

/// Decodes PNG/JPEG files from disk
#[derive(Debug, Clone, Default)]
pub struct FileTextureSource {
    root: Option<PathBuf>,
}

impl FileTextureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative URIs against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, uri: &str) -> PathBuf {
        let path = Path::new(uri.strip_prefix("file://").unwrap_or(uri));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl TextureSource for FileTextureSource {
    fn load(&self, uri: &str) -> PreviewResult<Texture> {
        let path = self.resolve(uri);
        let image = image::open(&path).map_err(|e| decode_error(uri, e))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Texture::from_rgba(width, height, rgba.into_raw())
    }
}

enum MemoryEntry {
    Decoded(Texture),
    Encoded(Vec<u8>),
}

/// In-memory assets, for hosts that fetch images themselves
#[derive(Default)]
pub struct MemoryTextureSource {
    entries: HashMap<String, MemoryEntry>,
}

impl MemoryTextureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_texture(mut self, uri: impl Into<String>, texture: Texture) -> Self {
        self.entries.insert(uri.into(), MemoryEntry::Decoded(texture));
        self
    }

    /// Encoded image bytes (PNG, JPEG, ...)
    pub fn with_encoded(mut self, uri: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.entries.insert(uri.into(), MemoryEntry::Encoded(bytes));
        self
    }
}

impl TextureSource for MemoryTextureSource {
    fn load(&self, uri: &str) -> PreviewResult<Texture> {
        match self.entries.get(uri) {
            Some(MemoryEntry::Decoded(texture)) => Ok(texture.clone()),
            Some(MemoryEntry::Encoded(bytes)) => {
                let rgba = image::load_from_memory(bytes)
                    .map_err(|e| decode_error(uri, e))?
                    .to_rgba8();
                let (width, height) = rgba.dimensions();
                Texture::from_rgba(width, height, rgba.into_raw())
            }
            None => Err(decode_error(uri, "not found")),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOADER
// ═══════════════════════════════════════════════════════════════════════════════

/// How load requests are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Resolved on the caller's thread during the next `poll`
    Deferred,
    /// Resolved on worker threads
    Background { workers: usize },
}

impl LoadMode {
    pub fn from_workers(workers: usize) -> Self {
        if workers == 0 {
            LoadMode::Deferred
        } else {
            LoadMode::Background { workers }
        }
    }
}

/// Result of one load request
#[derive(Debug)]
pub struct LoadCompletion {
    pub key: TextureKey,
    pub result: PreviewResult<Texture>,
}

fn load_key(source: &dyn TextureSource, key: &TextureKey) -> PreviewResult<Texture> {
    match key.uri() {
        Some(uri) => source.load(uri),
        None => Err(PreviewError::TextureLoad {
            key: key.symbol_id.clone(),
            reason: "empty image reference".into(),
        }),
    }
}

/// Non-blocking texture load queue
pub struct TextureLoader {
    source: Arc<dyn TextureSource>,
    mode: LoadMode,
    requests_tx: Option<Sender<TextureKey>>,
    completions_tx: Sender<LoadCompletion>,
    completions_rx: Receiver<LoadCompletion>,
    deferred: VecDeque<TextureKey>,
    ready: Vec<LoadCompletion>,
    workers: Vec<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    in_flight: usize,
}

impl TextureLoader {
    pub fn new(source: Arc<dyn TextureSource>, mode: LoadMode) -> Self {
        let (completions_tx, completions_rx) = unbounded();
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut loader = Self {
            source,
            mode,
            requests_tx: None,
            completions_tx,
            completions_rx,
            deferred: VecDeque::new(),
            ready: Vec::new(),
            workers: Vec::new(),
            cancelled,
            in_flight: 0,
        };
        if let LoadMode::Background { workers } = mode {
            loader.spawn_workers(workers.max(1));
        }
        loader
    }

    /// Loader that resolves everything on the frame thread
    pub fn deferred(source: Arc<dyn TextureSource>) -> Self {
        Self::new(source, LoadMode::Deferred)
    }

    fn spawn_workers(&mut self, count: usize) {
        let (requests_tx, requests_rx) = unbounded::<TextureKey>();
        for i in 0..count {
            let rx = requests_rx.clone();
            let tx = self.completions_tx.clone();
            let source = Arc::clone(&self.source);
            let cancelled = Arc::clone(&self.cancelled);
            let spawned = std::thread::Builder::new()
                .name(format!("rf-preview-loader-{}", i))
                .spawn(move || {
                    while let Ok(key) = rx.recv() {
                        if cancelled.load(Ordering::Acquire) {
                            break;
                        }
                        let result = load_key(source.as_ref(), &key);
                        if cancelled.load(Ordering::Acquire) {
                            break;
                        }
                        if tx.send(LoadCompletion { key, result }).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(e) => log::warn!("Texture loader worker {} failed to start: {}", i, e),
            }
        }
        if self.workers.is_empty() {
            log::warn!("No texture loader workers, resolving loads on the frame thread");
            self.mode = LoadMode::Deferred;
        } else {
            self.requests_tx = Some(requests_tx);
        }
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Queue a load; never blocks
    pub fn request(&mut self, key: TextureKey) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        self.in_flight += 1;
        match &self.requests_tx {
            Some(tx) => {
                if let Err(err) = tx.send(key) {
                    // Workers are gone; resolve on this thread instead
                    self.deferred.push_back(err.into_inner());
                }
            }
            None => self.deferred.push_back(key),
        }
    }

    /// Collect completions that are ready
    pub fn poll(&mut self) -> Vec<LoadCompletion> {
        while let Some(key) = self.deferred.pop_front() {
            let result = load_key(self.source.as_ref(), &key);
            self.ready.push(LoadCompletion { key, result });
        }
        self.ready.extend(self.completions_rx.try_iter());

        let done = std::mem::take(&mut self.ready);
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Wait up to `timeout` for background loads; for headless drivers only
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending_count() > self.deferred.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.completions_rx.recv_timeout(remaining) {
                Ok(done) => self.ready.push(done),
                Err(_) => return false,
            }
        }
        true
    }

    /// Requests not yet handed back by `poll`
    pub fn pending_count(&self) -> usize {
        self.in_flight.saturating_sub(self.ready.len())
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    /// Cancel outstanding work; later requests are ignored
    pub fn shutdown(&mut self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.requests_tx = None;
        self.deferred.clear();
        self.ready.clear();
        self.in_flight = 0;
        // Workers exit on their own once the request channel disconnects
        let detached = self.workers.drain(..).count();
        log::debug!("Texture loader shut down ({} workers detached)", detached);
    }
}

impl Drop for TextureLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str, uri: Option<&str>, category: SymbolCategory) -> TextureKey {
        TextureKey::new(id, uri, category)
    }

    #[test]
    fn test_fallback_label_uses_category() {
        let tex = generate_fallback(&key("w1", Some("wild.png"), SymbolCategory::Wild));
        assert_eq!(tex.origin, TextureOrigin::Fallback);
        assert_eq!(tex.label.as_deref(), Some("WILD"));
        assert_eq!(tex.width, FALLBACK_SIZE);
        assert_eq!(tex.pixels.len(), (FALLBACK_SIZE * FALLBACK_SIZE * 4) as usize);
    }

    #[test]
    fn test_fallback_label_uses_id_for_other() {
        let tex = generate_fallback(&key("cherry", None, SymbolCategory::Other));
        assert_eq!(tex.label.as_deref(), Some("CHERRY"));

        let long = generate_fallback(&key("watermelon_slice", None, SymbolCategory::Other));
        assert_eq!(long.label.as_deref(), Some("WATERMEL"));
    }

    #[test]
    fn test_fallback_draws_text() {
        let tex = generate_fallback(&key("w", None, SymbolCategory::Wild));
        let white = tex.pixels.chunks(4).filter(|p| *p == [255u8, 255, 255, 255]).count();
        assert!(white > 0);
    }

    #[test]
    fn test_blank_uri_counts_as_absent() {
        assert_eq!(key("a", Some("  "), SymbolCategory::Low).uri(), None);
        assert_eq!(key("a", Some("a.png"), SymbolCategory::Low).uri(), Some("a.png"));
    }

    #[test]
    fn test_from_rgba_rejects_bad_buffer() {
        assert!(Texture::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(Texture::from_rgba(0, 2, Vec::new()).is_err());
        assert!(Texture::from_rgba(1, 1, vec![1, 2, 3, 4]).is_ok());
    }

    #[test]
    fn test_deferred_loader_resolves_on_poll() {
        let source = MemoryTextureSource::new().with_texture(
            "a.png",
            Texture::solid(2, 2, Color::RED, TextureOrigin::Loaded),
        );
        let mut loader = TextureLoader::deferred(Arc::new(source));
        loader.request(key("a", Some("a.png"), SymbolCategory::High));
        loader.request(key("b", Some("missing.png"), SymbolCategory::Low));
        loader.request(key("c", None, SymbolCategory::Low));
        assert_eq!(loader.pending_count(), 3);

        let done = loader.poll();
        assert_eq!(done.len(), 3);
        assert!(done[0].result.is_ok());
        assert!(done[1].result.is_err());
        assert!(done[2].result.is_err());
        assert!(loader.is_idle());
    }

    #[test]
    fn test_background_loader_completes() {
        let source = MemoryTextureSource::new().with_texture(
            "a.png",
            Texture::solid(2, 2, Color::GREEN, TextureOrigin::Loaded),
        );
        let mut loader = TextureLoader::new(Arc::new(source), LoadMode::Background { workers: 2 });
        for i in 0..4 {
            loader.request(key(&format!("s{}", i), Some("a.png"), SymbolCategory::Low));
        }
        assert!(loader.wait_idle(Duration::from_secs(5)));
        assert_eq!(loader.poll().len(), 4);
        assert!(loader.is_idle());
    }

    #[test]
    fn test_shutdown_ignores_new_requests() {
        let mut loader = TextureLoader::deferred(Arc::new(MemoryTextureSource::new()));
        loader.shutdown();
        loader.request(key("a", Some("a.png"), SymbolCategory::Low));
        assert!(loader.poll().is_empty());
    }

    #[test]
    fn test_memory_source_decodes_png() {
        let mut png = Vec::new();
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let source = MemoryTextureSource::new().with_encoded("x.png", png);
        let tex = source.load("x.png").unwrap();
        assert_eq!((tex.width, tex.height), (3, 2));
        assert_eq!(tex.texel(0, 0), [10, 20, 30, 255]);
    }
}
