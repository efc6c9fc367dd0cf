//! Symbol descriptors supplied by the host

use serde::{Deserialize, Serialize};

use crate::texture::TextureKey;

/// Symbol category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum SymbolCategory {
    /// Wild - substitutes for others
    Wild = 0,
    /// Scatter - pays regardless of position
    Scatter = 1,
    /// High paying
    High = 2,
    /// Medium paying
    Medium = 3,
    /// Low paying
    Low = 4,
    /// Anything else (blanks, custom art)
    #[default]
    Other = 5,
}

impl SymbolCategory {
    /// Upper-case display name, used on fallback placeholders
    pub fn label(&self) -> &'static str {
        match self {
            SymbolCategory::Wild => "WILD",
            SymbolCategory::Scatter => "SCATTER",
            SymbolCategory::High => "HIGH",
            SymbolCategory::Medium => "MED",
            SymbolCategory::Low => "LOW",
            SymbolCategory::Other => "",
        }
    }

    /// Wild and scatter can trigger anticipation
    pub fn is_special(&self) -> bool {
        matches!(self, SymbolCategory::Wild | SymbolCategory::Scatter)
    }
}

/// A symbol as described by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDescriptor {
    /// Unique symbol ID (e.g. "HP1", "wild")
    pub id: String,
    /// Image URI; absence is not an error
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub category: SymbolCategory,
}

impl SymbolDescriptor {
    pub fn new(id: impl Into<String>, image_ref: Option<&str>, category: SymbolCategory) -> Self {
        Self {
            id: id.into(),
            image_ref: image_ref.map(str::to_owned),
            category,
        }
    }

    /// Texture key this symbol binds to
    pub fn texture_key(&self) -> TextureKey {
        TextureKey::new(&self.id, self.image_ref.as_deref(), self.category)
    }
}

/// Index into the symbol list shown at a cell before any spin.
///
/// Cycles through the list when there are fewer symbols than cells.
#[inline]
pub fn symbol_index_for(col: usize, row: usize, symbol_count: usize) -> usize {
    if symbol_count == 0 {
        return 0;
    }
    (col + row) % symbol_count
}

/// A cell position on the reel grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub col: u8,
    pub row: u8,
}

impl GridPosition {
    pub const fn new(col: u8, row: u8) -> Self {
        Self { col, row }
    }
}
