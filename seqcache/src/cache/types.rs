//! Core types for the frame cache: keys, pass types, render contexts and errors.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::BitOr;
use std::path::PathBuf;
use thiserror::Error;

/// Stable identity of a strip on the timeline.
///
/// Strips are compared by handle, never by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StripId(pub u64);

/// Identity of the scene that owns a render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u64);

/// Stage of the render pipeline a cached buffer represents.
///
/// Discriminants match the external bitmask representation used by
/// configuration files and per-strip overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PassType {
    /// Decoded source media, before any strip modifiers.
    Raw,
    /// Source after strip modifiers and transforms.
    Preprocessed,
    /// Strip blended over everything below it.
    Composite,
    /// Final output for a timeline frame.
    FinalOut,
    /// Timeline thumbnail.
    Thumbnail,
}

impl PassType {
    /// All pass types in pipeline order.
    pub const ALL: [PassType; 5] = [
        PassType::Raw,
        PassType::Preprocessed,
        PassType::Composite,
        PassType::FinalOut,
        PassType::Thumbnail,
    ];

    /// Bit value of this pass type in the external bitmask.
    pub const fn bit(self) -> u8 {
        match self {
            PassType::Raw => 1,
            PassType::Preprocessed => 2,
            PassType::Composite => 4,
            PassType::FinalOut => 8,
            PassType::Thumbnail => 16,
        }
    }

    /// Look up a pass type from a single bit value.
    pub fn from_bit(bit: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.bit() == bit)
    }

    /// Lowercase name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            PassType::Raw => "raw",
            PassType::Preprocessed => "preprocessed",
            PassType::Composite => "composite",
            PassType::FinalOut => "final_out",
            PassType::Thumbnail => "thumbnail",
        }
    }

    /// Parse a configuration name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for PassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of pass types.
///
/// Converts to and from the external bitmask at configuration boundaries;
/// inside the cache it is only queried through `contains`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PassTypeSet(u8);

impl PassTypeSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every pass type.
    pub const fn all() -> Self {
        Self(0b1_1111)
    }

    /// Build a set from an external bitmask. Unknown bits are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1_1111)
    }

    /// External bitmask representation.
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, pass: PassType) -> bool {
        self.0 & pass.bit() != 0
    }

    pub fn insert(&mut self, pass: PassType) {
        self.0 |= pass.bit();
    }

    pub fn remove(&mut self, pass: PassType) {
        self.0 &= !pass.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Intersection of two sets.
    pub fn intersection(self, other: PassTypeSet) -> Self {
        Self(self.0 & other.0)
    }

    /// Iterate members in pipeline order.
    pub fn iter(self) -> impl Iterator<Item = PassType> {
        PassType::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl From<PassType> for PassTypeSet {
    fn from(pass: PassType) -> Self {
        Self(pass.bit())
    }
}

impl FromIterator<PassType> for PassTypeSet {
    fn from_iter<I: IntoIterator<Item = PassType>>(iter: I) -> Self {
        let mut set = Self::empty();
        for pass in iter {
            set.insert(pass);
        }
        set
    }
}

impl BitOr for PassType {
    type Output = PassTypeSet;

    fn bitor(self, rhs: PassType) -> PassTypeSet {
        PassTypeSet(self.bit() | rhs.bit())
    }
}

impl BitOr<PassType> for PassTypeSet {
    type Output = PassTypeSet;

    fn bitor(self, rhs: PassType) -> PassTypeSet {
        PassTypeSet(self.0 | rhs.bit())
    }
}

impl BitOr for PassTypeSet {
    type Output = PassTypeSet;

    fn bitor(self, rhs: PassTypeSet) -> PassTypeSet {
        PassTypeSet(self.0 | rhs.0)
    }
}

/// Output parameters a cached buffer was rendered for.
///
/// Two contexts are equal only if every field matches exactly; the shutter
/// angle is compared bitwise.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Preview resolution as a percentage of full size
    pub preview_percent: u32,
    /// Motion-blur shutter angle
    pub motion_blur_shutter: f32,
    /// Motion-blur sample count
    pub motion_blur_samples: u32,
    /// Stereo view index
    pub view_id: u32,
    /// Scene the render belongs to
    pub scene: SceneId,
}

impl RenderContext {
    /// Context for a full-resolution render without motion blur.
    pub fn new(scene: SceneId, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            preview_percent: 100,
            motion_blur_shutter: 0.0,
            motion_blur_samples: 0,
            view_id: 0,
            scene,
        }
    }

    pub fn with_preview_percent(mut self, percent: u32) -> Self {
        self.preview_percent = percent;
        self
    }

    pub fn with_view(mut self, view_id: u32) -> Self {
        self.view_id = view_id;
        self
    }

    pub fn with_motion_blur(mut self, shutter: f32, samples: u32) -> Self {
        self.motion_blur_shutter = shutter;
        self.motion_blur_samples = samples;
        self
    }
}

impl PartialEq for RenderContext {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.preview_percent == other.preview_percent
            && self.motion_blur_shutter.to_bits() == other.motion_blur_shutter.to_bits()
            && self.motion_blur_samples == other.motion_blur_samples
            && self.view_id == other.view_id
            && self.scene == other.scene
    }
}

impl Eq for RenderContext {}

impl Hash for RenderContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.width.hash(state);
        self.height.hash(state);
        self.preview_percent.hash(state);
        self.motion_blur_shutter.to_bits().hash(state);
        self.motion_blur_samples.hash(state);
        self.view_id.hash(state);
        self.scene.hash(state);
    }
}

/// Per-request rendering state handed to `get`/`put`.
///
/// Only `context` takes part in key identity; the flags decide whether the
/// cache is consulted at all.
#[derive(Debug, Clone, Copy)]
pub struct RenderData {
    /// Output parameters
    pub context: RenderContext,
    /// Worker that issued the request
    pub task_id: u32,
    /// Bypass the cache entirely
    pub skip_cache: bool,
    /// Proxy build pass; never cached
    pub is_proxy_render: bool,
    /// Request issued by the background prefetch job
    pub is_prefetch_render: bool,
}

impl RenderData {
    pub fn new(context: RenderContext) -> Self {
        Self {
            context,
            task_id: 0,
            skip_cache: false,
            is_proxy_render: false,
            is_prefetch_render: false,
        }
    }

    pub fn with_task(mut self, task_id: u32) -> Self {
        self.task_id = task_id;
        self
    }

    pub fn prefetch(mut self) -> Self {
        self.is_prefetch_render = true;
        self
    }

    /// Whether this request must not touch the cache.
    pub fn bypasses_cache(&self) -> bool {
        self.skip_cache || self.is_proxy_render
    }
}

/// Identifies one cached artifact.
///
/// Equality and hashing cover strip, context, frame index and pass type.
/// `timeline_frame` rides along for eviction and invalidation tests only.
#[derive(Debug, Clone, Copy)]
pub struct CacheKey {
    /// Owning strip
    pub strip: StripId,
    /// Output parameters
    pub context: RenderContext,
    /// Media frame for RAW/THUMBNAIL, strip-relative frame otherwise
    pub frame_index: f32,
    /// Timeline position the entry was produced for
    pub timeline_frame: f32,
    /// Pipeline stage
    pub pass: PassType,
}

impl CacheKey {
    pub fn new(
        strip: StripId,
        context: RenderContext,
        frame_index: f32,
        timeline_frame: f32,
        pass: PassType,
    ) -> Self {
        Self {
            strip,
            context,
            // Folds -0.0 into 0.0 so both hash identically.
            frame_index: frame_index + 0.0,
            timeline_frame,
            pass,
        }
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.strip == other.strip
            && self.pass == other.pass
            && self.frame_index.to_bits() == other.frame_index.to_bits()
            && self.context == other.context
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.strip.hash(state);
        self.pass.hash(state);
        self.frame_index.to_bits().hash(state);
        self.context.hash(state);
    }
}

/// Cache-related errors.
///
/// Public cache operations never surface these; they are used inside the
/// subsystem and degrade to misses or no-ops at the boundary.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during disk cache operations
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// A block file header could not be decoded
    #[error("Corrupt cache file header in {path}: {reason}")]
    CorruptHeader { path: PathBuf, reason: String },

    /// A key was inserted while already present
    #[error("Key already cached: strip {strip:?}, frame {frame_index}, pass {pass}")]
    DuplicateKey {
        strip: StripId,
        frame_index: f32,
        pass: PassType,
    },

    /// Pixel data length does not match the declared dimensions
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}
