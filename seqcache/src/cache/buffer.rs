//! Shared, reference-counted pixel buffers.
//!
//! The store holds one handle per entry and every `get` hands out another,
//! so a buffer stays valid for its reader even if the entry is recycled
//! concurrently.

use std::sync::Arc;

use crate::cache::types::CacheError;

/// Channels per pixel. Rendered frames are always RGBA.
pub const CHANNELS: usize = 4;

/// Storage type of one pixel channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit unsigned channels
    Rgba8,
    /// 32-bit float channels, little-endian
    RgbaF32,
}

impl PixelFormat {
    /// Bytes used by one channel value.
    pub fn bytes_per_channel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 1,
            PixelFormat::RgbaF32 => 4,
        }
    }

    /// Bytes needed for a `width` × `height` image.
    pub fn image_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * CHANNELS * self.bytes_per_channel()
    }

    /// Infer the format of an RGBA image from its raw byte size.
    pub fn from_image_size(width: u32, height: u32, size: usize) -> Option<Self> {
        [PixelFormat::Rgba8, PixelFormat::RgbaF32]
            .into_iter()
            .find(|f| f.image_size(width, height) == size)
    }
}

#[derive(Debug)]
struct ImageData {
    width: u32,
    height: u32,
    format: PixelFormat,
    colorspace: String,
    pixels: Vec<u8>,
}

/// A decoded frame, shared by reference count.
///
/// Cloning is cheap and never copies pixels.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    inner: Arc<ImageData>,
}

impl FrameBuffer {
    /// Wrap pixel data, checking it matches the declared dimensions.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        colorspace: impl Into<String>,
        pixels: Vec<u8>,
    ) -> Result<Self, CacheError> {
        let expected = format.image_size(width, height);
        if pixels.len() != expected {
            return Err(CacheError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            inner: Arc::new(ImageData {
                width,
                height,
                format,
                colorspace: colorspace.into(),
                pixels,
            }),
        })
    }

    /// A buffer with every byte set to `value`.
    pub fn filled(width: u32, height: u32, format: PixelFormat, value: u8) -> Self {
        let pixels = vec![value; format.image_size(width, height)];
        Self {
            inner: Arc::new(ImageData {
                width,
                height,
                format,
                colorspace: String::from("sRGB"),
                pixels,
            }),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn format(&self) -> PixelFormat {
        self.inner.format
    }

    pub fn channels(&self) -> usize {
        CHANNELS
    }

    /// Name of the colorspace the pixels are encoded in.
    pub fn colorspace(&self) -> &str {
        &self.inner.colorspace
    }

    pub fn pixels(&self) -> &[u8] {
        &self.inner.pixels
    }

    /// Bytes charged against the memory budget.
    pub fn size_bytes(&self) -> usize {
        self.inner.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pixels.is_empty()
    }

    /// Whether two handles share the same allocation.
    pub fn ptr_eq(a: &FrameBuffer, b: &FrameBuffer) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Number of live handles, including the store's.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}
