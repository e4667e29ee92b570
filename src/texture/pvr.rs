//! Legacy PVR container parsing
//!
//! Understands the legacy PVR header in both its V1 (44-byte, no
//! surface-count field) and V2 (52-byte, tagged "PVR!") forms, carrying
//! uncompressed pixel data or PVRTC 2bpp/4bpp blocks, with optional
//! embedded mipmaps and cube-map layout. Header words are stored
//! little-endian; on big-endian hosts the 16-bit pixel data is swapped
//! after extraction.

use crate::render::{CompressedFormat, PixelFormat, PixelType};

use super::TextureError;

const V2_TAG: u32 = 0x2152_5650; // "PVR!"
const V1_HEADER_LEN: u32 = 44;
const V2_HEADER_LEN: u32 = 52;

const FLAG_MIPMAP: u32 = 0x100;
const FLAG_TWIDDLED: u32 = 0x200;
const FLAG_CUBEMAP: u32 = 0x1000;
const FLAG_ALPHA: u32 = 0x8000;
const FLAG_VERTICAL_FLIP: u32 = 0x0001_0000;
const PIXEL_TYPE_MASK: u32 = 0xFF;

const TYPE_RGBA_4444: u32 = 0x10;
const TYPE_RGBA_5551: u32 = 0x11;
const TYPE_RGBA_8888: u32 = 0x12;
const TYPE_RGB_565: u32 = 0x13;
const TYPE_RGB_555: u32 = 0x14;
const TYPE_RGB_888: u32 = 0x15;
const TYPE_I_8: u32 = 0x16;
const TYPE_AI_88: u32 = 0x17;
const TYPE_PVRTC_2: u32 = 0x18;
const TYPE_PVRTC_4: u32 = 0x19;
const TYPE_BGRA_8888: u32 = 0x1A;

/// Pixel layout of a parsed PVR file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvrFormat {
    /// Uncompressed pixels in the given format and packing
    Uncompressed(PixelFormat, PixelType),
    /// PVRTC compressed blocks
    Compressed(CompressedFormat),
}

/// One surface level extracted from a PVR file.
#[derive(Debug, Clone)]
pub struct PvrLevel {
    /// Cube face (0..6) or 0 for 2D
    pub surface: u32,
    /// Mip level, 0 is the base
    pub level: u32,
    /// Level width in pixels
    pub width: u32,
    /// Level height in pixels
    pub height: u32,
    /// Raw pixel or block bytes
    pub data: Vec<u8>,
}

/// A fully parsed PVR file.
#[derive(Debug, Clone)]
pub struct PvrTexture {
    /// Base level width
    pub width: u32,
    /// Base level height
    pub height: u32,
    /// Pixel layout
    pub format: PvrFormat,
    /// Number of surfaces (6 for a cube-map file, 1 otherwise)
    pub surfaces: u32,
    /// Mip levels per surface, including the base
    pub mipmap_levels: u32,
    /// Whether the alpha flag was set
    pub has_alpha: bool,
    /// Whether rows are stored bottom-up
    pub is_flipped_vertically: bool,
    /// All extracted levels, surface-major
    pub levels: Vec<PvrLevel>,
}

impl PvrTexture {
    /// Whether the file carries embedded mipmaps beyond the base level.
    pub fn has_mipmaps(&self) -> bool {
        self.mipmap_levels > 1
    }

    /// Whether the data is PVRTC compressed.
    pub fn is_compressed(&self) -> bool {
        matches!(self.format, PvrFormat::Compressed(_))
    }
}

fn word(bytes: &[u8], index: usize) -> Result<u32, TextureError> {
    let start = index * 4;
    bytes
        .get(start..start + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap_or([0; 4])))
        .ok_or_else(|| TextureError::InvalidPvr("file truncated inside header".into()))
}

fn decode_format(pixel_type: u32) -> Result<(PvrFormat, usize), TextureError> {
    let format = match pixel_type {
        TYPE_RGBA_4444 => (
            PvrFormat::Uncompressed(PixelFormat::Rgba, PixelType::UnsignedShort4444),
            16,
        ),
        TYPE_RGBA_5551 => (
            PvrFormat::Uncompressed(PixelFormat::Rgba, PixelType::UnsignedShort5551),
            16,
        ),
        TYPE_RGBA_8888 => (
            PvrFormat::Uncompressed(PixelFormat::Rgba, PixelType::UnsignedByte),
            32,
        ),
        TYPE_RGB_565 => (
            PvrFormat::Uncompressed(PixelFormat::Rgb, PixelType::UnsignedShort565),
            16,
        ),
        TYPE_RGB_888 => (
            PvrFormat::Uncompressed(PixelFormat::Rgb, PixelType::UnsignedByte),
            24,
        ),
        TYPE_I_8 => (
            PvrFormat::Uncompressed(PixelFormat::Luminance, PixelType::UnsignedByte),
            8,
        ),
        TYPE_AI_88 => (
            PvrFormat::Uncompressed(PixelFormat::LuminanceAlpha, PixelType::UnsignedByte),
            16,
        ),
        TYPE_BGRA_8888 => (
            PvrFormat::Uncompressed(PixelFormat::Bgra, PixelType::UnsignedByte),
            32,
        ),
        TYPE_PVRTC_2 => (PvrFormat::Compressed(CompressedFormat::PvrtcRgba2), 2),
        TYPE_PVRTC_4 => (PvrFormat::Compressed(CompressedFormat::PvrtcRgba4), 4),
        TYPE_RGB_555 => {
            return Err(TextureError::InvalidPvr(
                "RGB555 pixel type is not supported".into(),
            ))
        }
        other => {
            return Err(TextureError::InvalidPvr(format!(
                "unrecognized pixel type {other:#04x}"
            )))
        }
    };
    Ok(format)
}

/// Compressed bytes of one PVRTC level; PVRTC pads small levels up to
/// the minimum block footprint.
fn pvrtc_level_size(format: CompressedFormat, width: u32, height: u32) -> usize {
    let (min_w, min_h) = match format.bits_per_pixel() {
        2 => (16, 8),
        _ => (8, 8),
    };
    (width.max(min_w) as usize * height.max(min_h) as usize * format.bits_per_pixel() as usize) / 8
}

fn uncompressed_level_size(bpp: usize, width: u32, height: u32) -> usize {
    (width as usize * height as usize * bpp) / 8
}

/// Swap 16-bit pixel words in place. No-op on little-endian hosts.
fn correct_pixel_endianness(format: PvrFormat, data: &mut [u8]) {
    if cfg!(target_endian = "big") {
        let is_16bit = matches!(
            format,
            PvrFormat::Uncompressed(
                _,
                PixelType::UnsignedShort565
                    | PixelType::UnsignedShort4444
                    | PixelType::UnsignedShort5551
            )
        );
        if is_16bit {
            for pair in data.chunks_exact_mut(2) {
                pair.swap(0, 1);
            }
        }
    }
}

/// Parse a legacy PVR file.
///
/// V1 headers have no surface-count field; the count is inferred from
/// the cube-map flag (6 faces or 1 surface). A V1 file whose data
/// length disagrees with that inference is rejected as invalid rather
/// than guessed at.
pub fn parse(bytes: &[u8]) -> Result<PvrTexture, TextureError> {
    let header_len = word(bytes, 0)?;
    let (version_surfaces, header_size) = match header_len {
        V1_HEADER_LEN => (None, V1_HEADER_LEN as usize),
        V2_HEADER_LEN => {
            if word(bytes, 11)? != V2_TAG {
                return Err(TextureError::InvalidPvr("bad PVR! signature".into()));
            }
            (Some(word(bytes, 12)?.max(1)), V2_HEADER_LEN as usize)
        }
        other => {
            return Err(TextureError::InvalidPvr(format!(
                "unrecognized header length {other}"
            )))
        }
    };

    let height = word(bytes, 1)?;
    let width = word(bytes, 2)?;
    let mip_count = word(bytes, 3)?;
    let flags = word(bytes, 4)?;
    let data_len = word(bytes, 5)? as usize;

    let (format, bpp) = decode_format(flags & PIXEL_TYPE_MASK)?;
    if flags & FLAG_TWIDDLED != 0 && !matches!(format, PvrFormat::Compressed(_)) {
        return Err(TextureError::InvalidPvr(
            "twiddled uncompressed data is not supported".into(),
        ));
    }

    let is_cube = flags & FLAG_CUBEMAP != 0;
    let surfaces = version_surfaces.unwrap_or(if is_cube { 6 } else { 1 });
    if is_cube && surfaces != 6 {
        return Err(TextureError::InvalidPvr(format!(
            "cube-map file with {surfaces} surfaces"
        )));
    }
    // The legacy header counts mipmaps beyond the base level.
    let mipmap_levels = mip_count + 1;

    let data = bytes
        .get(header_size..)
        .ok_or_else(|| TextureError::InvalidPvr("file truncated after header".into()))?;
    if data.len() < data_len * surfaces as usize {
        return Err(TextureError::InvalidPvr(format!(
            "expected {} data bytes, found {}",
            data_len * surfaces as usize,
            data.len()
        )));
    }

    let mut levels = Vec::new();
    let mut offset = 0usize;
    for surface in 0..surfaces {
        let mut w = width;
        let mut h = height;
        for level in 0..mipmap_levels {
            let size = match format {
                PvrFormat::Compressed(cf) => pvrtc_level_size(cf, w, h),
                PvrFormat::Uncompressed(..) => uncompressed_level_size(bpp, w, h),
            };
            let mut level_data = data
                .get(offset..offset + size)
                .ok_or_else(|| {
                    TextureError::InvalidPvr(format!(
                        "surface {surface} level {level} truncated"
                    ))
                })?
                .to_vec();
            correct_pixel_endianness(format, &mut level_data);
            levels.push(PvrLevel {
                surface,
                level,
                width: w,
                height: h,
                data: level_data,
            });
            offset += size;
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }
    }

    Ok(PvrTexture {
        width,
        height,
        format,
        surfaces,
        mipmap_levels,
        has_alpha: flags & FLAG_ALPHA != 0,
        is_flipped_vertically: flags & FLAG_VERTICAL_FLIP != 0,
        levels,
    })
}
