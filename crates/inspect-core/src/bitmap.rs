// ── BMP resolution fields ──
//
// The node returns repeat images without a usable resolution. The
// BITMAPINFOHEADER keeps horizontal and vertical pixels-per-metre as
// little-endian i32 at byte offsets 38 and 42.

const X_PPM: std::ops::Range<usize> = 38..42;
const Y_PPM: std::ops::Range<usize> = 42..46;

/// Minimum length that holds both resolution fields.
pub const MIN_HEADER_LEN: usize = 46;

pub const INCHES_PER_METRE: f64 = 39.3701;

/// `round(dpi * 39.3701)`
#[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
pub fn dpi_to_dpm(dpi: u32) -> i32 {
    (f64::from(dpi) * INCHES_PER_METRE).round() as i32
}

/// Write `dpi` into both resolution fields. Short buffers are left as-is
/// and `false` is returned.
pub fn set_dpi(image: &mut [u8], dpi: u32) -> bool {
    if image.len() < MIN_HEADER_LEN {
        return false;
    }
    let dpm = dpi_to_dpm(dpi).to_le_bytes();
    image[X_PPM].copy_from_slice(&dpm);
    image[Y_PPM].copy_from_slice(&dpm);
    true
}

/// Horizontal resolution of a BMP in dots per inch, if it declares one.
#[allow(
    clippy::as_conversions,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn dpi_of(image: &[u8]) -> Option<u32> {
    if image.len() < MIN_HEADER_LEN || !image.starts_with(b"BM") {
        return None;
    }
    let bytes: [u8; 4] = image[X_PPM].try_into().ok()?;
    let dpm = i32::from_le_bytes(bytes);
    if dpm <= 0 {
        return None;
    }
    Some((f64::from(dpm) / INCHES_PER_METRE).round() as u32)
}
