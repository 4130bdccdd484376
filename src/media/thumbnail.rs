use image::DynamicImage;

use super::ThumbnailRef;
use crate::error::{MediaError, Result};

/// Default cap on thumbnail size. Anything bigger is almost certainly not album art.
pub const DEFAULT_MAX_THUMBNAIL_BYTES: usize = 20 * 1024 * 1024;

/// Resolve a thumbnail reference to raw bytes and decode them.
///
/// An empty stream is treated as "no thumbnail".
pub async fn load(reference: &ThumbnailRef, max_bytes: usize) -> Result<Option<DynamicImage>> {
    let bytes = reference.read_bytes(max_bytes).await?;
    decode(&bytes, max_bytes)
}

/// Validate a stream's reported size before loading it into memory
pub fn checked_stream_len(size: u64, max_bytes: usize) -> Result<u32> {
    let too_large = || MediaError::ThumbnailTooLarge {
        size: usize::try_from(size).unwrap_or(usize::MAX),
        limit: max_bytes,
    };
    if size > max_bytes as u64 {
        return Err(too_large());
    }
    u32::try_from(size).map_err(|_| too_large())
}

pub fn decode(bytes: &[u8], max_bytes: usize) -> Result<Option<DynamicImage>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    if bytes.len() > max_bytes {
        tracing::warn!("[Media/Thumbnail] Dropping {} byte thumbnail (limit {})", bytes.len(), max_bytes);
        return Err(MediaError::ThumbnailTooLarge { size: bytes.len(), limit: max_bytes });
    }

    let img = image::load_from_memory(bytes)?;
    Ok(Some(img))
}
