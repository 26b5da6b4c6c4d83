use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Path the normalizer will write for a given upload: the original path
/// with `.webp` appended, so the transient name stays traceable.
pub fn webp_path(src: &Path) -> PathBuf {
    let mut name = OsString::from(src.as_os_str());
    name.push(".webp");
    PathBuf::from(name)
}

/// Re-encode an uploaded image to WebP, whatever the source format.
///
/// Decoding and encoding are CPU-bound, so they run on the blocking pool;
/// the caller awaits completion before persisting any reference to the
/// derived file. On success the original upload is deleted. On failure the
/// original is left in place and no derived file is referenced.
pub async fn convert_to_webp(src: PathBuf) -> AppResult<PathBuf> {
    let dest = webp_path(&src);
    let out = dest.clone();

    tokio::task::spawn_blocking(move || -> AppResult<()> {
        let img = image::open(&src).map_err(|e| AppError::Image(e.to_string()))?;
        img.save_with_format(&dest, image::ImageFormat::WebP)
            .map_err(|e| AppError::Image(e.to_string()))?;

        // Cleanup of the transient upload; only once the webp exists
        if let Err(e) = std::fs::remove_file(&src) {
            tracing::warn!("Failed to remove original upload {}: {}", src.display(), e);
        }
        Ok(())
    })
    .await
    .map_err(|e| AppError::Internal(format!("conversion task failed: {}", e)))??;

    Ok(out)
}
