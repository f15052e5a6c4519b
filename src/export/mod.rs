//! Writing composed documents and standalone attachments to disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::compose::ComposedDocument;
use crate::error::{ReceiptError, Result};

/// Paths written for one message.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WrittenFiles {
    pub document: PathBuf,
    pub attachments: Vec<PathBuf>,
    pub bytes_written: u64,
}

/// Write the document and any standalone files into `output_dir`.
///
/// Existing files are never overwritten; a counter is appended instead.
pub fn write_composed(composed: &ComposedDocument, output_dir: &Path) -> Result<WrittenFiles> {
    std::fs::create_dir_all(output_dir).map_err(|e| ReceiptError::io(output_dir, e))?;

    let document = write_unique(
        output_dir,
        &composed.document.file_name,
        &composed.document.bytes,
    )?;
    let mut bytes_written = composed.document.bytes.len() as u64;

    let mut attachments = Vec::with_capacity(composed.standalone.len());
    for file in &composed.standalone {
        attachments.push(write_unique(output_dir, &file.file_name, &file.bytes)?);
        bytes_written += file.bytes.len() as u64;
    }

    Ok(WrittenFiles {
        document,
        attachments,
        bytes_written,
    })
}

fn write_unique(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = unique_path(&dir.join(file_name));
    std::fs::write(&path, bytes).map_err(|e| ReceiptError::io(&path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(path)
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    let candidate = |suffix: &str| {
        if ext.is_empty() {
            parent.join(format!("{stem}_{suffix}"))
        } else {
            parent.join(format!("{stem}_{suffix}.{ext}"))
        }
    };

    (1..1000)
        .map(|i| candidate(&i.to_string()))
        .find(|p| !p.exists())
        .unwrap_or_else(|| candidate("dup"))
}
