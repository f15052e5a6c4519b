//! Loader for individual `.eml` files.

use std::path::Path;

use crate::error::{ReceiptError, Result};
use crate::model::message::Message;
use crate::parser::mime;

/// Read and decode a single `.eml` file.
pub fn load_eml(path: impl AsRef<Path>) -> Result<Message> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ReceiptError::FileNotFound(path.to_path_buf())
        } else {
            ReceiptError::io(path, e)
        }
    })?;

    if !looks_like_message(&data) {
        return Err(ReceiptError::InvalidMessage(path.to_path_buf()));
    }

    Ok(mime::parse_message(&data))
}

/// A message must open with a header line (`Name: value`) or an mbox
/// `From ` separator.
fn looks_like_message(data: &[u8]) -> bool {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        return true;
    }
    let first_line = data.split(|&b| b == b'\n').next().unwrap_or_default();
    match first_line.iter().position(|&b| b == b':') {
        Some(colon) if colon > 0 => first_line[..colon]
            .iter()
            .all(|&b| b.is_ascii_graphic() && b != b':'),
        _ => false,
    }
}
