//! Email parsing: EML loading, MIME decoding, and header-value helpers.

pub mod eml;
pub mod header;
pub mod mime;
