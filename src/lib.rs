//! `receiptbox` turns forwarded invoice and receipt emails into named,
//! self-contained archive documents.
//!
//! A message goes through metadata extraction, date resolution, attachment
//! dedup, inline image embedding and optional remote thumbnails before the
//! finished HTML is handed to an external renderer.

pub mod compose;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod parser;
pub mod preview;
pub mod render;
