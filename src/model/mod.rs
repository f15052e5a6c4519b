//! Core data model types: messages, attachments, and extracted identity.

pub mod address;
pub mod data_uri;
pub mod message;
pub mod meta;
