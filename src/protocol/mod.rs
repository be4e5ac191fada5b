//! Protocol layer for the line chat server
//!
//! This module provides:
//! - Newline framing of the raw byte stream
//! - The fixed notices and the display name rule

pub mod line;
pub mod messages;

// Re-export commonly used types
pub use line::{LINE_TERMINATOR, LineFramer, encode_line};
pub use messages::{MAX_NAME_LEN, NAME_PROMPT, NAME_REJECTED, NAME_RETRY, validate_name};
