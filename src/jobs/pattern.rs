//! Pattern enumeration and validation (spec §6). Re-exported from
//! [`crate::types::pattern`], which owns the actual lists since `Job`
//! validation and `Conversation`/`Project` targeting both need them.

pub use crate::types::pattern::{is_valid, CONVERSATION_PATTERNS, PROJECT_PATTERNS};
