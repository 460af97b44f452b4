//! Where finished messages go.
//!
//! # Submodules
//!
//! - [`telegram`]: Bot API client, the dry-run logger, and Markdown escaping

pub mod telegram;
