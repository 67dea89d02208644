//! Site Module
//!
//! Narrow interfaces to the collaborators that decide which site serves a
//! request and what content it renders, with in-memory implementations.

mod content;
mod mount;

pub use content::{ContentItem, ContentLookup, StaticContent};
pub use mount::{Mount, MountResolver, ResolvedMount, StaticMounts};
