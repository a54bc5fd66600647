//! File system access for snapshot runs.

pub mod copy;
pub mod walker;

pub use copy::{copy_tree, CopyBackend, StdCopy, TreeCopyReport};
pub use walker::{is_hidden, list_top_level, EntryKind, SourceEntry};
