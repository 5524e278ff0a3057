//! Knowledge sources for Steward.
//!
//! The index is a plain text file of entries separated by blank lines; the
//! first line of each entry is a source identifier (a path relative to the
//! sources directory, or an http(s) URL) and the rest is a description.

pub mod filesystem;

pub use filesystem::FileSystemKnowledge;
