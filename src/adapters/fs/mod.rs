//! File-backed record sources

mod jsonl;

pub use jsonl::JsonlSource;
