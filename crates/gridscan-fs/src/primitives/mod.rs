pub mod atomic_write;

pub use atomic_write::{AtomicWriteOptions, atomic_read, atomic_write, ensure_parent_dir, read_if_exists, remove_if_exists};
