//! Wire and storage adapters the core leaves to the binary.

pub mod envelope;
pub mod fs_images;

pub use envelope::{Envelope, Outcome, dispatch};
pub use fs_images::FsImageStore;
