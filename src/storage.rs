mod filesystem;
#[cfg(test)]
mod memory;
mod traits;

pub use filesystem::FilesystemStore;
#[cfg(test)]
pub use memory::MemoryStore;
pub use traits::KeyValueStore;
