mod memory;

pub use memory::InMemoryRemoteTable;
