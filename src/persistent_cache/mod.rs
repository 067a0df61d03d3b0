pub mod store;

pub use store::PersistentMetadataCache;
