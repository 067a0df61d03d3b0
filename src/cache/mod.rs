pub mod key;
pub mod memory;

pub use key::derive_key;
pub use memory::TtlCache;
