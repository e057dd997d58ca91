mod http_store;
mod memory_store;
mod signaling_store;

pub use http_store::*;
pub use memory_store::*;
pub use signaling_store::*;
