// slotline-common - Wire protocol and cluster addressing shared by the client crates
//
// RESP codec, hash slots, redirect parsing and topology reply parsing.

pub mod node;
pub mod redirect;
pub mod resp;
pub mod slot;
pub mod topology;

// Re-export for convenience
pub use node::*;
pub use redirect::*;
pub use resp::*;
pub use slot::*;
pub use topology::*;
