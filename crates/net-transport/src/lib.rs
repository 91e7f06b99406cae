//! Network Transport - blocking byte-stream transports for the secure channel
//!
//! Provides the `TransportAdapter` seam with a TCP implementation and an
//! in-memory pipe for tests. Neither adds framing: one `send` is expected to
//! be matched by one `receive` on the other end.

mod error;
mod memory;
mod tcp;
mod transport;

pub use error::*;
pub use memory::*;
pub use tcp::*;
pub use transport::*;
