//! Single-producer walkthroughs of the rendezvous channel.
//!
//! - `block`: one delayed send paired with one blocking receive
//! - `stream`: a producer that drops its sender to end the stream

pub mod block;
pub mod stream;

pub use block::run_block;
pub use stream::run_stream;
