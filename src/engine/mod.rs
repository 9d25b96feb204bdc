//! Engine binary resolution and process stdio handling.
//!
//! - `isa`: instruction-set tokens, the capability table and CPU probes.
//! - `resolver`: startup-time selection and validation of the engine binary.
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based line framing.
//! - `spawner`: per-session process launch and guaranteed termination.
//! - `forwarder`: the engine stdout to client pump.

pub mod codec;
pub mod forwarder;
pub mod isa;
pub mod resolver;
pub mod spawner;

pub use resolver::EngineBinary;
