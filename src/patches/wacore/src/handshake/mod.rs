pub mod edge_routing;
pub mod noise;
pub mod state;
pub mod utils;

pub use edge_routing::{EdgeRoutingError, MAX_EDGE_ROUTING_LEN, build_edge_routing_preintro};
pub use noise::NoiseHandshake;
pub use state::{HandshakeState, Result};
