pub mod helpers;
pub mod local_network;
pub mod test_protocol;
pub mod test_resources;

pub use helpers::*;
pub use local_network::LocalNetwork;
pub use test_protocol::{
    protocol, Chat, HeightQuery, HeightReply, Ping, RequestsPlugin, SlowQuery, SlowReply,
};
pub use test_resources::{TestNavMesh, TestTerrain};
