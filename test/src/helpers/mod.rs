pub mod assertions;
pub mod test_network;

pub use test_network::{drain_clients, drain_server, fast_transfer_config, StepEvents, TestNetwork};
