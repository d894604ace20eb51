mod peer_registry;
pub use peer_registry::PeerRegistry;

mod server;
pub use server::Server;

mod server_config;
pub use server_config::ServerConfig;
