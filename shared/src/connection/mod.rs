mod connection_config;

pub use connection_config::ConnectionConfig;
