mod compression;
pub mod config;
pub mod error;
pub mod header;
pub mod packet;
pub mod presence_mask;
pub mod receiver;
pub mod sender;
pub mod spill;

pub use compression::{compress, decompress};
pub use config::{CompressionMode, TransferConfig};
pub use error::TransferError;
pub use header::{PacketHeader, StartHeader};
pub use packet::TransferPacket;
pub use presence_mask::PresenceMask;
pub use receiver::{ReceiveEvent, ReceivedData, TransferReceiver};
pub use sender::{EmittedPacket, TransferSender};
pub use spill::SpillFile;
