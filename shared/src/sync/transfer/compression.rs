use crate::sync::transfer::{config::CompressionMode, error::TransferError};

cfg_if! {
    if #[cfg(feature = "zstd_support")]
    {
        use zstd::bulk::{Compressor, Decompressor};

        /// Compress a snapshot. Returns `None` when compression would not make
        /// it smaller, in which case the raw bytes are sent.
        pub fn compress(mode: CompressionMode, raw: &[u8]) -> Result<Option<Vec<u8>>, TransferError> {
            let CompressionMode::Zstd(level) = mode;
            let mut compressor = Compressor::new(level).map_err(|error| TransferError::Compression {
                reason: format!("cannot create compressor at level {}: {}", level, error),
            })?;
            let compressed = compressor.compress(raw).map_err(|error| TransferError::Compression {
                reason: format!("compressing {} bytes: {}", raw.len(), error),
            })?;
            if compressed.len() >= raw.len() {
                return Ok(None);
            }
            Ok(Some(compressed))
        }

        /// Decompress a reassembled snapshot of known raw length. The input is
        /// untrusted network data.
        pub fn decompress(compressed: &[u8], raw_length: usize) -> Result<Vec<u8>, TransferError> {
            let mut decompressor = Decompressor::new().map_err(|error| TransferError::Compression {
                reason: format!("cannot create decompressor: {}", error),
            })?;
            let raw = decompressor
                .decompress(compressed, raw_length)
                .map_err(|error| TransferError::Compression {
                    reason: format!("decompressing {} bytes: {}", compressed.len(), error),
                })?;
            if raw.len() != raw_length {
                return Err(TransferError::HeaderMismatch {
                    reason: "decompressed length differs from raw length",
                });
            }
            Ok(raw)
        }
    }
    else
    {
        pub fn compress(_: CompressionMode, _: &[u8]) -> Result<Option<Vec<u8>>, TransferError> {
            Ok(None)
        }

        pub fn decompress(compressed: &[u8], _: usize) -> Result<Vec<u8>, TransferError> {
            Err(TransferError::Compression {
                reason: format!(
                    "received a compressed snapshot of {} bytes, but the zstd_support feature is disabled",
                    compressed.len()
                ),
            })
        }
    }
}
