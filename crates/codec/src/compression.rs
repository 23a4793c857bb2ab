use std::io::{Read, Write};

use execd_core::Error;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
}

impl Compression {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gz" => Some(Compression::Gzip),
            "bz2" => Some(Compression::Bzip2),
            _ => None,
        }
    }
}

/// Wraps already-encoded bytes with the path's trailing compression suffix,
/// if any. A `None` compression is a no-op passthrough.
pub fn compress(bytes: &[u8], compression: Option<Compression>) -> Result<Vec<u8>, Error> {
    match compression {
        None => Ok(bytes.to_vec()),
        Some(Compression::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
            encoder
                .write_all(bytes)
                .map_err(|e| Error::internal(format!("gzip compression failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| Error::internal(format!("gzip compression failed: {e}")))
        }
        Some(Compression::Bzip2) => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder
                .write_all(bytes)
                .map_err(|e| Error::internal(format!("bzip2 compression failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| Error::internal(format!("bzip2 compression failed: {e}")))
        }
    }
}

/// Decompresses bytes read back from disk during harvesting. Harvested
/// files are always returned decompressed (the response never re-applies
/// compression); the harvester decides based on the tracked path's suffix,
/// but a suffix is only a hint about what's on disk, not a guarantee — it's
/// the caller's job to fall back to the raw bytes if this errors.
pub fn decompress(bytes: &[u8], compression: Option<Compression>) -> Result<Vec<u8>, Error> {
    match compression {
        None => Ok(bytes.to_vec()),
        Some(Compression::Gzip) => {
            let mut decoder = flate2::read::GzDecoder::new(bytes);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::internal(format!("gzip decompression failed: {e}")))?;
            Ok(out)
        }
        Some(Compression::Bzip2) => {
            let mut decoder = bzip2::read::BzDecoder::new(bytes);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::internal(format!("bzip2 decompression failed: {e}")))?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gzip_round_trips() {
        let data = b"hello world";
        let compressed = compress(data, Some(Compression::Gzip)).unwrap();
        assert_ne!(compressed, data);
        let decompressed = decompress(&compressed, Some(Compression::Gzip)).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn bzip2_round_trips() {
        let data = b"hello world";
        let compressed = compress(data, Some(Compression::Bzip2)).unwrap();
        let decompressed = decompress(&compressed, Some(Compression::Bzip2)).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn no_compression_is_passthrough() {
        let data = b"hello world";
        assert_eq!(compress(data, None).unwrap(), data);
        assert_eq!(decompress(data, None).unwrap(), data);
    }
}
