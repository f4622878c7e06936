//! Pluggable compression for cache entries above
//! [`crate::config::CacheConfig::compress_threshold_bytes`] (§4.9,
//! §11 "Market data cache compression"). The algorithm itself is left
//! unspecified by the spec, so a trivial byte-run-length codec stands in
//! for whatever real codec a deployment would configure.

/// Encodes/decodes cache payload bytes. Implementations must round-trip:
/// `decode(encode(bytes)) == bytes`.
pub trait Compressor: Send + Sync {
    /// Compress `bytes`.
    fn compress(&self, bytes: &[u8]) -> Vec<u8>;
    /// Decompress a buffer previously produced by [`Self::compress`].
    fn decompress(&self, bytes: &[u8]) -> Vec<u8>;
}

/// Byte-oriented run-length encoding: `(count: u8, value: u8)` pairs, runs
/// capped at 255. Adequate for the repetitive quote/bar payloads this
/// cache stores; not meant to compete with a real general-purpose codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLengthCompressor;

impl Compressor for RunLengthCompressor {
    fn compress(&self, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len() / 2 + 2);
        let mut iter = bytes.iter().peekable();
        while let Some(&value) = iter.next() {
            let mut run: u8 = 1;
            while run < 255 && iter.peek() == Some(&&value) {
                iter.next();
                run += 1;
            }
            out.push(run);
            out.push(value);
        }
        out
    }

    fn decompress(&self, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(bytes.len() * 2);
        for pair in bytes.chunks_exact(2) {
            out.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_repetitive_payload() {
        let codec = RunLengthCompressor;
        let original = vec![7u8; 600];
        let compressed = codec.compress(&original);
        assert!(compressed.len() < original.len());
        assert_eq!(codec.decompress(&compressed), original);
    }

    #[test]
    fn round_trips_empty_and_mixed_payload() {
        let codec = RunLengthCompressor;
        assert_eq!(codec.decompress(&codec.compress(&[])), Vec::<u8>::new());

        let mixed: Vec<u8> = (0..50).collect();
        assert_eq!(codec.decompress(&codec.compress(&mixed)), mixed);
    }
}
