//! Ready-made body transforms.
//!
//! Transforms run on the worker thread after a body has been fully received.
//! Any `Fn(&[u8], Option<&Context>) -> Result<Vec<u8>, BoxError>` works; this
//! module only ships the common decompression case.

use std::io::Read;
use std::sync::Arc;

use flate2::read::GzDecoder;

use crate::session::{BoxError, Context, Transform};

/// Transform that gunzips the response body.
pub fn gunzip() -> Transform {
    Arc::new(|raw: &[u8], _context: Option<&Context>| -> Result<Vec<u8>, BoxError> {
        let mut decoder = GzDecoder::new(raw);
        let mut out = Vec::with_capacity(raw.len() * 2);
        decoder.read_to_end(&mut out)?;
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_gunzip_round_trip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"hello relayfetch").unwrap();
        let compressed = encoder.finish().unwrap();

        let transform = gunzip();
        assert_eq!(transform(&compressed, None).unwrap(), b"hello relayfetch");
    }

    #[test]
    fn test_gunzip_rejects_plain_bytes() {
        let transform = gunzip();
        assert!(transform(b"not gzip at all", None).is_err());
    }
}
