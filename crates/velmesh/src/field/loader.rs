//! Reading flat binary velocity models.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::error::{Error, Result};

const SAMPLE_BYTES: usize = 4;

/// Byte order of the 32-bit floats stored in a model file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    fn decode(self, bytes: [u8; SAMPLE_BYTES]) -> f32 {
        match self {
            ByteOrder::Little => f32::from_le_bytes(bytes),
            ByteOrder::Big => f32::from_be_bytes(bytes),
        }
    }

    /// Encodes one sample, mainly for writing synthetic models.
    pub fn encode(self, value: f32) -> [u8; SAMPLE_BYTES] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }
}

impl FromStr for ByteOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(ByteOrder::Little),
            "big" | "be" => Ok(ByteOrder::Big),
            other => Err(Error::InvalidConfig(format!(
                "unknown byte order '{other}', expected 'big' or 'little'"
            ))),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::Little => f.write_str("little"),
            ByteOrder::Big => f.write_str("big"),
        }
    }
}

/// Reads exactly `expected` samples from `path`.
pub(crate) fn read_f32_samples(
    path: &Path,
    expected: usize,
    byte_order: ByteOrder,
) -> Result<Vec<f64>> {
    let bytes = std::fs::read(path)?;
    let values = decode_samples(&bytes, expected, byte_order)?;
    info!(
        "Loaded {} samples ({} endian) from '{}'.",
        values.len(),
        byte_order,
        path.display()
    );
    Ok(values)
}

pub(crate) fn decode_samples(
    bytes: &[u8],
    expected: usize,
    byte_order: ByteOrder,
) -> Result<Vec<f64>> {
    if bytes.len() != expected * SAMPLE_BYTES {
        return Err(Error::InvalidConfig(format!(
            "model holds {} bytes but the grid needs {} samples ({} bytes)",
            bytes.len(),
            expected,
            expected * SAMPLE_BYTES
        )));
    }
    Ok(bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|chunk| {
            let mut raw = [0u8; SAMPLE_BYTES];
            raw.copy_from_slice(chunk);
            byte_order.decode(raw) as f64
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_byte_order_names() {
        assert_eq!("big".parse::<ByteOrder>().unwrap(), ByteOrder::Big);
        assert_eq!(" Little ".parse::<ByteOrder>().unwrap(), ByteOrder::Little);
        assert!(matches!(
            "middle".parse::<ByteOrder>(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn decodes_both_byte_orders() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let bytes: Vec<u8> = [1500.0f32, 2250.5, 4000.0]
                .iter()
                .flat_map(|v| order.encode(*v))
                .collect();
            let values = decode_samples(&bytes, 3, order).unwrap();
            assert_eq!(values, vec![1500.0, 2250.5, 4000.0]);
        }
    }

    #[test]
    fn size_mismatch_is_a_config_error() {
        let bytes = vec![0u8; 10];
        assert!(matches!(
            decode_samples(&bytes, 3, ByteOrder::Big),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("velmesh-does-not-exist.bin");
        assert!(matches!(
            read_f32_samples(&path, 1, ByteOrder::Little),
            Err(Error::Io(_))
        ));
    }
}
