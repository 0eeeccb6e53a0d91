//! Payload measurement and the size ceiling.

use serde::Serialize;

use crate::error::{HydrateCoreError, Result};

/// Default payload ceiling in kilobytes.
pub const DEFAULT_MAX_PAYLOAD_KB: u64 = 200;

/// Serialized size of a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayloadSize {
    pub bytes: usize,
}

impl PayloadSize {
    /// Serialize `value` to its canonical JSON form and count the UTF-8 bytes.
    pub fn measure<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| HydrateCoreError::Serialization(e.to_string()))?;
        Ok(Self { bytes: bytes.len() })
    }

    pub fn kb(&self) -> f64 {
        self.bytes as f64 / 1024.0
    }
}

/// Rejects payloads larger than a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadGuard {
    pub max_kb: u64,
}

impl PayloadGuard {
    pub fn new(max_kb: u64) -> Self {
        Self { max_kb }
    }

    /// Strictly greater than the ceiling; a payload exactly at the limit passes.
    pub fn exceeds(&self, size: PayloadSize) -> bool {
        size.kb() > self.max_kb as f64
    }
}

impl Default for PayloadGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_KB)
    }
}

/// Human-readable byte count: `512B`, `1.50KB`, `2.30MB`.
pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.2}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_measure_counts_utf8_bytes() {
        // "é" is two bytes in UTF-8, plus two quotes
        let size = PayloadSize::measure("é").unwrap();
        assert_eq!(size.bytes, 4);
    }

    #[test]
    fn test_kb_conversion() {
        let size = PayloadSize { bytes: 2048 };
        assert_eq!(size.kb(), 2.0);
    }

    #[test]
    fn test_non_string_map_keys_fail_to_serialize() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], "x");
        let result = PayloadSize::measure(&map);
        assert!(matches!(result, Err(HydrateCoreError::Serialization(_))));
    }

    #[test]
    fn test_guard_is_strict() {
        let guard = PayloadGuard::new(1);
        assert!(!guard.exceeds(PayloadSize { bytes: 1024 }));
        assert!(guard.exceeds(PayloadSize { bytes: 1025 }));
        assert!(guard.exceeds(PayloadSize { bytes: 2000 }));
    }

    #[test]
    fn test_zero_ceiling_rejects_any_payload() {
        let guard = PayloadGuard::new(0);
        assert!(guard.exceeds(PayloadSize { bytes: 1 }));
        assert!(!guard.exceeds(PayloadSize { bytes: 0 }));
    }

    #[test]
    fn test_default_guard() {
        assert_eq!(PayloadGuard::default().max_kb, 200);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(1536), "1.50KB");
        assert_eq!(format_bytes(2_411_725), "2.30MB");
    }
}
