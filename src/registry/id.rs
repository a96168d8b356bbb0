//! Viewer identifiers

use rand::RngCore;

/// Opaque viewer identity: 128 random bits
///
/// Rendered as `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX` (uppercase hex).
/// Uniqueness is probabilistic; collisions are not checked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId([u8; 16]);

impl ViewerId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl From<[u8; 16]> for ViewerId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, group) in [0..4, 4..6, 6..8, 8..10, 10..16].into_iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            for b in &self.0[group] {
                write!(f, "{:02X}", b)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups() {
        let id = ViewerId::from([
            0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55,
            0x66, 0x77,
        ]);
        assert_eq!(id.to_string(), "01234567-89AB-CDEF-0011-223344556677");
    }

    #[test]
    fn test_generate_is_random() {
        let a = ViewerId::generate();
        let b = ViewerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }
}
