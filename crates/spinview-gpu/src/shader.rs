//! Pre-compiled SPIR-V loading.

use crate::error::{GpuError, Result};
use std::path::Path;

/// Read a SPIR-V binary from disk.
///
/// The file must exist and hold a non-empty whole number of 32-bit words.
pub fn load_shader(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let words = bytes_to_spirv(&bytes).map_err(|reason| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        reason,
    })?;

    tracing::debug!("Loaded shader {} ({} words)", path.display(), words.len());
    Ok(words)
}

/// Convert a byte blob to little-endian words (SPIR-V requires 4-byte alignment).
pub fn bytes_to_spirv(bytes: &[u8]) -> std::result::Result<Vec<u32>, String> {
    if bytes.is_empty() {
        return Err("file is empty".to_string());
    }
    if bytes.len() % 4 != 0 {
        return Err(format!(
            "length {} is not a multiple of 4",
            bytes.len()
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("spinview-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn converts_little_endian_words() {
        let words = bytes_to_spirv(&[0x03, 0x02, 0x23, 0x07, 1, 0, 0, 0]).unwrap();
        assert_eq!(words, vec![0x0723_0203, 1]);
    }

    #[test]
    fn rejects_unaligned_length() {
        assert!(bytes_to_spirv(&[1, 2, 3]).is_err());
        assert!(bytes_to_spirv(&[]).is_err());
    }

    #[test]
    fn loads_from_disk() {
        let path = temp_file("ok.spv", &[0x03, 0x02, 0x23, 0x07]);
        let words = load_shader(&path).unwrap();
        assert_eq!(words, vec![0x0723_0203]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn malformed_file_names_the_path() {
        let path = temp_file("bad.spv", &[0, 1, 2, 3, 4]);
        let err = load_shader(&path).unwrap_err();
        match err {
            GpuError::ShaderLoad { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("spinview-does-not-exist.spv");
        assert!(matches!(
            load_shader(path),
            Err(GpuError::ShaderLoad { .. })
        ));
    }
}
