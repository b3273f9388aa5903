//! Decoded controller certificate stored in a temporary file.

use crate::error::{CoreError, CoreResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Certificate bytes provisioned from the base64 blob handed to the module.
///
/// The file lives until [`TrustMaterial::release`] is called (or the value is
/// dropped) so the HTTP client can be rebuilt from it while the process runs.
#[derive(Debug)]
pub struct TrustMaterial {
    file: NamedTempFile,
}

impl TrustMaterial {
    /// Decode `encoded` and write the certificate to a fresh temporary file
    pub fn provision(encoded: &str) -> CoreResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoreError::InvalidCertificate(format!("not valid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(CoreError::InvalidCertificate(
                "certificate is empty".to_string(),
            ));
        }
        Self::from_bytes(&bytes)
    }

    /// Write already-decoded certificate bytes to a temporary file
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("dmap-trust-")
            .suffix(".pem")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        debug!(
            "Provisioned trust material ({} bytes) at {}",
            bytes.len(),
            file.path().display()
        );

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the temporary certificate file
    pub fn release(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed trust material at {}", path.display()),
            Err(e) => warn!(
                "Failed to remove trust material at {}: {}",
                path.display(),
                e
            ),
        }
    }
}
