//! Legacy `.doc` conversion through headless LibreOffice

use std::process::Command;

use crate::config::ConversionConfig;
use crate::error::{Error, Result};

/// Converts Word 97-2003 files to `.docx` so the DOCX reader can handle them
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    config: ConversionConfig,
}

impl LibreOfficeConverter {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    /// Convert `.doc` bytes to `.docx` bytes
    ///
    /// Input and output live in a temporary directory that is removed on
    /// every return path.
    pub fn doc_to_docx(&self, filename: &str, data: &[u8]) -> Result<Vec<u8>> {
        if !self.config.enabled {
            return Err(Error::corrupt_document(
                filename,
                "legacy .doc conversion is disabled",
            ));
        }

        let temp_dir = tempfile::Builder::new().prefix("doc-rag-convert-").tempdir()?;
        let input_path = temp_dir.path().join("input.doc");
        std::fs::write(&input_path, data)?;

        tracing::debug!(
            "Converting {} with {}",
            filename,
            self.config.libreoffice_binary
        );

        let output = Command::new(&self.config.libreoffice_binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("docx")
            .arg("--outdir")
            .arg(temp_dir.path())
            .arg(&input_path)
            .output()
            .map_err(|e| {
                Error::corrupt_document(
                    filename,
                    format!(
                        "LibreOffice ({}) is required to read .doc files: {}",
                        self.config.libreoffice_binary, e
                    ),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::corrupt_document(
                filename,
                format!("LibreOffice conversion failed: {}", stderr.trim()),
            ));
        }

        std::fs::read(temp_dir.path().join("input.docx")).map_err(|e| {
            Error::corrupt_document(filename, format!("LibreOffice produced no output: {}", e))
        })
    }
}
