// src/packages/deb.rs

//! Built-in Debian control reader
//!
//! .deb packages are AR archives holding `debian-binary`, a `control.tar.*`
//! member and a `data.tar.*` member. This reader pulls the `control` file out
//! of the control member without any external tool.

use crate::error::{Error, Result};
use crate::packages::archive::ArchiveInspector;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;

pub struct NativeDebInspector;

impl NativeDebInspector {
    /// Raw bytes of the first AR member whose name starts with `prefix`
    fn extract_ar_member(path: &Path, prefix: &str) -> Result<(String, Vec<u8>)> {
        let file = File::open(path)?;
        let mut archive = ar::Archive::new(file);

        while let Some(entry) = archive.next_entry() {
            let mut entry = entry.map_err(|e| {
                Error::UnparseableOutput(format!("{}: failed to read AR entry: {}", path.display(), e))
            })?;

            let entry_name = String::from_utf8_lossy(entry.header().identifier()).to_string();
            if entry_name.starts_with(prefix) {
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                return Ok((entry_name, content));
            }
        }

        Err(Error::UnparseableOutput(format!(
            "{}: no {} member in archive",
            path.display(),
            prefix
        )))
    }

    fn decompress<'a>(member: &str, data: &'a [u8]) -> Result<Box<dyn Read + 'a>> {
        let reader: Box<dyn Read + 'a> = if member.ends_with(".gz") {
            Box::new(GzDecoder::new(data))
        } else if member.ends_with(".xz") {
            Box::new(XzDecoder::new(data))
        } else if member.ends_with(".zst") {
            Box::new(zstd::Decoder::new(data)?)
        } else {
            Box::new(data)
        };
        Ok(reader)
    }
}

impl ArchiveInspector for NativeDebInspector {
    fn control_block(&self, path: &Path) -> Result<String> {
        let (member, tar_data) = Self::extract_ar_member(path, "control.tar")?;
        debug!("Reading {} from {}", member, path.display());

        let reader = Self::decompress(&member, &tar_data)?;
        let mut archive = Archive::new(reader);

        for entry in archive.entries()? {
            let mut entry = entry?;
            let is_control = entry
                .path()?
                .file_name()
                .is_some_and(|name| name == "control");

            if is_control {
                let mut content = String::new();
                entry.read_to_string(&mut content)?;
                return Ok(content);
            }
        }

        Err(Error::UnparseableOutput(format!(
            "{}: control member has no control file",
            path.display()
        )))
    }
}
