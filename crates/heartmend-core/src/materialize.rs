//! Image materialization into cycle-scoped transient storage.
//!
//! Every cycle gets its own directory created with a random suffix, so two
//! concurrent submissions uploading `chat.png` never touch the same file.
//! The directory is removed when [`MaterializedImages`] is dropped, whichever
//! way the cycle ends.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::submission::{resolve_mime_type, AttachmentSource};

/// Prefix of every per-cycle transient directory.
pub const CYCLE_DIR_PREFIX: &str = "heartmend-cycle-";

/// A materialized attachment the completion client can read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageHandle {
    pub source_name: String,
    pub transient_path: PathBuf,
    pub mime_type: &'static str,
}

/// An attachment that could not be materialized and was dropped from the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeFailure {
    pub source_name: String,
    pub error: String,
}

/// Owns the transient directory of one cycle.
#[derive(Debug)]
pub struct MaterializedImages {
    dir: Option<TempDir>,
    handles: Vec<ImageHandle>,
    failures: Vec<MaterializeFailure>,
}

impl MaterializedImages {
    pub fn handles(&self) -> &[ImageHandle] {
        &self.handles
    }

    pub fn failures(&self) -> &[MaterializeFailure] {
        &self.failures
    }

    /// The cycle directory, if one was created.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.path())
    }
}

/// Write each attachment to a fresh cycle directory under `root`.
///
/// Per-item failures are logged and recorded; the remaining attachments are
/// still written. No directory is created when `attachments` is empty.
pub fn materialize_images<A: AttachmentSource>(root: &Path, attachments: &[A]) -> MaterializedImages {
    let mut images = MaterializedImages {
        dir: None,
        handles: Vec::with_capacity(attachments.len()),
        failures: Vec::new(),
    };

    if attachments.is_empty() {
        return images;
    }

    let dir = match tempfile::Builder::new()
        .prefix(CYCLE_DIR_PREFIX)
        .tempdir_in(root)
    {
        Ok(dir) => dir,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "failed to create cycle directory");
            images.failures = attachments
                .iter()
                .map(|a| MaterializeFailure {
                    source_name: a.name().to_string(),
                    error: format!("transient directory unavailable: {e}"),
                })
                .collect();
            return images;
        }
    };

    for (index, attachment) in attachments.iter().enumerate() {
        let name = attachment.name();
        let path = dir.path().join(transient_file_name(index, name));

        let written = attachment
            .read_bytes()
            .and_then(|bytes| std::fs::write(&path, bytes.as_ref()));

        match written {
            Ok(()) => {
                debug!(source = %name, path = %path.display(), "materialized image");
                images.handles.push(ImageHandle {
                    source_name: name.to_string(),
                    transient_path: path,
                    mime_type: resolve_mime_type(name, attachment.content_type()),
                });
            }
            Err(e) => {
                warn!(source = %name, error = %e, "skipping image that could not be materialized");
                images.failures.push(MaterializeFailure {
                    source_name: name.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    images.dir = Some(dir);
    images
}

/// `<index>-<name>` keeping only the last path component and a safe charset.
fn transient_file_name(index: usize, name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        format!("{index:02}-image")
    } else {
        format!("{index:02}-{cleaned}")
    }
}
