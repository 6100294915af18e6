//! Input collection: the narrative and image attachments of one submission.

use std::borrow::Cow;
use std::io;

use bytes::Bytes;

/// Image extensions the upload surface accepts.
pub const ACCEPTED_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Anything the image materializer can read bytes from.
pub trait AttachmentSource {
    /// Display name of the upload (used for captions and transient file names).
    fn name(&self) -> &str;

    /// Read the full blob. Failure skips this attachment only.
    fn read_bytes(&self) -> io::Result<Cow<'_, [u8]>>;

    /// Content type declared by the uploader, if any.
    fn content_type(&self) -> Option<&str> {
        None
    }
}

/// One uploaded image held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl AttachmentSource for Attachment {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_bytes(&self) -> io::Result<Cow<'_, [u8]>> {
        Ok(Cow::Borrowed(&self.data))
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// What the user handed in for one cycle. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSubmission {
    narrative: String,
    attachments: Vec<Attachment>,
}

impl UserSubmission {
    pub fn new(narrative: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            narrative: narrative.into(),
            attachments,
        }
    }

    pub fn narrative(&self) -> &str {
        &self.narrative
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// True when there is neither narrative text nor any attachment.
    ///
    /// Whitespace-only narrative counts as empty.
    pub fn is_empty(&self) -> bool {
        self.narrative.trim().is_empty() && self.attachments.is_empty()
    }
}

/// Whether `name` carries one of the [`ACCEPTED_IMAGE_EXTENSIONS`].
pub fn is_accepted_image_name(name: &str) -> bool {
    extension_of(name)
        .map(|ext| ACCEPTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// MIME type sent alongside inline image data.
pub fn image_mime_type(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}

/// MIME type for an upload: a declared PNG/JPEG type wins, anything else
/// (missing, generic or non-image) falls back to the extension.
pub fn resolve_mime_type(name: &str, declared: Option<&str>) -> &'static str {
    let essence = declared
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    match essence.as_deref() {
        Some("image/png") => "image/png",
        Some("image/jpeg" | "image/jpg" | "image/pjpeg") => "image/jpeg",
        _ => image_mime_type(name),
    }
}

fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}
