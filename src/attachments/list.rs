//! Attachment entries and the append-only list holding them.

use std::sync::Arc;

use chrono::{DateTime, Local};

/// Where an attachment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Kept from a microphone recording
    Recorded,
    /// Dropped onto the widget or picked by path
    Uploaded,
}

/// A named audio payload ready for playback.
///
/// Attachments are immutable once created; the payload is shared so playback
/// can borrow it without copying.
#[derive(Debug, Clone)]
pub struct Attachment {
    name: String,
    payload: Arc<[u8]>,
    media_type: String,
    origin: Origin,
    added_at: DateTime<Local>,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        payload: impl Into<Arc<[u8]>>,
        media_type: impl Into<String>,
        origin: Origin,
    ) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            media_type: media_type.into(),
            origin,
            added_at: Local::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Arc<[u8]> {
        &self.payload
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn added_at(&self) -> DateTime<Local> {
        self.added_at
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Ordered attachments of one widget. Entries can only be appended.
#[derive(Debug, Default)]
pub struct AttachmentList {
    entries: Vec<Attachment>,
}

impl AttachmentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attachment: Attachment) {
        tracing::info!(
            "Attachment added: {} ({}, {} bytes)",
            attachment.name,
            attachment.media_type,
            attachment.size()
        );
        self.entries.push(attachment);
    }

    /// Appends every attachment in order and returns how many were added.
    pub fn extend(&mut self, attachments: impl IntoIterator<Item = Attachment>) -> usize {
        let before = self.entries.len();
        for attachment in attachments {
            self.push(attachment);
        }
        self.entries.len() - before
    }

    pub fn get(&self, index: usize) -> Option<&Attachment> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attachment> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
