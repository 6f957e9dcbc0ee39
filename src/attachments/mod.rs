//! Attachments: the list, intake of uploaded files, and playback.

pub mod intake;
pub mod list;
pub mod playback;

pub use intake::IncomingFile;
pub use list::{Attachment, AttachmentList, Origin};
pub use playback::Player;
