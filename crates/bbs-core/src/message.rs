//! Private mail: `Message`, its `Attachment`s, and the broadcast sentinel.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of [`Attachment::name`]; names longer than this are
/// rejected rather than truncated.
pub const ATTACHMENT_NAME_MAX: usize = 300;

/// A value object owned by a [`Message`], holding either literal bytes or a
/// snapshot taken from an [`crate::object::Object`] at send time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Attachment {
    /// File name, at most [`ATTACHMENT_NAME_MAX`] bytes.
    pub name: String,
    /// Whether `data` is opaque binary (vs. text encoded as UTF-8 bytes).
    pub binary: bool,
    /// Payload bytes.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Size in bytes of the payload.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Source payload for a `POST /message` attachment, before the handler
/// resolves it to a plain [`Attachment`] snapshot.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachmentSource {
    /// Literal bytes supplied inline in the request.
    Inline {
        /// File name.
        name: String,
        /// Payload bytes.
        data: Vec<u8>,
        /// Whether `data` is binary.
        binary: bool,
    },
    /// A reference to an object the sender owns or can read; the handler
    /// must resolve this to an [`Attachment`] snapshot inside the same
    /// transaction that creates the per-recipient message copies.
    ObjectRef {
        /// Uuid of the referenced object.
        uuid: Uuid,
    },
}

/// A single piece of private mail.
///
/// Every recipient mailbox (including the sender's sent-folder copy) stores
/// an independent, fully-owned copy of this struct; `uuid` is the shared
/// identity that ties the copies together.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Message {
    /// Globally unique identifier, drawn once from the `message_uuids` set
    /// and never reused even though it appears in multiple mailboxes.
    pub uuid: Uuid,
    /// When the message was sent.
    pub sent_at: DateTime<Utc>,
    /// Body text.
    pub text: String,
    /// Recipients as given at send time: uppercase callsigns, or the single
    /// sentinel [`crate::callsign::BROADCAST_RECIPIENT`].
    pub recipients: Vec<String>,
    /// Uppercase callsign of the sender.
    pub sender: String,
    /// Whether this copy has been read; transitions only false→true.
    pub retrieved: bool,
    /// Whether this copy was successfully delivered into its mailbox.
    pub delivered: bool,
    /// Attachments, already resolved to plain byte snapshots.
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Mark this copy as read. A no-op if already retrieved — the flag
    /// never transitions back to false.
    pub fn mark_retrieved(&mut self) {
        self.retrieved = true;
    }
}
