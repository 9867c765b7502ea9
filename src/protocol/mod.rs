//! Wire protocol
//!
//! - [`envelope`]: JSON envelope decode/encode
//! - [`category`]: `message_type` values and the SEND → RECEIVE remapping
//! - [`media`]: `KIND:base64` media blobs
//! - [`message`]: classification into typed messages

pub mod category;
pub mod envelope;
pub mod media;
pub mod message;

pub use category::{AdminKind, Category, ContentKind};
pub use envelope::{Envelope, EnvelopeData, ALL, SERVER};
pub use media::{MediaKind, MediaPayload};
pub use message::{Message, Payload, Receiver, SystemSignal, ACK, PING, PONG};
