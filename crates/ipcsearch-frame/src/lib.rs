//! Message framing for the search service IPC.
//!
//! Every message on the pipe is framed with:
//! - A 4-byte little-endian code (command outbound, status inbound)
//! - A 4-byte little-endian payload size
//!
//! A response is one or more messages: every message but the last carries
//! [`ResponseCode::OkMoreData`], the last carries [`ResponseCode::Ok`], and
//! their payloads form one continuous byte stream.
//!
//! Lengths and counts inside payloads use the tiered VLQ encoding in [`vlq`].

pub mod code;
pub mod codec;
pub mod error;
pub mod reader;
pub mod vlq;
pub mod writer;

pub use code::{command, ResponseCode};
pub use codec::{
    decode_header, encode_message, FrameConfig, Message, MessageHeader, DEFAULT_MAX_PAYLOAD,
    HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::MessageReader;
pub use vlq::{decode_len_vlq, encode_len_vlq, encoded_len_vlq, get_len_vlq};
pub use writer::MessageWriter;
