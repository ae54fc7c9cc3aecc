//! Command and response codes.
//!
//! Outbound messages carry a command code, inbound messages a response code.

use std::fmt;

/// Outbound command codes.
pub mod command {
    pub const GET_IPC_PIPE_VERSION: u32 = 0;
    pub const GET_MAJOR_VERSION: u32 = 1;
    pub const GET_MINOR_VERSION: u32 = 2;
    pub const GET_REVISION: u32 = 3;
    pub const GET_BUILD_NUMBER: u32 = 4;
    pub const GET_TARGET_MACHINE: u32 = 5;
    pub const FIND_PROPERTY_FROM_NAME: u32 = 6;
    pub const SEARCH: u32 = 7;
    pub const IS_DB_LOADED: u32 = 8;

    /// Returns a human-readable name for a command code.
    pub fn command_name(code: u32) -> &'static str {
        match code {
            GET_IPC_PIPE_VERSION => "GET_IPC_PIPE_VERSION",
            GET_MAJOR_VERSION => "GET_MAJOR_VERSION",
            GET_MINOR_VERSION => "GET_MINOR_VERSION",
            GET_REVISION => "GET_REVISION",
            GET_BUILD_NUMBER => "GET_BUILD_NUMBER",
            GET_TARGET_MACHINE => "GET_TARGET_MACHINE",
            FIND_PROPERTY_FROM_NAME => "FIND_PROPERTY_FROM_NAME",
            SEARCH => "SEARCH",
            IS_DB_LOADED => "IS_DB_LOADED",
            _ => "UNKNOWN",
        }
    }
}

/// Status code of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// Success; more messages of this response follow.
    OkMoreData,
    /// Success; this is the final message of the response.
    Ok,
    BadRequest,
    /// Superseded by a newer request from the same client.
    Cancelled,
    NotFound,
    OutOfMemory,
    InvalidCommand,
    /// A code this client does not know.
    Unknown(u32),
}

impl ResponseCode {
    pub const OK_MORE_DATA: u32 = 100;
    pub const OK: u32 = 200;
    pub const ERROR_BAD_REQUEST: u32 = 400;
    pub const ERROR_CANCELLED: u32 = 401;
    pub const ERROR_NOT_FOUND: u32 = 404;
    pub const ERROR_OUT_OF_MEMORY: u32 = 500;
    pub const ERROR_INVALID_COMMAND: u32 = 501;

    pub fn from_u32(code: u32) -> Self {
        match code {
            Self::OK_MORE_DATA => Self::OkMoreData,
            Self::OK => Self::Ok,
            Self::ERROR_BAD_REQUEST => Self::BadRequest,
            Self::ERROR_CANCELLED => Self::Cancelled,
            Self::ERROR_NOT_FOUND => Self::NotFound,
            Self::ERROR_OUT_OF_MEMORY => Self::OutOfMemory,
            Self::ERROR_INVALID_COMMAND => Self::InvalidCommand,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::OkMoreData => Self::OK_MORE_DATA,
            Self::Ok => Self::OK,
            Self::BadRequest => Self::ERROR_BAD_REQUEST,
            Self::Cancelled => Self::ERROR_CANCELLED,
            Self::NotFound => Self::ERROR_NOT_FOUND,
            Self::OutOfMemory => Self::ERROR_OUT_OF_MEMORY,
            Self::InvalidCommand => Self::ERROR_INVALID_COMMAND,
            Self::Unknown(code) => code,
        }
    }

    /// True for both success codes.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::OkMoreData)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::OkMoreData => "ok (more data)",
            Self::Ok => "ok",
            Self::BadRequest => "bad request",
            Self::Cancelled => "request cancelled",
            Self::NotFound => "not found",
            Self::OutOfMemory => "out of memory",
            Self::InvalidCommand => "invalid command",
            Self::Unknown(_) => "unknown status",
        };
        write!(f, "{} ({text})", self.as_u32())
    }
}
