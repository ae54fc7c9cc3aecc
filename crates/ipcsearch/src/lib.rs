//! Client for a local file-search service reached over its IPC pipe.
//!
//! # Crate Structure
//!
//! - [`transport`]: Connecting to the service pipe by instance name
//! - [`frame`]: Message framing, response codes and the VLQ length codec
//! - [`proto`]: Search requests, result-list decoding and the blocking client

/// Re-export transport types.
pub mod transport {
    pub use ipcsearch_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ipcsearch_frame::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use ipcsearch_proto::*;
}

pub use ipcsearch_proto::{Client, ResultList, SearchFlags, SearchRequest};
