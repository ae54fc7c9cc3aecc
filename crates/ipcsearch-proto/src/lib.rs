//! Search requests and result lists for the search service IPC.
//!
//! A search response is one continuous byte stream split over any number
//! of messages. It is read through a [`Stream`]:
//! - [`PipeStream`] reads it once, straight from the connection
//! - [`PooledStream`] keeps every chunk it reads and can [`seek`](SeekableStream::seek)
//!
//! [`ResultList`] decodes the header and then one [`ResultItem`] per result,
//! using the wire type the header declares for each requested property.
//! Streams never fail per read: the first error is kept and later reads
//! return zeroes, so records always come out whole and the error is checked
//! once at the end.

pub mod client;
pub mod decode;
pub mod error;
pub mod pipe;
pub mod pooled;
pub mod property;
pub mod request;
pub mod result_list;
pub mod stream;

pub use client::{machine_name, Client, ServiceVersion};
pub use decode::{
    decode_record, decode_value, decode_variant, skip_record, skip_value, skip_variant,
    DecodeContext, ResultItem, VariantKind,
};
pub use error::{ProtoError, Result, StreamError};
pub use pipe::PipeStream;
pub use pooled::PooledStream;
pub use property::{
    FixedPoint, HighlightedText, ItemFlags, PropertyField, PropertyId, PropertyRequest,
    PropertyValue, RequestFlags, SortKey, ValueType, Variant, ARRAY_SEPARATOR,
};
pub use request::{SearchFlags, SearchRequest};
pub use result_list::ResultList;
pub use stream::{native_size_max, BufferStream, SeekableStream, Stream};
