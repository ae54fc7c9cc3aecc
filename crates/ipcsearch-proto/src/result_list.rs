//! Result-list header, sequential iteration and index seeking.

use tracing::{debug, trace};

use crate::decode::{decode_record, skip_record, DecodeContext, ResultItem};
use crate::error::StreamError;
use crate::property::{PropertyField, PropertyId, RequestFlags, SortKey, ValueType};
use crate::stream::{SeekableStream, Stream};

/// Bits of the header's `valid_flags` word.
pub mod valid {
    pub const FOLDER_RESULT_COUNT: u32 = 0x0000_0001;
    pub const FILE_RESULT_COUNT: u32 = 0x0000_0002;
    pub const TOTAL_RESULT_SIZE: u32 = 0x0000_0004;
}

/// A search response: its header plus a cursor over the item records.
///
/// Records are decoded on demand from the underlying stream. Over a
/// [`SeekableStream`] the list also keeps an index of record offsets so that
/// [`seek_to_index`](ResultList::seek_to_index) can revisit any item in the
/// viewport without re-querying the service.
pub struct ResultList<S> {
    stream: S,
    folder_count: Option<u64>,
    file_count: Option<u64>,
    total_size: Option<u64>,
    viewport_offset: u64,
    viewport_count: u64,
    sort: Vec<SortKey>,
    fields: Vec<PropertyField>,
    /// Offset of record `i` at position `i`; the length is the watermark.
    /// Created on the first seek.
    index: Option<Vec<u64>>,
    first_record: u64,
    /// Index of the next record to decode.
    cursor: u64,
}

impl<S: Stream> ResultList<S> {
    /// Read the result-list header from the start of a response.
    pub fn open(mut stream: S) -> Result<Self, StreamError> {
        let valid_flags = stream.read_u32();
        let folder_count =
            (valid_flags & valid::FOLDER_RESULT_COUNT != 0).then(|| stream.read_size());
        let file_count = (valid_flags & valid::FILE_RESULT_COUNT != 0).then(|| stream.read_size());
        let total_size = (valid_flags & valid::TOTAL_RESULT_SIZE != 0).then(|| stream.read_u64());
        let viewport_offset = stream.read_size();
        let viewport_count = stream.read_size();

        let sort_count = stream.read_len_vlq();
        let mut sort = Vec::new();
        let mut left = sort_count;
        while left > 0 && !stream.is_error() {
            let property = stream.read_u32();
            let flags = stream.read_u32();
            sort.push(SortKey::from_wire(property, flags));
            left -= 1;
        }

        let property_count = stream.read_len_vlq();
        let mut fields = Vec::new();
        let mut left = property_count;
        while left > 0 && !stream.is_error() {
            let property = PropertyId(stream.read_u32());
            let flags = RequestFlags::from_bits_retain(stream.read_u32());
            let value_type = ValueType::from_u8(stream.read_u8());
            fields.push(PropertyField {
                property,
                flags,
                value_type,
            });
            left -= 1;
        }

        if let Some(err) = stream.error() {
            return Err(err.clone());
        }

        debug!(
            ?folder_count,
            ?file_count,
            ?total_size,
            viewport_offset,
            viewport_count,
            properties = fields.len(),
            "result list header"
        );

        let first_record = stream.tell();
        Ok(Self {
            stream,
            folder_count,
            file_count,
            total_size,
            viewport_offset,
            viewport_count,
            sort,
            fields,
            index: None,
            first_record,
            cursor: 0,
        })
    }

    /// Total number of matching folders, when the service reported it.
    pub fn folder_count(&self) -> Option<u64> {
        self.folder_count
    }

    /// Total number of matching files, when the service reported it.
    pub fn file_count(&self) -> Option<u64> {
        self.file_count
    }

    /// Total size of all matching files, when requested and reported.
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    pub fn viewport_offset(&self) -> u64 {
        self.viewport_offset
    }

    /// Number of item records in this response.
    pub fn viewport_count(&self) -> u64 {
        self.viewport_count
    }

    /// Sort keys echoed by the service, primary first.
    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    /// Requested properties with their resolved wire types, in record order.
    pub fn fields(&self) -> &[PropertyField] {
        &self.fields
    }

    /// Column of `property` in every [`ResultItem::values`].
    pub fn field_index(&self, property: PropertyId) -> Option<usize> {
        self.fields.iter().position(|f| f.property == property)
    }

    /// Index of the item the next [`next_item`](Self::next_item) returns.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// The sticky error of the underlying stream.
    pub fn error(&self) -> Option<&StreamError> {
        self.stream.error()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_stream(self) -> S {
        self.stream
    }

    /// Decode the next item.
    ///
    /// Returns `None` past the last item of the viewport or once the stream
    /// has failed. A record during which the stream fails is still returned
    /// complete, with zeroed values; check [`error`](Self::error) after
    /// iterating.
    pub fn next_item(&mut self) -> Option<ResultItem> {
        if self.cursor >= self.viewport_count || self.stream.is_error() {
            return None;
        }
        if let Some(index) = self.index.as_mut() {
            if index.len() as u64 == self.cursor {
                index.push(self.stream.tell());
            }
        }
        let item = decode_record(
            &mut self.stream,
            DecodeContext {
                fields: &self.fields,
            },
        );
        self.cursor += 1;
        Some(item)
    }

    /// Decode every remaining item.
    pub fn collect_items(&mut self) -> Result<Vec<ResultItem>, StreamError> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item() {
            items.push(item);
        }
        match self.stream.error() {
            Some(err) => Err(err.clone()),
            None => Ok(items),
        }
    }

    /// Consume the rest of the response so the connection can carry the
    /// next request.
    pub fn finish(mut self) -> Result<(), StreamError> {
        self.stream.drain();
        match self.stream.error() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl<S: SeekableStream> ResultList<S> {
    /// Position the cursor on item `target`.
    ///
    /// Offsets already seen are looked up directly; otherwise records are
    /// skipped forward from the highest known offset, recording each one.
    /// An index outside the viewport is rejected without touching the
    /// stream.
    pub fn seek_to_index(&mut self, target: u64) -> Result<(), StreamError> {
        if target >= self.viewport_count {
            return Err(StreamError::IndexOutOfRange {
                index: target,
                count: self.viewport_count,
            });
        }
        if let Some(err) = self.stream.error() {
            return Err(err.clone());
        }

        let first_record = self.first_record;
        let index = self.index.get_or_insert_with(|| vec![first_record]);
        if let Some(&offset) = index.get(target as usize) {
            self.stream.seek(offset)?;
            self.cursor = target;
            return Ok(());
        }

        let mut known = index.len() as u64 - 1;
        self.stream.seek(index[known as usize])?;
        trace!(from = known, to = target, "scanning result records");
        let ctx = DecodeContext {
            fields: &self.fields,
        };
        while known < target {
            skip_record(&mut self.stream, ctx);
            if let Some(err) = self.stream.error() {
                return Err(err.clone());
            }
            index.push(self.stream.tell());
            known += 1;
        }
        self.cursor = target;
        Ok(())
    }

    /// Decode item `target`, leaving the cursor on the item after it.
    pub fn item_at(&mut self, target: u64) -> Result<ResultItem, StreamError> {
        self.seek_to_index(target)?;
        let item = self.next_item();
        match (self.stream.error(), item) {
            (Some(err), _) => Err(err.clone()),
            (None, Some(item)) => Ok(item),
            (None, None) => Err(StreamError::UnexpectedEnd),
        }
    }

    /// Number of records whose offsets are known.
    pub fn indexed_len(&self) -> usize {
        self.index.as_ref().map_or(0, Vec::len)
    }
}

impl<S: Stream> Iterator for ResultList<S> {
    type Item = ResultItem;

    fn next(&mut self) -> Option<ResultItem> {
        self.next_item()
    }
}
