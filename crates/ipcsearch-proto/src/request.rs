//! Search request encoding.

use bitflags::bitflags;
use bytes::{BufMut, BytesMut};
use ipcsearch_frame::{encode_len_vlq, encoded_len_vlq};

use crate::error::{ProtoError, Result};
use crate::property::{PropertyRequest, SortKey};

bitflags! {
    /// Search options sent in the first word of a search request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SearchFlags: u32 {
        const MATCH_CASE = 0x0000_0001;
        const MATCH_WHOLE_WORDS = 0x0000_0002;
        const MATCH_PATH = 0x0000_0004;
        const REGEX = 0x0000_0008;
        const MATCH_DIACRITICS = 0x0000_0010;
        const MATCH_PREFIX = 0x0000_0020;
        const MATCH_SUFFIX = 0x0000_0040;
        const IGNORE_PUNCTUATION = 0x0000_0080;
        const IGNORE_WHITESPACE = 0x0000_0100;
        const FOLDERS_FIRST_ALWAYS = 0x0000_0200;
        const FOLDERS_FIRST_NEVER = 0x0000_0400;
        const FOLDERS_FIRST_DESCENDING = 0x0000_0600;
        const REQUEST_TOTAL_SIZE = 0x0000_0800;
        const HIDE_RESULT_OMISSIONS = 0x0000_1000;
        const SORT_MIX = 0x0000_2000;
        /// Native-size fields in request and response are 8 bytes wide.
        const SIZE_T_64BIT = 0x0000_4000;
        const FORCE_REFRESH = 0x0000_8000;
    }
}

impl SearchFlags {
    /// Mask of the two bits selecting the folders-first mode.
    pub const FOLDERS_FIRST_MASK: SearchFlags = SearchFlags::FOLDERS_FIRST_DESCENDING;

    /// Replace the folders-first mode. `None` keeps folders first in the
    /// direction of the primary sort.
    pub fn with_folders_first(self, mode: Option<SearchFlags>) -> SearchFlags {
        let cleared = self.difference(Self::FOLDERS_FIRST_MASK);
        match mode {
            Some(mode) => cleared | mode.intersection(Self::FOLDERS_FIRST_MASK),
            None => cleared,
        }
    }

    pub fn is_64bit(self) -> bool {
        self.contains(SearchFlags::SIZE_T_64BIT)
    }
}

/// A search query with its viewport, sort order and requested properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub flags: SearchFlags,
    pub text: String,
    pub viewport_offset: u64,
    pub viewport_count: u64,
    /// Primary sort first.
    pub sort: Vec<SortKey>,
    /// Properties transferred per result, in record order.
    pub properties: Vec<PropertyRequest>,
}

impl SearchRequest {
    /// A request for `text` with the native size of this host, an unbounded
    /// viewport, default sort and no properties.
    pub fn new(text: impl Into<String>) -> Self {
        let flags = if cfg!(target_pointer_width = "64") {
            SearchFlags::SIZE_T_64BIT
        } else {
            SearchFlags::empty()
        };
        Self {
            flags,
            text: text.into(),
            viewport_offset: 0,
            viewport_count: native_max(flags),
            sort: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn flags(mut self, flags: SearchFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn viewport(mut self, offset: u64, count: u64) -> Self {
        self.viewport_offset = offset;
        self.viewport_count = count;
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn property(mut self, request: PropertyRequest) -> Self {
        self.properties.push(request);
        self
    }

    fn native_width(&self) -> usize {
        if self.flags.is_64bit() {
            8
        } else {
            4
        }
    }

    /// Exact size of the encoded request payload.
    pub fn encoded_len(&self) -> usize {
        4 + encoded_len_vlq(self.text.len() as u64)
            + self.text.len()
            + 2 * self.native_width()
            + encoded_len_vlq(self.sort.len() as u64)
            + 8 * self.sort.len()
            + encoded_len_vlq(self.properties.len() as u64)
            + 8 * self.properties.len()
    }

    /// Append the request payload to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let max = native_max(self.flags);
        for (what, value) in [
            ("viewport offset", self.viewport_offset),
            ("viewport count", self.viewport_count),
        ] {
            if value > max {
                return Err(ProtoError::Request(format!(
                    "{what} {value} does not fit a 32-bit size field"
                )));
            }
        }

        let start = dst.len();
        dst.reserve(self.encoded_len());
        dst.put_u32_le(self.flags.bits());
        encode_len_vlq(self.text.len() as u64, Some(dst));
        dst.put_slice(self.text.as_bytes());
        if self.flags.is_64bit() {
            dst.put_u64_le(self.viewport_offset);
            dst.put_u64_le(self.viewport_count);
        } else {
            dst.put_u32_le(self.viewport_offset as u32);
            dst.put_u32_le(self.viewport_count as u32);
        }
        encode_len_vlq(self.sort.len() as u64, Some(dst));
        for key in &self.sort {
            dst.put_u32_le(key.property.0);
            dst.put_u32_le(key.wire_flags());
        }
        encode_len_vlq(self.properties.len() as u64, Some(dst));
        for request in &self.properties {
            dst.put_u32_le(request.property.0);
            dst.put_u32_le(request.flags.bits());
        }
        debug_assert_eq!(dst.len() - start, self.encoded_len());
        Ok(())
    }
}

fn native_max(flags: SearchFlags) -> u64 {
    if flags.is_64bit() {
        u64::MAX
    } else {
        u64::from(u32::MAX)
    }
}
