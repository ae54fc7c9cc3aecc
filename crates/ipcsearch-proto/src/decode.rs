//! Typed property decoding.
//!
//! Records carry no per-field tags: each value is read according to the
//! wire type the header declared for its property, in request order. Every
//! decode path has a skip twin that consumes exactly the same bytes.

use bytes::Bytes;
use tracing::warn;

use crate::error::StreamError;
use crate::property::{
    FixedPoint, HighlightedText, ItemFlags, PropertyField, PropertyValue, RequestFlags,
    ValueType, Variant,
};
use crate::stream::Stream;

/// Most elements accepted in an array of a kind with no payload bytes.
pub const MAX_EMPTY_ARRAY_LEN: u64 = 1 << 16;

/// Decoding state shared by every record of one result list.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    /// Properties in the order their values appear in each record.
    pub fields: &'a [PropertyField],
}

/// One decoded result.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    pub flags: ItemFlags,
    /// One value per requested property, in request order.
    pub values: Vec<PropertyValue>,
}

impl ResultItem {
    pub fn is_folder(&self) -> bool {
        self.flags.contains(ItemFlags::FOLDER)
    }
}

/// Decode one record: item flags, then one value per field.
pub fn decode_record<S: Stream + ?Sized>(stream: &mut S, ctx: DecodeContext<'_>) -> ResultItem {
    let flags = ItemFlags::from_bits_retain(stream.read_u8());
    let values = ctx
        .fields
        .iter()
        .map(|field| decode_value(stream, field))
        .collect();
    ResultItem { flags, values }
}

/// Skip one record.
pub fn skip_record<S: Stream + ?Sized>(stream: &mut S, ctx: DecodeContext<'_>) {
    stream.skip(1);
    for field in ctx.fields {
        skip_value(stream, field);
    }
}

/// Decode the value of one field.
pub fn decode_value<S: Stream + ?Sized>(stream: &mut S, field: &PropertyField) -> PropertyValue {
    if field.flags.is_text() {
        let text = stream.read_string();
        return if field.flags.contains(RequestFlags::HIGHLIGHT) {
            PropertyValue::Highlighted(HighlightedText(text))
        } else {
            PropertyValue::Text(text)
        };
    }

    match field.value_type {
        ValueType::Null => PropertyValue::Empty,
        ValueType::Byte | ValueType::ByteGetText => PropertyValue::Byte(stream.read_u8()),
        ValueType::Word | ValueType::WordGetText => PropertyValue::Word(stream.read_u16()),
        ValueType::Dword | ValueType::DwordGetText => PropertyValue::Dword(stream.read_u32()),
        ValueType::DwordFixedQ1K => {
            PropertyValue::Fixed(FixedPoint::new(i64::from(stream.read_u32()), 3))
        }
        ValueType::Int32FixedQ1K => {
            PropertyValue::Fixed(FixedPoint::new(i64::from(stream.read_u32() as i32), 3))
        }
        ValueType::Int32FixedQ1M => {
            PropertyValue::Fixed(FixedPoint::new(i64::from(stream.read_u32() as i32), 6))
        }
        ValueType::Uint64 => PropertyValue::Uint64(stream.read_u64()),
        ValueType::Uint128 => {
            let lo = stream.read_u64();
            let hi = stream.read_u64();
            PropertyValue::Uint128((u128::from(hi) << 64) | u128::from(lo))
        }
        ValueType::Dimensions => {
            let width = stream.read_u32();
            let height = stream.read_u32();
            PropertyValue::Dimensions { width, height }
        }
        ValueType::SizeT => PropertyValue::Size(stream.read_size()),
        ValueType::Pstring
        | ValueType::PstringMultistring
        | ValueType::PstringStringReference
        | ValueType::PstringFolderReference
        | ValueType::PstringFileOrFolderReference => PropertyValue::Text(stream.read_string()),
        ValueType::Blob8 => {
            let len = u64::from(stream.read_u8());
            PropertyValue::Blob(Bytes::from(stream.read_vec(len)))
        }
        ValueType::Blob16 => {
            let len = u64::from(stream.read_u16());
            PropertyValue::Blob(Bytes::from(stream.read_vec(len)))
        }
        ValueType::PropVariant => PropertyValue::Variant(decode_variant(stream)),
        ValueType::Unknown(tag) => {
            unhandled_format(field, tag);
            PropertyValue::Unknown
        }
    }
}

/// Skip the value of one field.
pub fn skip_value<S: Stream + ?Sized>(stream: &mut S, field: &PropertyField) {
    if field.flags.is_text() {
        skip_string(stream);
        return;
    }

    if let Some(width) = field.value_type.fixed_width(stream.is_64bit()) {
        stream.skip(width);
        return;
    }

    match field.value_type {
        ValueType::Pstring
        | ValueType::PstringMultistring
        | ValueType::PstringStringReference
        | ValueType::PstringFolderReference
        | ValueType::PstringFileOrFolderReference => skip_string(stream),
        ValueType::Blob8 => {
            let len = u64::from(stream.read_u8());
            stream.skip(len);
        }
        ValueType::Blob16 => {
            let len = u64::from(stream.read_u16());
            stream.skip(len);
        }
        ValueType::PropVariant => skip_variant(stream),
        ValueType::Unknown(tag) => unhandled_format(field, tag),
        // fixed-width types are handled above
        _ => {}
    }
}

fn skip_string<S: Stream + ?Sized>(stream: &mut S) {
    let len = stream.read_len_vlq();
    stream.skip(len);
}

fn unhandled_format(field: &PropertyField, tag: u8) {
    warn!(
        property = field.property.0,
        value_type = tag,
        flags = field.flags.bits(),
        "unhandled property format, substituting placeholder"
    );
}

/// Scalar kinds of a variant value; bit 0x80 of the tag marks an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Empty,
    Null,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    R4,
    R8,
    Bool,
    FileTime,
    Clsid,
    String,
    Blob,
    Error,
    Currency,
}

impl VariantKind {
    pub const ARRAY_FLAG: u8 = 0x80;

    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Empty,
            1 => Self::Null,
            2 => Self::U8,
            3 => Self::I8,
            4 => Self::U16,
            5 => Self::I16,
            6 => Self::U32,
            7 => Self::I32,
            8 => Self::U64,
            9 => Self::I64,
            10 => Self::R4,
            11 => Self::R8,
            12 => Self::Bool,
            13 => Self::FileTime,
            14 => Self::Clsid,
            15 => Self::String,
            16 => Self::Blob,
            17 => Self::Error,
            18 => Self::Currency,
            _ => return None,
        })
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Null => 1,
            Self::U8 => 2,
            Self::I8 => 3,
            Self::U16 => 4,
            Self::I16 => 5,
            Self::U32 => 6,
            Self::I32 => 7,
            Self::U64 => 8,
            Self::I64 => 9,
            Self::R4 => 10,
            Self::R8 => 11,
            Self::Bool => 12,
            Self::FileTime => 13,
            Self::Clsid => 14,
            Self::String => 15,
            Self::Blob => 16,
            Self::Error => 17,
            Self::Currency => 18,
        }
    }

    /// Every kind, in tag order.
    pub const ALL: [VariantKind; 19] = [
        Self::Empty,
        Self::Null,
        Self::U8,
        Self::I8,
        Self::U16,
        Self::I16,
        Self::U32,
        Self::I32,
        Self::U64,
        Self::I64,
        Self::R4,
        Self::R8,
        Self::Bool,
        Self::FileTime,
        Self::Clsid,
        Self::String,
        Self::Blob,
        Self::Error,
        Self::Currency,
    ];

    /// Width of one scalar of this kind when it is fixed.
    pub fn fixed_width(self) -> Option<u64> {
        match self {
            Self::Empty | Self::Null => Some(0),
            Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 | Self::Bool => Some(2),
            Self::U32 | Self::I32 | Self::R4 | Self::Error => Some(4),
            Self::U64 | Self::I64 | Self::R8 | Self::FileTime | Self::Currency => Some(8),
            Self::Clsid => Some(16),
            Self::String | Self::Blob => None,
        }
    }
}

/// Decode a variant value: a sub-tag byte, then a scalar or an array.
pub fn decode_variant<S: Stream + ?Sized>(stream: &mut S) -> Variant {
    let tag = stream.read_u8();
    let Some(kind) = VariantKind::from_u8(tag & !VariantKind::ARRAY_FLAG) else {
        stream.fail(StreamError::UnknownVariantType(tag));
        return Variant::Empty;
    };

    if tag & VariantKind::ARRAY_FLAG == 0 {
        return decode_scalar(stream, kind);
    }

    let count = stream.read_len_vlq();
    if !check_array_len(stream, kind, count) {
        return Variant::Array(Vec::new());
    }
    let mut items = Vec::new();
    let mut left = count;
    while left > 0 && !stream.is_error() {
        items.push(decode_scalar(stream, kind));
        left -= 1;
    }
    Variant::Array(items)
}

/// Skip a variant value.
pub fn skip_variant<S: Stream + ?Sized>(stream: &mut S) {
    let tag = stream.read_u8();
    let Some(kind) = VariantKind::from_u8(tag & !VariantKind::ARRAY_FLAG) else {
        stream.fail(StreamError::UnknownVariantType(tag));
        return;
    };

    if tag & VariantKind::ARRAY_FLAG == 0 {
        skip_scalar(stream, kind);
        return;
    }

    let count = stream.read_len_vlq();
    if !check_array_len(stream, kind, count) {
        return;
    }
    if let Some(width) = kind.fixed_width() {
        match count.checked_mul(width) {
            Some(total) => stream.skip(total),
            None => stream.fail(StreamError::LengthOverflow),
        }
        return;
    }

    let mut left = count;
    while left > 0 && !stream.is_error() {
        skip_scalar(stream, kind);
        left -= 1;
    }
}

/// Reject arrays whose elements occupy no bytes but claim more than
/// [`MAX_EMPTY_ARRAY_LEN`] entries.
fn check_array_len<S: Stream + ?Sized>(stream: &mut S, kind: VariantKind, count: u64) -> bool {
    if kind.fixed_width() == Some(0) && count > MAX_EMPTY_ARRAY_LEN {
        stream.fail(StreamError::LengthOverflow);
        return false;
    }
    true
}

fn decode_scalar<S: Stream + ?Sized>(stream: &mut S, kind: VariantKind) -> Variant {
    match kind {
        VariantKind::Empty => Variant::Empty,
        VariantKind::Null => Variant::Null,
        VariantKind::U8 => Variant::U8(stream.read_u8()),
        VariantKind::I8 => Variant::I8(stream.read_u8() as i8),
        VariantKind::U16 => Variant::U16(stream.read_u16()),
        VariantKind::I16 => Variant::I16(stream.read_u16() as i16),
        VariantKind::U32 => Variant::U32(stream.read_u32()),
        VariantKind::I32 => Variant::I32(stream.read_u32() as i32),
        VariantKind::U64 => Variant::U64(stream.read_u64()),
        VariantKind::I64 => Variant::I64(stream.read_u64() as i64),
        VariantKind::R4 => {
            let value = f32::from_bits(stream.read_u32());
            Variant::Real(FixedPoint::from_f64(f64::from(value)))
        }
        VariantKind::R8 => Variant::Real(FixedPoint::from_f64(f64::from_bits(stream.read_u64()))),
        VariantKind::Bool => Variant::Bool(stream.read_u16() != 0),
        VariantKind::FileTime => Variant::FileTime(stream.read_u64()),
        VariantKind::Clsid => {
            let mut clsid = [0u8; 16];
            stream.read(&mut clsid);
            Variant::Clsid(clsid)
        }
        VariantKind::String => Variant::String(stream.read_string()),
        VariantKind::Blob => {
            let len = stream.read_len_vlq();
            Variant::Blob(Bytes::from(stream.read_vec(len)))
        }
        VariantKind::Error => Variant::Error(stream.read_u32()),
        VariantKind::Currency => Variant::Currency(FixedPoint::new(stream.read_u64() as i64, 4)),
    }
}

fn skip_scalar<S: Stream + ?Sized>(stream: &mut S, kind: VariantKind) {
    match kind.fixed_width() {
        Some(width) => stream.skip(width),
        None => skip_string(stream),
    }
}
