//! Property identifiers, request flags, wire value types and decoded values.

use std::fmt;

use bitflags::bitflags;
use bytes::Bytes;

/// Identifier of a result property (column) known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u32);

impl PropertyId {
    pub const NAME: PropertyId = PropertyId(0);
    pub const PATH: PropertyId = PropertyId(1);
    pub const SIZE: PropertyId = PropertyId(2);
    pub const EXTENSION: PropertyId = PropertyId(3);
    pub const TYPE: PropertyId = PropertyId(4);
    pub const DATE_MODIFIED: PropertyId = PropertyId(5);
    pub const DATE_CREATED: PropertyId = PropertyId(6);
    pub const DATE_ACCESSED: PropertyId = PropertyId(7);
    pub const ATTRIBUTES: PropertyId = PropertyId(8);

    const BUILTIN: [(&'static str, PropertyId); 9] = [
        ("name", Self::NAME),
        ("path", Self::PATH),
        ("size", Self::SIZE),
        ("extension", Self::EXTENSION),
        ("type", Self::TYPE),
        ("date-modified", Self::DATE_MODIFIED),
        ("date-created", Self::DATE_CREATED),
        ("date-accessed", Self::DATE_ACCESSED),
        ("attributes", Self::ATTRIBUTES),
    ];

    /// Look up a built-in property by its column name.
    ///
    /// Names are case-insensitive and `_` is accepted for `-`.
    pub fn from_name(name: &str) -> Option<PropertyId> {
        let wanted = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::BUILTIN
            .iter()
            .find(|(builtin, _)| *builtin == wanted)
            .map(|(_, id)| *id)
    }

    /// Column name of a built-in property.
    pub fn name(self) -> Option<&'static str> {
        Self::BUILTIN
            .iter()
            .find(|(_, id)| *id == self)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "property-{}", self.0),
        }
    }
}

bitflags! {
    /// How the service should deliver a requested property.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestFlags: u32 {
        /// Deliver display text instead of the raw value.
        const FORMAT = 0x0000_0001;
        /// Deliver display text with search matches marked by `*`.
        const HIGHLIGHT = 0x0000_0002;
    }
}

impl RequestFlags {
    /// True when the value arrives as text whatever its declared type.
    pub fn is_text(self) -> bool {
        self.intersects(RequestFlags::FORMAT | RequestFlags::HIGHLIGHT)
    }
}

bitflags! {
    /// Per-item flags leading every result record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ItemFlags: u8 {
        const FOLDER = 0x01;
        const ROOT = 0x02;
    }
}

/// One property the caller asks the service to transfer per result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyRequest {
    pub property: PropertyId,
    pub flags: RequestFlags,
}

impl PropertyRequest {
    /// Request the raw typed value.
    pub fn raw(property: PropertyId) -> Self {
        Self {
            property,
            flags: RequestFlags::empty(),
        }
    }

    /// Request display text.
    pub fn formatted(property: PropertyId) -> Self {
        Self {
            property,
            flags: RequestFlags::FORMAT,
        }
    }

    /// Request display text with search matches highlighted.
    pub fn highlighted(property: PropertyId) -> Self {
        Self {
            property,
            flags: RequestFlags::HIGHLIGHT,
        }
    }
}

/// One sort key; the first key of a list is the primary sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub property: PropertyId,
    pub descending: bool,
}

impl SortKey {
    pub const FLAG_DESCENDING: u32 = 0x0000_0001;

    pub fn ascending(property: PropertyId) -> Self {
        Self {
            property,
            descending: false,
        }
    }

    pub fn descending(property: PropertyId) -> Self {
        Self {
            property,
            descending: true,
        }
    }

    pub fn wire_flags(self) -> u32 {
        if self.descending {
            Self::FLAG_DESCENDING
        } else {
            0
        }
    }

    pub fn from_wire(property: u32, flags: u32) -> Self {
        Self {
            property: PropertyId(property),
            descending: flags & Self::FLAG_DESCENDING != 0,
        }
    }
}

/// Wire type the service declares for a requested property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Byte,
    Word,
    Dword,
    /// `u32` in thousandths.
    DwordFixedQ1K,
    Uint64,
    Uint128,
    /// Two `u32`: width then height.
    Dimensions,
    Pstring,
    PstringMultistring,
    PstringStringReference,
    /// Native size: 4 or 8 bytes depending on the request's 64-bit flag.
    SizeT,
    /// `i32` in thousandths.
    Int32FixedQ1K,
    /// `i32` in millionths.
    Int32FixedQ1M,
    PstringFolderReference,
    PstringFileOrFolderReference,
    /// Blob with a one-byte length.
    Blob8,
    DwordGetText,
    WordGetText,
    /// Blob with a two-byte length.
    Blob16,
    ByteGetText,
    PropVariant,
    /// A tag this client does not know.
    Unknown(u8),
}

impl ValueType {
    pub fn from_u8(tag: u8) -> Self {
        match tag {
            0 => Self::Null,
            1 => Self::Byte,
            2 => Self::Word,
            3 => Self::Dword,
            4 => Self::DwordFixedQ1K,
            5 => Self::Uint64,
            6 => Self::Uint128,
            7 => Self::Dimensions,
            8 => Self::Pstring,
            9 => Self::PstringMultistring,
            10 => Self::PstringStringReference,
            11 => Self::SizeT,
            12 => Self::Int32FixedQ1K,
            13 => Self::Int32FixedQ1M,
            14 => Self::PstringFolderReference,
            15 => Self::PstringFileOrFolderReference,
            16 => Self::Blob8,
            17 => Self::DwordGetText,
            18 => Self::WordGetText,
            19 => Self::Blob16,
            20 => Self::ByteGetText,
            21 => Self::PropVariant,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Byte => 1,
            Self::Word => 2,
            Self::Dword => 3,
            Self::DwordFixedQ1K => 4,
            Self::Uint64 => 5,
            Self::Uint128 => 6,
            Self::Dimensions => 7,
            Self::Pstring => 8,
            Self::PstringMultistring => 9,
            Self::PstringStringReference => 10,
            Self::SizeT => 11,
            Self::Int32FixedQ1K => 12,
            Self::Int32FixedQ1M => 13,
            Self::PstringFolderReference => 14,
            Self::PstringFileOrFolderReference => 15,
            Self::Blob8 => 16,
            Self::DwordGetText => 17,
            Self::WordGetText => 18,
            Self::Blob16 => 19,
            Self::ByteGetText => 20,
            Self::PropVariant => 21,
            Self::Unknown(tag) => tag,
        }
    }

    /// Every known type, in tag order.
    pub const KNOWN: [ValueType; 22] = [
        Self::Null,
        Self::Byte,
        Self::Word,
        Self::Dword,
        Self::DwordFixedQ1K,
        Self::Uint64,
        Self::Uint128,
        Self::Dimensions,
        Self::Pstring,
        Self::PstringMultistring,
        Self::PstringStringReference,
        Self::SizeT,
        Self::Int32FixedQ1K,
        Self::Int32FixedQ1M,
        Self::PstringFolderReference,
        Self::PstringFileOrFolderReference,
        Self::Blob8,
        Self::DwordGetText,
        Self::WordGetText,
        Self::Blob16,
        Self::ByteGetText,
        Self::PropVariant,
    ];

    /// Width of a raw value of this type when it is fixed.
    pub fn fixed_width(self, is_64bit: bool) -> Option<u64> {
        match self {
            Self::Null => Some(0),
            Self::Byte | Self::ByteGetText => Some(1),
            Self::Word | Self::WordGetText => Some(2),
            Self::Dword
            | Self::DwordGetText
            | Self::DwordFixedQ1K
            | Self::Int32FixedQ1K
            | Self::Int32FixedQ1M => Some(4),
            Self::Uint64 | Self::Dimensions => Some(8),
            Self::Uint128 => Some(16),
            Self::SizeT => Some(if is_64bit { 8 } else { 4 }),
            Self::Pstring
            | Self::PstringMultistring
            | Self::PstringStringReference
            | Self::PstringFolderReference
            | Self::PstringFileOrFolderReference
            | Self::Blob8
            | Self::Blob16
            | Self::PropVariant
            | Self::Unknown(_) => None,
        }
    }
}

/// A requested property as echoed in the result-list header, with the wire
/// type the service resolved for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyField {
    pub property: PropertyId,
    pub flags: RequestFlags,
    pub value_type: ValueType,
}

impl PropertyField {
    pub fn new(request: PropertyRequest, value_type: ValueType) -> Self {
        Self {
            property: request.property,
            flags: request.flags,
            value_type,
        }
    }
}

/// Fixed-point number: `raw / 10^decimals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    pub raw: i64,
    pub decimals: u8,
}

impl FixedPoint {
    pub fn new(raw: i64, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// Rescale a float to six decimals, saturating at the `i64` range.
    pub fn from_f64(value: f64) -> Self {
        Self::new((value * 1_000_000.0).round() as i64, 6)
    }

    pub fn to_f64(self) -> f64 {
        self.raw as f64 / 10f64.powi(i32::from(self.decimals))
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10u128.pow(u32::from(self.decimals));
        let magnitude = u128::from(self.raw.unsigned_abs());
        let sign = if self.raw < 0 { "-" } else { "" };
        if self.decimals == 0 {
            return write!(f, "{sign}{magnitude}");
        }
        write!(
            f,
            "{sign}{}.{:0width$}",
            magnitude / scale,
            magnitude % scale,
            width = usize::from(self.decimals)
        )
    }
}

/// Text with search matches marked: `*` toggles a highlighted run and
/// `**` stands for a literal asterisk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedText(pub String);

impl HighlightedText {
    /// The text as delivered, markers included.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(text, highlighted)` runs.
    pub fn spans(&self) -> Vec<(String, bool)> {
        let mut spans = Vec::new();
        let mut current = String::new();
        let mut highlighted = false;
        let mut chars = self.0.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '*' {
                current.push(c);
                continue;
            }
            if chars.peek() == Some(&'*') {
                chars.next();
                current.push('*');
                continue;
            }
            if !current.is_empty() {
                spans.push((std::mem::take(&mut current), highlighted));
            }
            highlighted = !highlighted;
        }
        if !current.is_empty() {
            spans.push((current, highlighted));
        }
        spans
    }

    /// The text with markers removed.
    pub fn plain(&self) -> String {
        self.spans().into_iter().map(|(text, _)| text).collect()
    }
}

impl fmt::Display for HighlightedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Separator between array elements in a combined display value.
pub const ARRAY_SEPARATOR: &str = "; ";

/// A decoded variant value.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Empty,
    Null,
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    /// Float or double, rescaled to six decimals.
    Real(FixedPoint),
    Bool(bool),
    /// 100ns intervals since 1601-01-01 UTC.
    FileTime(u64),
    Clsid([u8; 16]),
    String(String),
    Blob(Bytes),
    /// A status code stored as a value.
    Error(u32),
    /// Currency with four implied decimals.
    Currency(FixedPoint),
    Array(Vec<Variant>),
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Empty | Variant::Null => Ok(()),
            Variant::U8(v) => write!(f, "{v}"),
            Variant::I8(v) => write!(f, "{v}"),
            Variant::U16(v) => write!(f, "{v}"),
            Variant::I16(v) => write!(f, "{v}"),
            Variant::U32(v) => write!(f, "{v}"),
            Variant::I32(v) => write!(f, "{v}"),
            Variant::U64(v) => write!(f, "{v}"),
            Variant::I64(v) => write!(f, "{v}"),
            Variant::Real(v) | Variant::Currency(v) => write!(f, "{v}"),
            Variant::Bool(v) => write!(f, "{v}"),
            Variant::FileTime(v) => write!(f, "{v}"),
            Variant::Clsid(bytes) => write_clsid(f, bytes),
            Variant::String(s) => f.write_str(s),
            Variant::Blob(bytes) => write_hex(f, bytes),
            Variant::Error(code) => write!(f, "{code:#010x}"),
            Variant::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(ARRAY_SEPARATOR)?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// One decoded property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// The property has no value for this item.
    Empty,
    /// Placeholder for a value this client cannot interpret.
    Unknown,
    Text(String),
    Highlighted(HighlightedText),
    Byte(u8),
    Word(u16),
    Dword(u32),
    Uint64(u64),
    Uint128(u128),
    Size(u64),
    Fixed(FixedPoint),
    Dimensions { width: u32, height: u32 },
    Blob(Bytes),
    Variant(Variant),
}

impl PropertyValue {
    /// Unsigned integer view of scalar values.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropertyValue::Byte(v) => Some(u64::from(*v)),
            PropertyValue::Word(v) => Some(u64::from(*v)),
            PropertyValue::Dword(v) => Some(u64::from(*v)),
            PropertyValue::Uint64(v) | PropertyValue::Size(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view of string values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::Highlighted(h) => Some(h.as_str()),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, PropertyValue::Unknown)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Empty | PropertyValue::Unknown => Ok(()),
            PropertyValue::Text(s) => f.write_str(s),
            PropertyValue::Highlighted(h) => write!(f, "{h}"),
            PropertyValue::Byte(v) => write!(f, "{v}"),
            PropertyValue::Word(v) => write!(f, "{v}"),
            PropertyValue::Dword(v) => write!(f, "{v}"),
            PropertyValue::Uint64(v) | PropertyValue::Size(v) => write!(f, "{v}"),
            PropertyValue::Uint128(v) => write!(f, "{v}"),
            PropertyValue::Fixed(v) => write!(f, "{v}"),
            PropertyValue::Dimensions { width, height } => write!(f, "{width}x{height}"),
            PropertyValue::Blob(bytes) => write_hex(f, bytes),
            PropertyValue::Variant(v) => write!(f, "{v}"),
        }
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{b:02x}")?;
    }
    Ok(())
}

fn write_clsid(f: &mut fmt::Formatter<'_>, b: &[u8; 16]) -> fmt::Result {
    let d1 = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    let d2 = u16::from_le_bytes([b[4], b[5]]);
    let d3 = u16::from_le_bytes([b[6], b[7]]);
    write!(f, "{{{d1:08X}-{d2:04X}-{d3:04X}-{:02X}{:02X}-", b[8], b[9])?;
    for byte in &b[10..] {
        write!(f, "{byte:02X}")?;
    }
    f.write_str("}")
}
