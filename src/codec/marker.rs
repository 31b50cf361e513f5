//! AMF3 marker byte constants.

pub const UNDEFINED: u8 = 0x00;
pub const NULL: u8 = 0x01;

// Boolean: the value is the marker itself.
pub const FALSE: u8 = 0x02;
pub const TRUE: u8 = 0x03;

// Integer: U29, two's complement over 29 bits
pub const INTEGER: u8 = 0x04;

// Double (IEEE 754, big-endian)
pub const DOUBLE: u8 = 0x05;

pub const STRING: u8 = 0x06;
pub const ARRAY: u8 = 0x09;
pub const OBJECT: u8 = 0x0A;

// Extension markers. Recognized, not decoded.
pub const XML_DOC: u8 = 0x07;
pub const DATE: u8 = 0x08;
pub const XML: u8 = 0x0B;
pub const BYTE_ARRAY: u8 = 0x0C;

/// U29 `(0 << 1) | 1`: the empty string, which doubles as the end-of-members sentinel.
pub const EMPTY_STRING: u8 = 0x01;

// Object header flags, read from the low bits of the lead U29.
// Bit 0: inline instance (1) or object reference (0)
// Bit 1: inline traits (1) or traits reference (0)
// Bit 2: externalizable
// Bit 3: dynamic
// Bits 4..: sealed member count
pub const TRAITS_INLINE: u32 = 0b0010;
pub const TRAITS_EXTERNALIZABLE: u32 = 0b0100;
pub const TRAITS_DYNAMIC: u32 = 0b1000;

/// Lead U29 for an anonymous dynamic object with inline traits and no sealed members.
pub const ANONYMOUS_DYNAMIC_TRAITS: u8 = 0x0B;
