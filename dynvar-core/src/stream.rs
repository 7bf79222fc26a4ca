//! The versioned binary stream values are serialized to.
//!
//! The format is a plain concatenation of fixed-width fields in the
//! configured byte order; there is no framing or self-description beyond
//! what each type writes. Reading never fails loudly: a short or malformed
//! input flips the reader's [`StreamStatus`] and yields zero values, and the
//! first failure sticks.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use uuid::Uuid;

/// Protocol version of a stream. Newer versions only ever add fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamVersion(pub u8);

impl StreamVersion {
    /// The oldest version with a type-id table of its own.
    pub const V3_3: StreamVersion = StreamVersion(6);
    /// Fixed ids replaced the legacy table.
    pub const V4_0: StreamVersion = StreamVersion(7);
    /// Values carry a null flag.
    pub const V4_2: StreamVersion = StreamVersion(8);
    /// Url values are written encoded.
    pub const V4_4: StreamVersion = StreamVersion(10);
    /// Floating point precision becomes configurable.
    pub const V4_6: StreamVersion = StreamVersion(12);
    /// Current id layout; dates become 64-bit Julian days.
    pub const V5_0: StreamVersion = StreamVersion(13);
    /// Date-times may carry an offset.
    pub const V5_2: StreamVersion = StreamVersion(15);
    /// The newest version this crate writes.
    pub const V5_15: StreamVersion = StreamVersion(19);
    /// Alias for the newest version.
    pub const CURRENT: StreamVersion = StreamVersion::V5_15;
}

impl Default for StreamVersion {
    fn default() -> Self {
        StreamVersion::CURRENT
    }
}

/// Byte order of multi-byte fields.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Network order; the default.
    #[default]
    BigEndian,
    /// Little endian.
    LittleEndian,
}

/// Width used for floating point fields from [`StreamVersion::V4_6`] on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum FloatPrecision {
    /// Both `f32` and `f64` are written with 4 bytes.
    Single,
    /// Both `f32` and `f64` are written with 8 bytes.
    #[default]
    Double,
}

/// How a stream is laid out. Writer and reader must agree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct StreamOptions {
    /// Protocol version.
    pub version: StreamVersion,
    /// Byte order.
    pub byte_order: ByteOrder,
    /// Floating point width.
    pub float_precision: FloatPrecision,
}

impl StreamOptions {
    /// Default options at the given version.
    pub fn with_version(version: StreamVersion) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    fn wide_floats(&self) -> Option<bool> {
        if self.version < StreamVersion::V4_6 {
            None
        } else {
            Some(self.float_precision == FloatPrecision::Double)
        }
    }
}

/// Health of a [`StreamReader`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum StreamStatus {
    /// Nothing went wrong.
    #[default]
    Ok,
    /// The input ended before a field was complete.
    ReadPastEnd,
    /// The input was complete but not understood.
    ReadCorruptData,
}

const NULL_LENGTH: u32 = u32::MAX;

macro_rules! write_ints {
    ($($name:ident: $t:ty),* $(,)?) => {
        $(
            #[doc = concat!("Writes a `", stringify!($t), "`.")]
            pub fn $name(&mut self, v: $t) {
                let bytes = match self.options.byte_order {
                    ByteOrder::BigEndian => v.to_be_bytes(),
                    ByteOrder::LittleEndian => v.to_le_bytes(),
                };
                self.buf.extend_from_slice(&bytes);
            }
        )*
    };
}

/// Serializes into an in-memory buffer.
#[derive(Debug, Default)]
pub struct StreamWriter {
    buf: Vec<u8>,
    options: StreamOptions,
}

impl StreamWriter {
    /// A writer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer with the given options.
    pub fn with_options(options: StreamOptions) -> Self {
        Self {
            buf: Vec::new(),
            options,
        }
    }

    /// The options this writer was created with.
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Protocol version being written.
    pub fn version(&self) -> StreamVersion {
        self.options.version
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the writer, returning its buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    write_ints! {
        write_u8: u8,
        write_i8: i8,
        write_u16: u16,
        write_i16: i16,
        write_u32: u32,
        write_i32: i32,
        write_u64: u64,
        write_i64: i64,
    }

    /// Appends bytes without a length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a bool as one byte.
    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    /// Writes an `f32`, widened under double precision.
    pub fn write_f32(&mut self, v: f32) {
        match self.options.wide_floats() {
            Some(true) => self.write_u64(f64::from(v).to_bits()),
            _ => self.write_u32(v.to_bits()),
        }
    }

    /// Writes an `f64`, narrowed under single precision.
    pub fn write_f64(&mut self, v: f64) {
        match self.options.wide_floats() {
            Some(false) => self.write_u32((v as f32).to_bits()),
            _ => self.write_u64(v.to_bits()),
        }
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.write_raw(bytes);
    }

    /// Writes a string as its UTF-16 byte length followed by UTF-16 units.
    pub fn write_str(&mut self, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.write_len(units.len() * 2);
        for unit in units {
            self.write_u16(unit);
        }
    }

    /// Writes the null string marker.
    pub fn write_null_str(&mut self) {
        self.write_u32(NULL_LENGTH);
    }

    /// Writes a NUL-terminated byte string, the length counting the NUL.
    pub fn write_cstr(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len() + 1);
        self.write_raw(bytes);
        self.write_u8(0);
    }

    /// Writes an element count or byte length.
    pub fn write_len(&mut self, len: usize) {
        // lengths of u32::MAX and above collide with the null marker
        self.write_u32(u32::try_from(len).unwrap_or(NULL_LENGTH - 1));
    }
}

macro_rules! read_ints {
    ($($name:ident: $t:ty),* $(,)?) => {
        $(
            #[doc = concat!("Reads a `", stringify!($t), "`.")]
            pub fn $name(&mut self) -> $t {
                let bytes = self.take::<{ size_of::<$t>() }>();
                match self.options.byte_order {
                    ByteOrder::BigEndian => <$t>::from_be_bytes(bytes),
                    ByteOrder::LittleEndian => <$t>::from_le_bytes(bytes),
                }
            }
        )*
    };
}

/// Deserializes from a byte slice.
#[derive(Debug)]
pub struct StreamReader<'a> {
    input: &'a [u8],
    pos: usize,
    options: StreamOptions,
    status: StreamStatus,
}

impl<'a> StreamReader<'a> {
    /// A reader with default options.
    pub fn new(input: &'a [u8]) -> Self {
        Self::with_options(input, StreamOptions::default())
    }

    /// A reader with the given options.
    pub fn with_options(input: &'a [u8], options: StreamOptions) -> Self {
        Self {
            input,
            pos: 0,
            options,
            status: StreamStatus::Ok,
        }
    }

    /// The options this reader was created with.
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Protocol version being read.
    pub fn version(&self) -> StreamVersion {
        self.options.version
    }

    /// Current status.
    pub fn status(&self) -> StreamStatus {
        self.status
    }

    /// Records a failure. Only the first one is kept.
    pub fn set_status(&mut self, status: StreamStatus) {
        if self.status == StreamStatus::Ok {
            self.status = status;
        }
    }

    /// Whether no failure has been recorded.
    pub fn is_ok(&self) -> bool {
        self.status == StreamStatus::Ok
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    /// Whether the whole input was consumed.
    pub fn at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        match self.input.get(self.pos..self.pos + N) {
            Some(bytes) => {
                out.copy_from_slice(bytes);
                self.pos += N;
            }
            None => {
                self.pos = self.input.len();
                self.set_status(StreamStatus::ReadPastEnd);
            }
        }
        out
    }

    /// Reads `len` bytes without a length prefix.
    pub fn read_raw(&mut self, len: usize) -> &'a [u8] {
        match self.input.get(self.pos..self.pos.saturating_add(len)) {
            Some(bytes) => {
                self.pos += len;
                bytes
            }
            None => {
                self.pos = self.input.len();
                self.set_status(StreamStatus::ReadPastEnd);
                &[]
            }
        }
    }

    read_ints! {
        read_u8: u8,
        read_i8: i8,
        read_u16: u16,
        read_i16: i16,
        read_u32: u32,
        read_i32: i32,
        read_u64: u64,
        read_i64: i64,
    }

    /// Reads a one-byte bool.
    pub fn read_bool(&mut self) -> bool {
        self.read_u8() != 0
    }

    /// Reads an `f32` written by [`StreamWriter::write_f32`].
    pub fn read_f32(&mut self) -> f32 {
        match self.options.wide_floats() {
            Some(true) => f64::from_bits(self.read_u64()) as f32,
            _ => f32::from_bits(self.read_u32()),
        }
    }

    /// Reads an `f64` written by [`StreamWriter::write_f64`].
    pub fn read_f64(&mut self) -> f64 {
        match self.options.wide_floats() {
            Some(false) => f64::from(f32::from_bits(self.read_u32())),
            _ => f64::from_bits(self.read_u64()),
        }
    }

    /// Reads a length-prefixed byte array. The null marker reads as empty.
    pub fn read_bytes(&mut self) -> Vec<u8> {
        let len = self.read_u32();
        if len == NULL_LENGTH {
            return Vec::new();
        }
        self.read_raw(len as usize).to_vec()
    }

    /// Reads a UTF-16 string. The null marker reads as empty.
    pub fn read_str(&mut self) -> String {
        let len = self.read_u32();
        if len == NULL_LENGTH {
            return String::new();
        }
        if len % 2 != 0 {
            self.set_status(StreamStatus::ReadCorruptData);
            return String::new();
        }
        let bytes = self.read_raw(len as usize);
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| match self.options.byte_order {
                ByteOrder::BigEndian => u16::from_be_bytes([pair[0], pair[1]]),
                ByteOrder::LittleEndian => u16::from_le_bytes([pair[0], pair[1]]),
            })
            .collect();
        String::from_utf16_lossy(&units)
    }

    /// Reads a NUL-terminated byte string, dropping the terminator.
    pub fn read_cstr(&mut self) -> Vec<u8> {
        let mut bytes = self.read_bytes();
        if bytes.last() == Some(&0) {
            bytes.pop();
        }
        bytes
    }

    /// Reads an element count. The null marker reads as zero.
    pub fn read_len(&mut self) -> usize {
        match self.read_u32() {
            NULL_LENGTH => 0,
            len => len as usize,
        }
    }
}

/// A type with a binary stream representation.
pub trait Streamable: Sized {
    /// Appends `self` to `out`.
    fn write_to(&self, out: &mut StreamWriter);

    /// Reads a value back. On malformed input the reader's status is set
    /// and some value (usually the default) is still returned.
    fn read_from(input: &mut StreamReader<'_>) -> Self;
}

macro_rules! streamable_scalars {
    ($($t:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Streamable for $t {
                fn write_to(&self, out: &mut StreamWriter) {
                    out.$write(*self);
                }

                fn read_from(input: &mut StreamReader<'_>) -> Self {
                    input.$read()
                }
            }
        )*
    };
}

streamable_scalars! {
    bool => write_bool, read_bool;
    u8 => write_u8, read_u8;
    i8 => write_i8, read_i8;
    u16 => write_u16, read_u16;
    i16 => write_i16, read_i16;
    u32 => write_u32, read_u32;
    i32 => write_i32, read_i32;
    u64 => write_u64, read_u64;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl Streamable for () {
    fn write_to(&self, _out: &mut StreamWriter) {}

    fn read_from(_input: &mut StreamReader<'_>) -> Self {}
}

impl Streamable for char {
    fn write_to(&self, out: &mut StreamWriter) {
        let mut units = [0u16; 2];
        match self.encode_utf16(&mut units) {
            [unit] => out.write_u16(*unit),
            _ => out.write_u16(0xfffd),
        }
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        char::from_u32(u32::from(input.read_u16())).unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

impl Streamable for String {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_str(self);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        input.read_str()
    }
}

impl<T: Streamable> Streamable for Vec<T> {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_len(self.len());
        for item in self {
            item.write_to(out);
        }
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        let len = input.read_len();
        let mut items = Vec::with_capacity(len.min(input.remaining()));
        for _ in 0..len {
            if !input.is_ok() {
                break;
            }
            items.push(T::read_from(input));
        }
        items
    }
}

impl<K: Streamable + Ord, V: Streamable> Streamable for BTreeMap<K, V> {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_len(self.len());
        for (k, v) in self {
            k.write_to(out);
            v.write_to(out);
        }
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        let len = input.read_len();
        let mut map = BTreeMap::new();
        for _ in 0..len {
            if !input.is_ok() {
                break;
            }
            let k = K::read_from(input);
            let v = V::read_from(input);
            map.insert(k, v);
        }
        map
    }
}

impl<K: Streamable + Eq + Hash, V: Streamable> Streamable for HashMap<K, V> {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_len(self.len());
        for (k, v) in self {
            k.write_to(out);
            v.write_to(out);
        }
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        let len = input.read_len();
        let mut map = HashMap::with_capacity(len.min(input.remaining()));
        for _ in 0..len {
            if !input.is_ok() {
                break;
            }
            let k = K::read_from(input);
            let v = V::read_from(input);
            map.insert(k, v);
        }
        map
    }
}

// ============================================================================
// Dates and times
// ============================================================================

/// Julian day number of the day before 0001-01-01 (proleptic Gregorian).
const JULIAN_DAY_BEFORE_CE: i64 = 1_721_425;

/// Converts a date to its Julian day number.
pub fn julian_day(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) + JULIAN_DAY_BEFORE_CE
}

/// Converts a Julian day number back to a date, if it is representable.
pub fn from_julian_day(jd: i64) -> Option<NaiveDate> {
    let days = i32::try_from(jd - JULIAN_DAY_BEFORE_CE).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days)
}

/// Milliseconds since midnight.
pub fn msecs_since_midnight(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() * 1000 + (time.nanosecond() % 1_000_000_000) / 1_000_000
}

fn time_from_msecs(ms: u32) -> Option<NaiveTime> {
    NaiveTime::from_num_seconds_from_midnight_opt(ms / 1000, (ms % 1000) * 1_000_000)
}

/// The date builtin types default to.
pub(crate) fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

impl Streamable for NaiveDate {
    fn write_to(&self, out: &mut StreamWriter) {
        let jd = julian_day(*self);
        if out.version() >= StreamVersion::V5_0 {
            out.write_i64(jd);
        } else {
            out.write_u32(u32::try_from(jd).unwrap_or(0));
        }
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        let jd = if input.version() >= StreamVersion::V5_0 {
            input.read_i64()
        } else {
            i64::from(input.read_u32())
        };
        // zero and i64::MIN are how null dates were written
        if jd == 0 || jd == i64::MIN {
            return epoch().date();
        }
        from_julian_day(jd).unwrap_or_else(|| {
            input.set_status(StreamStatus::ReadCorruptData);
            epoch().date()
        })
    }
}

impl Streamable for NaiveTime {
    fn write_to(&self, out: &mut StreamWriter) {
        out.write_u32(msecs_since_midnight(*self));
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        let ms = input.read_u32();
        if ms == u32::MAX {
            return epoch().time();
        }
        time_from_msecs(ms).unwrap_or_else(|| {
            input.set_status(StreamStatus::ReadCorruptData);
            epoch().time()
        })
    }
}

/// Time spec byte for local wall-clock date-times.
const TIME_SPEC_LOCAL: u8 = 0;
const TIME_SPEC_OFFSET: u8 = 2;
const TIME_SPEC_ZONE: u8 = 3;

impl Streamable for NaiveDateTime {
    fn write_to(&self, out: &mut StreamWriter) {
        self.date().write_to(out);
        self.time().write_to(out);
        if out.version() >= StreamVersion::V4_0 {
            out.write_u8(TIME_SPEC_LOCAL);
        }
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        let date = NaiveDate::read_from(input);
        let time = NaiveTime::read_from(input);
        if input.version() >= StreamVersion::V4_0 {
            match input.read_u8() {
                TIME_SPEC_OFFSET if input.version() >= StreamVersion::V5_2 => {
                    input.read_i32();
                }
                TIME_SPEC_ZONE if input.version() >= StreamVersion::V5_2 => {
                    input.read_bytes();
                }
                _ => {}
            }
        }
        date.and_time(time)
    }
}

impl Streamable for Uuid {
    fn write_to(&self, out: &mut StreamWriter) {
        let (d1, d2, d3, d4) = self.as_fields();
        out.write_u32(d1);
        out.write_u16(d2);
        out.write_u16(d3);
        out.write_raw(d4);
    }

    fn read_from(input: &mut StreamReader<'_>) -> Self {
        let d1 = input.read_u32();
        let d2 = input.read_u16();
        let d3 = input.read_u16();
        let mut d4 = [0u8; 8];
        let tail = input.read_raw(8);
        if tail.len() == 8 {
            d4.copy_from_slice(tail);
        }
        Uuid::from_fields(d1, d2, d3, &d4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_utf16_with_byte_length() {
        let mut out = StreamWriter::new();
        out.write_str("hé");
        assert_eq!(out.as_bytes(), &[0, 0, 0, 4, 0, b'h', 0, 0xe9]);

        let bytes = out.into_inner();
        let mut input = StreamReader::new(&bytes);
        assert_eq!(input.read_str(), "hé");
        assert!(input.at_end());
        assert!(input.is_ok());
    }

    #[test]
    fn null_string_reads_as_empty() {
        let mut input = StreamReader::new(&[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(input.read_str(), "");
        assert!(input.is_ok());
    }

    #[test]
    fn short_input_sets_read_past_end_and_keeps_it() {
        let mut input = StreamReader::new(&[0, 0, 1]);
        assert_eq!(input.read_u32(), 0);
        assert_eq!(input.status(), StreamStatus::ReadPastEnd);
        input.set_status(StreamStatus::ReadCorruptData);
        assert_eq!(input.status(), StreamStatus::ReadPastEnd);
    }

    #[test]
    fn odd_string_length_is_corrupt() {
        let mut input = StreamReader::new(&[0, 0, 0, 1, 0x41]);
        assert_eq!(input.read_str(), "");
        assert_eq!(input.status(), StreamStatus::ReadCorruptData);
    }

    #[test]
    fn float_precision_follows_version() {
        let mut modern = StreamWriter::new();
        modern.write_f32(1.5);
        assert_eq!(modern.as_bytes().len(), 8);

        let mut single = StreamWriter::with_options(StreamOptions {
            float_precision: FloatPrecision::Single,
            ..StreamOptions::default()
        });
        single.write_f64(1.5);
        assert_eq!(single.as_bytes().len(), 4);

        let mut old = StreamWriter::with_options(StreamOptions::with_version(StreamVersion::V4_0));
        old.write_f32(1.5);
        old.write_f64(1.5);
        assert_eq!(old.as_bytes().len(), 12);
    }

    #[test]
    fn little_endian_integers() {
        let mut out = StreamWriter::with_options(StreamOptions {
            byte_order: ByteOrder::LittleEndian,
            ..StreamOptions::default()
        });
        out.write_u32(0x0102_0304);
        assert_eq!(out.as_bytes(), &[4, 3, 2, 1]);
    }

    #[test]
    fn julian_days() {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert_eq!(julian_day(date), 2_451_545);
        assert_eq!(from_julian_day(2_451_545), Some(date));
    }

    #[test]
    fn dates_shrink_before_v5() {
        let date = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        let mut old = StreamWriter::with_options(StreamOptions::with_version(StreamVersion::V4_6));
        date.write_to(&mut old);
        assert_eq!(old.as_bytes().len(), 4);

        let bytes = old.into_inner();
        let mut input =
            StreamReader::with_options(&bytes, StreamOptions::with_version(StreamVersion::V4_6));
        assert_eq!(NaiveDate::read_from(&mut input), date);
    }

    #[test]
    fn lists_stop_at_first_failure() {
        // claims 1000 strings, has none
        let mut input = StreamReader::new(&[0, 0, 0x03, 0xe8]);
        let list = Vec::<String>::read_from(&mut input);
        assert!(list.len() <= 1);
        assert_eq!(input.status(), StreamStatus::ReadPastEnd);
    }
}
