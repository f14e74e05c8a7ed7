//! The bidirectional serializer contract.
//!
//! A schema is written once against [`Serdes`], as a flat sequence of primitive calls on
//! `&mut` fields. Run against a [`Reader`](crate::Reader), it fills the fields from the
//! input; run against a [`Writer`](crate::Writer), it encodes them.

use {
    crate::result::{SerdesError, SerdesResult},
    encoding_rs::WINDOWS_1252,
    std::borrow::Cow,
};

/// Direction of a serdes session
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    /// Bytes are decoded into the model
    Reading,
    /// The model is encoded into bytes
    Writing,
}

/// A value stored on the wire as a raw integer of type `R`.
///
/// Conversion from the raw integer must be total. Values this crate doesn't know about
/// are kept as they are, so banks written by newer tools survive a round trip.
pub trait RawEnum<R>: Copy {
    /// The integer written to the wire
    fn to_raw(self) -> R;
    /// Reinterpret an integer read from the wire
    fn from_raw(raw: R) -> Self;
}

macro_rules! le_primitives {
    ($($name:ident: $ty:ty,)*) => {
        $(
            #[doc = concat!("Read or write a little endian `", stringify!($ty), "`")]
            fn $name(&mut self, name: &'static str, value: &mut $ty) -> SerdesResult {
                let mut buf = value.to_le_bytes();
                self.bytes(name, &mut buf)?;
                *value = <$ty>::from_le_bytes(buf);
                Ok(())
            }
        )*
    };
}

// Big endian values are the little endian primitive with the bytes swapped on both sides.
macro_rules! be_primitives {
    ($($name:ident => $le:ident: $ty:ty,)*) => {
        $(
            #[doc = concat!("Read or write a big endian `", stringify!($ty), "`")]
            fn $name(&mut self, name: &'static str, value: &mut $ty) -> SerdesResult {
                let mut swapped = value.swap_bytes();
                self.$le(name, &mut swapped)?;
                *value = swapped.swap_bytes();
                Ok(())
            }
        )*
    };
}

macro_rules! enum_primitives {
    ($($name:ident => $prim:ident: $ty:ty,)*) => {
        $(
            #[doc = concat!("Read or write a value stored as a little endian `", stringify!($ty), "`")]
            fn $name<E: RawEnum<$ty>>(&mut self, name: &'static str, value: &mut E) -> SerdesResult
            where
                Self: Sized,
            {
                let mut raw = value.to_raw();
                self.$prim(name, &mut raw)?;
                *value = E::from_raw(raw);
                Ok(())
            }
        )*
    };
}

/// Symmetric read/write primitives every backend provides.
///
/// All the integer, enum and padding primitives are built on top of [`Serdes::bytes`],
/// which reads into or writes out of the given buffer depending on the [`Mode`].
pub trait Serdes {
    /// Which direction this session goes
    fn mode(&self) -> Mode;
    /// Current byte position in the stream.
    ///
    /// Also verifies that the tracked position agrees with the stream (see [`Serdes::check`]).
    fn offset(&mut self) -> SerdesResult<u64>;
    /// Move to an absolute byte position, e.g. to backpatch a previously reserved field.
    ///
    /// Positions past the end of the stream are rejected with
    /// [`SerdesError::InvalidArgument`].
    fn seek(&mut self, offset: u64) -> SerdesResult;
    /// Verify that the tracked logical offset matches the physical stream position
    fn check(&mut self) -> SerdesResult;
    /// Whether the session is at the end of the stream
    fn is_complete(&mut self) -> SerdesResult<bool>;
    /// Number of bytes between the current position and the end of the stream
    fn remaining(&mut self) -> SerdesResult<u64>;
    /// Hand an assertion violation to the session's diagnostic sink.
    ///
    /// Returns the violation as an error if the session is strict.
    fn report(&mut self, violation: SerdesError) -> SerdesResult;

    /// Raw passthrough of exactly `buf.len()` bytes
    fn bytes(&mut self, name: &'static str, buf: &mut [u8]) -> SerdesResult;
    /// A string occupying exactly `len` bytes.
    ///
    /// Written zero padded. Writing a string that encodes to more than `len` bytes
    /// fails with [`SerdesError::LengthExceeded`], characters outside Windows-1252 with
    /// [`SerdesError::Unencodable`]. Trailing zero bytes are trimmed on read.
    fn fixed_len_string(
        &mut self,
        name: &'static str,
        value: &mut String,
        len: usize,
    ) -> SerdesResult;
    /// A string followed by a single zero byte
    fn null_terminated_string(&mut self, name: &'static str, value: &mut String)
    -> SerdesResult;

    le_primitives! {
        u8: u8,
        i8: i8,
        u16: u16,
        i16: i16,
        u32: u32,
        i32: i32,
        u64: u64,
        i64: i64,
    }

    be_primitives! {
        u16_be => u16: u16,
        i16_be => i16: i16,
        u32_be => u32: u32,
        i32_be => i32: i32,
        u64_be => u64: u64,
        i64_be => i64: i64,
    }

    enum_primitives! {
        enum_u8 => u8: u8,
        enum_u16 => u16: u16,
        enum_u32 => u32: u32,
    }

    /// `count` zero bytes.
    ///
    /// When reading, a non-zero byte is reported as an assertion violation.
    fn pad(&mut self, name: &'static str, count: usize) -> SerdesResult {
        let mut buf = vec![0; count];
        self.bytes(name, &mut buf)?;
        if let Some(&actual) = buf.iter().find(|&&b| b != 0) {
            self.report(SerdesError::AssertionViolation {
                name,
                expected: 0,
                actual: actual.into(),
            })?;
        }
        Ok(())
    }

    /// Recurse into a nested record
    fn object<T, F>(&mut self, name: &'static str, value: &mut T, f: F) -> SerdesResult
    where
        Self: Sized,
        F: FnOnce(&mut T, &mut Self) -> SerdesResult,
    {
        log::trace!("{name}");
        f(value, self)
    }

    /// Recurse into every element of `items`, in order.
    ///
    /// The slice must already have the right length. Schemas grow their lists from a
    /// count field before calling this.
    fn list<T, F>(&mut self, name: &'static str, items: &mut [T], mut f: F) -> SerdesResult
    where
        Self: Sized,
        F: FnMut(usize, &mut T, &mut Self) -> SerdesResult,
    {
        log::trace!("{name}: {} items", items.len());
        for (i, item) in items.iter_mut().enumerate() {
            f(i, item, self)?;
        }
        Ok(())
    }
}

/// Names are stored in a single byte code page.
///
/// Windows-1252 is an ASCII superset mapping all 256 byte values, so names written by
/// old DOS bank editors come back unchanged. Characters outside the code page are an
/// error instead of being replaced.
pub(crate) fn encode_text<'a>(name: &'static str, text: &'a str) -> SerdesResult<Cow<'a, [u8]>> {
    let (bytes, _, unmappable) = WINDOWS_1252.encode(text);
    if unmappable {
        return Err(SerdesError::Unencodable { name });
    }
    Ok(bytes)
}

pub(crate) fn decode_text(bytes: &[u8]) -> String {
    WINDOWS_1252
        .decode_without_bom_handling(bytes)
        .0
        .into_owned()
}
