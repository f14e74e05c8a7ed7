use {
    crate::{
        result::{SerdesError, SerdesResult},
        serdes::{Mode, Serdes, decode_text, encode_text},
    },
    std::io::{Cursor, Read, Seek, SeekFrom, Write},
};

type AssertionSink = Box<dyn FnMut(&SerdesError)>;

/// Session options shared by [`Reader`] and [`Writer`]
#[derive(Default)]
pub struct Options {
    strict: bool,
    sink: Option<AssertionSink>,
}

impl Options {
    /// Treat assertion violations as fatal errors instead of just reporting them
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
    /// Deliver assertion violations to `f` instead of logging them
    #[must_use]
    pub fn on_assertion(mut self, f: impl FnMut(&SerdesError) + 'static) -> Self {
        self.sink = Some(Box::new(f));
        self
    }
    fn report(&mut self, violation: SerdesError) -> SerdesResult {
        match &mut self.sink {
            Some(sink) => sink(&violation),
            None => log::warn!("{violation}"),
        }
        if self.strict { Err(violation) } else { Ok(()) }
    }
}

/// Decodes a model from a byte source
pub struct Reader<R> {
    inner: R,
    offset: u64,
    opts: Options,
}

/// Encodes a model into a seekable byte sink
pub struct Writer<W> {
    inner: W,
    offset: u64,
    opts: Options,
}

impl<R: Read + Seek> Reader<R> {
    /// Start reading at the current position of `inner`
    pub fn new(inner: R) -> SerdesResult<Self> {
        Self::with_options(inner, Options::default())
    }
    /// Like [`Reader::new`], with explicit [`Options`]
    pub fn with_options(mut inner: R, opts: Options) -> SerdesResult<Self> {
        let offset = inner.stream_position()?;
        Ok(Self {
            inner,
            offset,
            opts,
        })
    }
    /// Give back the underlying stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<W: Write + Seek> Writer<W> {
    /// Start writing at the current position of `inner`
    pub fn new(inner: W) -> SerdesResult<Self> {
        Self::with_options(inner, Options::default())
    }
    /// Like [`Writer::new`], with explicit [`Options`]
    pub fn with_options(mut inner: W, opts: Options) -> SerdesResult<Self> {
        let offset = inner.stream_position()?;
        Ok(Self {
            inner,
            offset,
            opts,
        })
    }
    /// Give back the underlying stream
    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn check_stream<S: Seek>(stream: &mut S, offset: u64, opts: &mut Options) -> SerdesResult {
    let actual = stream.stream_position()?;
    if actual != offset {
        opts.report(SerdesError::AssertionViolation {
            name: "offset",
            expected: offset,
            actual,
        })?;
    }
    Ok(())
}

/// Current position and length of the stream
fn position_and_len<S: Seek>(stream: &mut S) -> SerdesResult<(u64, u64)> {
    let pos = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(pos))?;
    Ok((pos, end))
}

fn at_end<S: Seek>(stream: &mut S) -> SerdesResult<bool> {
    let (pos, end) = position_and_len(stream)?;
    Ok(pos == end)
}

fn remaining<S: Seek>(stream: &mut S) -> SerdesResult<u64> {
    let (pos, end) = position_and_len(stream)?;
    Ok(end.saturating_sub(pos))
}

fn seek_within<S: Seek>(stream: &mut S, offset: u64) -> SerdesResult {
    let (_, end) = position_and_len(stream)?;
    if offset > end {
        return Err(SerdesError::InvalidArgument("seek past the end of the stream"));
    }
    stream.seek(SeekFrom::Start(offset))?;
    Ok(())
}

impl<R: Read + Seek> Serdes for Reader<R> {
    fn mode(&self) -> Mode {
        Mode::Reading
    }

    fn offset(&mut self) -> SerdesResult<u64> {
        self.check()?;
        Ok(self.offset)
    }

    fn seek(&mut self, offset: u64) -> SerdesResult {
        seek_within(&mut self.inner, offset)?;
        self.offset = offset;
        Ok(())
    }

    fn check(&mut self) -> SerdesResult {
        check_stream(&mut self.inner, self.offset, &mut self.opts)
    }

    fn is_complete(&mut self) -> SerdesResult<bool> {
        at_end(&mut self.inner)
    }

    fn remaining(&mut self) -> SerdesResult<u64> {
        remaining(&mut self.inner)
    }

    fn report(&mut self, violation: SerdesError) -> SerdesResult {
        self.opts.report(violation)
    }

    fn bytes(&mut self, name: &'static str, buf: &mut [u8]) -> SerdesResult {
        self.inner.read_exact(buf)?;
        log::trace!("{:#06x} {name}: {buf:02x?}", self.offset);
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn fixed_len_string(
        &mut self,
        name: &'static str,
        value: &mut String,
        len: usize,
    ) -> SerdesResult {
        let mut buf = vec![0; len];
        self.bytes(name, &mut buf)?;
        let end = buf.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
        *value = decode_text(&buf[..end]);
        Ok(())
    }

    fn null_terminated_string(
        &mut self,
        name: &'static str,
        value: &mut String,
    ) -> SerdesResult {
        let start = self.offset;
        let mut raw = Vec::new();
        let mut byte = [0];
        loop {
            self.inner.read_exact(&mut byte)?;
            self.offset += 1;
            if byte[0] == 0 {
                break;
            }
            raw.push(byte[0]);
        }
        *value = decode_text(&raw);
        log::trace!("{start:#06x} {name}: {value:?}");
        Ok(())
    }
}

impl<W: Write + Seek> Serdes for Writer<W> {
    fn mode(&self) -> Mode {
        Mode::Writing
    }

    fn offset(&mut self) -> SerdesResult<u64> {
        self.check()?;
        Ok(self.offset)
    }

    fn seek(&mut self, offset: u64) -> SerdesResult {
        seek_within(&mut self.inner, offset)?;
        self.offset = offset;
        Ok(())
    }

    fn check(&mut self) -> SerdesResult {
        check_stream(&mut self.inner, self.offset, &mut self.opts)
    }

    fn is_complete(&mut self) -> SerdesResult<bool> {
        at_end(&mut self.inner)
    }

    fn remaining(&mut self) -> SerdesResult<u64> {
        remaining(&mut self.inner)
    }

    fn report(&mut self, violation: SerdesError) -> SerdesResult {
        self.opts.report(violation)
    }

    fn bytes(&mut self, name: &'static str, buf: &mut [u8]) -> SerdesResult {
        log::trace!("{:#06x} {name}: {buf:02x?}", self.offset);
        self.inner.write_all(buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn fixed_len_string(
        &mut self,
        name: &'static str,
        value: &mut String,
        len: usize,
    ) -> SerdesResult {
        let encoded = encode_text(name, value)?;
        if encoded.len() > len {
            return Err(SerdesError::LengthExceeded {
                name,
                len: encoded.len(),
                max: len,
            });
        }
        let mut buf = vec![0; len];
        buf[..encoded.len()].copy_from_slice(&encoded);
        self.bytes(name, &mut buf)
    }

    fn null_terminated_string(
        &mut self,
        name: &'static str,
        value: &mut String,
    ) -> SerdesResult {
        let mut buf = encode_text(name, value)?.into_owned();
        buf.push(0);
        self.bytes(name, &mut buf)
    }
}

/// Run `f` over a fresh model, decoding `data`, which must be consumed entirely.
pub(crate) fn read_model<'a, T, F>(data: &'a [u8], opts: Options, f: F) -> SerdesResult<T>
where
    T: Default,
    F: FnOnce(&mut T, &mut Reader<Cursor<&'a [u8]>>) -> SerdesResult,
{
    let mut rd = Reader::with_options(Cursor::new(data), opts)?;
    let mut model = T::default();
    f(&mut model, &mut rd)?;
    if !rd.is_complete()? {
        let actual = rd.offset()?;
        rd.report(SerdesError::AssertionViolation {
            name: "trailing data",
            expected: data.len() as u64,
            actual,
        })?;
    }
    Ok(model)
}

/// Run `f` over a copy of `model`, encoding it into a new buffer.
///
/// Schemas take `&mut self` for both directions, so writing walks a scratch copy.
pub(crate) fn write_model<T, F>(model: &T, opts: Options, f: F) -> SerdesResult<Vec<u8>>
where
    T: Clone,
    F: FnOnce(&mut T, &mut Writer<Cursor<Vec<u8>>>) -> SerdesResult,
{
    let mut scratch = model.clone();
    let mut wr = Writer::with_options(Cursor::new(Vec::new()), opts)?;
    f(&mut scratch, &mut wr)?;
    wr.check()?;
    Ok(wr.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::{cell::Cell, rc::Rc},
    };

    fn writer() -> Writer<Cursor<Vec<u8>>> {
        Writer::new(Cursor::new(Vec::new())).unwrap()
    }

    fn finish(wr: Writer<Cursor<Vec<u8>>>) -> Vec<u8> {
        wr.into_inner().into_inner()
    }

    #[test]
    fn integers_are_little_endian() {
        let mut wr = writer();
        wr.u16("a", &mut 0x1234).unwrap();
        wr.i32("b", &mut -2).unwrap();
        wr.u64("c", &mut 0x0102_0304_0506_0708).unwrap();
        assert_eq!(
            finish(wr),
            [
                0x34, 0x12, 0xfe, 0xff, 0xff, 0xff, 8, 7, 6, 5, 4, 3, 2, 1
            ]
        );
    }

    #[test]
    fn big_endian_is_swapped() {
        let mut wr = writer();
        wr.u16_be("melodic_banks", &mut 1).unwrap();
        wr.u32_be("b", &mut 0x0102_0304).unwrap();
        let bytes = finish(wr);
        assert_eq!(bytes, [0x00, 0x01, 1, 2, 3, 4]);

        let mut rd = Reader::new(Cursor::new(&bytes[..])).unwrap();
        let mut banks = 0;
        let mut b = 0;
        rd.u16_be("melodic_banks", &mut banks).unwrap();
        rd.u32_be("b", &mut b).unwrap();
        assert_eq!((banks, b), (1, 0x0102_0304));
        assert!(rd.is_complete().unwrap());
    }

    #[test]
    fn fixed_len_string_exact_fit_has_no_padding() {
        let mut wr = writer();
        let mut name = "A".repeat(32);
        wr.fixed_len_string("name", &mut name, 32).unwrap();
        let bytes = finish(wr);
        assert_eq!(bytes.len(), 32);
        assert!(bytes.iter().all(|&b| b == b'A'));
    }

    #[test]
    fn fixed_len_string_overflow_is_rejected() {
        let mut wr = writer();
        let mut name = "B".repeat(40);
        assert_eq!(
            wr.fixed_len_string("name", &mut name, 32),
            Err(SerdesError::LengthExceeded {
                name: "name",
                len: 40,
                max: 32
            })
        );
        assert!(finish(wr).is_empty());
    }

    #[test]
    fn fixed_len_string_is_zero_padded() {
        let mut wr = writer();
        let mut name = String::from("Piano 1 XY");
        wr.fixed_len_string("name", &mut name, 32).unwrap();
        let bytes = finish(wr);
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..10], b"Piano 1 XY");
        assert_eq!(bytes[10..], [0; 22]);

        let mut rd = Reader::new(Cursor::new(&bytes[..])).unwrap();
        let mut back = String::new();
        rd.fixed_len_string("name", &mut back, 32).unwrap();
        assert_eq!(back, "Piano 1 XY");
    }

    #[test]
    fn null_terminated_string() {
        let mut wr = writer();
        wr.null_terminated_string("s", &mut String::from("WOPL"))
            .unwrap();
        wr.u8("after", &mut 7).unwrap();
        let bytes = finish(wr);
        assert_eq!(bytes, b"WOPL\0\x07");

        let mut rd = Reader::new(Cursor::new(&bytes[..])).unwrap();
        let mut s = String::new();
        let mut after = 0;
        rd.null_terminated_string("s", &mut s).unwrap();
        rd.u8("after", &mut after).unwrap();
        assert_eq!((s.as_str(), after), ("WOPL", 7));
    }

    #[test]
    fn high_bytes_survive_round_trip() {
        let raw = [b'C', 0xe9, 0x80, 0x81, 0, 0];
        let mut rd = Reader::new(Cursor::new(&raw[..])).unwrap();
        let mut name = String::new();
        rd.fixed_len_string("name", &mut name, raw.len()).unwrap();
        let mut wr = writer();
        wr.fixed_len_string("name", &mut name, raw.len()).unwrap();
        assert_eq!(finish(wr), raw);
    }

    #[test]
    fn unencodable_text_is_rejected() {
        let mut wr = writer();
        assert_eq!(
            wr.fixed_len_string("bank_name", &mut String::from("日本"), 32),
            Err(SerdesError::Unencodable { name: "bank_name" })
        );
        assert_eq!(
            wr.null_terminated_string("s", &mut String::from("Piano ♪")),
            Err(SerdesError::Unencodable { name: "s" })
        );
        assert!(finish(wr).is_empty());
    }

    #[test]
    fn short_input_is_eof() {
        let mut rd = Reader::new(Cursor::new(&[1u8][..])).unwrap();
        assert_eq!(rd.u16("x", &mut 0), Err(SerdesError::UnexpectedEof));
    }

    #[test]
    fn padding_violation_is_reported() {
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let opts = Options::default().on_assertion(move |_| counter.set(counter.get() + 1));
        let mut rd = Reader::with_options(Cursor::new(&[0u8, 5][..]), opts).unwrap();
        rd.pad("pad", 2).unwrap();
        assert_eq!(seen.get(), 1);
        assert!(rd.is_complete().unwrap());
    }

    #[test]
    fn strict_padding_violation_is_fatal() {
        let opts = Options::default().strict().on_assertion(|_| {});
        let mut rd = Reader::with_options(Cursor::new(&[0u8, 5][..]), opts).unwrap();
        assert_eq!(
            rd.pad("pad", 2),
            Err(SerdesError::AssertionViolation {
                name: "pad",
                expected: 0,
                actual: 5
            })
        );
    }

    #[test]
    fn backpatch_with_seek() {
        let mut wr = writer();
        let len_pos = wr.offset().unwrap();
        wr.u32("len", &mut 0).unwrap();
        wr.bytes("body", &mut [1, 2, 3]).unwrap();
        let end = wr.offset().unwrap();
        let mut len = u32::try_from(end - len_pos - 4).unwrap();
        wr.seek(len_pos).unwrap();
        wr.u32("len", &mut len).unwrap();
        assert!(!wr.is_complete().unwrap());
        wr.seek(end).unwrap();
        assert!(wr.is_complete().unwrap());
        wr.check().unwrap();
        assert_eq!(finish(wr), [3, 0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let mut wr = writer();
        wr.u16("x", &mut 1).unwrap();
        assert!(matches!(
            wr.seek(3),
            Err(SerdesError::InvalidArgument(_))
        ));
        assert_eq!(wr.offset().unwrap(), 2);
        wr.seek(0).unwrap();
        assert_eq!(wr.remaining().unwrap(), 2);
        assert_eq!(finish(wr), [1, 0]);

        let mut rd = Reader::new(Cursor::new(&[1u8, 2, 3][..])).unwrap();
        assert!(matches!(
            rd.seek(4),
            Err(SerdesError::InvalidArgument(_))
        ));
        rd.seek(3).unwrap();
        assert!(rd.is_complete().unwrap());
        rd.seek(1).unwrap();
        assert_eq!(rd.remaining().unwrap(), 2);
        rd.check().unwrap();
    }

    #[test]
    fn offset_starts_at_stream_position() {
        let mut cur = Cursor::new(vec![0xaa; 4]);
        cur.set_position(4);
        let mut wr = Writer::new(cur).unwrap();
        assert_eq!(wr.offset().unwrap(), 4);
        wr.u8("x", &mut 1).unwrap();
        assert_eq!(wr.offset().unwrap(), 5);
    }
}
