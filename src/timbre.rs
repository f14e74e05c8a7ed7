//! Global timbre libraries (`.OPL`, `.AD`) of the Audio Interface Library / Miles Sound System.
//!
//! A library is a table of 6 byte headers (patch, bank, absolute body offset) closed by a
//! two byte `FF FF` sentinel, followed by the timbre bodies in header order.

use {
    crate::{
        instrument::FbConn,
        io::{Options, read_model, write_model},
        operator::Operator,
        result::{SerdesError, SerdesResult},
        serdes::{Mode, Serdes},
    },
    std::fmt,
};

#[derive(Clone, Copy, Default, Debug)]
struct TimbreHeader {
    patch: u8,
    bank: u8,
    /// Absolute position of the body in the stream
    offset: u32,
}

impl TimbreHeader {
    const SIZE: u64 = 6;
    const SENTINEL_SIZE: u64 = 2;
    const SENTINEL: Self = Self {
        patch: 0xff,
        bank: 0xff,
        offset: 0,
    };

    const fn is_sentinel(&self) -> bool {
        self.patch == 0xff && self.bank == 0xff
    }

    // The sentinel has no offset field
    fn serdes<S: Serdes>(&mut self, s: &mut S) -> SerdesResult {
        s.u8("patch", &mut self.patch)?;
        s.u8("bank", &mut self.bank)?;
        if self.is_sentinel() {
            return Ok(());
        }
        s.u32("offset", &mut self.offset)
    }
}

/// A two operator OPL2 voice from a timbre library
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TimbreData {
    /// MIDI program. Stored in the header table, not the body.
    pub patch: u8,
    /// MIDI bank. Stored in the header table, not the body.
    pub bank: u8,
    /// Size of the body including this field.
    ///
    /// Also used to compute the offsets of the following bodies when writing.
    pub length: u16,
    /// Kept as is
    pub transpose: u8,
    /// Feedback/connection register
    pub feedback_connection: FbConn,
    /// Operator 0
    pub modulator: Operator,
    /// Operator 1
    pub carrier: Operator,
}

impl TimbreData {
    /// Body size of an OPL2 timbre
    pub const OPL2_LENGTH: u16 = 14;

    fn serdes<S: Serdes>(&mut self, s: &mut S) -> SerdesResult {
        s.u16("length", &mut self.length)?;
        s.u8("transpose", &mut self.transpose)?;
        s.object("modulator", &mut self.modulator, Operator::serdes)?;
        s.enum_u8("feedback_connection", &mut self.feedback_connection)?;
        s.object("carrier", &mut self.carrier, Operator::serdes)
    }
}

impl Default for TimbreData {
    fn default() -> Self {
        Self {
            patch: 0,
            bank: 0,
            length: Self::OPL2_LENGTH,
            transpose: 0,
            feedback_connection: FbConn::default(),
            modulator: Operator::default(),
            carrier: Operator::default(),
        }
    }
}

impl fmt::Display for TimbreData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "F:{:?} {} {}",
            self.feedback_connection, self.carrier, self.modulator
        )
    }
}

/// A global timbre library
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct GlobalTimbreLibrary {
    /// Timbres in file order
    pub data: Vec<TimbreData>,
}

impl GlobalTimbreLibrary {
    fn header_table(&self, start: u64) -> SerdesResult<Vec<TimbreHeader>> {
        let table_size = TimbreHeader::SIZE * self.data.len() as u64 + TimbreHeader::SENTINEL_SIZE;
        let mut offset = start + table_size;
        let mut headers = Vec::with_capacity(self.data.len());
        for timbre in &self.data {
            if timbre.patch == 0xff && timbre.bank == 0xff {
                return Err(SerdesError::InvalidArgument(
                    "patch 255 in bank 255 is reserved for the end marker",
                ));
            }
            headers.push(TimbreHeader {
                patch: timbre.patch,
                bank: timbre.bank,
                offset: u32::try_from(offset)
                    .map_err(|_| SerdesError::InvalidArgument("timbre offset exceeds 32 bits"))?,
            });
            offset += u64::from(timbre.length);
        }
        Ok(headers)
    }

    /// Read or write the header table and the timbre bodies.
    ///
    /// Bodies are read back to back, the header offsets are only compared against the
    /// actual positions. A mismatch is reported as an assertion violation.
    pub fn serdes<S: Serdes>(&mut self, s: &mut S) -> SerdesResult {
        let headers = match s.mode() {
            Mode::Reading => {
                let mut headers = Vec::new();
                loop {
                    let mut header = TimbreHeader::default();
                    header.serdes(s)?;
                    if header.is_sentinel() {
                        break;
                    }
                    headers.push(header);
                }
                self.data.resize_with(headers.len(), TimbreData::default);
                headers
            }
            Mode::Writing => {
                let mut headers = self.header_table(s.offset()?)?;
                s.list("headers", &mut headers, |_, header, s| header.serdes(s))?;
                let mut end = TimbreHeader::SENTINEL;
                end.serdes(s)?;
                headers
            }
        };
        log::debug!("{} timbres", headers.len());

        s.list("timbres", &mut self.data, |i, timbre, s| {
            let header = headers[i];
            let actual = s.offset()?;
            if actual != u64::from(header.offset) {
                s.report(SerdesError::AssertionViolation {
                    name: "timbre_offset",
                    expected: header.offset.into(),
                    actual,
                })?;
            }
            timbre.patch = header.patch;
            timbre.bank = header.bank;
            s.object("timbre", timbre, TimbreData::serdes)
        })
    }

    /// Decode a library. All of `data` must be used.
    pub fn read(data: &[u8]) -> SerdesResult<Self> {
        Self::read_with(data, Options::default())
    }

    /// Like [`Self::read`], with explicit [`Options`]
    pub fn read_with(data: &[u8], opts: Options) -> SerdesResult<Self> {
        read_model(data, opts, Self::serdes)
    }

    /// Encode into a new buffer
    pub fn write(&self) -> SerdesResult<Vec<u8>> {
        self.write_with(Options::default())
    }

    /// Like [`Self::write`], with explicit [`Options`]
    pub fn write_with(&self, opts: Options) -> SerdesResult<Vec<u8>> {
        write_model(self, opts, Self::serdes)
    }
}
