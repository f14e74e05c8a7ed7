use {
    crate::{
        operator::Operator,
        result::SerdesResult,
        serdes::{RawEnum, Serdes},
        wopl::FmtVer,
    },
    std::fmt,
};

/// How the operators of an instrument are wired into voices
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum InstrumentMode {
    /// One voice, operators 0 and 1
    TwoOperator = 0,
    /// One voice using all four operators
    FourOperator = 1,
    /// Two independent two operator voices
    PseudoFourOperator = 2,
    /// Instrument that makes no sound
    Blank = 4,
}

/// Which rhythm-mode drum an instrument plays
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum RhythmMode {
    /// Melodic, or a generic drum (rhythm mode disabled)
    Generic = 0,
    /// Bass drum
    Bass = 1,
    /// Snare drum
    Snare = 2,
    /// Tom-tom
    Tom = 3,
    /// Cymbal
    Cymbal = 4,
    /// Hi-hat
    HiHat = 5,
}

impl InstrumentMode {
    const fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => Self::TwoOperator,
            1 => Self::FourOperator,
            2 => Self::PseudoFourOperator,
            4 => Self::Blank,
            _ => return None,
        })
    }
}

impl RhythmMode {
    const fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => Self::Generic,
            1 => Self::Bass,
            2 => Self::Snare,
            3 => Self::Tom,
            4 => Self::Cymbal,
            5 => Self::HiHat,
            _ => return None,
        })
    }
}

/// Instrument flags byte: mode in bits 0..2, rhythm-mode drum in bits 3..5
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct InstrumentFlags(u8);

impl InstrumentFlags {
    const MODE_MASK: u8 = 0x07;
    const RHYTHM_MASK: u8 = 0x38;
    const RHYTHM_SHIFT: u32 = 3;

    /// Pack a mode and a rhythm-mode drum into a flags byte
    #[must_use]
    pub const fn pack(mode: InstrumentMode, rhythm: RhythmMode) -> Self {
        Self(mode as u8 | (rhythm as u8) << Self::RHYTHM_SHIFT)
    }
    /// Keep the raw byte as is, including unknown bits
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }
    /// The raw byte
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
    /// `None` if the mode bits hold an unknown combination
    #[must_use]
    pub const fn mode(self) -> Option<InstrumentMode> {
        InstrumentMode::from_bits(self.0 & Self::MODE_MASK)
    }
    /// `None` if the rhythm bits hold an unknown drum type
    #[must_use]
    pub const fn rhythm(self) -> Option<RhythmMode> {
        RhythmMode::from_bits((self.0 & Self::RHYTHM_MASK) >> Self::RHYTHM_SHIFT)
    }
    /// Replace the mode, leaving the other bits alone
    #[must_use]
    pub const fn with_mode(self, mode: InstrumentMode) -> Self {
        Self((self.0 & !Self::MODE_MASK) | mode as u8)
    }
    /// Replace the rhythm-mode drum, leaving the other bits alone
    #[must_use]
    pub const fn with_rhythm(self, rhythm: RhythmMode) -> Self {
        Self((self.0 & !Self::RHYTHM_MASK) | (rhythm as u8) << Self::RHYTHM_SHIFT)
    }
}

impl fmt::Debug for InstrumentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentFlags")
            .field("mode", &self.mode())
            .field("rhythm", &self.rhythm())
            .field("bits", &format_args!("{:#04x}", self.0))
            .finish()
    }
}

impl RawEnum<u8> for InstrumentFlags {
    fn to_raw(self) -> u8 {
        self.0
    }
    fn from_raw(raw: u8) -> Self {
        Self(raw)
    }
}

/// How the two operators of a voice are connected
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Connection {
    /// The modulator drives the carrier
    Fm,
    /// Both operators are mixed (additive)
    Am,
}

/// Feedback/connection register (C0) of a two operator pair
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FbConn(u8);

impl FbConn {
    /// `feedback` is masked to 0..=7
    #[must_use]
    pub const fn new(connection: Connection, feedback: u8) -> Self {
        let conn = match connection {
            Connection::Fm => 0,
            Connection::Am => 1,
        };
        Self(conn | (feedback & 7) << 1)
    }
    /// Keep the raw byte as is, including unknown bits
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }
    /// The raw byte
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
    /// Operator connection
    #[must_use]
    pub const fn connection(self) -> Connection {
        if self.0 & 1 == 0 {
            Connection::Fm
        } else {
            Connection::Am
        }
    }
    /// Modulator feedback level, 0..=7
    #[must_use]
    pub const fn feedback(self) -> u8 {
        (self.0 >> 1) & 7
    }
}

impl fmt::Debug for FbConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}+Fb{}", self.connection(), self.feedback())
    }
}

impl RawEnum<u8> for FbConn {
    fn to_raw(self) -> u8 {
        self.0
    }
    fn from_raw(raw: u8) -> Self {
        Self(raw)
    }
}

/// One synthesizer voice definition
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Instrument {
    /// Version of the instrument structure as the synthesizer understands it.
    ///
    /// Not stored in bank files.
    pub version: i32,
    /// Note offset in semitones (of the first voice in pseudo four operator mode)
    pub note_offset1: i16,
    /// Note offset in semitones of the second voice in pseudo four operator mode
    pub note_offset2: i16,
    /// MIDI velocity offset
    pub midi_velocity_offset: i8,
    /// Detune of the second voice in pseudo four operator mode
    pub second_voice_detune: i8,
    /// Tone a percussion instrument is played at
    pub percussion_key_number: u8,
    /// Mode and rhythm-mode drum
    pub flags: InstrumentFlags,
    /// Feedback/connection of operators 0 and 1
    pub fb_conn1: FbConn,
    /// Feedback/connection of operators 2 and 3
    pub fb_conn2: FbConn,
    /// Operator register data.
    ///
    /// Two operator instruments only use the first two, but all four are always stored.
    pub operators: [Operator; 4],
    /// Milliseconds the instrument sounds while the key is held (version 3+)
    pub delay_on_ms: u16,
    /// Milliseconds the instrument keeps sounding after key off (version 3+)
    pub delay_off_ms: u16,
}

impl Instrument {
    /// Two operator instrument with the unused operators blanked
    #[must_use]
    pub fn two_op(fb_conn: FbConn, carrier: Operator, modulator: Operator) -> Self {
        Self {
            flags: InstrumentFlags::pack(InstrumentMode::TwoOperator, RhythmMode::Generic),
            fb_conn1: fb_conn,
            operators: [carrier, modulator, Operator::BLANK, Operator::BLANK],
            ..Self::default()
        }
    }

    /// Size on the wire for a given file format version
    #[must_use]
    pub const fn wire_size(ver: FmtVer) -> usize {
        let delays = if ver.has_delays() { 4 } else { 0 };
        10 + 4 * Operator::SIZE + delays
    }

    /// Read or write the instrument body.
    ///
    /// The delay fields only exist in files of version 3 and later.
    pub fn serdes<S: Serdes>(&mut self, s: &mut S, ver: FmtVer) -> SerdesResult {
        s.i16("note_offset1", &mut self.note_offset1)?;
        s.i16("note_offset2", &mut self.note_offset2)?;
        s.i8("midi_velocity_offset", &mut self.midi_velocity_offset)?;
        s.i8("second_voice_detune", &mut self.second_voice_detune)?;
        s.u8("percussion_key_number", &mut self.percussion_key_number)?;
        s.enum_u8("flags", &mut self.flags)?;
        s.enum_u8("fb_conn1", &mut self.fb_conn1)?;
        s.enum_u8("fb_conn2", &mut self.fb_conn2)?;
        s.list("operators", &mut self.operators, |_, op, s| {
            s.object("operator", op, Operator::serdes)
        })?;
        if ver.has_delays() {
            s.u16("delay_on_ms", &mut self.delay_on_ms)?;
            s.u16("delay_off_ms", &mut self.delay_off_ms)?;
        }
        Ok(())
    }
}
