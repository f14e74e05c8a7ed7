use {
    crate::{
        instrument::Instrument,
        serdes::RawEnum,
        timbre::GlobalTimbreLibrary,
    },
    std::fmt,
};

mod io;

/// Number of instruments in a bank
pub const BANK_SIZE: usize = 128;
/// Size of the bank and instrument name fields
pub const NAME_LEN: usize = 32;
/// First drum note timbres spill into when converting a timbre library
const FIRST_PERCUSSION_NOTE: usize = 35;

/// WOPL format version
///
/// Decides which optional fields are present in the file. Passed down to every nested
/// record while reading or writing.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct FmtVer(pub u16);

impl FmtVer {
    /// Version 1
    pub const V1: Self = Self(1);
    /// Version 2: bank names and ids
    pub const V2: Self = Self(2);
    /// Version 3: instrument key on/off delays
    pub const V3: Self = Self(3);
    /// Newest version we know the layout of
    pub const CURRENT: Self = Self::V3;

    /// Whether banks have a name and id
    #[must_use]
    pub const fn has_bank_meta(self) -> bool {
        self.0 >= 2
    }
    /// Whether instruments have key on/off delays
    #[must_use]
    pub const fn has_delays(self) -> bool {
        self.0 >= 3
    }
}

impl Default for FmtVer {
    fn default() -> Self {
        Self::CURRENT
    }
}

bitflags::bitflags! {
    /// Chip-wide flags of a bank file
    #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug)]
    pub struct GlobalBankFlags: u8 {
        /// Deep tremolo (AM depth 4.8 dB)
        const DEEP_TREMOLO = 1;
        /// Deep vibrato (14 cent)
        const DEEP_VIBRATO = 2;
    }
}

impl RawEnum<u8> for GlobalBankFlags {
    fn to_raw(self) -> u8 {
        self.bits()
    }
    fn from_raw(raw: u8) -> Self {
        Self::from_bits_retain(raw)
    }
}

/// Volume scaling model
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VolumeModel(pub u8);

impl VolumeModel {
    /// Chosen by the synthesizer for the bank
    pub const AUTO: Self = Self(0);
    /// Linearized scaling, the most common one
    pub const GENERIC: Self = Self(1);
    /// Native OPL3 logarithmic scale
    pub const NATIVE_OPL3: Self = Self(2);
    /// Alias of [`Self::NATIVE_OPL3`]
    pub const CMF: Self = Self::NATIVE_OPL3;
    /// Logarithmic, using the DMX volume map table
    pub const DMX: Self = Self(3);
    /// Logarithmic, as in the Apogee Sound System
    pub const APOGEE: Self = Self(4);
    /// Approximated, shortened volume map table (9X)
    pub const NINE_X: Self = Self(5);
}

impl fmt::Debug for VolumeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            0 => "Auto",
            1 => "Generic",
            2 => "NativeOpl3",
            3 => "Dmx",
            4 => "Apogee",
            5 => "NineX",
            n => return write!(f, "VolumeModel({n})"),
        };
        f.write_str(name)
    }
}

impl RawEnum<u8> for VolumeModel {
    fn to_raw(self) -> u8 {
        self.0
    }
    fn from_raw(raw: u8) -> Self {
        Self(raw)
    }
}

/// An instrument with a name, as stored in a WOPL bank
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct WoplInstrument {
    /// At most [`NAME_LEN`] bytes when encoded
    pub name: String,
    /// The voice definition
    pub instrument: Instrument,
}

impl fmt::Display for WoplInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [op0, op1, ..] = &self.instrument.operators;
        write!(f, "F:{:?} {op0} {op1}", self.instrument.fb_conn1)
    }
}

/// 128 instruments, indexed by MIDI program (melodic) or note (percussion)
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct WoplBank {
    /// MIDI bank number. Low byte is the LSB, high byte the MSB.
    pub id: u16,
    /// At most [`NAME_LEN`] bytes when encoded
    pub name: String,
    /// Always exactly [`BANK_SIZE`] slots; unused ones hold default instruments
    pub instruments: Box<[WoplInstrument; BANK_SIZE]>,
}

impl Default for WoplBank {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            instruments: Box::new(std::array::from_fn(|_| WoplInstrument::default())),
        }
    }
}

impl WoplBank {
    /// MIDI bank select LSB
    #[must_use]
    pub const fn midi_lsb(&self) -> u8 {
        self.id.to_le_bytes()[0]
    }
    /// MIDI bank select MSB
    #[must_use]
    pub const fn midi_msb(&self) -> u8 {
        self.id.to_le_bytes()[1]
    }
}

/// A WOPL instrument bank file
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct WoplFile {
    /// Format version, decides which optional fields are stored
    pub version: FmtVer,
    /// Chip-wide flags
    pub global_flags: GlobalBankFlags,
    /// Volume scaling model
    pub volume_model: VolumeModel,
    /// Melodic banks
    pub melodic: Vec<WoplBank>,
    /// Percussion banks
    pub percussion: Vec<WoplBank>,
}

impl From<&GlobalTimbreLibrary> for WoplFile {
    /// Put the timbres of a library into one melodic and one percussion bank.
    ///
    /// The first 128 timbres become melodic programs, the rest are drums starting at
    /// note 35. Timbres that don't fit are dropped.
    fn from(library: &GlobalTimbreLibrary) -> Self {
        let mut melodic = WoplBank::default();
        let mut percussion = WoplBank::default();
        for (i, timbre) in library.data.iter().enumerate() {
            let slot = if i < BANK_SIZE {
                &mut melodic.instruments[i]
            } else {
                match percussion.instruments.get_mut(i - BANK_SIZE + FIRST_PERCUSSION_NOTE) {
                    Some(slot) => slot,
                    None => {
                        log::warn!(
                            "Dropping {} timbres that don't fit into the percussion bank",
                            library.data.len() - i
                        );
                        break;
                    }
                }
            };
            let mut instrument = Instrument::two_op(
                timbre.feedback_connection,
                timbre.carrier,
                timbre.modulator,
            );
            instrument.note_offset1 = timbre.patch.into();
            instrument.note_offset2 = timbre.bank.into();
            *slot = WoplInstrument {
                name: String::new(),
                instrument,
            };
        }
        Self {
            version: FmtVer::CURRENT,
            global_flags: GlobalBankFlags::DEEP_TREMOLO | GlobalBankFlags::DEEP_VIBRATO,
            volume_model: VolumeModel::AUTO,
            melodic: vec![melodic],
            percussion: vec![percussion],
        }
    }
}
