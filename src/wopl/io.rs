use crate::{
    instrument::Instrument,
    io::{Options, read_model, write_model},
    result::{SerdesError, SerdesResult},
    serdes::{Mode, Serdes},
    wopl::{BANK_SIZE, FmtVer, NAME_LEN, WoplBank, WoplFile, WoplInstrument},
};

const MAGIC: &str = "WOPL3-BANK";
const MAGIC_LEN: usize = MAGIC.len();

fn bank_count(banks: &[WoplBank]) -> SerdesResult<u16> {
    u16::try_from(banks.len()).map_err(|_| SerdesError::InvalidArgument("more than 65535 banks"))
}

impl WoplInstrument {
    /// Read or write the name followed by the instrument body
    pub fn serdes<S: Serdes>(&mut self, s: &mut S, ver: FmtVer) -> SerdesResult {
        s.fixed_len_string("instrument_name", &mut self.name, NAME_LEN)?;
        self.instrument.serdes(s, ver)
    }
}

impl WoplBank {
    /// Bytes a bank takes up in a file of version `ver`, meta and instruments together
    const fn wire_size(ver: FmtVer) -> u64 {
        let meta = if ver.has_bank_meta() { NAME_LEN + 2 } else { 0 };
        (meta + BANK_SIZE * (NAME_LEN + Instrument::wire_size(ver))) as u64
    }

    fn meta_serdes<S: Serdes>(&mut self, s: &mut S) -> SerdesResult {
        s.fixed_len_string("bank_name", &mut self.name, NAME_LEN)?;
        s.u16("bank_id", &mut self.id)
    }

    fn instruments_serdes<S: Serdes>(&mut self, s: &mut S, ver: FmtVer) -> SerdesResult {
        s.list("instruments", &mut self.instruments[..], |_, ins, s| {
            s.object("instrument", ins, |ins, s| ins.serdes(s, ver))
        })
    }
}

impl WoplFile {
    /// Read or write a whole bank file.
    ///
    /// When reading, `self` should be a default model. The bank lists are grown to the
    /// stored counts.
    pub fn serdes<S: Serdes>(&mut self, s: &mut S) -> SerdesResult {
        let mut magic = String::from(MAGIC);
        s.fixed_len_string("magic", &mut magic, MAGIC_LEN)?;
        if magic != MAGIC {
            return Err(SerdesError::InvalidFormat);
        }
        s.pad("magic_pad", 1)?;

        s.u16("version", &mut self.version.0)?;
        let ver = self.version;
        if ver > FmtVer::CURRENT {
            log::warn!(
                "WOPL version {} is newer than {}, reading it with the version {1} layout",
                ver.0,
                FmtVer::CURRENT.0
            );
        }

        let mut melodic_count = bank_count(&self.melodic)?;
        let mut percussion_count = bank_count(&self.percussion)?;
        s.u16_be("melodic_banks", &mut melodic_count)?;
        s.u16_be("percussion_banks", &mut percussion_count)?;
        s.enum_u8("global_flags", &mut self.global_flags)?;
        s.enum_u8("volume_model", &mut self.volume_model)?;
        log::debug!(
            "WOPL v{}: {melodic_count} melodic, {percussion_count} percussion banks",
            ver.0
        );

        // Counts come from the file, don't allocate banks the data can't hold
        if s.mode() == Mode::Reading {
            let banks = u64::from(melodic_count) + u64::from(percussion_count);
            let needed = banks * WoplBank::wire_size(ver);
            let available = s.remaining()?;
            if available < needed {
                log::debug!("{banks} banks need {needed} bytes, only {available} left");
                return Err(SerdesError::UnexpectedEof);
            }
        }
        self.melodic
            .resize_with(melodic_count.into(), WoplBank::default);
        self.percussion
            .resize_with(percussion_count.into(), WoplBank::default);

        if ver.has_bank_meta() {
            s.list("melodic_meta", &mut self.melodic, |_, bank, s| {
                bank.meta_serdes(s)
            })?;
            s.list("percussion_meta", &mut self.percussion, |_, bank, s| {
                bank.meta_serdes(s)
            })?;
        }
        let instruments_at = s.offset()?;
        log::debug!("Instruments start at {instruments_at:#x}");
        s.list("melodic_banks", &mut self.melodic, |_, bank, s| {
            bank.instruments_serdes(s, ver)
        })?;
        s.list("percussion_banks", &mut self.percussion, |_, bank, s| {
            bank.instruments_serdes(s, ver)
        })
    }

    /// Decode a bank file. All of `data` must be used.
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

#[cfg(test)]
mod tests {
    use {
        crate::{
            instrument::{Connection, FbConn, Instrument, InstrumentFlags, InstrumentMode, RhythmMode},
            io::Options,
            operator::{Operator, Waveform},
            result::SerdesError,
            timbre::GlobalTimbreLibrary,
            wopl::{BANK_SIZE, FmtVer, GlobalBankFlags, VolumeModel, WoplBank, WoplFile},
        },
        std::{cell::Cell, rc::Rc},
    };

    const EMPTY_LIBRARY_PREFIX: [u8; 19] = [
        0x57, 0x4f, 0x50, 0x4c, 0x33, 0x2d, 0x42, 0x41, 0x4e, 0x4b, 0x00, 0x03, 0x00, 0x00, 0x01,
        0x00, 0x01, 0x03, 0x00,
    ];

    fn empty_library_bytes() -> Vec<u8> {
        WoplFile::from(&GlobalTimbreLibrary::default())
            .write()
            .unwrap()
    }

    fn bank(id: u16, name: &str) -> WoplBank {
        let mut bank = WoplBank {
            id,
            name: name.into(),
            ..WoplBank::default()
        };
        for (i, slot) in bank.instruments.iter_mut().enumerate() {
            let i = u8::try_from(i).unwrap();
            slot.name = format!("{name} #{i}");
            slot.instrument = Instrument {
                note_offset1: -i16::from(i),
                note_offset2: 12,
                midi_velocity_offset: -3,
                second_voice_detune: 1,
                percussion_key_number: i,
                flags: InstrumentFlags::pack(InstrumentMode::PseudoFourOperator, RhythmMode::Tom),
                fb_conn1: FbConn::new(Connection::Am, i % 8),
                fb_conn2: FbConn::from_bits(0xf0),
                operators: [
                    Operator::from_bytes([i, 1, 2, 3, 4]),
                    Operator::BLANK,
                    Operator {
                        waveform: Waveform::DERIVED_SQUARE,
                        ..Operator::BLANK
                    },
                    Operator::from_bytes([0xff, 0xfe, 0xfd, 0xfc, 0x09]),
                ],
                delay_on_ms: u16::from(i) * 10,
                delay_off_ms: 500,
                ..Instrument::default()
            };
        }
        bank
    }

    #[test]
    fn round_trip() {
        let file = WoplFile {
            version: FmtVer::V3,
            global_flags: GlobalBankFlags::DEEP_VIBRATO,
            volume_model: VolumeModel(9),
            melodic: vec![bank(0, "GM"), bank(0x0102, "Variations")],
            percussion: vec![bank(0, "Drums")],
        };
        let bytes = file.write().unwrap();
        assert_eq!(bytes.len(), 19 + 3 * 34 + 3 * BANK_SIZE * 66);
        assert_eq!(WoplFile::read(&bytes).unwrap(), file);
    }

    #[test]
    fn empty_library_fixture() {
        let bytes = empty_library_bytes();
        assert_eq!(bytes.len(), 16_983);
        assert_eq!(bytes[..19], EMPTY_LIBRARY_PREFIX);
        assert!(bytes[19..].iter().all(|&b| b == 0));
        let file = WoplFile::read(&bytes).unwrap();
        assert_eq!(file, WoplFile::from(&GlobalTimbreLibrary::default()));
    }

    #[test]
    fn bank_counts_are_big_endian() {
        let file = WoplFile {
            melodic: vec![WoplBank::default(); 2],
            percussion: vec![WoplBank::default(); 0x0103],
            ..WoplFile::default()
        };
        let bytes = file.write().unwrap();
        assert_eq!(bytes[13..17], [0x00, 0x02, 0x01, 0x03]);
    }

    #[test]
    fn version_1_has_no_bank_meta() {
        let mut melodic = bank(0, "");
        for slot in melodic.instruments.iter_mut() {
            slot.instrument.delay_on_ms = 0;
            slot.instrument.delay_off_ms = 0;
        }
        let file = WoplFile {
            version: FmtVer::V1,
            melodic: vec![melodic],
            ..WoplFile::default()
        };
        let bytes = file.write().unwrap();
        assert_eq!(bytes.len(), 19 + BANK_SIZE * 62);
        assert_eq!(WoplFile::read(&bytes).unwrap(), file);
    }

    #[test]
    fn newer_version_uses_latest_layout() {
        let file = WoplFile {
            version: FmtVer(4),
            melodic: vec![bank(5, "Future")],
            ..WoplFile::default()
        };
        let bytes = file.write().unwrap();
        assert_eq!(bytes.len(), 19 + 34 + BANK_SIZE * 66);
        assert_eq!(WoplFile::read(&bytes).unwrap(), file);
    }

    #[test]
    fn bad_magic() {
        let mut bytes = empty_library_bytes();
        bytes[4] = b'2';
        assert_eq!(WoplFile::read(&bytes), Err(SerdesError::InvalidFormat));
    }

    #[test]
    fn truncated() {
        let bytes = empty_library_bytes();
        assert_eq!(
            WoplFile::read(&bytes[..1000]),
            Err(SerdesError::UnexpectedEof)
        );
        assert_eq!(WoplFile::read(&bytes[..5]), Err(SerdesError::UnexpectedEof));
    }

    #[test]
    fn bank_counts_larger_than_the_data() {
        let mut bytes = b"WOPL3-BANK\0\x03\x00\xff\xff\xff\xff\x00\x00".to_vec();
        bytes.extend_from_slice(&[0; 4]);
        assert_eq!(WoplFile::read(&bytes), Err(SerdesError::UnexpectedEof));

        // One byte short of a single bank
        let mut bytes = empty_library_bytes();
        bytes.truncate(bytes.len() - 1);
        assert_eq!(WoplFile::read(&bytes), Err(SerdesError::UnexpectedEof));
    }

    #[test]
    fn bank_wire_size() {
        assert_eq!(WoplBank::wire_size(FmtVer::V3), 34 + 128 * 66);
        assert_eq!(WoplBank::wire_size(FmtVer::V1), 128 * 62);
        assert_eq!(
            empty_library_bytes().len() as u64,
            19 + 2 * WoplBank::wire_size(FmtVer::CURRENT)
        );
    }

    #[test]
    fn unencodable_bank_name() {
        let file = WoplFile {
            melodic: vec![WoplBank {
                name: "日本".into(),
                ..WoplBank::default()
            }],
            ..WoplFile::default()
        };
        assert_eq!(
            file.write(),
            Err(SerdesError::Unencodable { name: "bank_name" })
        );
    }

    #[test]
    fn trailing_data_is_reported() {
        let mut bytes = empty_library_bytes();
        bytes.push(0);
        let opts = Options::default().strict().on_assertion(|_| {});
        assert!(matches!(
            WoplFile::read_with(&bytes, opts),
            Err(SerdesError::AssertionViolation {
                name: "trailing data",
                ..
            })
        ));
    }

    #[test]
    fn magic_pad_violation() {
        let mut bytes = empty_library_bytes();
        bytes[10] = 1;
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let opts = Options::default().on_assertion(move |_| counter.set(counter.get() + 1));
        assert!(WoplFile::read_with(&bytes, opts).is_ok());
        assert_eq!(seen.get(), 1);

        let opts = Options::default().strict().on_assertion(|_| {});
        assert_eq!(
            WoplFile::read_with(&bytes, opts),
            Err(SerdesError::AssertionViolation {
                name: "magic_pad",
                expected: 0,
                actual: 1
            })
        );
    }

    #[test]
    fn long_names_are_rejected() {
        let mut file = WoplFile {
            melodic: vec![WoplBank::default()],
            ..WoplFile::default()
        };
        file.melodic[0].instruments[3].name = "x".repeat(33);
        assert_eq!(
            file.write(),
            Err(SerdesError::LengthExceeded {
                name: "instrument_name",
                len: 33,
                max: 32
            })
        );
    }
}
