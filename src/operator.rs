use {
    crate::{
        result::SerdesResult,
        serdes::{RawEnum, Serdes},
    },
    std::fmt,
};

bitflags::bitflags! {
    /// AM/VIB/EG/KSR/MULT register of an operator
    ///
    /// The low nibble is the frequency multiplier, see [`Operator::freq_multiple`].
    #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, bytemuck::AnyBitPattern, bytemuck::NoUninit, Debug)]
    #[repr(C)]
    pub struct OperatorFlags: u8 {
        /// Frequency multiplier nibble
        const FREQ_MULT_MASK = 0x0f;
        /// Envelope scaling (KSR). Higher notes get shorter envelopes.
        const ENVELOPE_SCALE = 0x10;
        /// Hold the sustain level until key off (EG)
        const SUSTAIN        = 0x20;
        /// Frequency vibrato
        const VIBRATO        = 0x40;
        /// Amplitude vibrato (AM)
        const TREMOLO        = 0x80;
    }
}

impl RawEnum<u8> for OperatorFlags {
    fn to_raw(self) -> u8 {
        self.bits()
    }
    fn from_raw(raw: u8) -> Self {
        Self::from_bits_retain(raw)
    }
}

/// OPL3 waveform select
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, bytemuck::AnyBitPattern, bytemuck::NoUninit)]
#[repr(transparent)]
pub struct Waveform(pub u8);

impl Waveform {
    /// Sine wave
    pub const SINE: Self = Self(0);
    /// Half sine wave
    pub const HALF_SINE: Self = Self(1);
    /// Absolute sine wave
    pub const ABS_SINE: Self = Self(2);
    /// Pulse sine
    pub const PULSE_SINE: Self = Self(3);
    /// Sine, even periods only
    pub const SINE_EVEN_PERIODS: Self = Self(4);
    /// Absolute sine, even periods only
    pub const ABS_SINE_EVEN_PERIODS: Self = Self(5);
    /// Square wave
    pub const SQUARE: Self = Self(6);
    /// Derived square wave
    pub const DERIVED_SQUARE: Self = Self(7);

    /// Name of the waveform, if it's one of the eight OPL3 knows
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "Sine",
            1 => "HalfSine",
            2 => "AbsSine",
            3 => "PulseSine",
            4 => "SineEvenPeriods",
            5 => "AbsSineEvenPeriods",
            6 => "Square",
            7 => "DerivedSquare",
            _ => return None,
        })
    }
}

impl fmt::Debug for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Waveform({})", self.0),
        }
    }
}

impl RawEnum<u8> for Waveform {
    fn to_raw(self) -> u8 {
        self.0
    }
    fn from_raw(raw: u8) -> Self {
        Self(raw)
    }
}

/// Register data of one FM operator.
///
/// The fields are the raw register bytes, in wire order.
/// Envelope parameters are unpacked from them on demand.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Debug, bytemuck::AnyBitPattern, bytemuck::NoUninit)]
#[repr(C)]
pub struct Operator {
    /// AM/VIB/EG/KSR/MULT
    pub flags: OperatorFlags,
    /// Key scale (bits 6..7) and inverted total level (bits 0..5)
    pub key_scale_level: u8,
    /// Attack (high nibble) and decay (low nibble)
    pub attack_decay: u8,
    /// Inverted sustain (high nibble) and release (low nibble)
    pub sustain_release: u8,
    /// Waveform select
    pub waveform: Waveform,
}

impl Operator {
    /// Size of an operator on the wire
    pub const SIZE: usize = size_of::<Self>();

    /// Silent operator: zero level, zero sustain, zero release.
    ///
    /// Fills the unused operator slots of two operator instruments.
    pub const BLANK: Self = Self {
        flags: OperatorFlags::empty(),
        key_scale_level: 63,
        attack_decay: 0,
        sustain_release: 240,
        waveform: Waveform::SINE,
    };

    /// Reinterpret 5 raw register bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        bytemuck::cast(bytes)
    }
    /// The 5 raw register bytes
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        bytemuck::cast(self)
    }

    /// 0..=15
    #[must_use]
    pub const fn attack(&self) -> u8 {
        (self.attack_decay & 0xf0) >> 4
    }
    /// 0..=15
    #[must_use]
    pub const fn decay(&self) -> u8 {
        self.attack_decay & 0x0f
    }
    /// 0..=15
    #[must_use]
    pub const fn sustain(&self) -> u8 {
        0xf - ((self.sustain_release & 0xf0) >> 4)
    }
    /// 0..=15
    #[must_use]
    pub const fn release(&self) -> u8 {
        self.sustain_release & 0x0f
    }
    /// Output level, 0..=63. The register stores attenuation, so this is inverted.
    #[must_use]
    pub const fn level(&self) -> u8 {
        63u8.wrapping_sub(self.key_scale_level) & 0x3f
    }
    /// 0..=3
    #[must_use]
    pub const fn key_scale(&self) -> u8 {
        (self.key_scale_level & 0xc0) >> 6
    }
    /// 0..=15
    #[must_use]
    pub const fn freq_multiple(&self) -> u8 {
        self.flags.bits() & 0x0f
    }

    /// Read or write the 5 register bytes
    pub fn serdes<S: Serdes>(&mut self, s: &mut S) -> SerdesResult {
        s.enum_u8("flags", &mut self.flags)?;
        s.u8("key_scale_level", &mut self.key_scale_level)?;
        s.u8("attack_decay", &mut self.attack_decay)?;
        s.u8("sustain_release", &mut self.sustain_release)?;
        s.enum_u8("waveform", &mut self.waveform)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}:{} {:?} {:?} {}",
            self.attack(),
            self.decay(),
            self.sustain(),
            self.release(),
            self.waveform,
            self.flags,
            self.level()
        )
    }
}
