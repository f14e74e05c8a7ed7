#![doc = include_str!("../README.md")]
// When we return an error type, the possible errors are encoded within it.
#![allow(clippy::missing_errors_doc)]

mod instrument;
mod io;
mod operator;
mod result;
pub mod serdes;
mod synth;
mod timbre;
mod wopl;

pub use {
    instrument::{Connection, FbConn, Instrument, InstrumentFlags, InstrumentMode, RhythmMode},
    io::{Options, Reader, Writer},
    operator::{Operator, OperatorFlags, Waveform},
    result::{SerdesError, SerdesResult},
    serdes::{Mode, RawEnum, Serdes},
    synth::{RenderError, Synth, SynthError, render},
    timbre::{GlobalTimbreLibrary, TimbreData},
    wopl::{
        BANK_SIZE, FmtVer, GlobalBankFlags, NAME_LEN, VolumeModel, WoplBank, WoplFile,
        WoplInstrument,
    },
};
