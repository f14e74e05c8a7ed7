//! Interface of the OPL3 MIDI synthesizer that plays the banks.
//!
//! The engine itself lives outside this crate. [`render`] shows the expected
//! order of calls.

use crate::{result::SerdesError, wopl::WoplFile};

/// Failure message reported by a synthesizer engine
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SynthError(pub String);

/// Error when rendering a song
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The bank couldn't be encoded
    #[error("Bank: {0}")]
    Serdes(#[from] SerdesError),
    /// The engine rejected the bank or the song
    #[error("Synth: {0}")]
    Synth(#[from] SynthError),
    /// Chunks must hold at least one stereo frame
    #[error("Chunk size {0} is too small")]
    ChunkSize(usize),
}

/// An OPL3 MIDI synthesizer
pub trait Synth {
    /// Load an encoded WOPL bank
    fn open_bank_data(&mut self, data: &[u8]) -> Result<(), SynthError>;
    /// Load a song (MIDI, XMI, ...)
    fn open_data(&mut self, data: &[u8]) -> Result<(), SynthError>;
    /// Whether the song restarts after it ends
    fn set_loop_enabled(&mut self, enabled: bool);
    /// Fill `out` with interleaved stereo samples.
    ///
    /// Returns the number of samples written, 0 once the song is over.
    fn play(&mut self, out: &mut [i16]) -> usize;
    /// Whether the song is over
    fn at_end(&self) -> bool;
}

/// Play `song` with `bank` once, from start to end, `chunk` samples at a time.
///
/// Returns the interleaved stereo PCM.
pub fn render<S: Synth + ?Sized>(
    synth: &mut S,
    bank: &WoplFile,
    song: &[u8],
    chunk: usize,
) -> Result<Vec<i16>, RenderError> {
    if chunk < 2 {
        return Err(RenderError::ChunkSize(chunk));
    }
    synth.open_bank_data(&bank.write()?)?;
    synth.open_data(song)?;
    synth.set_loop_enabled(false);
    let mut pcm = Vec::new();
    let mut buf = vec![0; chunk];
    loop {
        let written = synth.play(&mut buf).min(chunk);
        if written == 0 {
            break;
        }
        pcm.extend_from_slice(&buf[..written]);
        if synth.at_end() {
            break;
        }
    }
    log::debug!("Rendered {} stereo frames", pcm.len() / 2);
    Ok(pcm)
}
