//! Testing utilities for oplbank

use {
    anstyle::AnsiColor,
    clap::Parser,
    oplbank::{GlobalTimbreLibrary, Options, SerdesResult, WoplBank, WoplFile},
    std::{error::Error, path::PathBuf},
};

#[derive(clap::Parser)]
enum Args {
    /// Decode a bank, encode it again and compare the bytes
    RoundTrip {
        path: PathBuf,
        /// Fail on padding, offset and trailing data problems
        #[arg(long)]
        strict: bool,
    },
    /// Convert a global timbre library into a WOPL bank
    OplToWopl { in_path: PathBuf, out_path: PathBuf },
    /// Print the instruments of a bank
    Dump { path: PathBuf },
}

enum Bank {
    Wopl(WoplFile),
    Opl(GlobalTimbreLibrary),
}

impl Bank {
    fn read(data: &[u8], opts: Options) -> SerdesResult<Self> {
        if data.starts_with(b"WOPL3-BANK") {
            WoplFile::read_with(data, opts).map(Self::Wopl)
        } else {
            GlobalTimbreLibrary::read_with(data, opts).map(Self::Opl)
        }
    }
    fn write(&self, opts: Options) -> SerdesResult<Vec<u8>> {
        match self {
            Self::Wopl(wopl) => wopl.write_with(opts),
            Self::Opl(opl) => opl.write_with(opts),
        }
    }
}

fn options(strict: bool) -> Options {
    if strict {
        Options::default().strict()
    } else {
        Options::default()
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let args = Args::parse();
    match args {
        Args::RoundTrip { path, strict } => round_trip(path, strict)?,
        Args::OplToWopl { in_path, out_path } => opl_to_wopl(in_path, out_path)?,
        Args::Dump { path } => dump(path)?,
    }
    Ok(())
}

fn round_trip(path: PathBuf, strict: bool) -> Result<(), Box<dyn Error>> {
    let data = std::fs::read(&path)?;
    let out = Bank::read(&data, options(strict))?.write(options(strict))?;
    let name = path.display();
    if out == data {
        pass(&format!("{name}: {} bytes", data.len()));
        return Ok(());
    }
    match data.iter().zip(&out).position(|(a, b)| a != b) {
        Some(pos) => fail(&format!("{name}: first difference at {pos:#x}")),
        None => fail(&format!(
            "{name}: length differs ({} in, {} out)",
            data.len(),
            out.len()
        )),
    }
    Ok(())
}

fn opl_to_wopl(in_path: PathBuf, out_path: PathBuf) -> Result<(), Box<dyn Error>> {
    let library = GlobalTimbreLibrary::read(&std::fs::read(in_path)?)?;
    let wopl = WoplFile::from(&library);
    std::fs::write(&out_path, wopl.write()?)?;
    log::info!(
        "Wrote {} timbres to {}",
        library.data.len(),
        out_path.display()
    );
    Ok(())
}

fn dump(path: PathBuf) -> Result<(), Box<dyn Error>> {
    match Bank::read(&std::fs::read(path)?, Options::default())? {
        Bank::Wopl(wopl) => {
            println!(
                "WOPL v{}, {:?}, {:?}",
                wopl.version.0, wopl.global_flags, wopl.volume_model
            );
            for (i, bank) in wopl.melodic.iter().enumerate() {
                dump_bank("Melodic", i, bank);
            }
            for (i, bank) in wopl.percussion.iter().enumerate() {
                dump_bank("Percussion", i, bank);
            }
        }
        Bank::Opl(opl) => {
            for (i, timbre) in opl.data.iter().enumerate() {
                println!("{i:3} {:3}:{:<3} {timbre}", timbre.bank, timbre.patch);
            }
        }
    }
    Ok(())
}

fn dump_bank(kind: &str, idx: usize, bank: &WoplBank) {
    println!(
        "{kind} bank {idx} (MSB {} LSB {}) {:?}",
        bank.midi_msb(),
        bank.midi_lsb(),
        bank.name
    );
    for (i, ins) in bank.instruments.iter().enumerate() {
        if *ins == Default::default() {
            continue;
        }
        println!("  {i:3} {:32} {ins}", ins.name);
    }
}

fn pass(msg: &str) {
    let style = anstyle::Style::new()
        .fg_color(Some(anstyle::Color::Ansi(AnsiColor::Green)))
        .bold();
    eprintln!("{style}[PASS]{style:#} {msg}");
}

fn fail(msg: &str) {
    let style = anstyle::Style::new()
        .fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)))
        .bold();
    eprintln!("{style}[FAIL]{style:#} {msg}");
}
