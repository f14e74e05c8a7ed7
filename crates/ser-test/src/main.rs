//! Test binary for serialization

use {
    oplbank::{GlobalTimbreLibrary, WoplFile},
    std::process::ExitCode,
};

fn main() -> ExitCode {
    let in_file = std::env::args()
        .nth(1)
        .expect("Need .wopl or .opl file as arg");
    let in_bytes = std::fs::read(in_file).unwrap();
    let (out_bytes, ext) = if in_bytes.starts_with(b"WOPL3-BANK") {
        (WoplFile::read(&in_bytes).unwrap().write().unwrap(), "wopl")
    } else {
        let library = GlobalTimbreLibrary::read(&in_bytes).unwrap();
        (library.write().unwrap(), "opl")
    };
    if in_bytes != out_bytes {
        eprintln!("Mismatch.");
        std::fs::write(format!("/tmp/in.{ext}"), &in_bytes).unwrap();
        std::fs::write(format!("/tmp/out.{ext}"), &out_bytes).unwrap();
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
