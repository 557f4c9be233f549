//! `ember`: inspect script files.
//!
//! Reports whether each file is source text or a bytecode image and summarizes its contents.

use std::{fs, path::{Path, PathBuf}, process};
use clap::Parser;
use ember::{Error, Format, Image, Result};

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Inspect Ember source and bytecode files", long_about = None)]
struct Cli {
    /// Dump each function's bytecode payload in hex
    #[arg(long)]
    hex: bool,

    /// Files to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() {
    ember::init_tracing();
    let cli = Cli::parse();

    for path in &cli.files {
        let file = path.display().to_string();
        if let Err(err) = inspect(path, cli.hex) {
            let err = match err.file() {
                Some(_) => err,
                None => err.at_file(file),
            };
            eprintln!("error: {}", err);
            process::exit(1);
        }
    }
}

fn inspect(path: &Path, hex: bool) -> Result<()> {
    let bytes = fs::read(path)
        .map_err(|err| Error::io(format!("Cannot open file: {}.", err)))?;

    match Format::detect(&bytes) {
        Format::Source => {
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| Error::io("Source is not valid UTF-8 text."))?;
            println!("{}: source, {} bytes, {} lines", path.display(), bytes.len(), text.lines().count());
        },
        Format::Bytecode => {
            let image = Image::decode(&bytes)?;
            println!(
                "{}: bytecode compiled from {}, {} function(s)",
                path.display(),
                image.source,
                image.functions.len(),
            );
            for func in &image.functions {
                println!(
                    "  {}({}) temps={} size={}",
                    func.name,
                    func.params.join(", "),
                    func.temp_size,
                    func.code.len(),
                );
                if hex {
                    for chunk in func.code.chunks(16) {
                        let line = chunk
                            .iter()
                            .map(|b| format!("{:02x}", b))
                            .collect::<Vec<_>>()
                            .join(" ");
                        println!("    {}", line);
                    }
                }
            }
        },
    }
    Ok(())
}
