use cafe_nus::archive::{extract_all, ArchiveFormat, ArchiveWriter};
use cafe_nus::{CommonKey, NusFilesystem, OpenOptions};
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: nus-extract <output.tar|output.zip> <base-dir> [update-dir]";

fn run(args: &[String]) -> cafe_nus::Result<()> {
    let output = PathBuf::from(&args[0]);
    let base = PathBuf::from(&args[1]);
    let update = args.get(2).map(PathBuf::from);

    let format = ArchiveFormat::from_path(&output)?;
    let options = OpenOptions::new(CommonKey::from_env()?).verify_plain_contents(true);
    let fs = NusFilesystem::open_with(&base, update.as_deref(), &options)?;

    let mut writer = ArchiveWriter::new(BufWriter::new(File::create(&output)?), format);
    let count = extract_all(&fs, &mut writer)?;
    writer.finish()?.into_inner().map_err(|e| e.into_error())?.sync_all()?;

    info!(files = count, output = %output.display(), "wrote archive");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if !(2..=3).contains(&args.len()) {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = ?e.kind(), "{e}");
            ExitCode::FAILURE
        }
    }
}
