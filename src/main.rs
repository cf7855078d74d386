//! Binary entry point: opens (or formats) an image and constructs a
//! [`pagefs::Filesystem`] over it (spec §10.3).
//!
//! Wiring this `Filesystem` into an actual kernel-to-userspace transport
//! (the real FUSE request loop) is out of scope (spec §1); this binary's
//! job ends at proving a working filesystem can be constructed and its
//! operation surface exercised.

use clap::Parser;
use log::info;
use pagefs::Filesystem;
use std::path::PathBuf;
use std::process::ExitCode;

/// `<program> [-f] [-v] <mountpoint> <image-path>` (spec §6).
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Run in the foreground instead of daemonizing.
    #[arg(short = 'f', long)]
    foreground: bool,

    /// Increase log verbosity; may be repeated.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory the filesystem would be mounted at.
    mountpoint: PathBuf,

    /// Path to the backing disk image; created and formatted if absent.
    image_path: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let fs = match Filesystem::open(&cli.image_path) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("pagefs: failed to open {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    info!(
        "would mount {} at {} (foreground={}); kernel-bridge transport is out of scope",
        cli.image_path.display(),
        cli.mountpoint.display(),
        cli.foreground
    );
    let root = fs.readdir("/").expect("root directory must resolve on a freshly opened image");
    info!("root directory has {} entr{}", root.len(), if root.len() == 1 { "y" } else { "ies" });

    ExitCode::SUCCESS
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
}
