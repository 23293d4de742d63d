//! Print a MIDI file's tracks and playback graph.

use cadenza_io::{LoadOptions, ManualDevice, MidiSequence};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct InfoArgs {
    /// Standard MIDI File
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Show one track per MIDI channel
    #[arg(short = 'c', long)]
    channels_to_tracks: bool,
}

pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let options = LoadOptions {
        channels_to_tracks: args.channels_to_tracks,
    };
    let sequence = MidiSequence::load(&args.file, options, Box::new(ManualDevice::new(44100, 2)))
        .map_err(|e| anyhow::anyhow!("failed to load '{}': {e}", args.file.display()))?;

    println!("File:   {}", args.file.display());
    let seconds = sequence
        .score()
        .tempo()
        .beats_to_seconds(sequence.length());
    println!("Length: {:.2} beats ({seconds:.2} s)", sequence.length());
    println!();
    print!("{sequence}");
    Ok(())
}
