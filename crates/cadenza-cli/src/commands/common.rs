//! Options and helpers shared by the play and render commands.

use crate::config::{self, Config};
use cadenza_core::{PlayOptions, RenderParameters, SynthSettings, TrackSelection};
use cadenza_io::{LoadOptions, MidiSequence, OutputDevice};
use clap::Args;
use std::path::{Path, PathBuf};

/// Flags common to every command that plays a sequence.
#[allow(clippy::struct_excessive_bools)] // one per command-line switch
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Standard MIDI File to play
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Play only this track (1-based; repeat for several)
    #[arg(short = 't', long = "track", value_name = "N", value_parser = parse_track)]
    pub tracks: Vec<usize>,

    /// Start position in beats
    #[arg(short, long, value_name = "BEATS", default_value_t = 0.0)]
    pub start: f64,

    /// Frames per render block
    #[arg(short = 'i', long, value_name = "FRAMES")]
    pub block_size: Option<u32>,

    /// Sound bank file for the synthesizer
    #[arg(short = 'b', long, value_name = "PATH")]
    pub sound_bank: Option<PathBuf>,

    /// Stream synthesizer samples from disk
    #[arg(short = 'd', long)]
    pub disk_stream: bool,

    /// Load one track per MIDI channel
    #[arg(short = 'c', long)]
    pub channels_to_tracks: bool,

    /// Print the sequence and its configured graph before playing
    #[arg(long)]
    pub print: bool,

    /// Suppress progress output
    #[arg(short = 'n', long)]
    pub quiet: bool,
}

/// Parses a 1-based track number into a 0-based index.
pub fn parse_track(s: &str) -> Result<usize, String> {
    let number: usize = s
        .parse()
        .map_err(|_| format!("invalid track number: '{s}'"))?;
    number
        .checked_sub(1)
        .ok_or_else(|| "track numbers start at 1".to_string())
}

/// Settings after merging flags over the config file.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub block_size: u32,
    pub synth: SynthSettings,
    pub options: PlayOptions,
}

impl SessionArgs {
    /// Merges these flags over `config`.
    pub fn resolve(&self, config: &Config) -> anyhow::Result<Resolved> {
        let block_size = self.block_size.unwrap_or(config.block_size);
        config::validate_block_size(block_size)?;
        if !self.start.is_finite() || self.start < 0.0 {
            anyhow::bail!("start position must be a non-negative number of beats");
        }

        Ok(Resolved {
            block_size,
            synth: SynthSettings {
                cpu_load_ceiling: config.cpu_load_ceiling,
                sound_bank: self.sound_bank.clone().or_else(|| config.sound_bank.clone()),
                stream_from_disk: self.disk_stream || config.stream_from_disk,
            },
            options: PlayOptions {
                start_time: self.start,
                selection: self.tracks.iter().copied().collect::<TrackSelection>(),
            },
        })
    }

    /// Loads the file.
    pub fn load(&self, device: Box<dyn OutputDevice>) -> anyhow::Result<MidiSequence> {
        MidiSequence::load(
            &self.file,
            LoadOptions {
                channels_to_tracks: self.channels_to_tracks,
            },
            device,
        )
        .map_err(|e| anyhow::anyhow!("failed to load '{}': {e}", self.file.display()))
    }

    /// With `--print`, shows the sequence and its graph as configured.
    pub fn print_prepared(
        &self,
        sequence: &MidiSequence,
        params: &RenderParameters,
        synth: &SynthSettings,
    ) {
        if !self.print {
            return;
        }
        println!("{sequence}");
        println!(
            "Sample rate: {} Hz, disk streaming: {}",
            params.sample_rate,
            if synth.stream_from_disk { "on" } else { "off" }
        );
    }

    /// File name shown in progress output.
    pub fn display_name(&self) -> String {
        file_name(&self.file)
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
