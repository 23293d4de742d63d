//! Offline rendering to an audio file.

use super::common::{SessionArgs, file_name};
use crate::config::{self, Config};
use crate::report::ConsoleReporter;
use cadenza_core::{RenderParameters, Session};
use cadenza_io::{FileFormat, ManualDevice, WavFileSink};
use clap::Args;
use std::path::PathBuf;

/// Channels written to the output file.
const CHANNELS: u16 = 2;

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Output file (.wav)
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Output sample rate in Hz
    #[arg(short = 'r', long)]
    sample_rate: Option<u32>,

    /// Output bit depth (16 or 32)
    #[arg(long)]
    bit_depth: Option<u16>,
}

pub fn run(args: RenderArgs, config: &Config) -> anyhow::Result<()> {
    let resolved = args.session.resolve(config)?;
    let sample_rate = args.sample_rate.unwrap_or(config.sample_rate);
    let bit_depth = args.bit_depth.unwrap_or(config.bit_depth);
    config::validate_sample_rate(sample_rate)?;
    config::validate_bit_depth(bit_depth)?;
    FileFormat::infer(&args.output)?;

    // The device output is replaced before anything renders, so no hardware
    // is opened.
    let device = ManualDevice::new(sample_rate, CHANNELS);
    let mut sequence = args.session.load(Box::new(device))?;
    let mut player = sequence.player();
    let mut graph = sequence.graph().clone();
    let mut reporter =
        ConsoleReporter::new(args.session.display_name(), args.session.quiet).with_progress_bar();

    let params = RenderParameters::offline(f64::from(sample_rate), resolved.block_size);
    let mut session = Session::prepare(&mut graph, params, &resolved.synth, &mut reporter)?;
    args.session
        .print_prepared(&sequence, session.params(), &resolved.synth);

    let mut sink = WavFileSink::create(&args.output, sample_rate, CHANNELS, bit_depth)?;
    let summary = session.render(
        &mut sequence,
        &mut player,
        &mut sink,
        &resolved.options,
        &mut reporter,
    )?;

    if !args.session.quiet {
        println!(
            "Wrote {} ({} frames, {:.2} s)",
            file_name(&args.output),
            summary.frames,
            summary.frames as f64 / f64::from(sample_rate)
        );
    }
    Ok(())
}
