//! Live playback through an audio output device.

use super::common::SessionArgs;
use crate::config::Config;
use crate::report::ConsoleReporter;
use cadenza_core::{DEFAULT_CANCEL_TICKS, LiveMonitor, MonitorOutcome, RenderParameters, Session};
use cadenza_io::CpalDevice;
use clap::Args;

#[derive(Args)]
pub struct PlayArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Output device (index, exact name, or partial name)
    #[arg(short = 'o', long, value_name = "DEVICE")]
    output_device: Option<String>,

    /// Give up after a fixed number of status intervals
    #[arg(short, long)]
    wait: bool,
}

pub fn run(args: PlayArgs, config: &Config) -> anyhow::Result<()> {
    let resolved = args.session.resolve(config)?;
    let search = args
        .output_device
        .as_deref()
        .or(config.output_device.as_deref());
    let device = CpalDevice::open(search)?;

    let mut sequence = args.session.load(Box::new(device))?;
    let mut player = sequence.player();
    let mut graph = sequence.graph().clone();
    let mut reporter = ConsoleReporter::new(args.session.display_name(), args.session.quiet);

    let params = RenderParameters::live(resolved.block_size);
    let mut session = Session::prepare(&mut graph, params, &resolved.synth, &mut reporter)?;
    args.session
        .print_prepared(&sequence, session.params(), &resolved.synth);

    let monitor = LiveMonitor::new().cancel_after(args.wait.then_some(DEFAULT_CANCEL_TICKS));
    let outcome = session.play(
        &mut sequence,
        &mut player,
        &resolved.options,
        &monitor,
        &mut reporter,
    )?;

    if let MonitorOutcome::Cancelled { ticks } = outcome
        && !args.session.quiet
    {
        println!("Stopped after {ticks} status intervals");
    }
    Ok(())
}
