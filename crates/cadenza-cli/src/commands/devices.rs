//! Audio output device listing.

use clap::Args;
use cadenza_io::list_output_devices;

#[derive(Args)]
pub struct DevicesArgs {}

pub fn run(_args: DevicesArgs) -> anyhow::Result<()> {
    let devices = list_output_devices()?;
    if devices.is_empty() {
        println!("No audio output devices found.");
        return Ok(());
    }

    println!("Output Devices");
    println!("==============\n");
    for (idx, device) in devices.iter().enumerate() {
        let default = if device.is_default { " (default)" } else { "" };
        println!(
            "  [{}] {} ({} Hz, {} ch){}",
            idx, device.name, device.default_sample_rate, device.channels, default
        );
    }
    println!();
    println!("Tip: Use the device index or part of its name with --output-device:");
    println!("  cadenza play song.mid --output-device 0");
    Ok(())
}
