//! Console output for sessions.

use cadenza_core::{OverloadReport, RenderMode, RenderParameters, Reporter};
use indicatif::{ProgressBar, ProgressStyle};

/// Hundredths of a beat per progress bar step.
const BAR_SCALE: f64 = 100.0;

/// Prints session progress to stdout.
///
/// With `quiet` set nothing is printed. A render with a progress bar shows
/// position on the bar instead of status lines.
pub struct ConsoleReporter {
    name: String,
    quiet: bool,
    bar_enabled: bool,
    bar: Option<ProgressBar>,
}

impl ConsoleReporter {
    pub fn new(name: impl Into<String>, quiet: bool) -> Self {
        Self {
            name: name.into(),
            quiet,
            bar_enabled: false,
            bar: None,
        }
    }

    /// Shows offline progress on a progress bar.
    pub fn with_progress_bar(mut self) -> Self {
        self.bar_enabled = !self.quiet;
        self
    }

    fn bar(length: f64) -> ProgressBar {
        let bar = ProgressBar::new((length * BAR_SCALE).ceil() as u64);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
            .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("##-"));
        bar.set_style(style);
        bar
    }
}

impl Reporter for ConsoleReporter {
    fn audible_tracks(&mut self, indices: &[usize]) {
        if self.quiet {
            return;
        }
        let list: Vec<String> = indices.iter().map(|i| (i + 1).to_string()).collect();
        if list.is_empty() {
            println!("No selected track exists; playing silence");
        } else {
            println!("Only playing tracks: {}", list.join(" "));
        }
    }

    fn graph_ready(&mut self, params: &RenderParameters) {
        if self.quiet {
            return;
        }
        let mode = match params.mode {
            RenderMode::Live => "live",
            RenderMode::Offline => "offline",
        };
        println!(
            "Graph ready ({mode}): {} Hz, {} frames per block",
            params.sample_rate, params.frames_per_block
        );
    }

    fn ready(&mut self, length: f64) {
        if !self.quiet {
            println!("Ready to play: {}, {length:.2} beats long", self.name);
        }
        if self.bar_enabled {
            let bar = Self::bar(length);
            bar.set_message(format!("0.00 / {length:.2} beats"));
            self.bar = Some(bar);
        }
    }

    fn render_progress(&mut self, beats: f64, length: f64) {
        if let Some(bar) = &self.bar {
            bar.set_position((beats.min(length) * BAR_SCALE) as u64);
            bar.set_message(format!("{beats:.2} / {length:.2} beats"));
        } else if !self.quiet {
            println!("current time: {beats:6.2} beats");
        }
    }

    fn playback_status(&mut self, beats: f64, cpu_load: Option<f32>) {
        if self.quiet {
            return;
        }
        match cpu_load {
            Some(load) => println!(
                "current time: {beats:6.2} beats, CPU load = {:.2}%",
                load * 100.0
            ),
            None => println!("current time: {beats:6.2} beats"),
        }
    }

    fn overload(&mut self, report: &OverloadReport) {
        if self.quiet {
            return;
        }
        println!(
            "*** Overload: {} since last tick, last at {:.2} s",
            report.count,
            report.since_start.as_secs_f64()
        );
    }

    fn finished(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message("done");
        }
        if !self.quiet {
            println!("Finished: {}", self.name);
        }
    }
}
