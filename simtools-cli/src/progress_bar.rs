use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use simtools::progress::ProgressNotifier;

/// Stage of a command: its label and the number of steps, 0 if unknown.
#[derive(Debug, Default)]
struct Stage {
    label: &'static str,
    steps: u64,
    /// Whether the bar has been restyled for this stage yet.
    started: bool,
}

/// Progress bar shared by all commands; hidden unless [`SimProgressBar::show`]
/// is called. Each stage is drawn as a spinner until its length is known.
#[derive(Debug, Clone)]
pub(crate) struct SimProgressBar {
    bar: ProgressBar,
    stage: Arc<Mutex<Stage>>,
}

impl SimProgressBar {
    pub fn new() -> SimProgressBar {
        let bar = ProgressBar::hidden();
        bar.set_style(ProgressStyle::default_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Reading inputs...");

        Self {
            bar,
            stage: Arc::new(Mutex::new(Stage::default())),
        }
    }

    pub fn show(&self) {
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear()
    }

    pub fn println<I: AsRef<str>>(&self, msg: I) {
        self.bar.println(msg);
    }

    pub fn set_stage(&self, label: &'static str) {
        let mut stage = self.stage.lock().unwrap();
        *stage = Stage {
            label,
            ..Stage::default()
        };
    }

    fn start_stage(&self, stage: &mut Stage) {
        self.bar.set_position(0);
        self.bar.set_message(stage.label);
        let style = if stage.steps == 0 {
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}: {pos}")
                .expect("Invalid progress bar template")
        } else {
            self.bar.set_length(stage.steps);
            ProgressStyle::default_bar()
                .template("{msg} {wide_bar} {pos}/{len} [ETA {eta}]")
                .expect("Invalid progress bar template")
        };
        self.bar.set_style(style);
        stage.started = true;
    }
}

impl ProgressNotifier for SimProgressBar {
    fn set_iter_num(&self, num_iter: u64) {
        let mut stage = self.stage.lock().unwrap();
        stage.steps = num_iter;
        stage.started = false;
    }

    fn inc_iter(&self) {
        let mut stage = self.stage.lock().unwrap();
        if !stage.started {
            self.start_stage(&mut stage);
        }
        self.bar.inc(1);
    }
}
