use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use colored::*;
use indicatif::ProgressStyle;
use reconr_core::ScanId;
use reconr_core::ledger::{ListenerError, ProgressListener};
use serde_json::Value;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const TIP_DURATION: Duration = Duration::from_secs(2);
const MESSAGE_READ_TIME: Duration = Duration::from_secs(1);
const MIN_TIP_VISIBILITY: Duration = Duration::from_millis(750);
const TIPS: &[&str] = &[
    "You can press 'q' to stop early",
    "A stopped run still prints what it found",
    "Run with -v to follow every scan",
];

enum Tick {
    Message(String),
    Finish,
}

/// Progress spinner of a run, rendered by the tracing-indicatif layer.
///
/// Phase progress replaces the message as it arrives; tips rotate in while
/// nothing else happens.
pub struct SpinnerHandle {
    tx: Sender<Tick>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SpinnerHandle {
    pub fn start(hidden: bool) -> Self {
        let span = if hidden {
            info_span!("progress")
        } else {
            info_span!("progress", indicatif.pb_show = true)
        };
        let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&[
                "▁▁▁▁▁",
                "▁▂▂▂▁",
                "▁▄▂▄▁",
                "▂▄▆▄▂",
                "▄▆█▆▄",
                "▂▄▆▄▂",
                "▁▄▂▄▁",
                "▁▂▂▂▁",
            ]);
        span.pb_set_style(&style);

        let (tx, rx) = mpsc::channel::<Tick>();
        let worker = thread::spawn(move || rotate(span, rx));

        Self {
            tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn send_to_queue(&self, message: String) {
        let _ = self.tx.send(Tick::Message(message));
    }

    /// Stops the spinner and waits until it is cleared from the terminal.
    pub fn finish(&self) {
        let _ = self.tx.send(Tick::Finish);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let _ = worker.join();
        }
    }
}

impl Drop for SpinnerHandle {
    fn drop(&mut self) {
        self.finish();
    }
}

impl ProgressListener for SpinnerHandle {
    fn on_progress(&self, _scan_id: &ScanId, payload: &Value) -> Result<(), ListenerError> {
        let phase = payload
            .get("phase")
            .and_then(Value::as_str)
            .ok_or("progress payload without phase")?;
        let completed = payload.get("completed").and_then(Value::as_u64).unwrap_or(0);
        let total = payload.get("total").and_then(Value::as_u64).unwrap_or(0);

        self.send_to_queue(format!(
            "{}: {}/{} scans finished",
            phase.replace('_', " "),
            completed.to_string().green().bold(),
            total
        ));
        Ok(())
    }
}

/// Owns the span for the spinner's lifetime; it closes when this returns.
fn rotate(span: Span, rx: mpsc::Receiver<Tick>) {
    let mut tip_index = 0;
    let mut next_action_time = Instant::now() + TIP_DURATION;
    let mut is_showing_tip = false;
    let mut last_tip_time = Instant::now();

    loop {
        let wait_time = next_action_time.saturating_duration_since(Instant::now());

        match rx.recv_timeout(wait_time) {
            Ok(Tick::Message(mut msg)) => {
                if is_showing_tip {
                    let elapsed = last_tip_time.elapsed();
                    if elapsed < MIN_TIP_VISIBILITY {
                        thread::sleep(MIN_TIP_VISIBILITY - elapsed);
                    }
                    is_showing_tip = false;
                }
                while let Ok(newer) = rx.try_recv() {
                    match newer {
                        Tick::Message(newer_msg) => msg = newer_msg,
                        Tick::Finish => return,
                    }
                }
                span.pb_set_message(&msg);
                next_action_time = Instant::now() + MESSAGE_READ_TIME;
            }
            Err(RecvTimeoutError::Timeout) => {
                let tip = TIPS[tip_index % TIPS.len()];
                span.pb_set_message(&format!("{}", tip.italic().white()));

                tip_index += 1;
                is_showing_tip = true;
                last_tip_time = Instant::now();

                next_action_time = Instant::now() + TIP_DURATION;
            }
            Ok(Tick::Finish) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
