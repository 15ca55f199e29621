// ===============================
// src/recorder.rs
// ===============================
//
// Lightweight JSONL audit log of sync events:
// - Appends every Event as one JSON line.
// - BufWriter to keep syscalls down; flushed every second and every N events.
// - Creates the parent directory if missing.
// - On a failed write, reopens the file once and retries that line.
//
// Enabled by setting `RECORD_FILE=/path/to/events.jsonl` (see main.rs).
//
use std::path::Path;

use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::Event;

const FLUSH_EVERY_N_EVENTS: u32 = 100;

async fn open_writer(path: &str) -> std::io::Result<BufWriter<tokio::fs::File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    Ok(BufWriter::new(file))
}

async fn write_line(
    writer: &mut BufWriter<tokio::fs::File>,
    line: &str,
) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await
}

pub async fn run(mut rx: mpsc::Receiver<Event>, path: String) {
    let mut writer = match open_writer(&path).await {
        Ok(writer) => writer,
        Err(e) => {
            error!(?e, %path, "recorder: open failed, recording disabled");
            // Drain the channel so senders never block on a dead recorder.
            while rx.recv().await.is_some() {}
            return;
        }
    };
    info!(%path, "recorder: started");

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut since_last_flush: u32 = 0;

    loop {
        tokio::select! {
            maybe_ev = rx.recv() => {
                match maybe_ev {
                    Some(ev) => {
                        let line = match serde_json::to_string(&ev) {
                            Ok(line) => line,
                            Err(e) => {
                                error!(?e, "recorder: serialize error, skip event");
                                continue;
                            }
                        };
                        if let Err(e) = write_line(&mut writer, &line).await {
                            error!(?e, "recorder: write failed, attempting reopen");
                            match open_writer(&path).await {
                                Ok(reopened) => {
                                    writer = reopened;
                                    if let Err(e2) = write_line(&mut writer, &line).await {
                                        error!(?e2, "recorder: write failed again after reopen, drop event");
                                    }
                                }
                                Err(e2) => error!(?e2, "recorder: reopen failed, drop event"),
                            }
                        }
                        since_last_flush += 1;
                        if since_last_flush >= FLUSH_EVERY_N_EVENTS {
                            let _ = writer.flush().await;
                            since_last_flush = 0;
                        }
                    }
                    None => {
                        // Channel closed: flush and stop.
                        let _ = writer.flush().await;
                        info!("recorder: channel closed, stopped");
                        break;
                    }
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}
