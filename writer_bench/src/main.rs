use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::{self, Parser};
use serde_derive::{Deserialize, Serialize};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use logbuffer::frame::{self, CURRENT_VERSION, FRAME_ALIGNMENT, VERSION_OFFSET};
use logbuffer::{AppendOutcome, AtomicBuffer, LogAppender, LogBufferConfig, MappedLogBuffers};

const HEADER_LENGTH: usize = 16;

#[derive(clap::Parser)]
#[clap()]
struct Opts {
    #[clap(short = 'c', long = "config", default_value = "logbuffer-writer.toml")]
    config: String,
    #[clap(short = 't', long = "threads", default_value = "2")]
    threads: usize,
    #[clap(short = 'l', long = "message-length", default_value = "64")]
    message_length: usize,
}

#[derive(Default, Debug, Serialize, Deserialize)]
struct WriterConfig {
    log_buffer: LogBufferConfig,
}

#[derive(Default, Debug)]
struct WriterStats {
    appended: usize,
    tripped: usize,
    full: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    let cfg: WriterConfig = confy::load_path(&opts.config)?;

    let closing = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&closing))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&closing))?;

    let buffers = MappedLogBuffers::create(&cfg.log_buffer)?;
    let log = buffers.log_buffer()?;
    let state = buffers.state_buffer()?;
    let mut header = [0u8; HEADER_LENGTH];
    header[VERSION_OFFSET] = CURRENT_VERSION;
    let appender = LogAppender::new(&log, &state, &header, cfg.log_buffer.max_frame_length)?;

    run(&appender, &opts, &closing)?;
    Ok(())
}

fn run<B: AtomicBuffer + Sync>(
    appender: &LogAppender<'_, B>,
    opts: &Opts,
    closing: &AtomicBool,
) -> Result<(), Box<dyn Error>> {
    if opts.message_length > appender.max_message_length() {
        return Err(format!(
            "message length {} exceeds max message length {}",
            opts.message_length,
            appender.max_message_length()
        )
        .into());
    }

    let start = Instant::now();
    let stats: Vec<WriterStats> = thread::scope(|s| {
        let handles: Vec<_> = (0..opts.threads)
            .map(|writer| s.spawn(move || write_until_tripped(appender, writer, opts.message_length, closing)))
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(writer, h)| {
                h.join().unwrap_or_else(|_| {
                    warn!(writer, "writer thread panicked, its appends are not counted");
                    WriterStats::default()
                })
            })
            .collect()
    });
    let duration = start.elapsed();

    let appended: usize = stats.iter().map(|s| s.appended).sum();
    let tripped: usize = stats.iter().map(|s| s.tripped).sum();
    let full: usize = stats.iter().map(|s| s.full).sum();
    let iops = (appended as f64) / duration.as_secs_f64().max(f64::EPSILON);
    println!(
        "{:#?}K messages append/s. Total time: {:#?}",
        (iops / 1000f64) as u64,
        duration
    );
    info!(appended, tripped, full, tail = appender.tail(), "writers finished");

    let (frames, padding) = scan(appender);
    println!(
        "Scanned {} data frames and {} padding frames ({} appended)",
        frames, padding, appended
    );
    if frames < appended {
        warn!(frames, appended, "scan stopped before every appended frame");
    }
    Ok(())
}

fn write_until_tripped<B: AtomicBuffer>(
    appender: &LogAppender<'_, B>,
    writer: usize,
    message_length: usize,
    closing: &AtomicBool,
) -> WriterStats {
    let mut stats = WriterStats::default();
    let mut message = vec![(writer % 256) as u8; message_length];
    let mut seq = 0u64;
    while !closing.load(Ordering::Relaxed) {
        if message_length >= 8 {
            message[..8].copy_from_slice(&seq.to_le_bytes());
        }
        match appender.append(&message, 0, message_length) {
            Ok(AppendOutcome::Appended { .. }) => stats.appended += 1,
            Ok(AppendOutcome::Tripped { padding_offset }) => {
                info!(writer, padding_offset, "log buffer tripped");
                stats.tripped += 1;
                break;
            }
            Ok(AppendOutcome::Full) => {
                stats.full += 1;
                break;
            }
            Err(e) => {
                warn!(writer, error = %e, "append rejected");
                break;
            }
        }
        seq += 1;
    }
    stats
}

/// Counts published data and padding frames from the start of the log.
fn scan<B: AtomicBuffer>(appender: &LogAppender<'_, B>) -> (usize, usize) {
    let log = appender.log_buffer();
    let (mut frames, mut padding) = (0, 0);
    let mut offset = 0;
    while offset < appender.capacity() {
        let length = frame::frame_length_volatile(log, offset);
        if length <= 0 {
            break;
        }
        if frame::is_padding_frame(log, offset) {
            padding += 1;
        } else {
            frames += 1;
        }
        offset += frame::align(length as usize, FRAME_ALIGNMENT);
    }
    (frames, padding)
}
