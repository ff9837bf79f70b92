//! Two-thread contention run for the frame ring.
//!
//! Splits a random byte stream into variable-length frames, pushes them from
//! one thread and pops them on another, then checks the reassembled stream.
//! Neither side backs off: every `Full`/`Empty` is an immediate retry.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use frame_ring::{FrameRing, RegionBacking, RingConfig, RingError, HEADER_LEN};
use rand::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "SPSC frame ring contention check")]
struct Args {
    /// Ring capacity in bytes
    #[arg(long, default_value_t = 512 * 1024)]
    capacity: u64,

    /// Total payload bytes to move through the ring
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    total_bytes: usize,

    /// Largest payload per frame (frames are 0..=max bytes)
    #[arg(long, default_value_t = 63)]
    max_payload: usize,

    /// Seed for the payload generator
    #[arg(long, default_value_t = 0xC0FFEE)]
    seed: u64,

    /// Allocate the ring on the heap instead of an anonymous mapping
    #[arg(long)]
    heap: bool,
}

/// Retry counters gathered by the two threads.
#[derive(Clone, Copy, Debug, Default)]
struct StressStats {
    frames: usize,
    producer_full: u64,
    consumer_empty: u64,
    elapsed: Duration,
}

impl StressStats {
    fn throughput_mib_s(&self, bytes: usize) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        bytes as f64 / (1024.0 * 1024.0) / secs
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let backing = if args.heap {
        RegionBacking::Heap
    } else {
        RegionBacking::Auto
    };
    let ring = FrameRing::with_config(RingConfig::new(args.capacity).with_backing(backing))
        .with_context(|| format!("failed to create ring of {} bytes", args.capacity))?;
    ensure!(
        args.max_payload as u64 <= always_admitted(ring.capacity()),
        "max payload {} may never be admitted by a {}-byte ring",
        args.max_payload,
        ring.capacity()
    );

    let (input, spans) = generate(args.seed, args.total_bytes, args.max_payload);
    info!(
        frames = spans.len(),
        bytes = input.len(),
        capacity = args.capacity,
        "input ready"
    );

    let (output, stats) = run(ring, &input, &spans)?;
    info!(
        frames = stats.frames,
        producer_full = stats.producer_full,
        consumer_empty = stats.consumer_empty,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        mib_per_s = stats.throughput_mib_s(input.len()),
        "stream transferred"
    );

    if output != input {
        let first = input
            .iter()
            .zip(&output)
            .position(|(a, b)| a != b)
            .unwrap_or(input.len().min(output.len()));
        warn!(first_mismatch = first, "stream corrupted");
        bail!(
            "reassembled stream differs at byte {first} ({} in, {} out)",
            input.len(),
            output.len()
        );
    }
    info!("stream verified");
    Ok(())
}

/// Largest payload an empty ring admits whatever its cursor offset.
fn always_admitted(capacity: u64) -> u64 {
    ((capacity + 1) / 2).saturating_sub(HEADER_LEN as u64)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn generate(seed: u64, total: usize, max_len: usize) -> (Vec<u8>, Vec<(usize, usize)>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bytes = vec![0u8; total];
    rng.fill_bytes(&mut bytes);

    let mut spans = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + rng.gen_range(0..=max_len)).min(total);
        spans.push((start, end));
        start = end;
    }
    (bytes, spans)
}

fn run(ring: FrameRing, input: &[u8], spans: &[(usize, usize)]) -> Result<(Vec<u8>, StressStats)> {
    let (mut producer, mut consumer) = ring.split();
    let started = Instant::now();

    let (producer_full, consumed) = thread::scope(|scope| {
        let writer = scope.spawn(move || -> Result<u64, RingError> {
            let mut full = 0u64;
            for &(start, end) in spans {
                loop {
                    match producer.push(&input[start..end]) {
                        Ok(()) => break,
                        Err(err) if err.is_retryable() => full += 1,
                        Err(err) => return Err(err),
                    }
                }
            }
            Ok(full)
        });

        let reader = scope.spawn(move || -> Result<(Vec<u8>, u64), RingError> {
            let mut output = Vec::with_capacity(input.len());
            let mut empty = 0u64;
            let mut frames = 0;
            while frames < spans.len() {
                match consumer.pop_into(&mut output) {
                    Ok(_) => frames += 1,
                    Err(err) if err.is_retryable() => empty += 1,
                    Err(err) => return Err(err),
                }
            }
            Ok((output, empty))
        });

        (writer.join(), reader.join())
    });

    let producer_full = producer_full
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))?
        .context("producer failed")?;
    let (output, consumer_empty) = consumed
        .map_err(|_| anyhow::anyhow!("consumer thread panicked"))?
        .context("consumer failed")?;

    let stats = StressStats {
        frames: spans.len(),
        producer_full,
        consumer_empty,
        elapsed: started.elapsed(),
    };
    Ok((output, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ring_moves_stream_intact() {
        let (input, spans) = generate(7, 64 * 1024, 63);
        let ring = FrameRing::new(256).expect("ring");
        let (output, stats) = run(ring, &input, &spans).expect("run");
        assert_eq!(stats.frames, spans.len());
        assert!(output == input);
    }

    #[test]
    fn payload_limit_rounds_odd_capacities_up() {
        assert_eq!(always_admitted(64), 28);
        assert_eq!(always_admitted(63), 28);
        assert_eq!(always_admitted(111), 52);
        assert_eq!(always_admitted(3), 0);

        let mut ring = FrameRing::new(63).expect("ring");
        for _ in 0..64 {
            ring.push(&[7; 28]).expect("push");
            assert_eq!(ring.pop().expect("pop"), vec![7; 28]);
        }
    }

    #[test]
    fn spans_cover_the_input_without_gaps() {
        let (input, spans) = generate(11, 10_000, 31);
        assert_eq!(spans.first().map(|s| s.0), Some(0));
        assert_eq!(spans.last().map(|s| s.1), Some(input.len()));
        for pair in spans.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
            assert!(pair[0].1 - pair[0].0 <= 31);
        }
    }
}
