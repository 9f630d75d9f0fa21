//! Offline rendering command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use gammou_config::SynthConfig;
use gammou_synth::{SynthEvent, Synthesizer};

use crate::patch::build_demo;

/// Frames rendered per `process_block` call.
const BLOCK_FRAMES: usize = 256;

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Synthesizer configuration (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated MIDI notes
    #[arg(long, value_delimiter = ',', default_value = "60,64,67")]
    notes: Vec<u8>,

    /// Seconds between successive note starts (0 plays a chord)
    #[arg(long, default_value = "0.0")]
    stagger: f32,

    /// Seconds each note is held
    #[arg(long, default_value = "1.0")]
    note_length: f32,

    /// Seconds rendered after the last release
    #[arg(long, default_value = "0.5")]
    tail: f32,

    /// Note-on velocity (0-1)
    #[arg(long, default_value = "0.8")]
    velocity: f32,

    /// Master gain
    #[arg(long, default_value = "0.25")]
    gain: f32,
}

pub fn run(args: RenderArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => SynthConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SynthConfig::default(),
    };
    if args.notes.iter().any(|&n| n > 127) {
        bail!("MIDI notes must be in 0..=127");
    }
    for (name, secs) in [
        ("stagger", args.stagger),
        ("note-length", args.note_length),
        ("tail", args.tail),
    ] {
        if !secs.is_finite() || secs < 0.0 {
            bail!("--{name} must be a non-negative number of seconds");
        }
    }

    let (mut synth, mut editor) = Synthesizer::new(&config);
    build_demo(&mut editor, args.gain)?;

    let sr = config.sample_rate_hz();
    let to_frames = |secs: f32| (secs * sr).round() as usize;
    let mut events: Vec<(usize, SynthEvent)> = Vec::with_capacity(args.notes.len() * 2);
    for (i, &note) in args.notes.iter().enumerate() {
        let start = to_frames(args.stagger * i as f32);
        let end = start + to_frames(args.note_length);
        events.push((
            start,
            SynthEvent::NoteOn {
                note,
                velocity: args.velocity,
            },
        ));
        events.push((end, SynthEvent::NoteOff { note, velocity: 0.0 }));
    }
    // stable: a note's on stays before its off when both land on one frame
    events.sort_by_key(|&(frame, _)| frame);

    let last_release = events.last().map_or(0, |&(frame, _)| frame);
    let total_frames = last_release + to_frames(args.tail);
    let channels = config.output_count;
    let mut rendered = vec![0.0f32; total_frames * channels];

    tracing::info!(
        notes = ?args.notes,
        frames = total_frames,
        channels,
        sample_rate = config.sample_rate,
        "rendering"
    );

    let mut pending = events.iter().peekable();
    let mut frame = 0;
    let mut peak_voices = 0;
    while frame < total_frames {
        while let Some(&&(at, event)) = pending.peek()
            && at <= frame
        {
            synth.handle_event(event);
            pending.next();
        }
        peak_voices = peak_voices.max(synth.active_voices().len());

        let next_event = pending.peek().map_or(total_frames, |&&(at, _)| at);
        let frames = BLOCK_FRAMES.min(next_event - frame).min(total_frames - frame).max(1);
        let out = &mut rendered[frame * channels..(frame + frames) * channels];
        synth.process_block(&[], out, frames);
        frame += frames;
    }

    write_wav(&args.output, &rendered, channels, config.sample_rate)?;

    let peak = rendered.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    println!(
        "Rendered {:.2}s ({} frames, {} ch) to {}",
        total_frames as f32 / sr,
        total_frames,
        channels,
        args.output.display()
    );
    println!("Peak level: {peak:.3}, max active voices: {peak_voices}");
    Ok(())
}

fn write_wav(path: &Path, samples: &[f32], channels: usize, sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: u16::try_from(channels).context("too many output channels")?,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
