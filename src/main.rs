//! surroundpan CLI: play a WAV file from a direction, or render it offline.
//!
//! Usage:
//!   surroundpan input.wav --layout 5.0 --speaker "Rear Left"
//!   surroundpan input.wav --azimuth 45 --volume 0.5
//!   surroundpan input.wav --sweep 30
//!   surroundpan input.wav --output-channels 2 --wav out.wav

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use sp_ir::{LayoutPreset, SpeakerLayout};
use sp_master::{format_clock, Controller, ControllerConfig};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "surroundpan", about = "Pan a mono source around a speaker layout")]
struct Args {
    /// WAV file to play; multichannel files are averaged to mono
    input: PathBuf,

    /// Speaker layout: stereo / 2.0 or surround / 5.0
    #[arg(short, long, default_value = "5.0")]
    layout: LayoutPreset,

    /// Output channels; 2 folds a surround layout down to stereo
    #[arg(long)]
    output_channels: Option<u16>,

    /// Source azimuth in degrees, positive to the right
    #[arg(short, long, allow_negative_numbers = true, conflicts_with = "speaker")]
    azimuth: Option<f32>,

    /// Play from a named speaker instead of an azimuth
    #[arg(short, long)]
    speaker: Option<String>,

    /// Rotate the source continuously at this many degrees per second
    #[arg(long, allow_negative_numbers = true)]
    sweep: Option<f32>,

    /// Playback volume, 0.0 to 1.0
    #[arg(short, long, default_value_t = 1.0)]
    volume: f32,

    /// Start position in seconds
    #[arg(long, default_value_t = 0.0)]
    seek: f64,

    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Output device name (default device if omitted)
    #[cfg(feature = "device")]
    #[arg(long)]
    device: Option<String>,

    /// Render to this WAV file instead of playing
    #[arg(long)]
    wav: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let layout = SpeakerLayout::preset(args.layout)?;
    let config = ControllerConfig {
        output_channels: args.output_channels,
        backend: backend(&args),
        ..Default::default()
    };
    let mut ctrl = Controller::new(layout, config)?;

    let data = fs::read(&args.input).with_context(|| format!("failed to read {}", args.input.display()))?;
    ctrl.load_wav(&data)
        .with_context(|| format!("failed to decode {}", args.input.display()))?;

    if let Some(name) = &args.speaker {
        ctrl.select_direction(name.as_str())?;
    } else if let Some(azimuth) = args.azimuth {
        ctrl.select_direction(azimuth)?;
    }
    ctrl.set_volume(args.volume);

    print_layout(&ctrl);

    match &args.wav {
        Some(path) => render_to_wav(&ctrl, path, args.duration),
        None => play_audio(&mut ctrl, &args),
    }
}

#[cfg(feature = "device")]
fn backend(args: &Args) -> sp_master::Backend {
    if args.wav.is_some() {
        sp_master::Backend::Headless
    } else {
        sp_master::Backend::Device {
            device_name: args.device.clone(),
        }
    }
}

#[cfg(not(feature = "device"))]
fn backend(_args: &Args) -> sp_master::Backend {
    sp_master::Backend::Headless
}

fn print_layout(ctrl: &Controller) {
    let layout = ctrl.layout();
    println!("Layout:   {} speakers, {} output channels", layout.len(), ctrl.output_channels());
    for (speaker, gain) in layout.speakers().iter().zip(ctrl.gains().iter()) {
        println!("  {:<12} {:>7.1}°  gain {:.3}", speaker.name.as_str(), speaker.azimuth_deg, gain);
    }
    println!("Duration: {}", format_clock(ctrl.duration()));
    println!();
}

#[cfg(feature = "device")]
fn play_audio(ctrl: &mut Controller, args: &Args) -> Result<()> {
    use sp_master::PlaybackEvent;
    use std::io::Write;
    use std::thread;
    use std::time::{Duration, Instant};

    const TICK: Duration = Duration::from_millis(10);

    ctrl.seek_seconds(args.seek)?;
    ctrl.play()?;
    println!("Playing...");

    let started = Instant::now();
    let mut last = started;
    let limit = args.duration.filter(|d| d.is_finite() && *d >= 0.0).map(Duration::from_secs_f64);

    while ctrl.is_playing() {
        let now = Instant::now();
        if let Some(speed) = args.sweep {
            let step = speed * (now - last).as_secs_f32();
            ctrl.select_direction(ctrl.active_azimuth() + step)?;
        }
        last = now;

        if ctrl
            .poll_events()
            .iter()
            .any(|e| matches!(e, PlaybackEvent::EndOfStream { .. }))
        {
            break;
        }
        if limit.is_some_and(|limit| now - started >= limit) {
            ctrl.stop();
            break;
        }

        print!(
            "\r{} / {} | {:>6.1}° | vol {:.2}",
            format_clock(ctrl.elapsed()),
            format_clock(ctrl.duration()),
            ctrl.active_azimuth(),
            ctrl.volume()
        );
        let _ = std::io::stdout().flush();
        thread::sleep(TICK);
    }

    println!("\rDone.                                ");
    Ok(())
}

#[cfg(not(feature = "device"))]
fn play_audio(_ctrl: &mut Controller, _args: &Args) -> Result<()> {
    bail!("built without the `device` feature; use --wav to render offline")
}

fn render_to_wav(ctrl: &Controller, path: &Path, duration: Option<f64>) -> Result<()> {
    let Some(rate) = ctrl.sample_rate() else {
        bail!("no source loaded");
    };
    let max_seconds = duration.unwrap_or(f64::MAX / rate as f64);
    println!("Rendering to {} at {} Hz...", path.display(), rate);

    let wav = ctrl.render_to_wav(max_seconds)?;
    info!("rendered {} bytes", wav.len());
    fs::write(path, &wav).with_context(|| format!("failed to write {}", path.display()))?;

    println!("Done.");
    Ok(())
}
