// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{crate_version, Args, Parser, Subcommand};
use crossbeam_channel::TryRecvError;
use duration_string::DurationString;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dubpad::audio::decode::decode_file;
use dubpad::audio::offline::WavRenderer;
use dubpad::audio::{list_devices, Output};
use dubpad::command::{parse_script, Cue};
use dubpad::config::Settings;
use dubpad::console::{self, ConsoleInput, DisplayTicker};
use dubpad::effects::EffectName;
use dubpad::persistence::{JsonFileStore, TriggerStore};
use dubpad::session::{Session, UiEvent};
use dubpad::transport::TickOutcome;
use dubpad::util::{
    duration_minutes_seconds, filename_display, format_time, seconds_to_duration,
};
use dubpad::waveform;

/// Extra time rendered after the last cue so echoes can ring out.
const RENDER_TAIL: f64 = 2.0;

/// Characters for an eight level envelope row.
const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A dub sample performance pad."
)]
struct Cli {
    /// The YAML configuration file. Without one, defaults and DUBPAD__
    /// environment overrides apply.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct PlayOptions {
    /// The audio file to load.
    path: PathBuf,
    /// Start offset in seconds.
    #[arg(long, default_value_t = 0.0)]
    offset: f64,
    /// Playback speed (0.25 to 4.0).
    #[arg(long)]
    speed: Option<f64>,
    /// Pitch shift in semitones.
    #[arg(long, allow_hyphen_values = true)]
    semitones: Option<f64>,
    /// Master volume (0 to 1).
    #[arg(long)]
    volume: Option<f32>,
    /// Dub effects to engage from the start. May be repeated.
    #[arg(long = "effect")]
    effects: Vec<EffectName>,
}

impl PlayOptions {
    /// Events that set the session up before playback starts.
    fn setup_events(&self) -> Vec<UiEvent> {
        let mut events = Vec::new();
        if let Some(speed) = self.speed {
            events.push(UiEvent::SetSpeed(speed));
        }
        if let Some(semitones) = self.semitones {
            events.push(UiEvent::SetPitchShiftSemitones(semitones));
        }
        if let Some(volume) = self.volume {
            events.push(UiEvent::SetMasterVolume(volume));
        }
        events.extend(self.effects.iter().map(|name| UiEvent::EffectEngage {
            name: *name,
            active: true,
        }));
        events
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Prints details and an envelope for an audio file.
    Info {
        /// The audio file to inspect.
        path: PathBuf,
        /// Envelope width in characters.
        #[arg(long, default_value_t = 64)]
        width: usize,
    },
    /// Plays a sample through the audio interface, reading commands from
    /// stdin. Type "help" for the list.
    Play {
        #[command(flatten)]
        options: PlayOptions,
    },
    /// Renders a performance to a WAV file.
    Render {
        #[command(flatten)]
        options: PlayOptions,
        /// The WAV file to write.
        output: PathBuf,
        /// A script of "<seconds> <command>" lines. Without one, the sample
        /// plays from the offset.
        #[arg(long)]
        script: Option<PathBuf>,
        /// How much to render (e.g. 30s). Defaults to the end of playback
        /// plus a short tail.
        #[arg(long)]
        length: Option<String>,
    },
    /// Lists stored trigger points, or the points of one sample.
    Triggers {
        /// The sample's id (its file name).
        sample: Option<String>,
    },
    /// Prints the default configuration.
    DefaultConfig {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::from_env()?,
    };

    match cli.command {
        Commands::Devices {} => {
            let devices = list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Info { path, width } => info_command(&settings, &path, width).await?,
        Commands::Play { options } => play(&settings, options).await?,
        Commands::Render {
            options,
            output,
            script,
            length,
        } => render(&settings, options, &output, script.as_deref(), length).await?,
        Commands::Triggers { sample } => triggers(&settings, sample.as_deref())?,
        Commands::DefaultConfig {} => print!("{}", Settings::default().to_yaml()?),
    }

    Ok(())
}

/// Decodes off the async runtime and installs the result in the session.
async fn load(session: &mut Session, path: &Path) -> Result<(), Box<dyn Error>> {
    let ticket = session.begin_load(filename_display(path));
    let decode_path = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || decode_file(&decode_path)).await?;
    session.finish_load(ticket, result)?;
    if let Some(warning) = session.warning() {
        warn!(warning, "Trigger storage problem");
    }
    Ok(())
}

fn new_session(settings: &Settings) -> Result<Session, Box<dyn Error>> {
    let store = JsonFileStore::new(&settings.storage.triggers());
    Ok(Session::new(settings, Box::new(store))?)
}

async fn info_command(settings: &Settings, path: &Path, width: usize) -> Result<(), Box<dyn Error>> {
    let decode_path = path.to_path_buf();
    let asset = tokio::task::spawn_blocking(move || decode_file(&decode_path)).await??;

    let duration = asset.duration();
    println!("{}", filename_display(path));
    println!(
        "  Duration: {} ({})",
        duration_minutes_seconds(seconds_to_duration(duration)),
        format_time(duration)
    );
    println!("  Channels: {}", asset.source_channels());
    println!("  Sample rate: {}", asset.sample_rate());
    let peak = asset.peak();
    if peak > 0.0 {
        println!("  Peak: {:.1} dBFS", 20.0 * peak.log10());
    } else {
        println!("  Peak: silent");
    }

    let columns = waveform::envelope(asset.channel(0), width);
    let row: String = waveform::envelope_bars(&columns, LEVELS.len() as f32)
        .iter()
        .map(|bar| LEVELS[(bar.height.round() as usize).clamp(1, LEVELS.len()) - 1])
        .collect();
    println!("  {}", row);

    let store = JsonFileStore::new(&settings.storage.triggers());
    if let Some(record) = store.load(filename_display(path))? {
        print_points(&record.trigger_points);
    }
    Ok(())
}

fn print_points(points: &[Option<f64>]) {
    for (slot, point) in points.iter().enumerate() {
        match point {
            Some(time) => println!("  Pad {}: {}", slot + 1, format_time(*time)),
            None => println!("  Pad {}: --", slot + 1),
        }
    }
}

async fn play(settings: &Settings, options: PlayOptions) -> Result<(), Box<dyn Error>> {
    let mut session = new_session(settings)?;
    session.ensure_context();
    load(&mut session, &options.path).await?;

    let output = Output::open(&settings.audio, session.graph())?;
    info!(%output, sample = ?session.sample_id(), "Playing");

    for event in options.setup_events() {
        session.handle_event(event);
    }
    session.handle_event(UiEvent::StartAt(options.offset));

    let (tx, rx) = crossbeam_channel::unbounded();
    let _reader = console::spawn_reader(tx);
    let mut ticker = DisplayTicker::new(session.timing().tick_interval);
    let mut input_open = true;

    'perform: loop {
        while input_open {
            match rx.try_recv() {
                Ok(ConsoleInput::Events(events)) => {
                    for event in events {
                        session.handle_event(event);
                    }
                    if let Some(warning) = session.warning() {
                        println!("Warning: {}", warning);
                    }
                }
                Ok(ConsoleInput::Status) => {
                    println!("{}", serde_json::to_string_pretty(&session.state())?)
                }
                Ok(ConsoleInput::Help) => println!("{}", console::help()),
                Ok(ConsoleInput::Quit) => break 'perform,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => input_open = false,
            }
        }

        match session.tick() {
            TickOutcome::Ended => info!("Reached the end of the sample"),
            TickOutcome::SelectionEnded => info!("Reached the end of the selection"),
            _ => {}
        }
        if !input_open && !session.is_playing() {
            break;
        }
        ticker.wait();
    }

    session.close();
    drop(output);
    Ok(())
}

async fn render(
    settings: &Settings,
    options: PlayOptions,
    output: &Path,
    script: Option<&Path>,
    length: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let cues = match script {
        Some(path) => parse_script(&fs::read_to_string(path)?)?,
        None => vec![Cue {
            at: 0.0,
            events: vec![UiEvent::StartAt(options.offset)],
        }],
    };

    let mut session = new_session(settings)?;
    session.ensure_context();
    load(&mut session, &options.path).await?;
    for event in options.setup_events() {
        session.handle_event(event);
    }

    let sample_rate = session.sample_rate() as f64;
    let length = match length {
        Some(length) => DurationString::from_string(length)
            .map(Duration::from)
            .map_err(|e| e.to_string())?
            .as_secs_f64(),
        None => {
            let last = cues.last().map(|cue| cue.at).unwrap_or(0.0);
            last + session.transport().effective_duration() + RENDER_TAIL
        }
    };
    let total = (length * sample_rate).round() as u64;
    let tick_frames = (session.timing().tick_interval.as_secs_f64() * sample_rate)
        .round()
        .max(1.0) as u64;

    let mut renderer = WavRenderer::create(output, session.sample_rate(), session.graph())?;
    let mut cues = cues.into_iter().peekable();
    while renderer.frames_written() < total {
        let now = renderer.frames_written() as f64 / sample_rate;
        while let Some(cue) = cues.next_if(|cue| cue.at <= now) {
            for event in cue.events {
                session.handle_event(event);
            }
        }
        renderer.render(tick_frames.min(total - renderer.frames_written()) as usize)?;
        session.tick();
    }
    renderer.finalize()?;

    info!(
        output = ?output,
        seconds = length,
        "Rendered performance"
    );
    if let Some(warning) = session.warning() {
        println!("Warning: {}", warning);
    }
    session.close();
    Ok(())
}

fn triggers(settings: &Settings, sample: Option<&str>) -> Result<(), Box<dyn Error>> {
    let store = JsonFileStore::new(&settings.storage.triggers());
    match sample {
        Some(sample) => match store.load(sample)? {
            Some(record) => {
                println!("{} (next pad {}):", sample, record.current_pad_index + 1);
                print_points(&record.trigger_points);
            }
            None => println!("No trigger points stored for {}.", sample),
        },
        None => {
            let ids = store.sample_ids()?;
            if ids.is_empty() {
                println!("No trigger points stored in {}.", store.path().display());
            }
            for id in ids {
                println!("- {}", id);
            }
        }
    }
    Ok(())
}
