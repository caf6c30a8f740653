use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use stride_guide::api::ApiServerBuilder;
use stride_guide::config::LocationSourceKind;
use stride_guide::location::{ChannelSource, FixSender, GpsdSource, ReplaySource};
use stride_guide::presentation::{self, restore_step, save_step};
use stride_guide::routes::RequestThrottle;
use stride_guide::voice::{
    AudioCapture, AudioPlayback, CloudSpeaker, Clip, ConsoleSpeaker, MicrophoneRecognizer,
    SpeechToText, TextToSpeech, VoiceCapture, decode_mp3, rms,
};
use stride_guide::{
    AnnouncementPolicy, CancelToken, Config, ConfigPermissions, Directions, DirectionsClient,
    Geocoder, GeocoderClient, Location, LocationSource, Navigator, NavigatorHandle,
    PermissionGate, SpeechOutput,
};

/// Stride - speak a destination, hear the next turn
#[derive(Parser)]
#[command(name = "stride", version, about)]
struct Cli {
    /// Destination to navigate to (skips waiting for voice input)
    #[arg(short, long)]
    destination: Option<String>,

    /// Fixed current location as "lat,lng" instead of a live source
    #[arg(long, conflicts_with_all = ["replay", "gpsd"])]
    location: Option<Location>,

    /// Replay a track file (one "lat,lng" per line)
    #[arg(long, conflicts_with = "gpsd")]
    replay: Option<PathBuf>,

    /// Read fixes from gpsd at this address
    #[arg(long)]
    gpsd: Option<String>,

    /// Print announcements instead of speaking, and disable the microphone
    #[arg(long, env = "STRIDE_NO_AUDIO")]
    no_audio: bool,

    /// Serve navigation status over HTTP on this port
    #[arg(long)]
    status_port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve an address to coordinates
    Geocode {
        /// Free-text address or place name
        address: String,
    },
    /// Show the next step between two points
    Directions {
        /// Origin as "lat,lng"
        #[arg(long)]
        from: Location,
        /// Destination as "lat,lng" or free text
        to: String,
    },
    /// Listen for one utterance and print the transcript
    Listen,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Yüz metre sonra sola dönün.")]
        text: String,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,stride_guide=info,stride=info",
        1 => "info,stride_guide=debug,stride=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Geocode { address } => geocode(&address).await,
            Command::Directions { from, to } => directions(from, &to).await,
            Command::Listen => listen().await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
            Command::Setup => stride_guide::setup::run_setup(),
        };
    }

    let mut config = Config::load()?;
    if let Some(path) = cli.replay {
        config.location.source = LocationSourceKind::Replay;
        config.location.replay_path = Some(path);
    }
    if let Some(addr) = cli.gpsd {
        config.location.source = LocationSourceKind::Gpsd;
        config.location.gpsd_addr = addr;
    }
    if cli.status_port.is_some() {
        config.server.status_port = cli.status_port;
    }
    let audio = config.voice.enabled && !cli.no_audio;
    tracing::debug!(?config, audio, "loaded configuration");

    let directions = Arc::new(DirectionsClient::new(&config.maps)?);
    let geocoder = Arc::new(GeocoderClient::new(&config.maps)?);
    let permissions: Arc<dyn PermissionGate> = Arc::new(ConfigPermissions::new(config.permissions));
    let speech = speech_output(&config, audio);

    let ui_state = config.ui_state_path();
    let restored = restore_step(&ui_state).unwrap_or_else(|e| {
        tracing::warn!(error = %e, path = %ui_state.display(), "ignoring saved ui state");
        None
    });

    let navigator = Navigator::builder(directions, geocoder, speech)
        .permissions(Arc::clone(&permissions))
        .policy(AnnouncementPolicy::new(&config.announce))
        .throttle(RequestThrottle::per_minute(config.maps.max_requests_per_minute))
        .restored_step(restored)
        .build();
    let handle = navigator.handle();
    let cancel = CancelToken::new();

    let (source, _fixed) = location_source(&config, cli.location).await?;

    let capture = if audio {
        voice_capture(&config, Arc::clone(&permissions))
    } else {
        None
    };

    if let Some(destination) = cli.destination {
        handle.submit_destination(destination).await?;
    }

    if let Some(port) = config.server.status_port {
        let server = ApiServerBuilder::new(handle.clone(), port).build().spawn();
        tokio::spawn(async move {
            match server.await {
                Ok(Err(e)) => tracing::error!(error = %e, "status server stopped"),
                Err(e) => tracing::error!(error = %e, "status server task failed"),
                Ok(Ok(())) => {}
            }
        });
    }

    tokio::spawn(presentation::present(
        handle.snapshots(),
        handle.notices(),
        cancel.clone(),
        std::io::stdout(),
    ));
    tokio::spawn(read_console(handle.clone(), capture.clone()));

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    if capture.is_some() {
        println!("Press Enter to speak a destination, or type one. Ctrl-C quits.");
    } else {
        println!("Type a destination and press Enter. Ctrl-C quits.");
    }

    let voice = capture.as_ref().map(VoiceCapture::subscribe);
    navigator
        .run(source.as_ref(), config.location.request, voice, &cancel)
        .await?;

    if let Some(capture) = &capture {
        capture.stop_listening();
    }
    if let Err(e) = save_step(&ui_state, handle.snapshot().step.as_ref()) {
        tracing::warn!(error = %e, "failed to save ui state");
    }

    Ok(())
}

/// Cloud speech when audio is on and configured, otherwise the console
fn speech_output(config: &Config, audio: bool) -> Arc<dyn SpeechOutput> {
    if !audio {
        return Arc::new(ConsoleSpeaker);
    }

    match TextToSpeech::from_config(&config.voice, &config.api_keys) {
        Ok(tts) => Arc::new(CloudSpeaker::new(tts)),
        Err(e) => {
            tracing::warn!(error = %e, "speech synthesis unavailable, printing announcements");
            Arc::new(ConsoleSpeaker)
        }
    }
}

fn voice_capture(config: &Config, permissions: Arc<dyn PermissionGate>) -> Option<VoiceCapture> {
    match SpeechToText::from_config(&config.voice, &config.api_keys, config.recognition_language()) {
        Ok(stt) => {
            let recognizer = MicrophoneRecognizer::new(stt, config.voice.listen_timeout);
            Some(VoiceCapture::new(Arc::new(recognizer), permissions))
        }
        Err(e) => {
            tracing::warn!(error = %e, "speech recognition unavailable, type destinations instead");
            None
        }
    }
}

/// The configured source, or a single fixed fix when `fixed` is given
///
/// The returned sender keeps a fixed source open.
async fn location_source(
    config: &Config,
    fixed: Option<Location>,
) -> anyhow::Result<(Box<dyn LocationSource>, Option<FixSender>)> {
    if let Some(location) = fixed {
        let (source, sender) = ChannelSource::new();
        sender.send(location).await?;
        return Ok((Box::new(source), Some(sender)));
    }

    let source: Box<dyn LocationSource> = match config.location.source {
        LocationSourceKind::Gpsd => Box::new(GpsdSource::new(config.location.gpsd_addr.clone())),
        LocationSourceKind::Replay => {
            let path = config.location.replay_path.clone().ok_or_else(|| {
                anyhow::anyhow!("replay source needs a track file (--replay or location.replay_path)")
            })?;
            Box::new(ReplaySource::from_file(path)?)
        }
    };
    Ok((source, None))
}

/// Enter toggles listening; any other line is submitted as a destination
async fn read_console(handle: NavigatorHandle, capture: Option<VoiceCapture>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if !line.is_empty() {
            if handle.submit_destination(line).await.is_err() {
                break;
            }
            continue;
        }

        match &capture {
            Some(capture) => {
                if let Err(e) = capture.toggle() {
                    tracing::warn!(error = %e, "voice toggle refused");
                }
            }
            None => println!("Voice input is off; type a destination."),
        }
    }
}

async fn geocode(address: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let geocoder = GeocoderClient::new(&config.maps)?;

    match geocoder.geocode(address).await? {
        Some(location) => println!("{location}"),
        None => println!("No result (the service returned an error status)"),
    }
    Ok(())
}

async fn directions(from: Location, to: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = DirectionsClient::new(&config.maps)?;

    let destination = match to.parse::<Location>() {
        Ok(location) => location,
        Err(_) => GeocoderClient::new(&config.maps)?
            .geocode(to)
            .await?
            .ok_or_else(|| anyhow::anyhow!("could not resolve {to:?}"))?,
    };

    match client.directions(from, destination).await? {
        Some(step) => {
            println!("{}", step.spoken_text().unwrap_or_default());
            println!("{}", serde_json::to_string_pretty(&step)?);
        }
        None => println!("No step"),
    }
    Ok(())
}

/// Run one listening session and print what was heard
async fn listen() -> anyhow::Result<()> {
    let config = Config::load()?;
    let stt = SpeechToText::from_config(&config.voice, &config.api_keys, config.recognition_language())?;
    let recognizer = MicrophoneRecognizer::new(stt, config.voice.listen_timeout);
    let capture = VoiceCapture::new(
        Arc::new(recognizer),
        Arc::new(ConfigPermissions::new(config.permissions)),
    );

    let mut state = capture.subscribe();
    capture.start_listening()?;
    println!("Listening... speak now.");

    let state = state.wait_for(|s| !s.is_listening).await?.clone();
    match state.error {
        Some(error) => println!("Recognition failed: {error}"),
        None => println!("Heard: {}", state.spoken_text),
    }
    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let levels = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        println!("Sample rate: {} Hz", stride_guide::voice::SAMPLE_RATE);
        println!("---");

        for i in 0..duration {
            std::thread::sleep(Duration::from_secs(1));

            let samples = capture.take_buffer();
            let energy = rms(&samples);
            let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let meter_len = (energy * 100.0).min(50.0) as usize;
            let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

            println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
        }

        capture.stop();
        Ok(())
    });
    levels.await??;

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24_000_u32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3
        })
        .collect();

    let clip = Clip {
        samples,
        sample_rate,
    };
    play(clip).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Synthesize `text` with the configured provider and play it
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::from_config(&config.voice, &config.api_keys)?;

    println!("Synthesizing speech...");
    let mp3 = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3.len());

    let clip = decode_mp3(&mp3)?;
    println!("Playing {:.1}s at {} Hz...", clip.duration().as_secs_f32(), clip.sample_rate);
    play(clip).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");
    Ok(())
}

async fn play(clip: Clip) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || {
        let stop = std::sync::atomic::AtomicBool::new(false);
        AudioPlayback::new()?.play(clip, &stop)
    })
    .await??;
    Ok(())
}
