//! Interactive first-run setup wizard (`stride setup`)

use std::path::{Path, PathBuf};

use dialoguer::{Confirm, Input, Select};

use crate::config::file::{
    LocationFileConfig, MapsFileConfig, ServerFileConfig, StrideConfigFile, VoiceFileConfig,
    config_file_path, load_config_file,
};
use crate::config::{DEFAULT_GPSD_ADDR, MapsConfig};

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("Stride Setup\n");

    let mut existing = load_config_file();
    let config_path =
        config_file_path().unwrap_or_else(|| PathBuf::from("~/.config/stride/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. Maps
    let defaults = MapsConfig::default();
    let maps_key = ask_key("Google Maps API key", "GOOGLE_MAPS_API_KEY", existing.maps.api_key.take())?;
    let language: String = Input::new()
        .with_prompt("Instruction language")
        .default(
            existing
                .maps
                .language_code
                .clone()
                .unwrap_or(defaults.language_code),
        )
        .interact_text()?;

    let maps = MapsFileConfig {
        api_key: maps_key,
        language_code: Some(language),
        ..existing.maps
    };

    // 2. Voice
    let enable_voice = Confirm::new()
        .with_prompt("Enable voice (microphone and spoken directions)?")
        .default(existing.voice.enabled.unwrap_or(true))
        .interact()?;

    let mut api_keys = existing.api_keys;
    let voice = if enable_voice {
        let stt = ["whisper", "deepgram"];
        let stt_idx = Select::new()
            .with_prompt("Speech recognition provider")
            .items(&stt)
            .default(position(&stt, existing.voice.stt_provider.as_deref()))
            .interact()?;

        let tts = ["openai", "elevenlabs"];
        let tts_idx = Select::new()
            .with_prompt("Speech synthesis provider")
            .items(&tts)
            .default(position(&tts, existing.voice.tts_provider.as_deref()))
            .interact()?;

        if stt_idx == 0 || tts_idx == 0 {
            api_keys.openai = ask_key("OpenAI API key", "OPENAI_API_KEY", api_keys.openai)?;
        }
        if stt_idx == 1 {
            api_keys.deepgram = ask_key("Deepgram API key", "DEEPGRAM_API_KEY", api_keys.deepgram)?;
        }
        if tts_idx == 1 {
            api_keys.elevenlabs =
                ask_key("ElevenLabs API key", "ELEVENLABS_API_KEY", api_keys.elevenlabs)?;
        }

        let tts_voice: String = Input::new()
            .with_prompt(if tts_idx == 0 { "Voice" } else { "Voice ID" })
            .default(
                existing
                    .voice
                    .tts_voice
                    .clone()
                    .unwrap_or_else(|| "alloy".to_string()),
            )
            .interact_text()?;

        VoiceFileConfig {
            enabled: Some(true),
            stt_provider: Some(stt[stt_idx].to_string()),
            tts_provider: Some(tts[tts_idx].to_string()),
            tts_voice: Some(tts_voice),
            ..existing.voice
        }
    } else {
        VoiceFileConfig {
            enabled: Some(false),
            ..existing.voice
        }
    };

    // 3. Location
    let sources = ["gpsd", "replay"];
    let source_idx = Select::new()
        .with_prompt("Location source")
        .items(&sources)
        .default(position(&sources, existing.location.source.as_deref()))
        .interact()?;

    let location = if source_idx == 0 {
        let addr: String = Input::new()
            .with_prompt("gpsd address")
            .default(
                existing
                    .location
                    .gpsd_addr
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GPSD_ADDR.to_string()),
            )
            .interact_text()?;
        LocationFileConfig {
            source: Some("gpsd".to_string()),
            gpsd_addr: Some(addr),
            ..existing.location
        }
    } else {
        let path: String = Input::new()
            .with_prompt("Replay file (one \"lat,lng\" per line)")
            .with_initial_text(existing.location.replay_path.clone().unwrap_or_default())
            .interact_text()?;
        LocationFileConfig {
            source: Some("replay".to_string()),
            replay_path: Some(path),
            ..existing.location
        }
    };

    // 4. Status server
    let serve = Confirm::new()
        .with_prompt("Serve navigation status over HTTP?")
        .default(existing.server.status_port.is_some())
        .interact()?;
    let server = if serve {
        let port: u16 = Input::new()
            .with_prompt("Status port")
            .default(existing.server.status_port.unwrap_or(7777))
            .interact_text()?;
        ServerFileConfig {
            status_port: Some(port),
        }
    } else {
        ServerFileConfig::default()
    };

    let config_file = StrideConfigFile {
        data_dir: existing.data_dir,
        maps,
        voice,
        api_keys,
        location,
        announce: existing.announce,
        permissions: existing.permissions,
        server,
    };

    write_config(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `stride --destination \"<place>\" -v` to start.");

    Ok(())
}

/// Prompt for a secret, keeping the current value on blank input
fn ask_key(label: &str, env_hint: &str, current: Option<String>) -> anyhow::Result<Option<String>> {
    let prompt = current.as_deref().map_or_else(
        || format!("{label} ({env_hint})"),
        |k| format!("{label} (current: {}, leave blank to keep)", mask(k)),
    );

    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    let input = input.trim();
    Ok(if input.is_empty() {
        current
    } else {
        Some(input.to_string())
    })
}

/// Show the first and last four characters of a key
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}

fn position(items: &[&str], current: Option<&str>) -> usize {
    current
        .and_then(|c| items.iter().position(|i| i.eq_ignore_ascii_case(c)))
        .unwrap_or(0)
}

/// Serialize and write the config file
fn write_config(path: &Path, config: &StrideConfigFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, toml::to_string_pretty(config)?)?;
    Ok(())
}
