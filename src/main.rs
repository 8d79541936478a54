//! Narrator - spoken feedback from the command line
//!
//! Drives the narration coordinator against the configured backends.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use narrator::audio::{PlaybackMode, SoundEffects};
use narrator::config::{config_path, Config};
use narrator::narrator::{NarrationEvent, Outcome};
use narrator::tts::ssml::render_ssml;
use narrator::tts::EspeakCatalog;
use narrator::voice::{FallbackRules, Persona, VoiceCatalog, VoiceResolver};
use narrator::Narrator;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Speak a line and wait until it finished
    Say {
        text: String,

        /// Persona to speak as (guide or buddy)
        #[arg(short, long, default_value = "guide")]
        persona: Persona,

        #[arg(long, default_value_t = 0)]
        priority: i32,

        /// Cooldown tag; repeated tags within the window stay silent
        #[arg(long)]
        tag: Option<String>,

        #[arg(long, default_value_t = 2000)]
        window_ms: u64,
    },
    /// Print the markup sent to the speech service
    Ssml {
        text: String,

        #[arg(short, long, default_value = "guide")]
        persona: Persona,
    },
    /// List on-device voices and the fallback voice of each persona
    Voices,
    /// List sound effect pools, or play one
    Effect {
        pool: Option<String>,

        /// Seconds to keep the process alive while the effect plays
        #[arg(long, default_value_t = 2)]
        linger: u64,
    },
    /// Show the configuration, or write the defaults
    Config {
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    // Setup logging: RUST_LOG wins, then --verbose, then the config level
    let level = if args.verbose {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    config.validate()?;

    match args.command {
        Command::Say {
            text,
            persona,
            priority,
            tag,
            window_ms,
        } => say(&config, &text, persona, priority, tag.as_deref(), window_ms).await,
        Command::Ssml { text, persona } => {
            let profile = VoiceResolver::from_config(&config).profile(persona);
            println!("{}", render_ssml(&text, &profile, &config.speech.language));
            Ok(())
        }
        Command::Voices => voices(&config).await,
        Command::Effect { pool, linger } => {
            let effects = SoundEffects::new(Path::new(&config.effects_dir), PlaybackMode::Random);
            match pool {
                Some(pool) => {
                    effects.play(&pool)?;
                    tokio::time::sleep(Duration::from_secs(linger)).await;
                }
                None => {
                    for name in effects.pool_names() {
                        println!("{}", name);
                    }
                }
            }
            Ok(())
        }
        Command::Config { init } => {
            let path = config_path();
            if init {
                Config::default().save_to(&path)?;
                println!("✅ Wrote default configuration to {}", path.display());
            } else {
                println!("# {}", path.display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}

async fn say(
    config: &Config,
    text: &str,
    persona: Persona,
    priority: i32,
    tag: Option<&str>,
    window_ms: u64,
) -> Result<()> {
    info!("🎙️ Narrator v{} starting...", env!("CARGO_PKG_VERSION"));
    let narrator = Narrator::from_config(config)?;

    if let Err(e) = narrator.resume_output().await {
        warn!("⚠️ Audio output not ready yet: {}", e);
    }

    // Subscribe first so a fast failure is not missed
    let mut events = narrator.subscribe();
    let queued = narrator.request_narration(
        text,
        persona,
        priority,
        tag,
        Duration::from_millis(window_ms),
    );

    match queued {
        Some(_) => loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(NarrationEvent::Finished { .. }) | Err(_) => break,
                    Ok(_) => {}
                },
                _ = tokio::signal::ctrl_c() => {
                    narrator.stop();
                    break;
                }
            }
        },
        None => println!("🤫 Nothing to say (cooling down, muted or empty)"),
    }

    for entry in narrator.history() {
        let mark = match entry.outcome {
            Outcome::Played => "🔊",
            Outcome::Failed => "❌",
            Outcome::Interrupted | Outcome::Discarded => "🛑",
        };
        println!("{} [{}] {}: {}", mark, entry.at.format("%H:%M:%S"), entry.persona, entry.text);
    }

    narrator.shutdown().await;
    Ok(())
}

async fn voices(config: &Config) -> Result<()> {
    let catalog = Arc::new(EspeakCatalog::new(&config.fallback.espeak_bin));
    let voices = catalog
        .voices()
        .await
        .with_context(|| format!("listing voices with {}", config.fallback.espeak_bin))?;

    println!("{} voices from {}", voices.len(), catalog.name());
    for voice in &voices {
        println!("  {:<24} {:<10} {}", voice.id, voice.locale, voice.name);
    }

    let mut resolver = VoiceResolver::from_config(config)
        .with_catalog(catalog, FallbackRules::from(&config.fallback));
    for persona in Persona::all() {
        let (profile, failure) = resolver.resolve(persona).await;
        if let Some(e) = failure {
            warn!("⚠️ Fallback voice for {} unavailable: {}", persona, e);
        }
        println!(
            "{}: cloud {} / device {}",
            persona,
            profile.synthesis_voice_id,
            profile.device_voice.as_deref().unwrap_or("none")
        );
    }
    Ok(())
}
