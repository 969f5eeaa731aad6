use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Args, Parser, Subcommand};
use scrobble_dispatch::config::Config;
use scrobble_dispatch::scrobbler::lastfm;
use scrobble_dispatch::ui::{ConsoleNotifier, SystemTabOpener};
use scrobble_dispatch::{DispatchResult, ScrobbleManager, Scrobbler, Song};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(version, about = "Send now playing, scrobbles and loves to every configured scrobbler")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List scrobblers and whether they are signed in
    Status,
    /// Sign in to a scrobbler
    Auth {
        /// Scrobbler label, e.g. "Last.fm" or "ListenBrainz (Primary)"
        label: String,
        /// Print the authorization URL instead of opening a browser tab
        #[arg(long)]
        interactive: bool,
    },
    /// Update "now playing"
    NowPlaying(SongArgs),
    /// Scrobble a song
    Scrobble(SongArgs),
    /// Love a song
    Love(SongArgs),
    /// Unlove a song
    Unlove(SongArgs),
}

#[derive(Args)]
struct SongArgs {
    #[arg(long)]
    artist: String,
    #[arg(long)]
    title: String,
    #[arg(long)]
    album: Option<String>,
    /// Duration in seconds
    #[arg(long)]
    duration: Option<u64>,
    /// MusicBrainz recording id
    #[arg(long)]
    mbid: Option<String>,
    /// Unix time playback started
    #[arg(long)]
    timestamp: Option<i64>,
}

impl SongArgs {
    fn into_song(self) -> Result<Song> {
        let started_at = match self.timestamp {
            Some(ts) => Some(DateTime::from_timestamp(ts, 0).context("Invalid timestamp")?),
            None => None,
        };

        Ok(Song {
            title: self.title,
            artist: self.artist,
            album: self.album,
            duration: self.duration,
            recording_mbid: self.mbid,
            started_at,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let mut config = Config::load(&config_path)?;

    // Kept concrete so a freshly acquired session key can be saved
    let lastfm_scrobbler = config.lastfm_scrobbler()?.map(Arc::new);
    let mut scrobblers: Vec<Arc<dyn Scrobbler>> = Vec::new();
    if let Some(ref lastfm_scrobbler) = lastfm_scrobbler {
        scrobblers.push(lastfm_scrobbler.clone());
    }
    for lb in config.listenbrainz_scrobblers()? {
        scrobblers.push(Arc::new(lb));
    }

    let manager = ScrobbleManager::new(Arc::new(ConsoleNotifier), Arc::new(SystemTabOpener));
    manager.register_and_bind_all(scrobblers).await;

    match cli.command {
        Command::Status => {
            for scrobbler in manager.list_registered() {
                let state = if manager.is_bound(scrobbler.label()) {
                    "signed in"
                } else {
                    "not signed in"
                };
                println!("{}: {}", scrobbler.label(), state);
            }
        }
        Command::Auth { label, interactive } => {
            let scrobbler = manager
                .find_registered(&label)
                .with_context(|| format!("No enabled scrobbler named {:?}", label))?;

            manager
                .authenticate(scrobbler.clone(), interactive || config.interactive_auth)
                .await;
            if !manager.is_bound(&label) {
                anyhow::bail!("Sign in to {} failed", label);
            }

            print!("Press Enter once access is granted...");
            io::stdout().flush()?;
            io::stdin().lock().read_line(&mut String::new())?;

            scrobbler
                .fetch_session()
                .await
                .with_context(|| format!("{} did not confirm the session", label))?;

            if label == lastfm::LABEL {
                let session_key = lastfm_scrobbler.as_ref().and_then(|l| l.session_key());
                if let Some(session_key) = session_key {
                    if let Some(settings) = config.lastfm.as_mut() {
                        settings.session_key = session_key;
                    }
                    config.save(&config_path)?;
                }
            }
            println!("Signed in to {}", label);
        }
        Command::NowPlaying(args) => report(manager.send_now_playing(&args.into_song()?).await),
        Command::Scrobble(args) => report(manager.scrobble(&args.into_song()?).await),
        Command::Love(args) => report(manager.toggle_love(&args.into_song()?, true).await),
        Command::Unlove(args) => report(manager.toggle_love(&args.into_song()?, false).await),
    }

    Ok(())
}

fn report(results: Vec<DispatchResult>) {
    if results.is_empty() {
        println!("No scrobblers are signed in");
    }

    for result in results {
        match result.outcome {
            Ok(()) => println!("{}: ok", result.label),
            Err(err) if err.is_auth_error() => {
                println!(
                    "{}: signed out ({}), run `auth {:?}`",
                    result.label, err, result.label
                )
            }
            Err(err) => println!("{}: failed ({})", result.label, err),
        }
    }
}
