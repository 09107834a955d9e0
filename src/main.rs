mod audio_files;
mod audio_tags;
mod config;
mod cover_art;
mod dedup;
mod file_hash;
mod hash_cache;
mod input_list;
mod logging;
mod name_matcher;
mod normalize;
mod ports;
mod retry;
mod services;
mod spotify;
#[cfg(test)]
mod test_utils;
mod unique_path;
mod yt_dlp;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    audio_tags::AudiotagsReader,
    config::Config,
    cover_art::HttpImageFetcher,
    dedup::LibrarySession,
    input_list::{ListMode, read_list_file, resolve_input_file},
    name_matcher::NameMatcher,
    services::curate::Curator,
    services::retrieve::{RetrievalSettings, Retriever},
    spotify::SpotifyCatalog,
    yt_dlp::YtDlpFetcher,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "SONG_RETRIEVER_CONFIG")]
    config: Option<PathBuf>,

    /// Console log level (default: info, or debug with DEBUG=1)
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: String,

    /// Path to log file
    #[arg(long, env = "SONG_RETRIEVER_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download the songs, albums, playlists or artists of an input list
    Retrieve {
        /// Library directory to store downloads in
        #[arg(short, long, env = "DESTINATION_FOLDER")]
        destination: Option<String>,

        /// Directory holding songs.txt, album.txt, playlist.txt or artist.txt
        #[arg(long)]
        input_dir: Option<String>,

        /// Process this list mode instead of resolving the input file
        #[arg(short, long, value_enum, requires = "input")]
        mode: Option<ListMode>,

        /// Input list file, used together with --mode
        #[arg(short, long, requires = "mode")]
        input: Option<PathBuf>,

        /// Spotify client id
        #[arg(long, env = "CLIENT_ID")]
        client_id: Option<String>,

        /// Spotify client secret
        #[arg(long, env = "CLIENT_SECRET")]
        client_secret: Option<String>,
    },
    /// Remove songs by target artists and tidy up the library
    Curate {
        /// Target artist, may be repeated; added to the configured artists
        #[arg(short, long = "artist")]
        artists: Vec<String>,

        /// Report what would change without touching any file
        #[arg(long)]
        dry_run: bool,

        /// Library directory to curate
        #[arg(short, long, env = "DESTINATION_FOLDER")]
        destination: Option<String>,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let console_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| logging::default_console_level().to_string());
    logging::init_tracing(&console_level, args.log_file.as_deref(), &args.log_file_level)?;

    tracing::debug!("Song retriever starting");
    let mut config = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .wrap_err("Failed to load song-retriever config")?;

    match args.command {
        Commands::Retrieve {
            destination,
            input_dir,
            mode,
            input,
            client_id,
            client_secret,
        } => {
            if let Some(destination) = destination {
                config.set_destination(&destination);
            }
            if let Some(input_dir) = input_dir {
                config.set_input_directory(&input_dir);
            }
            config.set_spotify_credentials(
                client_id.or_else(|| env_value("SPOTIFY_CLIENT_ID")),
                client_secret.or_else(|| env_value("SPOTIFY_CLIENT_SECRET")),
            );
            let list = match (mode, input) {
                (Some(mode), Some(input)) => Some((mode, input)),
                _ => resolve_input_file(&config.input_directory_path()),
            };
            retrieve(&config, list).await?;
        }
        Commands::Curate {
            artists,
            dry_run,
            destination,
        } => {
            if let Some(destination) = destination {
                config.set_destination(&destination);
            }
            curate(&config, artists, dry_run)?;
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                tracing::info!("Default config available at {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

async fn retrieve(config: &Config, list: Option<(ListMode, PathBuf)>) -> Result<()> {
    // Configuration problems abort before anything touches the library
    let (client_id, client_secret) = config.spotify_credentials()?;
    let download = config.download().clone();
    let policies = config.retry_policies();
    let audio = YtDlpFetcher::new(
        download.clone(),
        policies.download.delay(),
        config.instrumental_keywords(),
    )?;

    let Some((mode, path)) = list else {
        tracing::error!(
            "No input file found in {}. Expected one of songs.txt, album.txt, playlist.txt or artist.txt",
            config.input_directory_path().display()
        );
        return Ok(());
    };
    let entries = read_list_file(&path, mode)?;
    if entries.is_empty() {
        tracing::error!("No entries found in {}", path.display());
        return Ok(());
    }
    tracing::info!("Using {} ({} entries)", path.display(), entries.len());

    let destination = config.destination_path();
    let mut session = LibrarySession::open(&destination)
        .wrap_err_with(|| format!("Failed to open library at {}", destination.display()))?;

    let catalog = SpotifyCatalog::new(
        client_id,
        client_secret,
        download.request_timeout,
        config.market().map(str::to_string),
    );
    let settings = RetrievalSettings {
        instrumental_keywords: config
            .instrumental_keywords()
            .iter()
            .map(|keyword| keyword.to_lowercase())
            .collect(),
        placeholder_image: config.placeholder_image_path(),
        retry: policies,
    };

    let mut retriever = Retriever::new(
        catalog,
        audio,
        HttpImageFetcher::new(download.request_timeout),
        &mut session,
        settings,
    );
    let summary = retriever.run(mode, &entries).await;
    drop(retriever);

    if let Err(e) = session.finish() {
        tracing::warn!("Failed to write hash cache: {:?}", e);
    }
    println!("{}", summary);
    Ok(())
}

fn curate(config: &Config, extra_artists: Vec<String>, dry_run: bool) -> Result<()> {
    let mut artists = config.curate_artists().to_vec();
    artists.extend(extra_artists);
    let base_dir = config.destination_path();

    let curator = Curator::new(AudiotagsReader, NameMatcher::new(artists), dry_run);
    let summary = curator.run(&base_dir)?;
    println!("\nSummary\n{}", summary);
    Ok(())
}
