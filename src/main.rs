mod config;
mod logging;
mod ports;
mod services;
mod spotify_rs;
#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context, eyre::eyre};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    logging::init_tracing,
    ports::auth::TokenProvider,
    services::{
        library::{LibraryService, Ownership},
        merge::{MergeMode, MergeOrchestrator, MergeRequest, identity::TrackIdentitySet},
        spotify::{
            client::SpotifyHttpAdapter,
            token::{RefreshingToken, StaticToken},
        },
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "SPHUFFLE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Tracing filter, e.g. "info" or "sphuffle=debug" (overrides the config file)
    #[arg(long, env = "SPHUFFLE_LOG", global = true)]
    log_level: Option<String>,

    /// OTLP collector endpoint for exporting spans
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    /// Spotify access token, used as-is
    #[arg(long, env = "SPOTIFY_ACCESS_TOKEN", global = true, hide_env_values = true)]
    access_token: Option<String>,

    /// Spotify refresh token, exchanged for access tokens as needed
    #[arg(long, env = "SPOTIFY_REFRESH_TOKEN", global = true, hide_env_values = true)]
    refresh_token: Option<String>,

    /// Spotify app client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// Spotify app client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", global = true, hide_env_values = true)]
    client_secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List your playlists
    Playlists,
    /// Merge source playlists into a new or existing playlist
    Merge {
        /// Ids of the playlists to merge, in the order their tracks should appear
        #[arg(required = true, num_args = 1..)]
        sources: Vec<String>,

        /// Existing playlist to update instead of creating a new one
        #[arg(short, long)]
        target: Option<String>,

        /// Remove tracks from the target that no source contains (updates only)
        #[arg(short, long)]
        sync: bool,

        /// Print the changes without applying them
        #[arg(long)]
        dry_run: bool,
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

impl Args {
    /// Command line credentials take precedence over the config file.
    fn apply_overrides(&self, config: &mut Config) {
        let spotify = &mut config.spotify;
        for (value, slot) in [
            (&self.access_token, &mut spotify.access_token),
            (&self.refresh_token, &mut spotify.refresh_token),
            (&self.client_id, &mut spotify.client_id),
            (&self.client_secret, &mut spotify.client_secret),
        ] {
            if value.is_some() {
                *slot = value.clone();
            }
        }
        if let Some(level) = &self.log_level {
            config.tracing.level = level.clone();
        }
        if self.otlp_endpoint.is_some() {
            config.tracing.otlp_endpoint = self.otlp_endpoint.clone();
        }
    }
}

fn token_provider(config: &Config) -> Result<Arc<dyn TokenProvider>> {
    let spotify = &config.spotify;
    match (
        &spotify.refresh_token,
        &spotify.client_id,
        &spotify.client_secret,
        &spotify.access_token,
    ) {
        (Some(refresh_token), Some(client_id), Some(client_secret), _) => {
            let mut tokens = RefreshingToken::new(
                client_id.clone(),
                client_secret.clone(),
                refresh_token.clone(),
            );
            if let Some(token_url) = &spotify.token_url {
                tokens = tokens.with_token_url(token_url.clone());
            }
            Ok(Arc::new(tokens))
        }
        (_, _, _, Some(access_token)) => Ok(Arc::new(StaticToken::new(access_token.clone()))),
        _ => Err(eyre!(
            "No Spotify credentials configured. Set an access token, or a refresh token \
             together with the client id and secret."
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    if let Commands::Config(command) = &args.command {
        return match command {
            ConfigCommands::CreateDefault => {
                if Config::create_default(&config_path)? {
                    println!("Created config file at {}", config_path.display());
                } else {
                    println!("Config file already exists at {}", config_path.display());
                }
                Ok(())
            }
            ConfigCommands::Path => {
                println!("{}", config_path.display());
                Ok(())
            }
        };
    }

    let config_exists = config_path.exists();
    let mut config = Config::load(Some(&config_path))?;
    args.apply_overrides(&mut config);

    let tracer_provider = init_tracing(
        "sphuffle",
        config.tracing.otlp_endpoint.as_deref(),
        &config.tracing.level,
    )?;
    if config_exists {
        tracing::debug!("Loaded configuration from {}", config_path.display());
    } else {
        tracing::debug!("No config file at {}, using defaults", config_path.display());
    }

    let result = run(args.command, &config).await;

    if let Some(provider) = tracer_provider
        && let Err(e) = provider.shutdown()
    {
        eprintln!("Failed to flush traces: {}", e);
    }

    result
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    let tokens = token_provider(config)?;
    let client = SpotifyHttpAdapter::new(tokens, config.client_options()?);
    let library = LibraryService::new(&client);

    let user = library
        .current_user()
        .await
        .wrap_err("Failed to fetch the current Spotify user")?;
    tracing::info!("Signed in as {}", user.display_name.as_deref().unwrap_or(&user.id));

    let playlists = library
        .list_playlists(&user.id)
        .await
        .wrap_err("Failed to list playlists")?;

    match command {
        Commands::Playlists => {
            for entry in &playlists {
                let ownership = match entry.ownership {
                    Ownership::Owned => "owned",
                    Ownership::Followed => "followed",
                };
                println!(
                    "{}\t{:>5} tracks\t{:<8}\t{}",
                    entry.playlist.id, entry.playlist.track_count, ownership, entry.playlist.name
                );
            }
            Ok(())
        }
        Commands::Merge {
            sources,
            target,
            sync,
            dry_run,
        } => {
            let sources = library
                .resolve_playlists(&playlists, &sources)
                .await
                .wrap_err("Failed to look up source playlists")?;
            let request = MergeRequest {
                sources,
                target_id: target,
                sync,
            };
            let orchestrator = MergeOrchestrator::new(&client, user.id.clone(), config.merge_options());

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, stopping after the current request");
                    ctrl_c.cancel();
                }
            });

            if dry_run {
                let preview = orchestrator.preview(&request, &cancel).await?;
                let target_name = preview
                    .target
                    .as_ref()
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| format!("new playlist '{}'", config.merge.playlist_name));

                println!(
                    "{} unique tracks from {} playlists ({} before dedup)",
                    preview.collected.identities.len(),
                    preview.collected.sources.len(),
                    preview.collected.raw_count
                );
                let mode = match preview.mode {
                    MergeMode::Create => "create",
                    MergeMode::Update => "update",
                };
                println!("Target ({}): {}", mode, target_name);
                for uri in &preview.plan.to_remove {
                    println!("  - {}", uri);
                }
                let to_add: TrackIdentitySet = preview.plan.to_add.iter().collect();
                for track in preview
                    .collected
                    .tracks
                    .iter()
                    .filter(|t| to_add.contains(&t.uri))
                {
                    println!("  + {} - {}", track.artists.join(", "), track.name);
                }
                println!(
                    "Would add {}, remove {}, leaving {} tracks",
                    preview.plan.to_add.len(),
                    preview.plan.to_remove.len(),
                    preview.total_final_tracks()
                );
                return Ok(());
            }

            match orchestrator.run(&request, &cancel).await {
                Ok(result) => {
                    let verb = match result.mode {
                        MergeMode::Create => "Created",
                        MergeMode::Update => "Updated",
                    };
                    println!(
                        "{} '{}' ({}) from {} playlists: {} added, {} removed, {} tracks total",
                        verb,
                        result.target.name,
                        result.target.id,
                        result.source_playlists_count,
                        result.tracks_added,
                        result.tracks_removed,
                        result.total_final_tracks
                    );
                    Ok(())
                }
                Err(failure) => {
                    if let Some(target) = &failure.target
                        && (failure.progress.added > 0 || failure.progress.removed > 0)
                    {
                        eprintln!(
                            "Playlist '{}' was partially updated: {} added, {} removed before the failure",
                            target.name, failure.progress.added, failure.progress.removed
                        );
                    }
                    if failure.error.is_auth() {
                        eprintln!("Your Spotify credentials were rejected; refresh the token and retry.");
                    }
                    Err(failure).wrap_err("Merge did not complete")
                }
            }
        }
        Commands::Config(_) => Ok(()),
    }
}
