mod config;
mod logging;
mod models;
mod ports;
mod services;
mod spotify_rs;
#[cfg(test)]
mod test_utils;
mod ytmusic_rs;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::{Result, eyre::Context, eyre::bail};

use crate::{
    config::Config,
    ports::{ProviderClient, ReadOnlyProvider},
    services::{
        orchestrator::{self, SyncOptions},
        spotify::SpotifyProvider,
        youtube::YoutubeProvider,
    },
    spotify_rs::auth::SpotifyApiCredentials,
    ytmusic_rs::auth::BrowserAuth,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The config file to use
    #[arg(short, long, global = true, env = "MUSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `musync=debug`
    #[arg(long, default_value = "info", global = true, env = "MUSYNC_LOG")]
    log_level: String,

    /// OTLP gRPC endpoint to export traces to
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Spotify,
    Youtube,
}

#[derive(Args, Debug)]
struct SyncFlags {
    /// Sync playlists owned by the user (default)
    #[arg(long, overrides_with = "no_user_playlists")]
    user_playlists: bool,
    /// Skip playlists owned by the user
    #[arg(long, overrides_with = "user_playlists")]
    no_user_playlists: bool,

    /// Sync playlists the user follows (default)
    #[arg(long, overrides_with = "no_followed_playlists")]
    followed_playlists: bool,
    /// Skip playlists the user follows
    #[arg(long, overrides_with = "followed_playlists")]
    no_followed_playlists: bool,

    /// Sync followed artists (default)
    #[arg(long, overrides_with = "no_followed_artists")]
    followed_artists: bool,
    /// Skip followed artists
    #[arg(long, overrides_with = "followed_artists")]
    no_followed_artists: bool,

    /// Read everything but change nothing
    #[arg(long)]
    read_only: bool,
}

impl SyncFlags {
    fn options(&self) -> SyncOptions {
        SyncOptions {
            user_playlists: self.user_playlists || !self.no_user_playlists,
            followed_playlists: self.followed_playlists || !self.no_followed_playlists,
            followed_artists: self.followed_artists || !self.no_followed_artists,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync from one provider to another
    Unisync {
        source: Provider,
        destination: Provider,
        #[command(flatten)]
        flags: SyncFlags,
    },
    /// Sync every provider with every other, in both directions
    Multisync {
        #[arg(num_args = 2.., required = true)]
        providers: Vec<Provider>,
        #[command(flatten)]
        flags: SyncFlags,
    },
    /// Delete every playlist created by a previous sync
    ClearPlaylists {
        provider: Provider,
        /// Only log what would be deleted
        #[arg(long)]
        read_only: bool,
    },
    /// Check that the tool runs
    Hello,
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

/// What a provider needs to connect, read from the config and local files only.
#[derive(Debug)]
enum ProviderSettings {
    Spotify(SpotifyApiCredentials),
    Youtube(BrowserAuth),
}

impl ProviderSettings {
    fn resolve(provider: Provider, config: &Config) -> Result<Self> {
        match provider {
            Provider::Spotify => Ok(Self::Spotify(config.spotify_credentials()?)),
            Provider::Youtube => {
                let auth_file = config.youtube_auth_file()?;
                let auth = BrowserAuth::from_file(&auth_file)
                    .wrap_err("Failed to load YouTube Music browser authentication")?;
                Ok(Self::Youtube(auth))
            }
        }
    }
}

/// Settings of every provider, so a missing key fails before any provider
/// authenticates.
fn resolve_settings(providers: &[Provider], config: &Config) -> Result<Vec<ProviderSettings>> {
    providers
        .iter()
        .map(|provider| ProviderSettings::resolve(*provider, config))
        .collect()
}

async fn connect(settings: ProviderSettings, read_only: bool) -> Result<Box<dyn ProviderClient>> {
    let client: Box<dyn ProviderClient> = match settings {
        ProviderSettings::Spotify(credentials) => {
            Box::new(SpotifyProvider::connect(credentials).await?)
        }
        ProviderSettings::Youtube(auth) => Box::new(YoutubeProvider::with_auth(auth)),
    };

    if read_only {
        tracing::info!("{} is read-only, no changes will be made", client.provider_name());
        return Ok(Box::new(ReadOnlyProvider::new(client)));
    }
    Ok(client)
}

/// Providers in first-seen order, without repeats.
fn distinct_providers(providers: &[Provider]) -> Vec<Provider> {
    let mut distinct = Vec::new();
    for provider in providers {
        if !distinct.contains(provider) {
            distinct.push(*provider);
        }
    }
    distinct
}

async fn run(command: Commands, config_path: Option<PathBuf>) -> Result<()> {
    let load_config = || {
        Config::load(config_path.as_deref()).wrap_err("Failed to load musync config")
    };

    match command {
        Commands::Unisync {
            source,
            destination,
            flags,
        } => {
            if source == destination {
                bail!("Source and destination must be different providers");
            }
            let config = load_config()?;
            let source = ProviderSettings::resolve(source, &config)?;
            let destination = ProviderSettings::resolve(destination, &config)?;
            let source = connect(source, false).await?;
            let destination = connect(destination, flags.read_only).await?;
            orchestrator::unisync(source.as_ref(), destination.as_ref(), &flags.options())
                .await?;
        }
        Commands::Multisync { providers, flags } => {
            let providers = distinct_providers(&providers);
            if providers.len() < 2 {
                bail!("Multisync needs at least two different providers");
            }
            let config = load_config()?;
            let settings = resolve_settings(&providers, &config)?;
            let mut clients = Vec::with_capacity(settings.len());
            for settings in settings {
                clients.push(connect(settings, flags.read_only).await?);
            }
            let reports = orchestrator::multisync(&clients, &flags.options()).await?;
            tracing::info!("Multisync finished {} syncs", reports.len());
        }
        Commands::ClearPlaylists {
            provider,
            read_only,
        } => {
            let config = load_config()?;
            let settings = ProviderSettings::resolve(provider, &config)?;
            let client = connect(settings, read_only).await?;
            let deleted = orchestrator::clear_playlists(client.as_ref()).await?;
            tracing::info!(
                "Deleted {} synced playlists from {}",
                deleted,
                client.provider_name()
            );
        }
        Commands::Hello => {
            tracing::info!("Hello from musync, everything is working");
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                tracing::info!("Config file at {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let tracer_provider = logging::init_tracing(cli.otlp_endpoint.as_deref(), &cli.log_level)?;

    let result = run(cli.command, cli.config).await;
    logging::shutdown_tracing(tracer_provider);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, SpotifyConfig, YoutubeConfig};

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("musync").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_sync_flags_default_to_everything() {
        let Commands::Unisync { flags, .. } = parse(&["unisync", "spotify", "youtube"]) else {
            panic!("expected unisync");
        };
        assert_eq!(flags.options(), SyncOptions::default());
        assert!(!flags.read_only);
    }

    #[test]
    fn test_sync_flags_negation_last_wins() {
        let Commands::Unisync { flags, .. } = parse(&[
            "unisync",
            "youtube",
            "spotify",
            "--no-followed-artists",
            "--user-playlists",
            "--no-user-playlists",
            "--no-followed-playlists",
            "--followed-playlists",
            "--read-only",
        ]) else {
            panic!("expected unisync");
        };

        assert_eq!(
            flags.options(),
            SyncOptions {
                user_playlists: false,
                followed_playlists: true,
                followed_artists: false,
            }
        );
        assert!(flags.read_only);
    }

    #[test]
    fn test_negated_sync_flags_are_listed_in_help() {
        use clap::CommandFactory;

        let command = Cli::command();
        let unisync = command.find_subcommand("unisync").unwrap();

        for flag in ["no_user_playlists", "no_followed_playlists", "no_followed_artists"] {
            let arg = unisync
                .get_arguments()
                .find(|arg| arg.get_id() == flag)
                .unwrap();
            assert!(!arg.is_hide_set(), "{flag} is hidden");
        }
    }

    #[test]
    fn test_multisync_requires_two_providers() {
        let result = Cli::try_parse_from(["musync", "multisync", "spotify"]);
        assert!(result.is_err());

        let Commands::Multisync { providers, .. } =
            parse(&["multisync", "spotify", "youtube", "spotify"])
        else {
            panic!("expected multisync");
        };
        assert_eq!(
            distinct_providers(&providers),
            vec![Provider::Spotify, Provider::Youtube]
        );
    }

    #[tokio::test]
    async fn test_unisync_rejects_same_provider() {
        let command = parse(&["unisync", "spotify", "spotify"]);
        let result = run(command, None).await;
        assert!(result.is_err());
    }

    fn spotify_only_config() -> Config {
        Config {
            spotify: SpotifyConfig {
                client_id: Some("id".into()),
                client_secret: Some("secret".into()),
                redirect_uri: Some("http://127.0.0.1:8888/callback".into()),
                refresh_token: Some("not-a-real-token".into()),
            },
            ..Config::default()
        }
    }

    fn is_missing_youtube(err: &color_eyre::Report) -> bool {
        err.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<ConfigError>(),
                Some(ConfigError::Missing { provider: "YouTube", .. })
            )
        })
    }

    #[test]
    fn test_resolve_settings_fails_on_any_missing_provider() {
        let config = spotify_only_config();

        let err = resolve_settings(&[Provider::Spotify, Provider::Youtube], &config).unwrap_err();

        assert!(is_missing_youtube(&err), "unexpected error: {err:?}");
        assert!(matches!(
            resolve_settings(&[Provider::Spotify], &config).as_deref(),
            Ok([ProviderSettings::Spotify(_)])
        ));
    }

    #[test]
    fn test_resolve_settings_reads_browser_auth_file() {
        let dir = tempfile::tempdir().unwrap();
        let auth_file = dir.path().join("browser.json");
        std::fs::write(&auth_file, r#"{ "cookie": "SAPISID=abc", "x-goog-authuser": "0" }"#)
            .unwrap();
        let mut config = Config {
            youtube: YoutubeConfig {
                browser_auth_file: Some(auth_file.to_string_lossy().into_owned()),
            },
            ..Config::default()
        };

        assert!(matches!(
            resolve_settings(&[Provider::Youtube], &config).as_deref(),
            Ok([ProviderSettings::Youtube(_)])
        ));

        config.youtube.browser_auth_file = Some(
            dir.path()
                .join("missing.json")
                .to_string_lossy()
                .into_owned(),
        );
        assert!(resolve_settings(&[Provider::Youtube], &config).is_err());
    }

    #[tokio::test]
    async fn test_unisync_reports_missing_config_before_authenticating() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
            [spotify]
            client_id = "id"
            client_secret = "secret"
            redirect_uri = "http://127.0.0.1:8888/callback"
            refresh_token = "not-a-real-token"
            "#,
        )
        .unwrap();

        for args in [
            &["unisync", "spotify", "youtube"][..],
            &["multisync", "spotify", "youtube"][..],
        ] {
            let err = run(parse(args), Some(config_path.clone()))
                .await
                .unwrap_err();
            assert!(is_missing_youtube(&err), "unexpected error: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_multisync_rejects_single_distinct_provider() {
        let command = parse(&["multisync", "youtube", "youtube"]);
        let result = run(command, None).await;
        assert!(result.is_err());
    }
}
