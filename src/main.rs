use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dz_localities::locality::{
    ImportSource, LabelConfig, Language, LocalityReader, LocalityWriter, XmlSchema,
};
use dz_localities::server::{self, AppState};
use dz_localities::settings::FEED_FILE_NAME;
use dz_localities::{AppConfig, LabelSettings};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// dz-localities: Algerian wilaya/commune registry
///
/// Imports the wilaya/commune XML feed, keeps it in a local store and
/// serves bilingual option labels for checkout forms.
///
/// Examples:
///   dzloc import
///   dzloc import --file ~/Downloads/algeria-cities.xml
///   dzloc subregions DZ-07
///   dzloc settings --language arabic --bilingual true
///   dzloc serve --port 8080
#[derive(Parser)]
#[command(name = "dzloc", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConfigArgs {
    /// Directory holding the store and settings. Defaults to ~/.dz-localities.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Operator-managed feed used when no file is given.
    /// Defaults to <data-dir>/uploads/algeria-cities.xml.
    #[arg(long, global = true)]
    fallback_xml: Option<PathBuf>,

    /// Dataset shipped with the package.
    #[arg(long, global = true)]
    bundled_xml: Option<PathBuf>,

    /// Cache lifetime in seconds.
    #[arg(long, global = true, default_value_t = 86_400)]
    cache_ttl_secs: i64,

    /// Prefix of composite region codes.
    #[arg(long, global = true, default_value = "DZ")]
    country_code: String,

    /// Element names of the feed: "algeria" or "generic".
    #[arg(long, global = true, default_value = "algeria")]
    schema: XmlSchema,
}

impl ConfigArgs {
    fn into_config(self) -> AppConfig {
        let defaults = AppConfig::default();
        let data_dir = self.data_dir.unwrap_or(defaults.data_dir);
        AppConfig {
            fallback_xml: Some(
                self.fallback_xml
                    .unwrap_or_else(|| data_dir.join("uploads").join(FEED_FILE_NAME)),
            ),
            bundled_xml: self.bundled_xml.or(defaults.bundled_xml),
            data_dir,
            cache_ttl: chrono::Duration::seconds(self.cache_ttl_secs.max(0)),
            country_code: self.country_code,
            schema: self.schema,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, short = 'p', default_value_t = 8080)]
        port: u16,
    },
    /// Import the feed (explicit file, else fallback, else bundled).
    Import {
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },
    /// Remove all stored localities.
    Delete,
    /// Write the dataset as JSON (stdout unless --out is given).
    Export {
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
    /// Show stored counts.
    Status,
    /// Print the first rows of the stored data.
    Sample {
        #[arg(long, short = 'n', default_value_t = 5)]
        limit: usize,
    },
    /// List region options with resolved labels.
    Regions,
    /// List subregion options of a region ("DZ-07" or "7").
    Subregions { identifier: String },
    /// Show or change label settings.
    Settings {
        /// "latin" or "arabic".
        #[arg(long)]
        language: Option<Language>,
        #[arg(long)]
        bilingual: Option<bool>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("encoding output")?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.into_config();
    let localities = config.build_localities();
    let settings = LabelSettings::load_from(config.settings_path());

    match cli.command {
        // ── Server ──────────────────────────────────────────────
        Command::Serve { host, port } => {
            let state = Arc::new(AppState { localities, settings });
            server::start(&host, port, state)
                .await
                .with_context(|| format!("serving on {}:{}", host, port))?;
        }

        // ── Writers ─────────────────────────────────────────────
        Command::Import { file } => {
            let explicit = file.as_deref().map(ImportSource::from_path).transpose()?;
            let outcome = localities.import(explicit)?;
            print_json(&outcome)?;
        }
        Command::Delete => {
            localities.delete()?;
            print_json(&localities.counts())?;
        }

        // ── Readers ─────────────────────────────────────────────
        Command::Export { out } => {
            let json = localities.export_json()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "export written");
                }
                None => println!("{}", json),
            }
        }
        Command::Status => print_json(&localities.counts())?,
        Command::Sample { limit } => println!("{}", localities.debug_sample(limit)),
        Command::Regions => print_json(&localities.region_options(&settings.get()))?,
        Command::Subregions { identifier } => {
            print_json(&localities.lookup_subregions(&identifier, &settings.get())?)?;
        }

        // ── Settings ────────────────────────────────────────────
        Command::Settings { language, bilingual } => {
            let current = settings.get();
            let next = LabelConfig::new(
                language.unwrap_or(current.default_language),
                bilingual.unwrap_or(current.bilingual),
            );
            if settings.set(next).context("saving settings")? {
                localities.on_label_settings_changed(&next);
            }
            print_json(&settings.get())?;
        }
    }

    Ok(())
}
