use anyhow::Context;
use clap::{Parser, Subcommand};
use mapforge::{Config, ForgeEnvironment, MappingVersion};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Mapforge command line arguments
#[derive(Parser, Debug)]
#[command(name = "mapforge")]
#[command(about = "Mapping tables, jar remapping and synthetic maven artifacts")]
struct Args {
    /// Path to configuration file (TOML format)
    #[arg(long, env = "MAPFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Cache root, overriding the configuration
    #[arg(long, env = "MAPFORGE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Target game version, overriding the configuration
    #[arg(long)]
    minecraft_version: Option<String>,

    /// Mapping channel, overriding the configuration
    #[arg(long)]
    channel: Option<String>,

    /// Mapping version, overriding the configuration
    #[arg(long)]
    mapping_version: Option<String>,

    /// Regenerate cached files once during this run
    #[arg(long, default_value = "false")]
    refresh: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a mapping table and print it or copy it to a file
    Mapping {
        /// Direction such as `notch-mcp`; defaults to the configured one
        #[arg(long)]
        direction: Option<String>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the content hash of a generated mapping table
    Hash {
        #[arg(long)]
        direction: Option<String>,
    },
    /// Remap archives and print the paths of the results
    Remap {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        direction: Option<String>,
        /// Archives providing inherited classes
        #[arg(long, value_delimiter = ',')]
        classpath: Vec<PathBuf>,
        /// Copy results here instead of only printing their cache paths
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Serve a maven repository path from the synthetic repository
    Fetch {
        /// e.g. `/mapping/mcp/snapshot/20171003/snapshot-20171003-notch-mcp.srg`
        path: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(version) = &self.minecraft_version {
            config.minecraft_version = version.clone();
        }
        if let Some(channel) = &self.channel {
            config.mappings.channel = channel.clone();
        }
        if let Some(version) = &self.mapping_version {
            config.mappings.version = version.clone();
        }
        config.refresh |= self.refresh;
        Ok(config)
    }
}

fn mapping_version(env: &ForgeEnvironment, direction: Option<&str>) -> MappingVersion {
    let defaults = env.defaults.get();
    match direction {
        Some(direction) => defaults.with_direction(direction),
        None => defaults.clone(),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mapforge=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    let env = ForgeEnvironment::from_config(config)?;

    match args.command {
        Command::Mapping { direction, output } => {
            let version = mapping_version(&env, direction.as_deref());
            let path = env
                .manager
                .mapping_file(&version)
                .with_context(|| format!("Failed to generate {}", version))?;
            match output {
                Some(output) => {
                    fs::copy(&path, &output)
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                    info!("Wrote {} to {}", version, output.display());
                }
                None => {
                    let bytes = fs::read(&path)?;
                    std::io::stdout().write_all(&bytes)?;
                }
            }
        }
        Command::Hash { direction } => {
            let version = mapping_version(&env, direction.as_deref());
            println!("{}", env.manager.mapping_hash(&version)?);
        }
        Command::Remap {
            inputs,
            direction,
            classpath,
            output_dir,
        } => {
            let version = mapping_version(&env, direction.as_deref());
            for input in &inputs {
                let remapped = env
                    .remapper
                    .remap(&version, input, &classpath)
                    .with_context(|| format!("Failed to remap {}", input.display()))?;
                match &output_dir {
                    Some(dir) => {
                        fs::create_dir_all(dir)?;
                        let name = remapped.file_name().context("remapped file has no name")?;
                        let target = dir.join(name);
                        fs::copy(&remapped, &target)?;
                        println!("{}", target.display());
                    }
                    None => println!("{}", remapped.display()),
                }
            }
        }
        Command::Fetch { path, output } => {
            let bytes = env
                .repository
                .fetch(&path)?
                .with_context(|| format!("No provider serves {}", path))?;
            match output {
                Some(output) => fs::write(&output, &bytes)
                    .with_context(|| format!("Failed to write {}", output.display()))?,
                None => std::io::stdout().write_all(&bytes)?,
            }
        }
    }
    Ok(())
}
