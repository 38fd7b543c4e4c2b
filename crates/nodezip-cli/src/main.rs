#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use nodezip_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nodezip")]
#[command(author, version, about = "List the files a Node.js deployment archive would contain", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// List the entries of a folder
    Folder {
        /// Folder to walk
        source: PathBuf,

        /// Archive directory the entries are placed under
        #[arg(long, value_name = "PREFIX")]
        prefix: Option<String>,

        /// Gitignore-style pattern to exclude (repeatable)
        #[arg(long = "ignore", value_name = "PATTERN")]
        ignore: Vec<String>,
    },

    /// Install dependencies into a scratch directory and list their entries
    Deps {
        /// Dependency names to install
        #[arg(required = true)]
        names: Vec<String>,

        /// The project's package.json
        #[arg(long, value_name = "FILE", default_value = "package.json")]
        package_json: PathBuf,

        /// The project's lockfile (package-lock.json, yarn.lock or pnpm-lock.yaml)
        #[arg(long, value_name = "FILE")]
        lockfile: PathBuf,

        /// Archive directory the entries are placed under
        #[arg(long, value_name = "PREFIX")]
        prefix: Option<String>,

        /// Target CPU architecture for native packages
        #[arg(long)]
        arch: Option<String>,

        /// Target OS platform for native packages
        #[arg(long)]
        platform: Option<String>,

        /// Gitignore-style pattern to exclude (repeatable)
        #[arg(long = "ignore", value_name = "PATTERN")]
        ignore: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Commands::Version => commands::version::run(cli.json),
        Commands::Folder {
            source,
            prefix,
            ignore,
        } => commands::folder::run(&config, &source, prefix.as_deref(), &ignore, cli.json),
        Commands::Deps {
            names,
            package_json,
            lockfile,
            prefix,
            arch,
            platform,
            ignore,
        } => commands::deps::run(
            &config,
            &commands::deps::DepsArgs {
                names,
                package_json,
                lockfile,
                prefix,
                arch,
                platform,
                ignore,
            },
            cli.json,
        ),
    }
}
