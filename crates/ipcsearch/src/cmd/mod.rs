use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use ipcsearch_proto::Client;
use ipcsearch_transport::IpcStream;

use crate::exit::{proto_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod search;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the index and print matching files and folders.
    Search(SearchArgs),
    /// Show service version and database state.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Search(args) => search::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Which service to talk to and how long to wait for it.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Service instance name.
    #[arg(long, env = "IPCSEARCH_INSTANCE")]
    pub instance: Option<String>,
    /// How long to wait for the service pipe (e.g. 5s, 500ms).
    #[arg(long, env = "IPCSEARCH_TIMEOUT", default_value = "5s")]
    pub timeout: String,
}

impl ConnectArgs {
    pub fn connect(&self) -> CliResult<Client<IpcStream, IpcStream>> {
        let timeout = parse_duration(&self.timeout)?;
        Client::connect(self.instance.as_deref(), timeout)
            .map_err(|err| proto_error("connect failed", &err))
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search text; multiple words are joined with spaces.
    #[arg(required = true)]
    pub text: Vec<String>,
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Columns to show (comma-separated property names).
    #[arg(long, value_delimiter = ',', default_value = "name,path,size")]
    pub columns: Vec<String>,
    /// Sort keys, primary first (e.g. size:desc,name).
    #[arg(long, value_delimiter = ',')]
    pub sort: Vec<String>,
    /// First result to transfer.
    #[arg(long, default_value_t = 0)]
    pub offset: u64,
    /// Maximum number of results to transfer.
    #[arg(long)]
    pub count: Option<u64>,
    /// Mark search matches in name and path columns.
    #[arg(long)]
    pub highlight: bool,
    /// Ask the service for display text instead of raw values.
    #[arg(long)]
    pub formatted: bool,
    #[arg(long)]
    pub match_case: bool,
    #[arg(long)]
    pub whole_word: bool,
    /// Match against the full path instead of the name.
    #[arg(long)]
    pub match_path: bool,
    /// Treat the search text as a regular expression.
    #[arg(long)]
    pub regex: bool,
    #[arg(long)]
    pub diacritics: bool,
    /// Where folders are placed relative to files.
    #[arg(long, value_enum)]
    pub folders_first: Option<FoldersFirst>,
    /// Report the total size of all matching files.
    #[arg(long)]
    pub total_size: bool,
    /// Print only these result indexes (relative to --offset), in the given
    /// order.
    #[arg(long, value_delimiter = ',', value_name = "INDEX")]
    pub at: Vec<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FoldersFirst {
    Always,
    Never,
    Ascending,
    Descending,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
