use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{self, EnvFilter};

use repotree::config::{AnalyzerConfig, TOKEN_ENV_VAR};
use repotree::error::AnalyzerError;
use repotree::providers::{GithubClient, RepositoryReference};
use repotree::services::{
    self, AnalysisResult, BatchSummary, JsonFileStore, RepositoryAnalyzer, ResultStore,
};

#[derive(Parser)]
#[command(author, version, about = "Analyze the file structure of GitHub repositories", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// GitHub API token for authentication (overrides GITHUB_TOKEN environment variable)
    #[arg(short = 't', long, global = true)]
    github_token: Option<String>,

    /// GitHub API root, e.g. for GitHub Enterprise
    #[arg(long = "api-url", global = true)]
    api_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single repository
    Analyze {
        /// Repository URL
        #[arg(
            help = "Repository URL - supports 'https://github.com/user/repo', 'git@github.com:user/repo.git' and 'github:user/repo'. Prompted for when omitted"
        )]
        url: Option<String>,

        /// Directory to save the analysis JSON into
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print the analysis as JSON instead of a report
        #[arg(long)]
        json: bool,
    },
    /// Analyze every repository listed in the first column of a CSV file
    Batch {
        /// CSV file with one repository URL per row
        input: PathBuf,

        /// Directory to save results and the batch summary into
        #[arg(short, long, default_value = "analysis_results")]
        output_dir: PathBuf,

        /// Skip the first row of the CSV file
        #[arg(long)]
        has_header: bool,
    },
    /// Recompute the batch summary from previously saved results
    Aggregate {
        /// Directory holding repo_analysis_*.json files
        dir: PathBuf,
    },
    /// Check that a GitHub token resolves and show the current quota
    CheckToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr) // Use stderr for logging
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    match &cli.command {
        Commands::Analyze {
            url,
            output_dir,
            json,
        } => {
            let url = match url {
                Some(url) => url.clone(),
                None => prompt("Enter GitHub repository URL: ")?,
            };
            // Fail on a malformed URL before asking for a token
            let reference = RepositoryReference::parse(&url)?;

            let analyzer = RepositoryAnalyzer::from_config(&load_config(&cli)?)?;
            let result = match analyzer.analyze(&reference).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Failed to analyze {}: {}", reference, e);
                    anyhow::bail!("Failed to analyze {}: {}", reference, e)
                }
            };

            if *json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_analysis(&result);
            }

            if let Some(dir) = output_dir {
                let store = JsonFileStore::new(dir)?;
                let path = store.persist_result(&result)?;
                eprintln!("Results saved to {}", path.display());
            }
            Ok(())
        }
        Commands::Batch {
            input,
            output_dir,
            has_header,
        } => {
            let urls = services::read_repository_list(input, *has_header)?;
            tracing::info!("Loaded {} repositories from {}", urls.len(), input.display());

            let analyzer = RepositoryAnalyzer::from_config(&load_config(&cli)?)?;
            let store = JsonFileStore::new(output_dir)?;
            let report = services::run_batch(&analyzer, &store, &urls).await?;

            for persisted in &report.persisted {
                println!("ok     {} -> {}", persisted.full_name, persisted.location.display());
            }
            for failure in &report.failures {
                println!("failed {}: {}", failure.reference, failure.error);
            }

            match &report.summary {
                Some(summary) => {
                    println!();
                    print_summary(summary);
                    Ok(())
                }
                None => anyhow::bail!(AnalyzerError::NoSuccessfulAnalyses),
            }
        }
        Commands::Aggregate { dir } => {
            let summary = services::aggregate_directory(dir)?;
            print_summary(&summary);
            Ok(())
        }
        Commands::CheckToken => {
            let config = load_config(&cli)?;
            println!("Token found: {}****", config.token_preview());

            let client = GithubClient::new(&config)?;
            let quota = client.rate_limit().await?;
            println!(
                "Core quota: {}/{} remaining, resets at {}",
                quota.remaining, quota.limit, quota.reset
            );
            Ok(())
        }
    }
}

/// Builds the client configuration from the global flags.
///
/// The token comes from `--github-token`, then `GITHUB_TOKEN`, then an
/// interactive prompt when stdin is a terminal.
fn load_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let config = match AnalyzerConfig::resolve(cli.github_token.clone()) {
        Ok(config) => config,
        Err(AnalyzerError::Configuration(reason)) if io::stdin().is_terminal() => {
            tracing::debug!("{}", reason);
            let token = prompt(&format!(
                "{} is not set. Enter your GitHub personal access token: ",
                TOKEN_ENV_VAR
            ))?;
            AnalyzerConfig::new(token)?
        }
        Err(e) => return Err(e.into()),
    };

    if cli.github_token.is_some() {
        tracing::info!("Using GitHub token from command line arguments");
    }

    let mut config = config.with_request_timeout(Duration::from_secs(cli.timeout_secs));
    if let Some(url) = &cli.api_url {
        tracing::info!("Using custom GitHub API URL: {}", url);
        config = config.with_api_base_url(url)?;
    }
    tracing::debug!("{:?}", config);
    Ok(config)
}

fn prompt(message: &str) -> Result<String> {
    eprint!("{}", message);
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_analysis(result: &AnalysisResult) {
    let info = &result.info;
    let summary = &result.summary;

    println!("Repository: {}", info.full_name);
    println!(
        "Description: {}",
        info.description.as_deref().unwrap_or("<no description>")
    );
    println!("Language: {}", info.language.as_deref().unwrap_or("<unknown>"));
    println!("License: {}", info.license.as_deref().unwrap_or("<none>"));
    println!("Stars: {}  Forks: {}  Watchers: {}", info.stars, info.forks, info.watchers);
    println!("Default branch: {}", info.default_branch);
    println!();
    println!("Files: {}", summary.file_count);
    println!("Directories: {}", summary.directory_count);
    println!("Max depth: {}", summary.max_depth);
    println!("File types:");
    print_file_types(summary.file_types.iter());
}

fn print_summary(summary: &BatchSummary) {
    println!("Repositories analyzed: {}", summary.total_repositories);
    println!("Average files: {:.2}", summary.average_file_count);
    println!("Average directories: {:.2}", summary.average_directory_count);
    println!("File types:");
    print_file_types(summary.file_types.iter());
}

/// Most frequent first, ties by extension.
fn print_file_types<'a>(types: impl Iterator<Item = (&'a String, &'a usize)>) {
    let mut types: Vec<_> = types.collect();
    types.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (extension, count) in types {
        println!("  {:<20} {}", extension, count);
    }
}
