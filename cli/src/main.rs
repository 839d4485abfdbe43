//! RankFlow CLI: runs batch jobs on a local execution context

use clap::{Args, Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use rankflow::{PageRankJob, PageRankOptions, RankEntry, SessionConfig};
use std::path::PathBuf;
use tracing::{debug, Level};

#[derive(Parser, Debug)]
#[command(name = "rankflow", version, about = "RankFlow batch jobs")]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Log verbosity (logs go to stderr)
    #[arg(long, default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, PartialEq, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Clone, Copy, Debug, PartialEq, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rank the nodes of an edge list with PageRank
    Pagerank {
        /// Edge-list file or directory
        #[arg(long)]
        edges: PathBuf,

        /// Number of iterations
        #[arg(long, default_value_t = 10)]
        iterations: usize,

        /// Damping factor
        #[arg(long, default_value_t = 0.85)]
        damping: f64,

        /// Number of top-ranked pages to print
        #[arg(long, default_value_t = 10)]
        top_k: usize,

        /// Storage level for adjacency and ranks (e.g. MEMORY_AND_DISK)
        #[arg(long)]
        persist: Option<String>,

        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Session settings; flags override values from `--config`
#[derive(Args, Debug, Default)]
struct SessionArgs {
    /// YAML file with session settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    app_name: Option<String>,

    /// local, local[N] or local[*]
    #[arg(long)]
    master: Option<String>,

    #[arg(long)]
    executor_instances: Option<usize>,

    #[arg(long)]
    executor_cores: Option<usize>,

    /// Storage memory budget, e.g. 2g
    #[arg(long)]
    executor_memory: Option<String>,

    #[arg(long)]
    driver_memory: Option<String>,

    #[arg(long)]
    shuffle_partitions: Option<usize>,

    /// true or false
    #[arg(long)]
    dynamic_allocation: Option<bool>,
}

impl SessionArgs {
    fn resolve(self) -> rankflow::PageRankResult<SessionConfig> {
        let base = match &self.config {
            Some(path) => SessionConfig::from_yaml_file(path)?,
            None => SessionConfig::default(),
        };
        Ok(base.overlay(SessionConfig {
            app_name: self.app_name,
            master: self.master,
            executor_instances: self.executor_instances,
            executor_cores: self.executor_cores,
            executor_memory: self.executor_memory,
            driver_memory: self.driver_memory,
            shuffle_partitions: self.shuffle_partitions,
            dynamic_allocation: self.dynamic_allocation,
        }))
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Pagerank {
            edges,
            iterations,
            damping,
            top_k,
            persist,
            session,
        } => {
            let mut opts = PageRankOptions::new(edges)
                .with_iterations(iterations)
                .with_damping(damping)
                .with_top_k(top_k);
            opts.persist = persist;
            run_pagerank(opts, session, &cli.format)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_pagerank(
    opts: PageRankOptions,
    session: SessionArgs,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = session.resolve()?;
    debug!("Session: {:?}", session.as_properties());

    let ctx = session.build_context()?;
    let result = PageRankJob::new(&ctx, opts).and_then(|mut job| job.run());
    ctx.stop();

    print_ranks(&result?, format)
}

fn print_ranks(entries: &[RankEntry], format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(entries)?);
        }
        OutputFormat::Csv => {
            println!("page,rank");
            for entry in entries {
                println!("{},{}", entry.node, entry.rank);
            }
        }
        OutputFormat::Table => {
            println!("Top pages by rank:");
            if entries.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["#", "Page", "Rank"]);
            for (i, entry) in entries.iter().enumerate() {
                table.add_row(vec![
                    (i + 1).to_string(),
                    entry.node.to_string(),
                    format!("{:.6}", entry.rank),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}
