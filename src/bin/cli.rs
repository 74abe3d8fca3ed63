//! lexstore CLI
//!
//! Command-line interface for building and querying store files.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use lexstore::Reader;

/// lexstore CLI
#[derive(Parser, Debug)]
#[command(name = "lexstore-cli")]
#[command(about = "Compact queryable store for tag-structured text documents")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source document into a store file
    Build {
        /// Source document (XML)
        src: String,

        /// Destination store file
        dst: String,

        /// Registered path, repeatable (e.g. /form/orth)
        #[arg(short, long = "path")]
        paths: Vec<String>,

        /// Cluster byte budget (uncompressed)
        #[arg(short, long, default_value = "64000")]
        cluster_size: u16,
    },

    /// Look up entries by keyword
    Find {
        /// Store file
        file: String,

        /// Keyword; a trailing % makes it a prefix query
        keyword: String,

        /// Skip this many matches
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Return at most this many matches (0 = unbounded)
        #[arg(short, long, default_value = "0")]
        count: usize,

        /// Restrict matches to one registered path index
        #[arg(short, long, default_value = "0")]
        path_index: u8,

        /// Content filter keyword (same wildcard convention)
        #[arg(short, long)]
        filter: Option<String>,

        /// Path index the filter text must occur under
        #[arg(long, default_value = "0")]
        filter_path_index: u8,
    },

    /// Reconstruct one entry
    Get {
        /// Store file
        file: String,

        /// Entry id
        id: u64,
    },

    /// Show store metadata
    Info {
        /// Store file
        file: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lexstore=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> lexstore::Result<()> {
    match args.command {
        Commands::Build {
            src,
            dst,
            mut paths,
            cluster_size,
        } => {
            paths.sort_unstable();
            paths.dedup();

            let summary = lexstore::write(&src, &dst, &paths, cluster_size)?;
            println!(
                "wrote {}: {} entries in {} clusters ({} terms, {} names)",
                dst, summary.entries, summary.clusters, summary.lexicon_keys, summary.alphabet_len
            );
        }

        Commands::Find {
            file,
            keyword,
            offset,
            count,
            path_index,
            filter,
            filter_path_index,
        } => {
            let reader = Reader::open(&file)?;
            let results = reader.find(
                &keyword,
                offset,
                count,
                path_index,
                filter.as_deref(),
                filter_path_index,
            )?;

            if results.is_empty() {
                println!("no matches");
            }
            for (key, ids) in results {
                let rendered: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                println!("{}: {}", key, rendered.join(", "));
            }
        }

        Commands::Get { file, id } => {
            let reader = Reader::open(&file)?;
            match reader.get(id)? {
                Some(text) => println!("{}", text),
                None => println!("no entry {}", id),
            }
        }

        Commands::Info { file } => {
            let reader = Reader::open(&file)?;
            println!("writer version: {}", reader.writer_version());
            println!("reader version: {}", reader.reader_version());
            println!("entries:        {}", reader.entry_count());
            println!("clusters:       {}", reader.cluster_count());
            println!("path registry:  {}", if reader.filters_supported() { "yes" } else { "no" });
        }
    }

    Ok(())
}
