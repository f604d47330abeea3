//! ARC task dataset command line tool
//!
//! Fetches the published shards, loads them, renders single tasks and packs
//! task collections into new shards.
//!
//! # Usage
//!
//! ```bash
//! # Download the default record into ./dataset
//! arc-data fetch
//!
//! # Count the samples of one partition, streaming
//! arc-data load --partition rearc --stream --batch-size 64
//!
//! # Render a task to PNG
//! arc-data render --id rearc-0 --partition rearc --out images/
//!
//! # Pack a JSON object of id -> task into a shard
//! arc-data pack --input tasks.json --output custom.parquet
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arc_data_core::config::{DataConfig, ShardCompression};
use arc_data_core::render::parse_color;
use arc_data_core::{
    save_task, write_shard, DataError, DatasetLoader, LoadMode, Loaded, LocalStorage,
    RecordFetcher, RenderOptions, Sample, ShardWriteOptions, Task,
};

/// ARC task dataset tool
#[derive(Parser, Debug)]
#[command(name = "arc-data")]
#[command(about = "Fetch, load, render and pack ARC task datasets")]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Hide progress bars
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every file of a record
    Fetch {
        /// Record to fetch (defaults to the configured record)
        #[arg(long)]
        record_id: Option<u64>,

        /// Use the sandbox archive
        #[arg(long)]
        sandbox: bool,

        /// Destination directory (defaults to the cache root)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Load samples and print counts
    Load {
        /// Partition to load (defaults to all)
        #[arg(short, long)]
        partition: Option<String>,

        /// Stream samples instead of loading them all at once
        #[arg(long)]
        stream: bool,

        /// Rows per batch when streaming
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Render one task to PNG
    Render {
        /// Sample identifier
        #[arg(long)]
        id: String,

        /// Partition to search (defaults to all)
        #[arg(short, long)]
        partition: Option<String>,

        /// Output file or directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Cell size in pixels
        #[arg(long, default_value = "16")]
        cell_size: u32,

        /// Grid line color (#RRGGBB, w, k)
        #[arg(long, default_value = "w")]
        grid_line_color: String,
    },

    /// Write a JSON object of id -> task as a shard
    Pack {
        /// JSON input file
        #[arg(short, long)]
        input: PathBuf,

        /// Shard to write
        #[arg(short, long)]
        output: PathBuf,

        /// Compression (snappy, none)
        #[arg(long)]
        compression: Option<String>,

        /// Maximum rows per row group
        #[arg(long, default_value = "1024")]
        rows_per_group: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = load_config(args.config.as_deref())?;
    if args.quiet {
        config.dataset.show_progress = false;
    }

    match args.command {
        Command::Fetch {
            record_id,
            sandbox,
            out,
        } => {
            if sandbox {
                config.remote.use_sandbox = true;
            }
            let record_id = record_id.unwrap_or(config.remote.record_id);
            let out = out.unwrap_or_else(|| config.storage.base_path.clone());

            let fetcher = RecordFetcher::new(&config.remote, config.dataset.show_progress)?;
            tracing::info!("Fetching record {} from {}", record_id, fetcher.base_url());
            let report = fetcher.fetch_into(record_id, &out)?;

            for file in &report.files {
                println!("{}\t{}", file.name, file.bytes);
            }
            println!(
                "{} file(s), {} bytes written to {}",
                report.files.len(),
                report.total_bytes(),
                out.display()
            );
        }

        Command::Load {
            partition,
            stream,
            batch_size,
        } => {
            let loader = DatasetLoader::from_config(config)?;

            let mode = if stream { LoadMode::Lazy } else { LoadMode::Eager };
            let mut request = loader.request(mode);
            request.partition = partition.clone();
            if let Some(batch_size) = batch_size {
                request.batch_size = batch_size;
            }

            let mut summary = Summary::default();
            match loader.load(&request)? {
                Loaded::Eager(samples) => samples.iter().for_each(|(_, task)| summary.add(task)),
                Loaded::Lazy(stream) => {
                    for sample in stream {
                        summary.add(&sample?.1);
                    }
                }
            }
            let output = serde_json::json!({
                "partition": partition.as_deref().unwrap_or("all"),
                "mode": if stream { "lazy" } else { "eager" },
                "samples": summary.samples,
                "train_pairs": summary.train_pairs,
                "test_pairs": summary.test_pairs,
                "unsolved_test_pairs": summary.unsolved,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Render {
            id,
            partition,
            out,
            cell_size,
            grid_line_color,
        } => {
            let options = RenderOptions {
                title: id.clone(),
                cell_size,
                grid_line_color: parse_color(&grid_line_color)?,
                ..RenderOptions::default()
            };
            let loader = DatasetLoader::from_config(config)?;

            let task = find_task(&loader, partition.as_deref(), &id)?;
            let written = save_task(&task, &options, &out)?;
            println!("{}", written.display());
        }

        Command::Pack {
            input,
            output,
            compression,
            rows_per_group,
        } => {
            let compression = match compression {
                Some(name) => name.parse()?,
                None => config.dataset.compression,
            };
            let rows = pack(&input, &output, compression, rows_per_group)?;
            println!("{} rows written to {}", rows, output.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<DataConfig, DataError> {
    let config = match path {
        Some(path) => DataConfig::from_file(path)?,
        None => DataConfig::default(),
    }
    .with_env_overrides();
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    samples: usize,
    train_pairs: usize,
    test_pairs: usize,
    unsolved: usize,
}

impl Summary {
    fn add(&mut self, task: &Task) {
        self.samples += 1;
        self.train_pairs += task.train.len();
        self.test_pairs += task.test.len();
        self.unsolved += task.test.iter().filter(|p| p.output.is_none()).count();
    }
}

/// Streams the selected shards until `id` turns up.
fn find_task(loader: &DatasetLoader, partition: Option<&str>, id: &str) -> Result<Task, DataError> {
    let batch_size = loader.config().dataset.batch_size;
    for sample in loader.load_lazy(partition, batch_size)? {
        let (sample_id, task) = sample?;
        if sample_id == id {
            return Ok(task);
        }
    }
    Err(DataError::config(format!(
        "no task with id '{id}' in {}",
        partition.unwrap_or("any partition")
    )))
}

/// Reads a JSON object mapping ids to tasks and writes it as one shard,
/// rows ordered by id.
fn pack(
    input: &Path,
    output: &Path,
    compression: ShardCompression,
    rows_per_group: usize,
) -> Result<u64, DataError> {
    let text = std::fs::read_to_string(input)
        .map_err(|e| DataError::storage_with_source(input, "failed to read task file", e))?;
    let tasks: BTreeMap<String, Task> = serde_json::from_str(&text)
        .map_err(|e| DataError::decode(input.display().to_string(), e))?;
    let samples: Vec<Sample> = tasks.into_iter().collect();

    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = output
        .file_name()
        .ok_or_else(|| DataError::config(format!("'{}' is not a file path", output.display())))?;

    let storage = LocalStorage::at(dir)?;
    let options = ShardWriteOptions {
        compression,
        rows_per_group,
    };
    write_shard(&storage, Path::new(file_name), &samples, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arc_data_core::dataset::read_shard;
    use arc_data_core::{Grid, Pair};

    #[test]
    fn test_parse_load_args() {
        let args = Args::try_parse_from([
            "arc-data",
            "--log-level",
            "debug",
            "load",
            "--partition",
            "rearc",
            "--stream",
            "--batch-size",
            "32",
        ])
        .unwrap();

        assert_eq!(args.log_level, "debug");
        match args.command {
            Command::Load {
                partition,
                stream,
                batch_size,
            } => {
                assert_eq!(partition.as_deref(), Some("rearc"));
                assert!(stream);
                assert_eq!(batch_size, Some(32));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_render_requires_id() {
        assert!(Args::try_parse_from(["arc-data", "render"]).is_err());
    }

    #[test]
    fn test_pack_writes_sorted_shard() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("tasks.json");
        std::fs::write(
            &input,
            r#"{
                "b": {"train": [{"input": [[1]], "output": [[2]]}], "test": [{"input": [[3]]}]},
                "a": {"train": [{"input": [[4]], "output": [[5]]}], "test": [{"input": [[6]], "output": [[7]]}]}
            }"#,
        )
        .unwrap();
        let output = temp.path().join("out").join("custom.parquet");

        let rows = pack(&input, &output, ShardCompression::None, 1).unwrap();
        assert_eq!(rows, 2);

        let storage = LocalStorage::at(temp.path().join("out")).unwrap();
        let samples = read_shard(&storage, Path::new("custom.parquet")).unwrap();
        assert_eq!(samples[0].0, "a");
        assert_eq!(samples[1].0, "b");
        assert_eq!(
            samples[1].1.train[0],
            Pair::new(Grid::new(vec![vec![1]]), Grid::new(vec![vec![2]]))
        );
        assert!(samples[1].1.test[0].output.is_none());

        let mut summary = Summary::default();
        samples.iter().for_each(|(_, task)| summary.add(task));
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.unsolved, 1);
    }

    #[test]
    fn test_pack_rejects_bad_json() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("tasks.json");
        std::fs::write(&input, "[1, 2, 3]").unwrap();

        let err = pack(&input, &temp.path().join("x.parquet"), ShardCompression::Snappy, 10)
            .unwrap_err();
        assert!(err.is_decode());
    }
}
