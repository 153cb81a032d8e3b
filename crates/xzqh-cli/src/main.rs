//! xzqh - Build and query compact administrative division datasets
//!
//! This tool compiles a JSON province/city/county tree into the binary
//! payload format and answers list, detail, and search queries against it.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;
use xzqh_core::codec::DEFAULT_MAX_NAME_LEN;
use xzqh_core::{
    DecoderConfig, Encoder, EncoderConfig, Instance, Loader, RegionDetail, RegionEntry,
    SourceRegion, ABSENT,
};

/// Build and query compact administrative division datasets
#[derive(Parser, Debug)]
#[command(name = "xzqh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a JSON region tree into a binary payload
    Build(BuildArgs),
    /// List all provinces
    Provinces(DataArgs),
    /// List the cities of a province
    Cities {
        #[command(flatten)]
        data: DataArgs,
        /// Province index
        #[arg(allow_negative_numbers = true)]
        province: i64,
    },
    /// List the counties of a city
    Counties {
        #[command(flatten)]
        data: DataArgs,
        /// Province index
        #[arg(allow_negative_numbers = true)]
        province: i64,
        /// City index within the province
        #[arg(allow_negative_numbers = true)]
        city: i64,
    },
    /// Show name, code, and coordinates of one region
    Detail {
        #[command(flatten)]
        data: DataArgs,
        /// Province index
        #[arg(allow_negative_numbers = true)]
        province: i64,
        /// City index within the province
        #[arg(allow_negative_numbers = true)]
        city: Option<i64>,
        /// County index within the city
        #[arg(allow_negative_numbers = true)]
        county: Option<i64>,
    },
    /// Find regions by exact name
    Search {
        #[command(flatten)]
        data: DataArgs,
        /// Name to look for
        name: String,
    },
    /// Show node counts and coordinate coverage
    Stats {
        #[command(flatten)]
        data: DataArgs,
        /// Also list every region without a coordinate
        #[arg(long)]
        missing: bool,
    },
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// JSON file holding an array of province trees
    #[arg(short, long)]
    input: PathBuf,

    /// Output path for the binary payload
    #[arg(short, long, default_value = "xzqh.bin")]
    output: PathBuf,

    /// Overwrite an existing output file
    #[arg(long)]
    force: bool,

    /// Fixed code width (inferred from the first province when omitted)
    #[arg(long)]
    code_width: Option<u8>,
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Path to the binary payload
    #[arg(short, long, env = "XZQH_DATA", default_value = "xzqh.bin")]
    data: PathBuf,

    /// Longest accepted region name, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_NAME_LEN)]
    max_name_len: usize,

    /// Skip verifying the payload checksum
    #[arg(long)]
    skip_checksum: bool,
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable columns
    Text,
    /// Pretty-printed JSON
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(&cli)
}

/// Dispatch a parsed command
fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Build(args) => {
            let written = build(args)?;
            println!("Wrote {} bytes to {}", written, args.output.display());
            Ok(())
        }
        Command::Provinces(data) => with_instance(data, |instance| {
            print_entries(cli.format, &instance.provinces()?)
        }),
        Command::Cities { data, province } => with_instance(data, |instance| {
            print_entries(cli.format, &instance.cities(*province)?)
        }),
        Command::Counties {
            data,
            province,
            city,
        } => with_instance(data, |instance| {
            print_entries(cli.format, &instance.counties(*province, *city)?)
        }),
        Command::Detail {
            data,
            province,
            city,
            county,
        } => with_instance(data, |instance| {
            let detail = instance.detail(
                *province,
                city.unwrap_or(ABSENT),
                county.unwrap_or(ABSENT),
            )?;
            print_detail(cli.format, &detail)
        }),
        Command::Search { data, name } => with_instance(data, |instance| {
            let hits = instance.search(name)?;
            if cli.format == OutputFormat::Json {
                return print_json(&hits);
            }
            if hits.is_empty() {
                println!("No location found with name: {}", name);
            }
            for hit in &hits {
                let lineage: Vec<&str> = hit.lineage.iter().map(|e| e.name.as_str()).collect();
                println!("Found match ({}):", hit.path);
                println!("{}", lineage.join(" -> "));
                println!("Code: {}", hit.detail.code);
                println!("Coordinates: {}", format_coordinates(&hit.detail));
                println!("{}", "-".repeat(50));
            }
            Ok(())
        }),
        Command::Stats { data, missing } => with_instance(data, |instance| {
            let stats = instance.stats()?;
            let missing = if *missing {
                Some(instance.missing_coordinates()?)
            } else {
                None
            };

            if cli.format == OutputFormat::Json {
                #[derive(Serialize)]
                struct Report<'a> {
                    stats: &'a xzqh_core::IndexStats,
                    coverage: f64,
                    #[serde(skip_serializing_if = "Option::is_none")]
                    missing: Option<&'a Vec<xzqh_core::MissingCoordinate>>,
                }
                return print_json(&Report {
                    stats: &stats,
                    coverage: stats.coverage(),
                    missing: missing.as_ref(),
                });
            }

            println!("provinces:        {:>8}", stats.provinces);
            println!("cities:           {:>8}", stats.cities);
            println!("counties:         {:>8}", stats.counties);
            println!("with coordinates: {:>8}", stats.with_coordinates);
            println!("coverage:         {:>7.2}%", stats.coverage());

            if let Some(missing) = missing {
                println!();
                println!("{} regions without coordinates:", missing.len());
                for region in &missing {
                    println!("  [{:8}] {} - {}", region.level, region.code, region.lineage);
                }
            }
            Ok(())
        }),
    }
}

/// Load the dataset, run `query`, then destroy the instance
fn with_instance<F>(data: &DataArgs, query: F) -> Result<()>
where
    F: FnOnce(&Instance) -> Result<()>,
{
    let mut instance = open(data)?;
    let result = query(&instance);
    instance.destroy();
    result
}

/// Load a payload file with the decoder settings from the command line
fn open(data: &DataArgs) -> Result<Instance> {
    let config = DecoderConfig::new()
        .max_name_len(data.max_name_len)
        .verify_checksum(!data.skip_checksum);

    let instance = Loader::new()
        .decoder_config(config)
        .load_file(&data.data)
        .with_context(|| format!("Failed to load dataset: {}", data.data.display()))?;

    debug!("Loaded {:?}", instance);
    Ok(instance)
}

/// Compile the input JSON and write the payload, returning its size
fn build(args: &BuildArgs) -> Result<usize> {
    let json = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;
    let regions: Vec<SourceRegion> = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse region tree: {}", args.input.display()))?;

    info!("Read {} provinces from {}", regions.len(), args.input.display());

    let mut config = EncoderConfig::new();
    if let Some(width) = args.code_width {
        config = config.code_width(width);
    }
    let payload = Encoder::with_config(config)
        .encode(&regions)
        .context("Failed to encode region tree")?;

    write_payload(&args.output, &payload, args.force)?;
    Ok(payload.len())
}

/// Write a payload to disk, refusing to clobber without `force`
fn write_payload(output_path: &Path, payload: &[u8], force: bool) -> Result<()> {
    // Create parent directories
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }

    let mut file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

    file.write_all(payload)
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}

fn print_entries(format: OutputFormat, entries: &[RegionEntry]) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => {
            for entry in entries {
                println!("{:>4}  {}  {}", entry.index, entry.code, entry.name);
            }
            Ok(())
        }
    }
}

fn print_detail(format: OutputFormat, detail: &RegionDetail) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(detail),
        OutputFormat::Text => {
            println!("Name: {}", detail.name);
            println!("Code: {}", detail.code);
            println!("Coordinates: {}", format_coordinates(detail));
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn format_coordinates(detail: &RegionDetail) -> String {
    match (detail.lng, detail.lat) {
        (Some(lng), Some(lat)) => format!("{:.6}, {:.6}", lng, lat),
        _ => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SAMPLE_JSON: &str = r#"[
        {
            "code": "110000",
            "name": "北京市",
            "level": "province",
            "children": [
                {
                    "code": "110100",
                    "name": "市辖区",
                    "level": "prefecture",
                    "children": [
                        {
                            "code": "110101",
                            "name": "东城区",
                            "level": "county",
                            "center": {"longitude": 116.41, "latitude": 39.92}
                        }
                    ]
                }
            ]
        }
    ]"#;

    fn build_sample(dir: &TempDir) -> BuildArgs {
        let input = dir.path().join("xzqh.json");
        fs::write(&input, SAMPLE_JSON).unwrap();
        BuildArgs {
            input,
            output: dir.path().join("out").join("xzqh.bin"),
            force: false,
            code_width: None,
        }
    }

    fn data_args(path: PathBuf) -> DataArgs {
        DataArgs {
            data: path,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            skip_checksum: false,
        }
    }

    #[test]
    fn test_build_then_query() {
        let dir = TempDir::new().unwrap();
        let args = build_sample(&dir);

        let written = build(&args).unwrap();
        assert_eq!(fs::metadata(&args.output).unwrap().len() as usize, written);

        let mut instance = open(&data_args(args.output.clone())).unwrap();
        assert_eq!(instance.provinces().unwrap()[0].name, "北京市");
        assert_eq!(instance.counties(0, 0).unwrap()[0].code, "110101");

        let detail = instance.detail(0, 0, 0).unwrap();
        assert_eq!(format_coordinates(&detail), "116.410000, 39.920000");
        assert_eq!(
            format_coordinates(&instance.detail(0, ABSENT, ABSENT).unwrap()),
            "N/A"
        );

        instance.destroy();
        assert!(instance.provinces().is_err());
    }

    #[test]
    fn test_build_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let mut args = build_sample(&dir);

        build(&args).unwrap();
        let err = build(&args).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        args.force = true;
        assert!(build(&args).is_ok());
    }

    #[test]
    fn test_build_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        let args = build_sample(&dir);
        fs::write(&args.input, "{not json").unwrap();
        assert!(build(&args).is_err());
        assert!(!args.output.exists());
    }

    #[test]
    fn test_open_rejects_corrupt_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        fs::write(&path, b"XZQH\x01").unwrap();

        let err = open(&data_args(path)).unwrap_err();
        assert!(err.to_string().contains("Failed to load dataset"));
    }

    #[test]
    fn test_parse_detail_args() {
        let cli = Cli::try_parse_from(["xzqh", "detail", "--data", "a.bin", "3", "1"]).unwrap();
        match cli.command {
            Command::Detail {
                data,
                province,
                city,
                county,
            } => {
                assert_eq!(data.data, PathBuf::from("a.bin"));
                assert_eq!(province, 3);
                assert_eq!(city, Some(1));
                assert_eq!(county, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_negative_index() {
        let cli = Cli::try_parse_from(["xzqh", "cities", "-2"]).unwrap();
        assert!(matches!(cli.command, Command::Cities { province: -2, .. }));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
