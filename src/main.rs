// src/main.rs
mod logger;

use clap::{ArgAction, Parser, Subcommand};
use huffpack::frequency::symbol_label;
use huffpack::report::{Report, sha256_hex, sha256_reader};
use huffpack::{EncodingMap, FrequencyTable, build_tree};
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::info;

const COMPRESSED_EXT: &str = "huf";
const DECOMPRESSED_PREFIX: &str = "unhuf.";

#[derive(Parser)]
#[command(name = "huffpack", version = "0.1.0")]
#[command(about = "Huffman coding file compressor.", long_about = None)]
struct Cli {
    /// Print reports as JSON lines
    #[arg(long, global = true)]
    json: bool,
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file (default output: <file>.huf)
    Compress {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decompress a .huf file (default output: unhuf.<file>)
    Decompress {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the frequency table and code of every byte in a file
    Table { file: PathBuf },
    /// Show the encoding tree of a file, sideways
    Tree { file: PathBuf },
    /// Show the header and code table of a .huf file
    Inspect { file: PathBuf },
    /// Compress and decompress in memory and compare digests
    Verify { file: PathBuf },
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let span = tracing::info_span!("command_execution", command = ?std::env::args().collect::<Vec<_>>());
    let _enter = span.enter();

    match cli.command {
        Commands::Compress { file, output } => {
            let output = output.unwrap_or_else(|| compressed_name(&file));
            let report = compress_file(&file, &output)?;
            emit(&report, cli.json)
        }
        Commands::Decompress { file, output } => {
            let output = output.unwrap_or_else(|| decompressed_name(&file));
            let report = decompress_file(&file, &output)?;
            emit(&report, cli.json)
        }
        Commands::Table { file } => show_table(&file),
        Commands::Tree { file } => show_tree(&file),
        Commands::Inspect { file } => inspect_file(&file),
        Commands::Verify { file } => {
            let report = verify_file(&file)?;
            emit(&report, cli.json)
        }
    }
}

fn compressed_name(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".");
    name.push(COMPRESSED_EXT);
    PathBuf::from(name)
}

// poem.txt.huf -> unhuf.poem.txt, in the same directory
fn decompressed_name(file: &Path) -> PathBuf {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(&format!(".{COMPRESSED_EXT}"))
        .unwrap_or(&name);
    file.with_file_name(format!("{DECOMPRESSED_PREFIX}{stem}"))
}

// Writes into a fresh temporary file beside `path` that replaces it only on success.
// On failure the temporary file is dropped, which deletes it.
fn write_atomically<T>(
    path: &Path,
    write: impl FnOnce(BufWriter<&File>) -> huffpack::Result<T>,
) -> io::Result<T> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir)?;
    let value = write(BufWriter::new(temp.as_file()))?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(value)
}

fn compress_file(input: &Path, output: &Path) -> io::Result<Report> {
    let mut source = File::open(input)?;
    let stats = write_atomically(output, |sink| huffpack::compress(&mut source, sink))?;

    let mut report = Report::new("compress", input, Some(output));
    report.input_bytes = stats.input_bytes;
    report.output_bytes = fs::metadata(output)?.len();
    report.distinct_symbols = stats.distinct_symbols;
    report.payload_bits = stats.payload_bits;
    report.sha256 = sha256_reader(File::open(input)?)?;

    info!(input = %input.display(), output = %output.display(), "compressed");
    Ok(report)
}

fn decompress_file(input: &Path, output: &Path) -> io::Result<Report> {
    let source = BufReader::new(File::open(input)?);
    let stats = write_atomically(output, |sink| huffpack::decompress(source, sink))?;

    let mut report = Report::new("decompress", input, Some(output));
    report.input_bytes = fs::metadata(input)?.len();
    report.output_bytes = stats.output_bytes;
    report.distinct_symbols = stats.distinct_symbols;
    report.payload_bits = stats.payload_bits;
    report.sha256 = sha256_reader(File::open(output)?)?;

    info!(input = %input.display(), output = %output.display(), "decompressed");
    Ok(report)
}

fn verify_file(input: &Path) -> io::Result<Report> {
    let original = fs::read(input)?;
    let packed = huffpack::compress_bytes(&original)?;
    let restored = huffpack::decompress_bytes(&packed)?;

    let before = sha256_hex(&original);
    let after = sha256_hex(&restored);
    if before != after {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("round trip mismatch: {before} != {after}"),
        ));
    }

    let mut report = Report::new("verify", input, None);
    report.input_bytes = original.len() as u64;
    report.output_bytes = packed.len() as u64;
    report.distinct_symbols = FrequencyTable::from_bytes(&original).len();
    report.sha256 = before;
    info!(input = %input.display(), "round trip verified");
    Ok(report)
}

fn show_table(input: &Path) -> io::Result<()> {
    let table = FrequencyTable::from_reader(File::open(input)?)?;
    if table.is_empty() {
        println!("Can't build a code; {} is empty.", input.display());
        return Ok(());
    }
    let map = EncodingMap::from_tree(&build_tree(&table)?);
    println!("{:>6}  {:>9}  code", "byte", "count");
    for (symbol, count) in table.iter() {
        println!(
            "{:>6}  {:>9}  {}",
            symbol_label(symbol),
            count,
            map.get(symbol).unwrap_or("-")
        );
    }
    Ok(())
}

fn show_tree(input: &Path) -> io::Result<()> {
    let table = FrequencyTable::from_reader(File::open(input)?)?;
    if table.is_empty() {
        println!("Can't build a tree; {} is empty.", input.display());
        return Ok(());
    }
    print!("{}", build_tree(&table)?.render_sideways());
    Ok(())
}

fn inspect_file(input: &Path) -> io::Result<()> {
    let seen = huffpack::inspect(BufReader::new(File::open(input)?))?;
    println!("header: {}", seen.header);
    println!(
        "header check: {}",
        if seen.header_is_canonical() { "ok" } else { "not canonical" }
    );
    println!("symbols: {}", seen.map.len());
    println!("tree height: {}", seen.tree.height());
    println!("payload: {} bits", seen.payload_bits);
    for (symbol, code) in seen.map.iter() {
        println!("{:>6}  {}", symbol_label(symbol), code);
    }
    Ok(())
}

fn emit(report: &Report, json: bool) -> io::Result<()> {
    if json {
        let line = report.to_json().map_err(io::Error::other)?;
        println!("{line}");
    } else {
        let target = report
            .output
            .as_deref()
            .map(|o| format!(" -> {o}"))
            .unwrap_or_default();
        println!(
            "{}: {}{} ({} bytes -> {} bytes, ratio {:.3})",
            report.action,
            report.input,
            target,
            report.input_bytes,
            report.output_bytes,
            report.ratio()
        );
    }
    Ok(())
}
