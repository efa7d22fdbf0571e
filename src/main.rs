use std::error::Error as _;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{LevelFilter, info};

use pietcc::codegen::generate::{Layout, generate};
use pietcc::io::{self as pio, Error};
use pietcc::vm::interp::{self, Halt, Interpreter};
use pietcc::vm::reader::Reader;
use pietcc::vm::runtime::Runtime;

/// Compile byte streams into Piet images and run Piet images.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Log every decision at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Run(RunArgs),
}

/// Build an image that prints the given bytes
#[derive(Args)]
struct GenerateArgs {
    /// File to encode; if no such file exists, the argument itself is encoded
    #[arg(value_name = "INPUT")]
    source: String,

    /// Where to write the image
    output: PathBuf,

    #[command(flatten)]
    layout: Layout,

    /// Mask the payload so the program must be fed this key as input;
    /// repeat to use a different key for each recursion round
    #[arg(long = "input", value_name = "KEY")]
    keys: Vec<String>,

    /// Encode the resulting image this many more times
    #[arg(long, default_value_t = 0)]
    recurse: usize,

    #[command(flatten)]
    config: interp::Config,
}

/// Interpret an image
#[derive(Args)]
struct RunArgs {
    image: PathBuf,

    /// Where to write program output; stdout if omitted
    output: Option<PathBuf>,

    /// Bytes the program reads as input
    #[arg(long)]
    input: Option<String>,

    #[command(flatten)]
    config: interp::Config,

    /// Maximum steps per second; negative runs at full speed
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    speed: i64,

    /// Pixels per codel side; 0 detects it from the image
    #[arg(long, default_value_t = 1)]
    codel_size: usize,

    /// Read colors outside the palette as black instead of failing
    #[arg(long)]
    lenient: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(if cli.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let result = match cli.command {
        Command::Generate(args) => run_generate(args).map(|()| ExitCode::SUCCESS),
        Command::Run(args) => run_image(args),
    };
    result.unwrap_or_else(|err| {
        let mut line = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            line.push_str(": ");
            line.push_str(&cause.to_string());
            source = cause.source();
        }
        eprintln!("error: {line}");
        ExitCode::FAILURE
    })
}

fn run_generate(args: GenerateArgs) -> pio::Result<()> {
    let mut data = if Path::new(&args.source).exists() {
        fs::read(&args.source)?
    } else {
        args.source.into_bytes()
    };

    let mut grid = None;
    for round in 0..=args.recurse {
        let key = (!args.keys.is_empty()).then(|| args.keys[round % args.keys.len()].as_bytes());
        let image = generate(&data, key, args.layout)?;

        let input: Vec<u8> = key
            .map(|key| key.iter().copied().cycle().take(data.len()).collect())
            .unwrap_or_default();
        let (output, halt) = interp::interpret(&image, &input, args.config)?;
        if halt != Halt::Finished || output != data {
            return Err(Error::Unfaithful);
        }
        info!(
            "round {round}: {} bytes as a {}x{} image",
            data.len(),
            image.width(),
            image.height()
        );

        if round < args.recurse {
            data = pio::encode_png(&image)?;
        }
        grid = Some(image);
    }

    if let Some(grid) = grid {
        pio::save(&grid, &args.output)?;
    }
    Ok(())
}

fn run_image(args: RunArgs) -> pio::Result<ExitCode> {
    let mut grid = pio::load(&args.image, args.lenient)?;
    let codel_size = match args.codel_size {
        0 => Reader::new(grid.clone()).smallest_codel_side(),
        size => size,
    };
    if codel_size > 1 {
        info!("reading {codel_size}x{codel_size} pixels per codel");
        grid = grid.scale_down(codel_size);
    }

    let output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    let runtime = Runtime::new(output, args.input.unwrap_or_default().into_bytes());
    let mut interp =
        Interpreter::new(Reader::new(grid), runtime, args.config).ok_or(Error::EmptyImage)?;
    let halt = interp.run(args.speed)?;
    interp.runtime.output.flush()?;
    info!("halted after {} steps: {halt:?}", interp.iteration());

    Ok(match halt {
        Halt::Finished => ExitCode::SUCCESS,
        Halt::StepLimit => {
            eprintln!("error: step limit reached");
            ExitCode::from(2)
        }
    })
}
