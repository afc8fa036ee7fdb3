use arch::imm::ImmTable;
use std::num::ParseIntError;
use std::process::ExitCode;
use wvasm::{listing, source, Config, Error};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {author}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(author, version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Print debug logs
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Resolve addresses of a matched listing
    Build(BuildArgs),

    /// Generate the immediate-cost table
    Imms {
        /// Output file
        #[clap(short, long, default_value = "imms.json")]
        output: String,
    },
}

#[derive(Debug, clap::Args)]
struct BuildArgs {
    /// Input listing
    #[clap(default_value = "main.s")]
    input: String,

    /// Output listing
    #[clap(short, long, default_value = "main.lst")]
    output: String,

    /// Immediate table (generated when omitted)
    #[clap(long)]
    imms: Option<String>,

    /// Config file (YAML)
    #[clap(short, long)]
    config: Option<String>,

    /// Starting address
    #[clap(long, value_parser = parse_with_prefix)]
    start: Option<u32>,

    /// Padding bound of the first attempt
    #[clap(long)]
    buffer: Option<u32>,

    /// Budget of every bounded attempt [ms]
    #[clap(long)]
    timeout: Option<u64>,

    /// Reserve the longest sequence for every jump instead of solving
    #[clap(long)]
    no_optimize: bool,

    /// Write label addresses (YAML)
    #[clap(long)]
    symbols: Option<String>,

    /// Dump addressed code
    #[clap(short, long)]
    dump: bool,
}

fn parse_with_prefix(s: &str) -> Result<u32, ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b") {
        u32::from_str_radix(bin, 2)
    } else {
        s.parse()
    }
}

fn main() -> ExitCode {
    use clap::Parser;

    let args: Args = Args::parse();
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::new().filter_or("WVASM_LOG", "info"));
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    println!("WVASM Layout Assembler");

    match args.command {
        Command::Build(build_args) => {
            let mut source = String::new();
            match build(&build_args, &mut source) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    e.print_diag(&build_args.input, &source);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Imms { output } => match imms(&output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                e.print_diag(&output, "");
                ExitCode::FAILURE
            }
        },
    }
}

fn load_config(args: &BuildArgs) -> Result<Config, Error> {
    let mut config = match &args.config {
        Some(path) => {
            println!("  < {}", path);
            Config::load(path)?
        }
        None => Config::default(),
    };
    if let Some(start) = args.start {
        config.starting_address = start;
    }
    if let Some(buffer) = args.buffer {
        config.buffer = buffer;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_ms = Some(timeout);
    }
    if args.no_optimize {
        config.optimize = false;
    }
    Ok(config)
}

fn build(args: &BuildArgs, source: &mut String) -> Result<(), Error> {
    println!("1. Read Config and Listing");
    let config = load_config(args)?;
    println!("  < {}", args.input);
    *source = std::fs::read_to_string(&args.input)
        .map_err(|e| Error::FileOpen(args.input.clone(), e))?;
    let program = source::parse(source, &config)?;

    println!("2. Load Immediate Table");
    let table = match &args.imms {
        Some(path) => {
            println!("  < {}", path);
            ImmTable::load(path)?
        }
        None => ImmTable::generate(),
    };

    println!("3. Resolve Addresses");
    let assembled = wvasm::assemble(program, &table, &config)?;

    println!("4. Write Listing");
    println!("  > {}", args.output);
    std::fs::write(&args.output, listing::render(&assembled))
        .map_err(|e| Error::FileWrite(args.output.clone(), e))?;
    if let Some(path) = &args.symbols {
        println!("  > {}", path);
        std::fs::write(path, listing::SymbolMap::new(&assembled).to_yaml())
            .map_err(|e| Error::FileWrite(path.clone(), e))?;
    }

    if args.dump {
        listing::dump(&assembled);
    }
    Ok(())
}

fn imms(output: &str) -> Result<(), Error> {
    println!("1. Search Immediate Sequences");
    let table = ImmTable::generate();
    println!(
        "  {} values, {}..={} words",
        table.coverage(),
        table.shortest(),
        table.longest()
    );

    println!("2. Write Table");
    println!("  > {}", output);
    table.save(output)?;
    Ok(())
}
