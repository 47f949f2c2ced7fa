use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use zerosphere_carbon::engine::{areas_from_form, quantities_from_form};
use zerosphere_carbon::report::{pathway_cells, to_fixed, EMISSION_REPORT_FILE, PATHWAY_REPORT_FILE};
use zerosphere_carbon::view::{breakdown_slices, totals_bars};
use zerosphere_carbon::{
    parse_quantity, Config, FileStorage, InMemoryRemoteStore, LocalIdentity, PathwayInputs, Session, Strategy,
};

type CliSession = Session<FileStorage, LocalIdentity, InMemoryRemoteStore>;

#[derive(Parser, Debug)]
#[command(name = "zerosphere", about = "Mine emission, sink and offset pathway calculator")]
struct Cli {
    /// JSON config file; missing means defaults
    #[arg(long, default_value = "zerosphere.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute total emission, sink and net emission
    Emissions(EmissionArgs),
    /// Evaluate offset strategies for a budget
    Pathway(PathwayArgs),
    /// List recent saved calculations
    History {
        #[arg(long)]
        count: Option<usize>,
        /// List pathway snapshots instead
        #[arg(long)]
        pathways: bool,
    },
    /// Include or exclude a saved calculation from charts and exports
    Toggle {
        index: usize,
        #[arg(long)]
        exclude: bool,
    },
    /// Write the emission report CSV
    Export {
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Erase a saved history
    Clear {
        #[arg(long)]
        pathways: bool,
    },
}

/// Raw field values; anything unparsable counts as zero.
#[derive(Args, Debug)]
struct EmissionArgs {
    #[arg(long)]
    diesel: Option<String>,
    #[arg(long)]
    petrol: Option<String>,
    #[arg(long)]
    coal: Option<String>,
    #[arg(long)]
    lpg: Option<String>,
    #[arg(long)]
    ch4: Option<String>,
    #[arg(long)]
    n2o: Option<String>,
    #[arg(long)]
    forest: Option<String>,
    #[arg(long)]
    grassland: Option<String>,
    /// Append the result to the local history
    #[arg(long)]
    save: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Afforestation,
    Methane,
    Renewable,
}

impl From<StrategyArg> for Strategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Afforestation => Strategy::Afforestation,
            StrategyArg::Methane => Strategy::Methane,
            StrategyArg::Renewable => Strategy::Renewable,
        }
    }
}

#[derive(Args, Debug)]
struct PathwayArgs {
    #[arg(long, default_value = "")]
    fund: String,
    #[arg(long, default_value = "")]
    land: String,
    #[arg(long = "current-emission", default_value = "")]
    current_emission: String,
    /// Strategies to evaluate; all when omitted
    #[arg(long = "strategy", value_enum)]
    strategies: Vec<StrategyArg>,
    /// Strategies to leave out of the report
    #[arg(long, value_enum)]
    hide: Vec<StrategyArg>,
    /// Append the results to the local pathway history
    #[arg(long)]
    save: bool,
    /// Write the pathway report CSV
    #[arg(long)]
    report: Option<Option<PathBuf>>,
}

fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn write_report(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "report written");
    println!("wrote {}", path.display());
    Ok(())
}

fn run_emissions(session: &mut CliSession, args: EmissionArgs) {
    let fields = [
        ("diesel", &args.diesel),
        ("petrol", &args.petrol),
        ("coal", &args.coal),
        ("lpg", &args.lpg),
        ("ch4", &args.ch4),
        ("n2o", &args.n2o),
        ("forest", &args.forest),
        ("grassland", &args.grassland),
    ];
    let present: Vec<(&str, &str)> = fields
        .iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
        .collect();

    session.calculate_emissions(&quantities_from_form(present.iter().copied()));
    session.calculate_sink(&areas_from_form(present.iter().copied()));

    if let Some(breakdown) = session.breakdown() {
        for (label, value) in breakdown_slices(breakdown) {
            println!("{label},{}", to_fixed(value, 4));
        }
    }
    for (label, value) in totals_bars(session.total_emission(), session.total_sink()) {
        println!("{label},{}", to_fixed(value, 2));
    }

    if args.save {
        println!("{}", session.save_calculation());
    }
}

fn run_pathway(session: &mut CliSession, args: PathwayArgs) -> Result<()> {
    session.set_pathway_inputs(PathwayInputs {
        fund: parse_quantity(&args.fund),
        land: parse_quantity(&args.land),
        current_emission: parse_quantity(&args.current_emission),
    });

    let strategies: Vec<Strategy> = if args.strategies.is_empty() {
        Strategy::ALL.to_vec()
    } else {
        args.strategies.into_iter().map(Strategy::from).collect()
    };
    for strategy in strategies {
        let r = session.calculate_pathway(strategy);
        println!("{},{}", strategy.label(), pathway_cells(&r));
    }
    for hidden in args.hide {
        session.visibility.set(hidden.into(), false);
    }

    if args.save {
        println!("{}", session.save_pathway());
    }
    if let Some(out) = args.report {
        let path = out.unwrap_or_else(|| PathBuf::from(PATHWAY_REPORT_FILE));
        write_report(&path, &session.pathway_report())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(&cli.config).context("loading configuration")?;
    init_logging(&config);

    let storage = FileStorage::new(&config.data_dir);
    let mut session = Session::open(storage, LocalIdentity::new(), InMemoryRemoteStore::new());

    match cli.command {
        Command::Emissions(args) => run_emissions(&mut session, args),
        Command::Pathway(args) => run_pathway(&mut session, args)?,
        Command::History { count, pathways } => {
            let n = config.window(count);
            if pathways {
                let history = session.pathway_history();
                let start = history.window_start(n);
                for (i, p) in history.query_recent(n).iter().enumerate() {
                    let strategies: Vec<&str> = p.results().iter().map(|(s, _)| s.label()).collect();
                    println!("{},{},{},{}", start + i, p.included, p.timestamp, strategies.join("|"));
                }
            } else {
                let history = session.emission_history();
                let start = history.window_start(n);
                for (i, e) in history.query_recent(n).iter().enumerate() {
                    println!(
                        "{},{},{},{},{},{}",
                        start + i,
                        e.included,
                        e.timestamp,
                        to_fixed(e.emission, 2),
                        to_fixed(e.sink, 2),
                        to_fixed(e.net, 2)
                    );
                }
            }
        }
        Command::Toggle { index, exclude } => {
            session
                .set_included(index, !exclude)
                .with_context(|| format!("toggling entry {index}"))?;
        }
        Command::Export { count, out } => {
            let n = config.window(count);
            let path = out.unwrap_or_else(|| PathBuf::from(EMISSION_REPORT_FILE));
            write_report(&path, &session.emission_report(n))?;
        }
        Command::Clear { pathways } => {
            if pathways {
                session.clear_pathway_history()?;
            } else {
                session.clear_emission_history()?;
            }
        }
    }
    Ok(())
}
