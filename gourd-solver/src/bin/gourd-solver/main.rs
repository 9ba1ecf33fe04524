use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use gourd_solver::params::Emphasis;
use gourd_solver::results::Error;
use gourd_solver::results::GourdResult;
use gourd_solver::statistics::configure_statistic_logging;
use gourd_solver::Solver;
use log::error;
use log::info;
use log::LevelFilter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum EmphasisArg {
    #[default]
    Default,
    Counter,
    CpSolver,
    EasyCip,
    Feasibility,
    HardLp,
    Optimality,
}

impl From<EmphasisArg> for Emphasis {
    fn from(arg: EmphasisArg) -> Emphasis {
        match arg {
            EmphasisArg::Default => Emphasis::Default,
            EmphasisArg::Counter => Emphasis::Counter,
            EmphasisArg::CpSolver => Emphasis::CpSolver,
            EmphasisArg::EasyCip => Emphasis::EasyCip,
            EmphasisArg::Feasibility => Emphasis::Feasibility,
            EmphasisArg::HardLp => Emphasis::HardLp,
            EmphasisArg::Optimality => Emphasis::Optimality,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about, arg_required_else_help = true)]
struct Args {
    /// The instance to solve; the reader is chosen by the file extension ('*.cip' by default).
    instance_path: PathBuf,

    /// A settings file with parameter assignments, as written by `--save-settings`.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Writes the non-default parameter values to this file after applying all options.
    #[arg(long)]
    save_settings: Option<PathBuf>,

    /// An emphasis preset applied before the settings file.
    #[arg(long, value_enum, default_value_t)]
    emphasis: EmphasisArg,

    /// The time budget for the solver, given in seconds.
    #[arg(short = 't', long = "time-limit")]
    time_limit: Option<f64>,

    /// The node budget for the solver.
    #[arg(short = 'n', long = "node-limit")]
    node_limit: Option<i64>,

    /// Writes the best solution found to this file.
    #[arg(long)]
    sol: Option<PathBuf>,

    /// Enables log message output from the solver, including the progress display.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Enables logging of statistics from the solver.
    #[arg(short = 's', long = "log-statistics")]
    log_statistics: bool,
}

fn configure_logging(verbose: bool, log_statistics: bool) {
    if log_statistics {
        configure_statistic_logging("stat:", None, None, None);
    }
    let level_filter = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .filter_level(level_filter)
        .target(env_logger::Target::Stdout)
        .init();
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) => {
            error!("Execution failed, error: {e}");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn run() -> GourdResult<()> {
    let args = Args::parse();
    configure_logging(args.verbose, args.log_statistics);

    let mut solver = Solver::default();

    solver.set_emphasis(args.emphasis.into());
    if let Some(settings) = args.settings.as_deref() {
        solver.read_params(settings)?;
    }
    if let Some(time_limit) = args.time_limit {
        solver.params.set_real("limits/time", time_limit)?;
    }
    if let Some(node_limit) = args.node_limit {
        solver.params.set_long("limits/nodes", node_limit)?;
    }
    if let Some(path) = args.save_settings.as_deref() {
        solver.write_params(path, true, true)?;
    }

    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, solver.interrupt_flag())
            .map_err(|e| Error::InvalidData(format!("cannot register signal listener: {e}")))?;
    }

    solver.read_prob(&args.instance_path)?;
    info!("read problem from {}", args.instance_path.display());

    solver.solve()?;

    println!("status: {}", solver.status());
    if let Some(best) = solver.best_sol() {
        println!("objective: {}", solver.sol_orig_obj(best));
    }
    if args.sol.is_some() && solver.best_sol().is_some() {
        if let Some(path) = args.sol.as_deref() {
            solver.write_best_sol(path)?;
            info!("wrote best solution to {}", path.display());
        }
    }
    Ok(())
}
