use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use common::{config::Settings, observation::Implementation, plot::Plot};
use eyre::{Result, bail, eyre};
use sddmm_grid::{GridInput, GridPlot};
use sddmm_line::LinePlot;
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod run;

const MODULES: &[&str] = &["common", "sddmm", "sddmm_line", "sddmm_grid"];

#[derive(Parser)]
#[command(version, about = "Comparative GFLOPS charts for SDDMM benchmark results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Resolution of PNG output, at least 300
    #[arg(long, global = true)]
    dpi: Option<u32>,
    #[arg(short, long, global = true)]
    log: Vec<String>,
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// One chart per K from a markdown report
    Line {
        /// Markdown report
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long, default_value = ".")]
        outdir: PathBuf,
        /// Rows without this kernel's result are dropped
        #[arg(long, default_value = "zcx")]
        reference: Implementation,
    },
    /// All K in one grid figure from per-K CSV results
    Grid {
        #[arg(long)]
        k32: Option<PathBuf>,
        #[arg(long)]
        k64: Option<PathBuf>,
        #[arg(long)]
        k128: Option<PathBuf>,
        #[arg(long)]
        k256: Option<PathBuf>,
        #[arg(short, long, default_value = ".")]
        outdir: PathBuf,
        #[arg(long, default_value = "BSMR")]
        reference: Implementation,
        /// Moving average width over NNZ
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
        window: u64,
        #[arg(long, default_value_t = 100_000)]
        nnz_min: u64,
        #[arg(long, default_value_t = 2_000_000)]
        nnz_max: u64,
        /// Plot the raw rows
        #[arg(long, default_value_t = false)]
        no_smooth: bool,
    },
    /// Run every plot listed in a config file
    Run {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
        #[arg(short, long, default_value = ".")]
        outdir: PathBuf,
    },
}

fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("info".to_owned());
    let args = Cli::parse();

    let mut env_filter = EnvFilter::new(format!("sddmm_plot={log_level}"));
    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }
    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    let (file_layer, _guard) = match &args.log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(log_appender(path)?);
            (
                Some(layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(file_layer)
        .init();

    let mut settings = Settings::with_dpi(args.dpi);
    let (plots, outdir): (Vec<Box<dyn Plot>>, PathBuf) = match args.command {
        Commands::Line {
            file,
            outdir,
            reference,
        } => (vec![Box::new(LinePlot { file, reference }) as Box<dyn Plot>], outdir),
        Commands::Grid {
            k32,
            k64,
            k128,
            k256,
            outdir,
            reference,
            window,
            nnz_min,
            nnz_max,
            no_smooth,
        } => {
            let inputs = [(32, k32), (64, k64), (128, k128), (256, k256)]
                .into_iter()
                .filter_map(|(k, path)| path.map(|path| GridInput { k, path }))
                .collect::<Vec<_>>();
            if inputs.is_empty() {
                bail!("Pass at least one of --k32, --k64, --k128, --k256");
            }
            if nnz_min > nnz_max {
                bail!("--nnz-min {nnz_min} is above --nnz-max {nnz_max}");
            }
            let plot = GridPlot {
                inputs,
                reference,
                window: (!no_smooth).then_some(window as usize),
                nnz_range: Some((nnz_min, nnz_max)),
            };
            (vec![Box::new(plot) as Box<dyn Plot>], outdir)
        }
        Commands::Run { config, outdir } => {
            let config = common::config::Config::from_file(&config)?;
            if args.dpi.is_none() {
                settings = config.settings.clone();
            }
            println!("Running {}", config.name);
            (config.plots, outdir)
        }
    };

    match run::run_plots(&plots, &outdir, &settings) {
        Ok(reports) => {
            for (name, report) in &reports {
                for line in run::summary(name, report) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        Err(err) => {
            error!("{err:#?}");
            Err(err)
        }
    }
}

fn log_appender(path: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let name = path
        .file_name()
        .ok_or_else(|| eyre!("Log file {path:?} has no file name"))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok(tracing_appender::rolling::never(dir, name))
}
