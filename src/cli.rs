//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_scenario_adapter::JsonScenarioAdapter;
use crate::adapters::json_snapshot_adapter::JsonSnapshotAdapter;
use crate::domain::error::ScenarioMapError;
use crate::domain::evaluation::{group_by_status, ScenarioEvaluation, ScenarioStatus};
use crate::domain::field_parser;
use crate::domain::filter::{FilterError, Target};
use crate::domain::market_data::{IndicatorSpec, ParsedMarketData};
use crate::domain::resolver::resolve;
use crate::domain::scenario::{validate_scenario, CompiledScenario, Scenario};
use crate::domain::scenario_eval::ScenarioEngine;
use crate::domain::settings::{
    build_engine_settings, build_indicator_spec, validate_engine_config, EngineSettings,
};
use crate::ports::data_port::MarketDataPort;
use crate::ports::scenario_port::ScenarioPort;

#[derive(Parser, Debug)]
#[command(
    name = "scenariomap",
    about = "Evaluate trading scenarios against multi-timeframe market data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Where market data comes from: a JSON snapshot file or a directory of CSV bars.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct DataSource {
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    /// Directory of `<SYMBOL>_<TF>.csv` bar histories
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate scenarios against market data
    Evaluate {
        #[arg(short, long)]
        scenarios: PathBuf,
        #[command(flatten)]
        source: DataSource,
        /// Only this symbol (default: every symbol in the source)
        #[arg(long)]
        symbol: Option<String>,
        /// Only this scenario id
        #[arg(long)]
        scenario: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a scenario file
    Validate {
        #[arg(short, long)]
        scenarios: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Resolve field expressions such as `1D_P0_sma_89 * 0.99`
    Resolve {
        #[command(flatten)]
        source: DataSource,
        #[arg(long)]
        symbol: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(required = true)]
        expressions: Vec<String>,
    },
    /// Build snapshots from CSV bar histories
    Snapshot {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Evaluations for one symbol, as written by `evaluate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub evaluations: Vec<ScenarioEvaluation>,
    /// Scenario ids per status.
    pub by_status: BTreeMap<ScenarioStatus, Vec<String>>,
}

impl EvaluationReport {
    pub fn new(data: &ParsedMarketData, evaluations: Vec<ScenarioEvaluation>) -> Self {
        let by_status = group_by_status(&evaluations)
            .into_iter()
            .map(|(status, evals)| {
                (
                    status,
                    evals.iter().map(|e| e.scenario_id.clone()).collect(),
                )
            })
            .collect();
        Self {
            symbol: data.symbol.clone(),
            timestamp: data.timestamp,
            evaluations,
            by_status,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Evaluate {
            scenarios,
            source,
            symbol,
            scenario,
            config,
            output,
        } => run_evaluate(
            &scenarios,
            &source,
            symbol.as_deref(),
            scenario.as_deref(),
            config.as_ref(),
            output.as_ref(),
        ),
        Command::Validate { scenarios, config } => run_validate(&scenarios, config.as_ref()),
        Command::Resolve {
            source,
            symbol,
            config,
            expressions,
        } => run_resolve(&source, &symbol, config.as_ref(), &expressions),
        Command::Snapshot {
            data_dir,
            symbol,
            config,
            output,
        } => run_snapshot(&data_dir, symbol.as_deref(), config.as_ref(), output.as_ref()),
    }
}

fn fail(err: ScenarioMapError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

/// Load the INI config, or an empty one when no path is given.
pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ScenarioMapError> {
    match path {
        None => Ok(FileConfigAdapter::empty()),
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            FileConfigAdapter::from_file(path).map_err(|e| ScenarioMapError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })
        }
    }
}

pub fn load_settings(
    config_path: Option<&PathBuf>,
) -> Result<(EngineSettings, IndicatorSpec), ScenarioMapError> {
    let config = load_config(config_path)?;
    Ok((build_engine_settings(&config)?, build_indicator_spec(&config)?))
}

pub fn open_data_source(
    source: &DataSource,
    spec: IndicatorSpec,
) -> Result<Box<dyn MarketDataPort>, ScenarioMapError> {
    match (&source.snapshot, &source.data_dir) {
        (Some(path), _) => {
            eprintln!("Loading snapshot from {}", path.display());
            Ok(Box::new(JsonSnapshotAdapter::from_file(path)?))
        }
        (None, Some(dir)) => {
            eprintln!("Reading bar histories from {}", dir.display());
            Ok(Box::new(CsvAdapter::new(dir.clone(), spec)))
        }
        (None, None) => Err(ScenarioMapError::SnapshotParse {
            reason: "either --snapshot or --data-dir is required".to_string(),
        }),
    }
}

fn resolve_symbols(
    port: &dyn MarketDataPort,
    symbol: Option<&str>,
) -> Result<Vec<String>, ScenarioMapError> {
    let symbols = match symbol {
        Some(s) => vec![s.to_string()],
        None => port.list_symbols()?,
    };
    if symbols.is_empty() {
        return Err(ScenarioMapError::NoData {
            symbol: "(any)".to_string(),
        });
    }
    Ok(symbols)
}

/// Evaluate the engine's scenarios for each symbol. A single `scenario_id`
/// is evaluated for every symbol, even one outside its instrument list.
pub fn evaluate_symbols(
    engine: &ScenarioEngine,
    port: &dyn MarketDataPort,
    symbols: &[String],
    scenario_id: Option<&str>,
) -> Result<Vec<EvaluationReport>, ScenarioMapError> {
    symbols
        .iter()
        .map(|symbol| {
            let data = port.load_snapshot(symbol)?;
            let evaluations = match scenario_id {
                Some(id) => vec![engine.evaluate(id, &data)],
                None => engine.evaluate_all(&data),
            };
            Ok(EvaluationReport::new(&data, evaluations))
        })
        .collect()
}

fn write_json<T: Serialize>(value: &T, output: Option<&PathBuf>) -> Result<(), ScenarioMapError> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    match output {
        Some(path) => {
            fs::write(path, json + "\n")?;
            eprintln!("Written to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub fn run_evaluate(
    scenarios_path: &PathBuf,
    source: &DataSource,
    symbol: Option<&str>,
    scenario_id: Option<&str>,
    config_path: Option<&PathBuf>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: settings
    let (settings, spec) = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Stage 2: scenarios
    eprintln!("Loading scenarios from {}", scenarios_path.display());
    let scenarios = match JsonScenarioAdapter::new(scenarios_path.clone()).load_scenarios() {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    for scenario in &scenarios {
        if let Err(e) = validate_scenario(scenario) {
            eprintln!("warning: {e}");
        }
    }
    let engine = ScenarioEngine::new(scenarios, settings);
    if let Some(id) = scenario_id {
        if engine.scenario(id).is_none() {
            let known: Vec<&str> = engine.scenario_ids().collect();
            eprintln!(
                "warning: scenario '{id}' not found, results will be NO_BIAS (known: {})",
                known.join(", ")
            );
        }
    }

    // Stage 3: market data
    let port = match open_data_source(source, spec) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let symbols = match resolve_symbols(port.as_ref(), symbol) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    // Stage 4: evaluate
    eprintln!(
        "Evaluating {} scenarios for {} symbols...",
        engine.len(),
        symbols.len()
    );
    let reports = match evaluate_symbols(&engine, port.as_ref(), &symbols, scenario_id) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    for report in &reports {
        let summary: Vec<String> = report
            .by_status
            .iter()
            .map(|(status, ids)| format!("{} {}", status, ids.len()))
            .collect();
        eprintln!("  {}: {}", report.symbol, summary.join(", "));
    }

    // Stage 5: output
    match write_json(&reports, output_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn describe_filter_error(error: &FilterError) -> String {
    match error {
        FilterError::Expression { id, input, source } => format!(
            "filter '{}':\n{}",
            id,
            indent(&source.display_with_context(input), "      ")
        ),
        other => other.to_string(),
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_target(target: &Target) -> String {
    match target {
        Target::Value(expr) => expr.to_string(),
        Target::Range { min, max } => format!("[{}, {}]", min, max),
    }
}

/// Validate every scenario, printing what each compiles to. Returns the
/// first error found.
pub fn validate_scenarios(scenarios: &[Scenario]) -> Result<(), ScenarioMapError> {
    let mut first_error = None;

    for scenario in scenarios {
        let compiled = CompiledScenario::compile(scenario.clone());
        match validate_scenario(scenario) {
            Ok(()) => eprintln!(
                "\n{} ({} filters): ok",
                scenario.id,
                compiled.total_filters()
            ),
            Err(e) => {
                eprintln!("\n{}: {}", scenario.id, e);
                first_error.get_or_insert(e);
            }
        }

        for filter in &compiled.filters {
            eprintln!(
                "    {}: {} {} {}",
                filter.id,
                filter.subject,
                filter.operator,
                describe_target(&filter.target)
            );
        }
        for rejected in &compiled.rejected {
            eprintln!("    error: {}", describe_filter_error(&rejected.error));
        }
        match compiled.direction {
            Some((direction, source)) => {
                eprintln!("    direction: {:?} (from {:?})", direction, source)
            }
            None => eprintln!("    direction: none"),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

pub fn run_validate(scenarios_path: &PathBuf, config_path: Option<&PathBuf>) -> ExitCode {
    let config_check = load_config(config_path).and_then(|config| {
        validate_engine_config(&config)?;
        build_indicator_spec(&config).map(|_| ())
    });
    if let Err(e) = config_check {
        return fail(e);
    }

    eprintln!("Validating scenarios: {}", scenarios_path.display());
    let scenarios = match JsonScenarioAdapter::new(scenarios_path.clone()).load_scenarios() {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    match validate_scenarios(&scenarios) {
        Ok(()) => {
            eprintln!("\n{} scenarios are valid.", scenarios.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Parse and resolve each expression. Parse errors abort; unresolvable
/// expressions resolve to `None`.
pub fn resolve_expressions(
    data: &ParsedMarketData,
    expressions: &[String],
) -> Result<Vec<(String, Option<f64>)>, ScenarioMapError> {
    expressions
        .iter()
        .map(|input| {
            let expr = field_parser::parse(input).map_err(|e| {
                eprintln!("error: {}", e.display_with_context(input));
                ScenarioMapError::from(e)
            })?;
            Ok((expr.to_string(), resolve(&expr, data)))
        })
        .collect()
}

pub fn run_resolve(
    source: &DataSource,
    symbol: &str,
    config_path: Option<&PathBuf>,
    expressions: &[String],
) -> ExitCode {
    let (_, spec) = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let data = match open_data_source(source, spec).and_then(|port| port.load_snapshot(symbol)) {
        Ok(d) => d,
        Err(e) => return fail(e),
    };

    match resolve_expressions(&data, expressions) {
        Ok(resolved) => {
            for (expr, value) in resolved {
                match value {
                    Some(v) => println!("{expr} = {v}"),
                    None => println!("{expr} = (no value)"),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => ExitCode::from(&e),
    }
}

pub fn build_snapshots(
    port: &dyn MarketDataPort,
    symbols: &[String],
) -> Result<Vec<ParsedMarketData>, ScenarioMapError> {
    symbols.iter().map(|s| port.load_snapshot(s)).collect()
}

pub fn run_snapshot(
    data_dir: &PathBuf,
    symbol: Option<&str>,
    config_path: Option<&PathBuf>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    let (_, spec) = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    eprintln!("Reading bar histories from {}", data_dir.display());
    let port = CsvAdapter::new(data_dir.clone(), spec);
    let snapshots = match resolve_symbols(&port, symbol).and_then(|s| build_snapshots(&port, &s)) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    for snapshot in &snapshots {
        let timeframes: Vec<String> = snapshot
            .timeframes
            .iter()
            .map(|(tf, series)| format!("{} ({} periods)", tf, series.depth()))
            .collect();
        eprintln!("  {}: {}", snapshot.symbol, timeframes.join(", "));
    }

    let result = match snapshots.as_slice() {
        [single] => write_json(single, output_path),
        all => write_json(&all, output_path),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}
