//! Engine settings and their validation.
//!
//! Settings come from the `[engine]` and `[indicators]` sections of the INI
//! config. Every key is optional; missing keys take the defaults below.
//! Present keys must parse and be in range.

use crate::domain::error::ScenarioMapError;
use crate::domain::filter_eval::DEFAULT_EQUALITY_TOLERANCE;
use crate::domain::market_data::IndicatorSpec;
use crate::ports::config_port::ConfigPort;

const ENGINE: &str = "engine";
const INDICATORS: &str = "indicators";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Pass rate at which a partial match still gets a directional call.
    pub partial_match_threshold: f64,
    pub equality_tolerance: f64,
    pub default_risk_score: f64,
    /// Used when a scenario sets no `baseProbability`.
    pub default_base_probability: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            partial_match_threshold: 0.5,
            equality_tolerance: DEFAULT_EQUALITY_TOLERANCE,
            default_risk_score: 50.0,
            default_base_probability: 50.0,
        }
    }
}

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), ScenarioMapError> {
    build_engine_settings(config).map(|_| ())
}

pub fn build_engine_settings(config: &dyn ConfigPort) -> Result<EngineSettings, ScenarioMapError> {
    let defaults = EngineSettings::default();

    let partial_match_threshold = read_double(
        config,
        ENGINE,
        "partial_match_threshold",
        defaults.partial_match_threshold,
    )?;
    if partial_match_threshold <= 0.0 || partial_match_threshold > 1.0 {
        return Err(invalid(
            ENGINE,
            "partial_match_threshold",
            "partial_match_threshold must be in (0, 1]",
        ));
    }

    let equality_tolerance =
        read_double(config, ENGINE, "equality_tolerance", defaults.equality_tolerance)?;
    if equality_tolerance < 0.0 {
        return Err(invalid(
            ENGINE,
            "equality_tolerance",
            "equality_tolerance must be non-negative",
        ));
    }

    let default_risk_score =
        read_double(config, ENGINE, "default_risk_score", defaults.default_risk_score)?;
    check_score("default_risk_score", default_risk_score)?;

    let default_base_probability = read_double(
        config,
        ENGINE,
        "default_base_probability",
        defaults.default_base_probability,
    )?;
    check_score("default_base_probability", default_base_probability)?;

    Ok(EngineSettings {
        partial_match_threshold,
        equality_tolerance,
        default_risk_score,
        default_base_probability,
    })
}

/// Indicator lengths for the snapshot builder.
pub fn build_indicator_spec(config: &dyn ConfigPort) -> Result<IndicatorSpec, ScenarioMapError> {
    let defaults = IndicatorSpec::default();

    let sma = read_lengths(config, "sma", defaults.sma)?;
    let sma_low = read_lengths(config, "sma_low", defaults.sma_low)?;
    let ema = read_lengths(config, "ema", defaults.ema)?;
    let rsi = read_lengths(config, "rsi", defaults.rsi)?;

    let (default_period, default_mult) = defaults.bollinger.unwrap_or((20, 200));
    let period = read_int(config, INDICATORS, "bollinger_period", default_period as i64)?;
    let bollinger = if period == 0 {
        None
    } else if period < 0 {
        return Err(invalid(
            INDICATORS,
            "bollinger_period",
            "bollinger_period must be non-negative",
        ));
    } else {
        let mult = read_double(
            config,
            INDICATORS,
            "bollinger_mult",
            default_mult as f64 / 100.0,
        )?;
        if mult <= 0.0 {
            return Err(invalid(
                INDICATORS,
                "bollinger_mult",
                "bollinger_mult must be positive",
            ));
        }
        Some((period as usize, (mult * 100.0).round() as u32))
    };

    Ok(IndicatorSpec {
        sma,
        sma_low,
        ema,
        rsi,
        bollinger,
    })
}

fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, ScenarioMapError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, &format!("'{}' is not a number", raw.trim()))),
    }
}

fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, ScenarioMapError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(section, key, &format!("'{}' is not an integer", raw.trim()))),
    }
}

fn read_lengths(
    config: &dyn ConfigPort,
    key: &str,
    default: Vec<usize>,
) -> Result<Vec<usize>, ScenarioMapError> {
    let Some(items) = config.get_list(INDICATORS, key) else {
        return Ok(default);
    };
    items
        .iter()
        .map(|item| match item.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(invalid(
                INDICATORS,
                key,
                &format!("'{}' is not a positive length", item),
            )),
        })
        .collect()
}

fn check_score(key: &str, value: f64) -> Result<(), ScenarioMapError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(invalid(ENGINE, key, &format!("{} must be between 0 and 100", key)));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> ScenarioMapError {
    ScenarioMapError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
