use crate::domain::{BenchmarkDefinition, CriteriaSet, EvaluationType, Weighting};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub benchmarks_path: String,
    pub catalog: CatalogConfig,
    pub prices_database_path: String,
    pub rebalance_interval_secs: u64,
    pub rebalance_concurrency: usize,
    pub marker_policy: MarkerPolicy,
    pub evaluation_date: Option<NaiveDate>,
    pub set_valued_columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogConfig {
    Csv { dir: String },
    Http { version_url: String, cards_url: String },
}

/// When the version marker may advance after a pass in which some benchmarks failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerPolicy {
    /// Commit once every benchmark has been attempted.
    #[default]
    Advance,
    /// Commit only if no benchmark was skipped.
    Strict,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("Invalid benchmark definitions: {0}")]
    Definitions(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = required(&env_map, "DATABASE_PATH")?;
        let benchmarks_path = required(&env_map, "BENCHMARKS_PATH")?;
        let prices_database_path = required(&env_map, "PRICES_DATABASE_PATH")?;

        let catalog = match env_map
            .get("CATALOG_SOURCE")
            .map(|s| s.as_str())
            .unwrap_or("csv")
        {
            "csv" => CatalogConfig::Csv {
                dir: required(&env_map, "CATALOG_DIR")?,
            },
            "http" => CatalogConfig::Http {
                version_url: required(&env_map, "CATALOG_VERSION_URL")?,
                cards_url: required(&env_map, "CATALOG_CARDS_URL")?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "CATALOG_SOURCE".to_string(),
                    format!("must be csv or http, got {}", other),
                ))
            }
        };

        let rebalance_interval_secs = env_map
            .get("REBALANCE_INTERVAL_SECS")
            .map(|s| s.as_str())
            .unwrap_or("3600")
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "REBALANCE_INTERVAL_SECS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let rebalance_concurrency = env_map
            .get("REBALANCE_CONCURRENCY")
            .map(|s| s.as_str())
            .unwrap_or("4")
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "REBALANCE_CONCURRENCY".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let marker_policy = match env_map
            .get("MARKER_POLICY")
            .map(|s| s.as_str())
            .unwrap_or("advance")
        {
            "advance" => MarkerPolicy::Advance,
            "strict" => MarkerPolicy::Strict,
            other => {
                return Err(ConfigError::InvalidValue(
                    "MARKER_POLICY".to_string(),
                    format!("must be advance or strict, got {}", other),
                ))
            }
        };

        let evaluation_date = match env_map.get("EVALUATION_DATE") {
            Some(s) => Some(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidValue(
                    "EVALUATION_DATE".to_string(),
                    "must be a YYYY-MM-DD date".to_string(),
                )
            })?),
            None => None,
        };

        let set_valued_columns = env_map.get("SET_VALUED_COLUMNS").map(|s| {
            s.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect()
        });

        Ok(Config {
            port,
            database_path,
            benchmarks_path,
            catalog,
            prices_database_path,
            rebalance_interval_secs,
            rebalance_concurrency,
            marker_policy,
            evaluation_date,
            set_valued_columns,
        })
    }

    /// The configured evaluation date, or today in UTC.
    pub fn evaluation_date_or_today(&self) -> NaiveDate {
        self.evaluation_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env_map
        .get(key)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

/// One entry of the definitions file: either a bare criteria list or a full definition.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DefinitionEntry {
    Criteria(CriteriaSet),
    Full {
        criteria: CriteriaSet,
        #[serde(default)]
        evaluation_type: EvaluationType,
        #[serde(default)]
        weighting: Weighting,
    },
}

/// Read benchmark definitions from a JSON file.
pub fn load_benchmark_definitions(
    path: impl AsRef<Path>,
) -> Result<Vec<BenchmarkDefinition>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Definitions(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_benchmark_definitions(&content)
}

/// Parse a definitions document of the form `{ "name": [criteria...] | {criteria, ...} }`.
///
/// Definitions are returned ordered by name.
pub fn parse_benchmark_definitions(json: &str) -> Result<Vec<BenchmarkDefinition>, ConfigError> {
    let entries: BTreeMap<String, DefinitionEntry> =
        serde_json::from_str(json).map_err(|e| ConfigError::Definitions(e.to_string()))?;

    entries
        .into_iter()
        .map(|(name, entry)| {
            if name.trim().is_empty() {
                return Err(ConfigError::Definitions(
                    "benchmark name must not be empty".to_string(),
                ));
            }
            Ok(match entry {
                DefinitionEntry::Criteria(criteria) => BenchmarkDefinition::new(name, criteria),
                DefinitionEntry::Full {
                    criteria,
                    evaluation_type,
                    weighting,
                } => BenchmarkDefinition::new(name, criteria)
                    .with_evaluation_type(evaluation_type)
                    .with_weighting(weighting),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operator;
    use std::io::Write;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "BENCHMARKS_PATH".to_string(),
            "/etc/mtgindex/benchmarks.json".to_string(),
        );
        map.insert("CATALOG_DIR".to_string(), "/data/catalog".to_string());
        map.insert(
            "PRICES_DATABASE_PATH".to_string(),
            "/data/prices.db".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.catalog,
            CatalogConfig::Csv {
                dir: "/data/catalog".to_string()
            }
        );
        assert_eq!(config.rebalance_interval_secs, 3600);
        assert_eq!(config.rebalance_concurrency, 4);
        assert_eq!(config.marker_policy, MarkerPolicy::Advance);
        assert!(config.evaluation_date.is_none());
        assert!(config.set_valued_columns.is_none());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_benchmarks_path() {
        let mut env_map = setup_required_env();
        env_map.remove("BENCHMARKS_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "BENCHMARKS_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_http_catalog_requires_urls() {
        let mut env_map = setup_required_env();
        env_map.insert("CATALOG_SOURCE".to_string(), "http".to_string());
        env_map.insert(
            "CATALOG_VERSION_URL".to_string(),
            "https://mtgjson.example/Meta.json".to_string(),
        );
        let result = Config::from_env_map(env_map.clone());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "CATALOG_CARDS_URL"),
            _ => panic!("Expected MissingEnv error"),
        }

        env_map.insert(
            "CATALOG_CARDS_URL".to_string(),
            "https://mtgjson.example/cards.json".to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert!(matches!(config.catalog, CatalogConfig::Http { .. }));
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_catalog_source() {
        let mut env_map = setup_required_env();
        env_map.insert("CATALOG_SOURCE".to_string(), "ftp".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CATALOG_SOURCE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("REBALANCE_CONCURRENCY".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "REBALANCE_CONCURRENCY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_marker_policy_and_evaluation_date() {
        let mut env_map = setup_required_env();
        env_map.insert("MARKER_POLICY".to_string(), "strict".to_string());
        env_map.insert("EVALUATION_DATE".to_string(), "2019-02-01".to_string());
        env_map.insert(
            "SET_VALUED_COLUMNS".to_string(),
            "colors, keywords,".to_string(),
        );
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.marker_policy, MarkerPolicy::Strict);
        assert_eq!(config.evaluation_date, NaiveDate::from_ymd_opt(2019, 2, 1));
        assert_eq!(
            config.set_valued_columns,
            Some(vec!["colors".to_string(), "keywords".to_string()])
        );
    }

    #[test]
    fn test_invalid_marker_policy() {
        let mut env_map = setup_required_env();
        env_map.insert("MARKER_POLICY".to_string(), "lenient".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MARKER_POLICY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_parse_definitions_both_forms() {
        let json = r#"{
            "two_drops": [
                {"property": "convertedManaCost", "operation": "=", "value": 2}
            ],
            "red_foils": {
                "criteria": [{"attribute": "colors", "operator": "contains", "value": "R"}],
                "evaluation_type": "foil",
                "weighting": "price"
            }
        }"#;
        let defs = parse_benchmark_definitions(json).unwrap();
        assert_eq!(defs.len(), 2);

        assert_eq!(defs[0].name, "red_foils");
        assert_eq!(defs[0].evaluation_type, EvaluationType::Foil);
        assert_eq!(defs[0].weighting, Weighting::Price);
        assert_eq!(defs[0].criteria.0[0].operator, Operator::Contains);

        assert_eq!(defs[1].name, "two_drops");
        assert_eq!(defs[1].evaluation_type, EvaluationType::Paper);
        assert_eq!(defs[1].weighting, Weighting::Equal);
        assert_eq!(defs[1].criteria.0[0].operator, Operator::Eq);
    }

    #[test]
    fn test_parse_definitions_rejects_unknown_operator() {
        let json = r#"{"bad": [{"attribute": "power", "operator": "like", "value": "1"}]}"#;
        assert!(matches!(
            parse_benchmark_definitions(json),
            Err(ConfigError::Definitions(_))
        ));
    }

    #[test]
    fn test_load_definitions_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"everything": []}}"#).unwrap();

        let defs = load_benchmark_definitions(file.path()).unwrap();
        assert_eq!(defs.len(), 1);
        assert!(defs[0].criteria.is_empty());
    }

    #[test]
    fn test_load_definitions_missing_file() {
        let result = load_benchmark_definitions("/nonexistent/benchmarks.json");
        assert!(matches!(result, Err(ConfigError::Definitions(_))));
    }
}
