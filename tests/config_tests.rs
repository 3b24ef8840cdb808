//! Configuration loading from JSON files and `COVMAP_*` environment variables.

use std::env;
use std::fs;
use std::sync::{Mutex, MutexGuard};

use covmap::{Config, CorrelationKind, Error, PoolingStrategy, DEFAULT_MI_BINS};

const COVMAP_VARS: &[&str] = &[
    "COVMAP_KIND",
    "COVMAP_POOLING",
    "COVMAP_DETREND",
    "COVMAP_OUTPUT_DIR",
    "COVMAP_PREFIX",
    "COVMAP_P_THRESHOLD",
    "COVMAP_MIN_CLUSTER_SIZE",
    "COVMAP_FDR_ALPHA",
    "COVMAP_PERMUTATIONS",
    "COVMAP_SEED",
];

// Environment variables are process-wide; tests touching them run one at a time.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    for key in COVMAP_VARS {
        env::remove_var(key);
    }
    guard
}

struct EnvGuard {
    key: &'static str,
    original: Option<String>,
}

impl EnvGuard {
    fn set(key: &'static str, value: &str) -> Self {
        let original = env::var(key).ok();
        env::set_var(key, value);
        Self { key, original }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        if let Some(val) = &self.original {
            env::set_var(self.key, val);
        } else {
            env::remove_var(self.key);
        }
    }
}

#[test]
fn json_file_fills_missing_fields_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("covmap.json");
    fs::write(&path, r#"{"kind": "spearman", "pooling": "median", "min_cluster_size": 3}"#).unwrap();

    let config = Config::from_json_file(&path).unwrap();
    assert_eq!(config.kind, CorrelationKind::Spearman);
    assert_eq!(config.pooling, PoolingStrategy::Median);
    assert_eq!(config.min_cluster_size, 3);

    let defaults = Config::default();
    assert_eq!(config.p_threshold, defaults.p_threshold);
    assert_eq!(config.fdr_alpha, defaults.fdr_alpha);
    assert_eq!(config.detrend, defaults.detrend);
    assert_eq!(config.mi_bins, DEFAULT_MI_BINS);
    assert_eq!(config.seed, None);
}

#[test]
fn json_file_with_out_of_range_threshold_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("covmap.json");
    fs::write(&path, r#"{"p_threshold": 1.5}"#).unwrap();

    let err = Config::from_json_file(&path).unwrap_err();
    assert!(
        matches!(err, Error::InvalidParameter { name: "p_threshold", .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn json_file_errors_are_reported() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("absent.json");
    let err = Config::from_json_file(&missing).unwrap_err();
    assert!(matches!(err, Error::Io { ref path, .. } if path == &missing));

    let malformed = dir.path().join("broken.json");
    fs::write(&malformed, "{ kind: ").unwrap();
    assert!(matches!(Config::from_json_file(&malformed), Err(Error::Json(_))));

    let unknown_kind = dir.path().join("kendall.json");
    fs::write(&unknown_kind, r#"{"kind": "kendall"}"#).unwrap();
    assert!(Config::from_json_file(&unknown_kind).is_err());
}

#[test]
fn env_overlays_kind_detrend_and_seed() {
    let _lock = env_lock();
    let _kind = EnvGuard::set("COVMAP_KIND", "Ledoit");
    let _detrend = EnvGuard::set("COVMAP_DETREND", "yes");
    let _seed = EnvGuard::set("COVMAP_SEED", "42");

    let base = Config {
        min_cluster_size: 5,
        ..Config::default()
    };
    let config = base.from_env().unwrap();
    assert_eq!(config.kind, CorrelationKind::Ledoit);
    assert!(config.detrend);
    assert_eq!(config.seed, Some(42));
    // Unset variables leave the existing value alone.
    assert_eq!(config.min_cluster_size, 5);
}

#[test]
fn env_blank_values_are_ignored() {
    let _lock = env_lock();
    let _kind = EnvGuard::set("COVMAP_KIND", "  ");
    let _seed = EnvGuard::set("COVMAP_SEED", "");

    let config = Config::default().from_env().unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn env_unparseable_boolean_is_a_config_error() {
    let _lock = env_lock();
    let _detrend = EnvGuard::set("COVMAP_DETREND", "maybe");

    let err = Config::default().from_env().unwrap_err();
    match err {
        Error::Config(msg) => assert!(msg.contains("COVMAP_DETREND"), "message: {msg}"),
        other => panic!("expected Error::Config, got {other:?}"),
    }
}

#[test]
fn env_unparseable_number_is_a_config_error() {
    let _lock = env_lock();
    let _seed = EnvGuard::set("COVMAP_SEED", "forty-two");

    assert!(matches!(Config::default().from_env(), Err(Error::Config(_))));
}

#[test]
fn env_values_are_validated() {
    let _lock = env_lock();
    let _alpha = EnvGuard::set("COVMAP_FDR_ALPHA", "0");

    let err = Config::default().from_env().unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { name: "fdr_alpha", .. }));
}
