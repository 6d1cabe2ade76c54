use std::io::Write;
use std::sync::Mutex;

use vsmq::config::{load_config, ConfigError};
use vsmq::Config;

// Config::load reads process-wide environment variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_VARS: &[&str] = &[
    "VSMQ_CONFIG",
    "QUEUE_ADDR",
    "VECTOR_STORE_QUEUE",
    "VECTOR_STORE_RESPONSE_QUEUE",
    "VSMQ_POLL_TIMEOUT_MS",
    "VSMQ_ERROR_BACKOFF_MS",
    "VSMQ_RESPONSE_TIMEOUT_MS",
    "VSMQ_BIND_ADDR",
    "VSMQ_MAX_FRAME_BYTES",
    "VSMQ_DEFAULT_N_RESULTS",
    "VSMQ_EMBEDDING_DIMENSIONS",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn load_config_matches_toml() {
    let cfg: Config = load_config("vsmq.toml").expect("failed to load config");

    assert_eq!(cfg.queue.addr, "127.0.0.1:7379");
    assert_eq!(cfg.queue.work_queue, "vector_store_queue");
    assert_eq!(cfg.queue.response_queue, "vector_store_response_queue");
    assert_eq!(cfg.queue.poll_timeout_ms, 1000);
    assert_eq!(cfg.queue.response_timeout_ms, 10_000);
    assert_eq!(cfg.broker.max_frame_bytes, 8 * 1024 * 1024);
    assert_eq!(cfg.store.default_n_results, 25);
    assert_eq!(cfg.store.embedding_dimensions, 256);
    assert_eq!(cfg, Config::default());
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let cfg = Config::load(None).expect("defaults load");
    assert_eq!(cfg, Config::default());
}

#[test]
fn partial_file_keeps_defaults_for_missing_keys() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let file = write_config(
        r#"
[queue]
work_queue = "jobs"

[store]
default_n_results = 5
"#,
    );
    let cfg = Config::load(file.path().to_str()).expect("file load");
    assert_eq!(cfg.queue.work_queue, "jobs");
    assert_eq!(cfg.queue.response_queue, "vector_store_response_queue");
    assert_eq!(cfg.store.default_n_results, 5);
    assert_eq!(cfg.store.embedding_dimensions, 256);
}

#[test]
fn environment_overrides_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let file = write_config(
        r#"
[queue]
addr = "10.0.0.1:7000"
work_queue = "from_file"
poll_timeout_ms = 250
"#,
    );
    std::env::set_var("VSMQ_CONFIG", file.path());
    std::env::set_var("VECTOR_STORE_QUEUE", "from_env");
    std::env::set_var("VSMQ_POLL_TIMEOUT_MS", "50");

    let cfg = Config::load(None).expect("env load");
    clear_env();

    assert_eq!(cfg.queue.addr, "10.0.0.1:7000");
    assert_eq!(cfg.queue.work_queue, "from_env");
    assert_eq!(cfg.queue.poll_timeout_ms, 50);
}

#[test]
fn malformed_values_are_reported() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    std::env::set_var("VSMQ_DEFAULT_N_RESULTS", "many");
    let err = Config::load(None).unwrap_err();
    clear_env();
    assert!(matches!(err, ConfigError::Parse(ref msg) if msg.starts_with("VSMQ_DEFAULT_N_RESULTS")));

    let file = write_config("[queue\naddr = 1");
    let err = Config::load(file.path().to_str()).unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));

    let err = load_config("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
