pub mod control;
pub mod monitor;
pub mod simulate;
pub mod status;
pub mod watch;

use std::path::Path;

use stripdeck_core::{EngineConfig, HttpGateway};

/// Print `msg` and exit non-zero.
pub fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

/// Load the config file (or defaults) and layer command-line overrides on top.
pub fn load_config(path: Option<&Path>, url: Option<&str>, base_path: Option<&str>) -> EngineConfig {
    let mut config = match path {
        Some(path) => EngineConfig::load(path).unwrap_or_else(|e| fail(e)),
        None => EngineConfig::default(),
    };
    apply_overrides(&mut config, url, base_path);
    config
}

pub fn apply_overrides(config: &mut EngineConfig, url: Option<&str>, base_path: Option<&str>) {
    if let Some(url) = url {
        config.base_url = normalize_url(url);
    }
    if let Some(base_path) = base_path {
        config.base_path = base_path.to_string();
    }
}

/// Accept bare `host[:port]` and assume plain HTTP.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

pub fn make_gateway(config: &EngineConfig) -> HttpGateway {
    HttpGateway::new(&config.base_url, &config.base_path, config.request_timeout())
        .unwrap_or_else(|e| fail(e))
}

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap_or_else(|e| fail(format!("cannot start runtime: {e}")))
}

/// `12345` ms as `12.3s`.
pub fn format_ms(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1_000)
    } else {
        format!("{:.1}s", ms as f64 / 1_000.0)
    }
}
