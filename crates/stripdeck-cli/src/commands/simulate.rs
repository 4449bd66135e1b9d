use std::sync::Arc;

use stripdeck_core::{EngineConfig, SystemClock};
use stripdeck_server::{DEFAULT_EFFECTS, DEFAULT_INTERVAL_MS};

use super::format_ms;

pub fn run(host: &str, port: u16, config: &EngineConfig) {
    let prefix = config.base_path.trim_end_matches('/');
    let base = format!("http://{host}:{port}{prefix}");

    println!("🎛  stripdeck simulated controller v{}", stripdeck_core::VERSION);
    println!("   {base}");
    println!(
        "   {} effects, rotating every {}",
        DEFAULT_EFFECTS.len(),
        format_ms(DEFAULT_INTERVAL_MS)
    );
    println!();
    println!("   Endpoints:");
    println!("     GET  /getEffectList          Effect list and countdown");
    println!("     GET  /getStatistics          Resource counters");
    println!("     POST /nextEffect             Advance to the next enabled effect");
    println!("     POST /previousEffect         Go back one enabled effect");
    println!("     POST /setCurrentEffectIndex  currentEffectIndex=N");
    println!("     POST /enableEffect           effectIndex=N");
    println!("     POST /disableEffect          effectIndex=N");
    println!("     POST /settings               effectInterval=MS");
    println!();
    println!("   Try: stripdeck --url http://{host}:{port} monitor");
    println!();

    let rt = super::runtime();
    if let Err(e) = rt.block_on(stripdeck_server::run_server(
        host,
        port,
        Arc::new(SystemClock),
        &config.base_path,
    )) {
        super::fail(format!("server stopped: {e}"));
    }
}
