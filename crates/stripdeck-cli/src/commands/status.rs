use stripdeck_core::{EngineConfig, RequestGateway, Snapshot, Statistics, format_value};

use super::format_ms;

pub fn run(config: &EngineConfig, json: bool, with_stats: bool) {
    let gateway = super::make_gateway(config);
    let rt = super::runtime();

    let (snapshot, stats) = rt.block_on(async {
        let snapshot = gateway.fetch_snapshot().await;
        let stats = if with_stats {
            Some(gateway.fetch_statistics().await)
        } else {
            None
        };
        (snapshot, stats)
    });
    let snapshot = snapshot.unwrap_or_else(|e| super::fail(e));
    let stats = stats.transpose().unwrap_or_else(|e| super::fail(e));

    if json {
        let mut body = serde_json::json!({ "snapshot": snapshot });
        if let Some(stats) = &stats {
            body["statistics"] = serde_json::to_value(stats).unwrap_or_default();
        }
        match serde_json::to_string_pretty(&body) {
            Ok(s) => println!("{s}"),
            Err(e) => super::fail(e),
        }
        return;
    }

    print_snapshot(config, &snapshot);
    if let Some(stats) = &stats {
        println!();
        print_statistics(stats);
    }
}

fn print_snapshot(config: &EngineConfig, snapshot: &Snapshot) {
    println!("🎛  {}{}", config.base_url, config.base_path);
    println!(
        "   interval {}   next change in {}   {}/{} enabled",
        format_ms(snapshot.effect_interval),
        format_ms(snapshot.milliseconds_remaining),
        snapshot.enabled_effects(),
        snapshot.effects.len(),
    );
    println!();
    println!("     {:>3}  {:<3} Name", "#", "On");
    println!("     {}", "─".repeat(40));
    for (i, effect) in snapshot.effects.iter().enumerate() {
        let pointer = if i == snapshot.current_effect_index {
            "▸"
        } else {
            " "
        };
        let on = if effect.enabled { "●" } else { "·" };
        println!("   {pointer} {i:>3}  {on:<3} {}", effect.label(i));
    }
}

fn print_statistics(stats: &Statistics) {
    println!("   Statistics");
    println!("   {}", "─".repeat(40));
    for (name, value) in stats.fields.iter() {
        println!("   {name:<16} {}", format_value(value));
    }
}
