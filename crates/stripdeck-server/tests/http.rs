//! End-to-end tests: the simulated controller driven through `HttpGateway`.

use std::sync::Arc;
use std::time::Duration;

use stripdeck_core::{
    EngineConfig, GatewayError, HttpGateway, ManualClock, NotificationLog, RequestGateway,
    SessionState, TokioClock, spawn,
};
use stripdeck_server::{DEFAULT_EFFECTS, EffectManager, build_router};

struct Device {
    base_url: String,
    clock: Arc<ManualClock>,
}

async fn start_device(base_path: &str) -> Device {
    let clock = Arc::new(ManualClock::new(0));
    let manager = EffectManager::with_default_effects(clock.clone());
    let app = build_router(manager, base_path);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Device {
        base_url: format!("http://{addr}"),
        clock,
    }
}

fn gateway(device: &Device, base_path: &str) -> HttpGateway {
    HttpGateway::new(&device.base_url, base_path, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn snapshot_decodes_device_format() {
    let device = start_device("").await;
    let gw = gateway(&device, "");

    let snap = gw.fetch_snapshot().await.unwrap();
    assert_eq!(snap.effects.len(), DEFAULT_EFFECTS.len());
    assert_eq!(snap.current_effect_index, 0);
    assert_eq!(snap.effect_interval, 30_000);
    assert_eq!(snap.milliseconds_remaining, 30_000);
    assert_eq!(snap.enabled_count, Some(DEFAULT_EFFECTS.len()));
    assert_eq!(snap.effects[1].name.as_deref(), Some("Fire"));
}

#[tokio::test]
async fn remaining_follows_device_clock() {
    let device = start_device("").await;
    let gw = gateway(&device, "");

    device.clock.advance(12_500);
    let snap = gw.fetch_snapshot().await.unwrap();
    assert_eq!(snap.milliseconds_remaining, 17_500);

    device.clock.advance(20_000);
    let snap = gw.fetch_snapshot().await.unwrap();
    assert_eq!(snap.current_effect_index, 1, "interval elapsed, device rotated");
}

#[tokio::test]
async fn commands_change_device_state() {
    let device = start_device("").await;
    let gw = gateway(&device, "");

    gw.set_current_effect_index(3).await.unwrap();
    assert_eq!(gw.fetch_snapshot().await.unwrap().current_effect_index, 3);

    gw.set_effect_enabled(4, false).await.unwrap();
    gw.step(true).await.unwrap();
    let snap = gw.fetch_snapshot().await.unwrap();
    assert_eq!(snap.current_effect_index, 5, "disabled effect is skipped");
    assert!(!snap.effects[4].enabled);
    assert_eq!(snap.enabled_effects(), DEFAULT_EFFECTS.len() - 1);

    gw.step(false).await.unwrap();
    assert_eq!(gw.fetch_snapshot().await.unwrap().current_effect_index, 3);

    gw.set_effect_enabled(4, true).await.unwrap();
    gw.update_settings(5_000).await.unwrap();
    let snap = gw.fetch_snapshot().await.unwrap();
    assert!(snap.effects[4].enabled);
    assert_eq!(snap.effect_interval, 5_000);
}

#[tokio::test]
async fn out_of_range_index_is_acknowledged_and_ignored() {
    let device = start_device("").await;
    let gw = gateway(&device, "");

    gw.set_current_effect_index(99).await.unwrap();
    gw.set_effect_enabled(99, false).await.unwrap();
    let snap = gw.fetch_snapshot().await.unwrap();
    assert_eq!(snap.current_effect_index, 0);
    assert_eq!(snap.enabled_effects(), DEFAULT_EFFECTS.len());
}

#[tokio::test]
async fn statistics_carry_resource_counters() {
    let device = start_device("").await;
    let gw = gateway(&device, "");

    let stats = gw.fetch_statistics().await.unwrap();
    assert!(stats.fields.get("CPU_USED_CORE0").unwrap().as_f64().is_some());
    assert!(stats.fields.get("HEAP_FREE").unwrap().as_f64().is_some());
    assert_eq!(stats.fields.get("CHIP_MODEL").unwrap().as_f64(), None);
}

#[tokio::test]
async fn base_path_prefixes_every_route() {
    let device = start_device("/led").await;

    let gw = gateway(&device, "/led");
    gw.step(true).await.unwrap();
    assert_eq!(gw.fetch_snapshot().await.unwrap().current_effect_index, 1);

    let wrong = gateway(&device, "");
    let err = wrong.fetch_snapshot().await.unwrap_err();
    assert_eq!(
        err,
        GatewayError::Status {
            operation: "fetchSnapshot".into(),
            status: 404
        }
    );
}

#[tokio::test]
async fn coordinator_drives_simulated_device() {
    let device = start_device("").await;
    let config = EngineConfig {
        base_url: device.base_url.clone(),
        statistics_interval_ms: 200,
        ..EngineConfig::default()
    };
    let log = Arc::new(NotificationLog::default());
    let (handle, _task) = spawn(
        gateway(&device, ""),
        log.clone(),
        Arc::new(TokioClock::new()),
        config,
    );
    let mut views = handle.subscribe();

    handle.open(true);
    tokio::time::timeout(
        Duration::from_secs(5),
        views.wait_for(|v| v.state == SessionState::Loaded),
    )
    .await
    .expect("snapshot loaded")
    .unwrap();

    handle.navigate_to(6);
    tokio::time::timeout(
        Duration::from_secs(5),
        views.wait_for(|v| {
            v.snapshot
                .as_ref()
                .is_some_and(|s| s.current_effect_index == 6)
                && !v.busy
        }),
    )
    .await
    .expect("navigation applied")
    .unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        views.wait_for(|v| v.chart("CPU").is_some_and(|c| c.window().len() >= 2)),
    )
    .await
    .expect("statistics sampled")
    .unwrap();

    assert!(log.recent().is_empty(), "unexpected: {:?}", log.recent());
    handle.shutdown();
}
