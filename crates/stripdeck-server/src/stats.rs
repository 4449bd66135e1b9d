//! Plausible resource counters for `/getStatistics`.

use rand::Rng;
use serde_json::{Value, json};

const HEAP_SIZE: u64 = 327_680;
const DMA_SIZE: u64 = 180_224;
const PSRAM_SIZE: u64 = 4_194_252;
const FLASH_SIZE: u64 = 4_194_304;
const CODE_SIZE: u64 = 1_402_880;
const CODE_SPACE: u64 = 1_966_080;

/// Drifting counters with per-read jitter.
///
/// The low-water marks (`*_MIN`) only ever go down, as on the real device.
#[derive(Debug, Clone)]
pub struct StatsSimulator {
    led_fps: f64,
    heap_free: u64,
    heap_min: u64,
    dma_free: u64,
    dma_min: u64,
    psram_free: u64,
    psram_min: u64,
}

impl Default for StatsSimulator {
    fn default() -> Self {
        Self {
            led_fps: 60.0,
            heap_free: 160_000,
            heap_min: 160_000,
            dma_free: 90_000,
            dma_min: 90_000,
            psram_free: 4_000_000,
            psram_min: 4_000_000,
        }
    }
}

fn jitter(rng: &mut impl Rng, value: u64, spread: u64, floor: u64, ceil: u64) -> u64 {
    let delta = rng.random_range(0..=spread * 2) as i64 - spread as i64;
    (value as i64 + delta).clamp(floor as i64, ceil as i64) as u64
}

impl StatsSimulator {
    /// Advance the simulation one read and return the response body.
    pub fn sample(&mut self) -> Value {
        let mut rng = rand::rng();

        self.led_fps = (self.led_fps + rng.random_range(-3.0..3.0)).clamp(20.0, 120.0);
        self.heap_free = jitter(&mut rng, self.heap_free, 4_000, 40_000, HEAP_SIZE);
        self.heap_min = self.heap_min.min(self.heap_free);
        self.dma_free = jitter(&mut rng, self.dma_free, 2_000, 20_000, DMA_SIZE);
        self.dma_min = self.dma_min.min(self.dma_free);
        self.psram_free = jitter(&mut rng, self.psram_free, 50_000, 1_000_000, PSRAM_SIZE);
        self.psram_min = self.psram_min.min(self.psram_free);

        let core0: f64 = rng.random_range(30.0..95.0);
        let core1: f64 = rng.random_range(5.0..40.0);

        json!({
            "LED_FPS": self.led_fps.round() as u64,
            "SERIAL_FPS": 0,
            "AUDIO_FPS": rng.random_range(20..=25),
            "HEAP_SIZE": HEAP_SIZE,
            "HEAP_FREE": self.heap_free,
            "HEAP_MIN": self.heap_min,
            "DMA_SIZE": DMA_SIZE,
            "DMA_FREE": self.dma_free,
            "DMA_MIN": self.dma_min,
            "PSRAM_SIZE": PSRAM_SIZE,
            "PSRAM_FREE": self.psram_free,
            "PSRAM_MIN": self.psram_min,
            "CHIP_MODEL": "ESP32-D0WDQ6",
            "CHIP_CORES": 2,
            "CHIP_SPEED": 240,
            "PROG_SIZE": CODE_SIZE,
            "CODE_SIZE": CODE_SIZE,
            "CODE_FREE": CODE_SPACE - CODE_SIZE,
            "FLASH_SIZE": FLASH_SIZE,
            "CPU_USED": (core0 + core1) / 2.0,
            "CPU_USED_CORE0": core0,
            "CPU_USED_CORE1": core1,
        })
    }
}
