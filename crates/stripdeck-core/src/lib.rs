//! # stripdeck-core
//!
//! Live state synchronization and time-series windowing for networked LED
//! effect controllers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stripdeck_core::{EngineConfig, HttpGateway, LogSink, TokioClock, spawn};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default();
//! let gateway = HttpGateway::new(&config.base_url, &config.base_path, config.request_timeout())?;
//! let (handle, _task) = spawn(gateway, LogSink, Arc::new(TokioClock::new()), config);
//!
//! handle.open(true);
//! handle.navigate_to(2);
//!
//! let mut views = handle.subscribe();
//! views.changed().await?;
//! println!("{:?}", views.borrow().state);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Gateway → Coordinator → (Countdown, Samplers) → View
//!
//! - **[`Session`]** is a pure state machine: `Closed → Opening → Loaded ⇄
//!   Refreshing`. Every fetch carries a generation; results from any other
//!   generation are dropped.
//! - **[`coordinator`]** drives the session on a tokio task: it starts and
//!   cancels fetches, runs mutation commands behind the busy flag, and
//!   publishes a [`View`] after every change.
//! - **[`CountdownTimer`]** recomputes the time left from an absolute deadline
//!   on every tick and asks for a refresh once per activation.
//! - **[`TimeSeriesSampler`]** keeps a bounded window per chart; stack order,
//!   colors and tooltips are pure functions of one [`Sample`].

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod countdown;
pub mod error;
pub mod gateway;
pub mod model;
pub mod notify;
pub mod sampler;
pub mod session;

pub use clock::{Clock, ManualClock, Millis, SystemClock, TokioClock};
pub use config::{ChartSource, ChartSpec, DEFAULT_BASE_URL, EngineConfig};
pub use coordinator::{BusyFlag, BusyGuard, Chart, CoordinatorHandle, View, spawn};
pub use countdown::{CountdownTimer, Tick};
pub use error::{ConfigError, ErrorClass, GatewayError};
pub use gateway::{Command, HttpGateway, RequestGateway};
pub use model::{Effect, Snapshot, StatFields, StatSource, StatValue, Statistics};
pub use notify::{LogSink, Notification, NotificationKind, NotificationLog, NotificationSink};
pub use sampler::{
    Category, ColorClass, Sample, StackLayer, TimeSeriesSampler, TooltipRow, Window, color_class,
    format_value, stack_layers, stack_order, tooltip,
};
pub use session::{Action, Generation, Session, SessionState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
