//! Logging setup for bindery
//!
//! Every event the container emits uses the `bindery` target: container
//! construction, declarations, first creation of cached instances, scope
//! instances opening and closing, and failed resolutions at `DEBUG`; each
//! resolution step and cache hit at `TRACE`.
//!
//! The engine only emits events. Installing a subscriber is up to the
//! application, and the helpers here cover the common cases.
//!
//! # Features
//!
//! - `logging` - emit events (default)
//! - `logging-json` - JSON subscriber helpers (production)
//! - `logging-pretty` - human-readable subscriber helpers (development)
//!
//! # Example
//!
//! ```rust,ignore
//! use bindery::logging;
//!
//! // JSON if logging-json is enabled, pretty otherwise
//! logging::init();
//!
//! // Only bindery's own events, one line each, with thread names
//! logging::builder()
//!     .trace()
//!     .compact()
//!     .bindery_only()
//!     .with_thread_names()
//!     .init();
//! ```

use tracing::Level;

/// Target of every event emitted by this crate.
pub const TARGET: &str = "bindery";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line, colored
    Pretty,
    /// Single line per event
    Compact,
}

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
    with_thread_names: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Json,
            target: None,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
            with_thread_names: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Every resolution step
    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    /// Declarations, creations and failures
    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    pub fn error(self) -> Self {
        self.with_level(Level::ERROR)
    }

    /// Only keep events whose target is `target`
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only keep bindery's own events
    pub fn bindery_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// Filter directive equivalent to this configuration.
    pub fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{target}={}", self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the subscriber as the global default.
    ///
    /// Returns `false`, leaving the existing one in place, if a global
    /// subscriber was already installed.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) -> bool {
        use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

        let layer: Box<dyn Layer<Registry> + Send + Sync> = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => fmt::layer()
                .json()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .boxed(),
            // Without the json formatter, JSON degrades to the default format
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => fmt::layer()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_file(self.with_file)
                .with_line_number(self.with_line_number)
                .with_thread_ids(self.with_thread_ids)
                .with_thread_names(self.with_thread_names)
                .boxed(),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(EnvFilter::new(self.directive()))
            .try_init()
            .is_ok()
    }

    /// No subscriber feature enabled: nothing to install.
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) -> bool {
        false
    }
}

pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install the default subscriber: JSON with `logging-json`, otherwise
/// pretty with `logging-pretty`.
pub fn init() -> bool {
    if cfg!(feature = "logging-json") {
        init_json()
    } else {
        init_pretty()
    }
}

/// Install a JSON subscriber at `DEBUG`.
///
/// ```json
/// {"timestamp":"2026-01-01T00:00:00.000Z","level":"DEBUG","fields":{"message":"Creating DI container","depth":0,"bindings":3},"target":"bindery"}
/// ```
pub fn init_json() -> bool {
    builder().json().debug().init()
}

/// Install a pretty subscriber at `DEBUG`.
///
/// ```text
///   2026-01-01T00:00:00.000Z DEBUG bindery: Creating DI container, depth: 0, bindings: 3
/// ```
pub fn init_pretty() -> bool {
    builder().pretty().debug().init()
}

/// Install a subscriber that drops every event not emitted by bindery.
pub fn init_bindery_only() -> bool {
    builder().bindery_only().debug().init()
}
