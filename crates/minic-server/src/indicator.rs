//! Serial link to the status indicator board.
//!
//! The board shows the outcome of the last compile as a colour. It receives
//! one ASCII character per request and never answers. Signalling is
//! best-effort: a missing board or a failed write is logged and ignored.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use minic_pipeline::Status;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::IndicatorConfig;
use crate::error::{MinicError, Result};

/// Serial read/write timeout.
const PORT_TIMEOUT: Duration = Duration::from_secs(1);

/// Character sent to the board for each outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorSignal {
    /// `S`: compiled and ran cleanly.
    Success,
    /// `X`: rejected by the compiler.
    Syntax,
    /// `M`: suspicious diagnostic.
    Semantic,
    /// `R`: the program failed.
    Runtime,
    /// `O`: lights off (empty input, server fault).
    Off,
}

impl IndicatorSignal {
    /// The byte written to the serial line.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Success => b'S',
            Self::Syntax => b'X',
            Self::Semantic => b'M',
            Self::Runtime => b'R',
            Self::Off => b'O',
        }
    }
}

impl From<Status> for IndicatorSignal {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => Self::Success,
            Status::Syntax => Self::Syntax,
            Status::Semantic => Self::Semantic,
            Status::Runtime => Self::Runtime,
            Status::Error => Self::Off,
        }
    }
}

impl std::fmt::Display for IndicatorSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", char::from(self.as_byte()))
    }
}

/// A device that displays compile outcomes.
pub trait Indicator: Send + Sync {
    /// Sends `signal` to the device. May block on I/O.
    fn signal(&self, signal: IndicatorSignal) -> Result<()>;

    /// Identifying address of the device, if connected.
    fn address(&self) -> Option<String>;

    /// Whether a device is attached.
    fn is_connected(&self) -> bool {
        self.address().is_some()
    }
}

/// Indicator attached over a serial port.
pub struct SerialIndicator {
    port_name: String,
    port: Mutex<Box<dyn serialport::SerialPort>>,
}

impl std::fmt::Debug for SerialIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialIndicator")
            .field("port_name", &self.port_name)
            .finish_non_exhaustive()
    }
}

impl SerialIndicator {
    /// Opens `port_name` at `baud_rate`.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(PORT_TIMEOUT)
            .open()
            .map_err(|e| MinicError::indicator_write(port_name, e.to_string()))?;

        Ok(Self {
            port_name: port_name.to_string(),
            port: Mutex::new(port),
        })
    }

    /// The serial port name.
    #[must_use]
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl Indicator for SerialIndicator {
    fn signal(&self, signal: IndicatorSignal) -> Result<()> {
        let mut port = self
            .port
            .lock()
            .map_err(|_| MinicError::indicator_write(&self.port_name, "port lock poisoned"))?;

        port.write_all(&[signal.as_byte()])
            .and_then(|()| port.flush())
            .map_err(|e| MinicError::indicator_write(&self.port_name, e.to_string()))?;

        debug!(port = %self.port_name, %signal, "Indicator signalled");
        Ok(())
    }

    fn address(&self) -> Option<String> {
        Some(self.port_name.clone())
    }
}

/// Stand-in used when no board is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIndicator;

impl Indicator for NullIndicator {
    fn signal(&self, signal: IndicatorSignal) -> Result<()> {
        debug!(%signal, "[SIMULATION] Indicator signal");
        Ok(())
    }

    fn address(&self) -> Option<String> {
        None
    }
}

/// Tries the configured candidate ports and returns the first that opens.
///
/// Blocks for `settle_millis` after a successful open while the board
/// resets. Returns `None` when the indicator is disabled or nothing opens.
pub fn connect(config: &IndicatorConfig) -> Option<SerialIndicator> {
    if !config.enabled {
        info!("Indicator disabled in configuration");
        return None;
    }

    for candidate in &config.candidates {
        match SerialIndicator::open(candidate, config.baud_rate) {
            Ok(indicator) => {
                std::thread::sleep(Duration::from_millis(config.settle_millis));
                info!(port = %candidate, baud_rate = config.baud_rate, "Indicator connected");
                return Some(indicator);
            }
            Err(e) => debug!(port = %candidate, error = %e, "Indicator port unavailable"),
        }
    }

    info!(
        candidates = config.candidates.len(),
        "No indicator found, running in simulation mode"
    );
    None
}

/// Like [`connect`], falling back to a [`NullIndicator`].
pub fn connect_or_null(config: &IndicatorConfig) -> Arc<dyn Indicator> {
    match connect(config) {
        Some(indicator) => Arc::new(indicator),
        None => Arc::new(NullIndicator),
    }
}

/// Ordered, non-blocking delivery of signals to an [`Indicator`].
///
/// A single blocking worker drains a queue, so signals reach the device in
/// the order they were sent and a slow write never stalls the sender. The
/// worker stops once every clone of the link is dropped.
#[derive(Clone)]
pub struct IndicatorLink {
    indicator: Arc<dyn Indicator>,
    queue: mpsc::UnboundedSender<IndicatorSignal>,
}

impl std::fmt::Debug for IndicatorLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorLink")
            .field("address", &self.indicator.address())
            .finish_non_exhaustive()
    }
}

impl IndicatorLink {
    /// Starts the delivery worker. Must be called within a Tokio runtime.
    #[must_use]
    pub fn spawn(indicator: Arc<dyn Indicator>) -> Self {
        let (queue, mut pending) = mpsc::unbounded_channel::<IndicatorSignal>();
        let device = Arc::clone(&indicator);
        tokio::task::spawn_blocking(move || {
            while let Some(signal) = pending.blocking_recv() {
                if let Err(e) = device.signal(signal) {
                    warn!(
                        %signal,
                        error = %e,
                        transient = e.is_transient(),
                        "Indicator signal failed"
                    );
                }
            }
            debug!("Indicator worker stopped");
        });

        Self { indicator, queue }
    }

    /// Queues `signal` and returns immediately.
    pub fn send(&self, signal: IndicatorSignal) {
        if self.queue.send(signal).is_err() {
            warn!(%signal, "Indicator worker is gone, signal dropped");
        }
    }

    /// Identifying address of the device, if connected.
    #[must_use]
    pub fn address(&self) -> Option<String> {
        self.indicator.address()
    }

    /// Whether a device is attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.indicator.is_connected()
    }
}
