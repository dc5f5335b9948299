//! Coil sources.
//!
//! A coil source is the transport-facing side of the bridge: it reads and
//! writes single coils (registers) on a heat pump. The coordinator only talks
//! to sources through the [`CoilSource`] trait, so the wire protocol lives
//! entirely behind it.
//!
//! Current sources:
//! - `simulation`: in-memory heat pump for development and tests
//!
//! `coils` holds the coil database shared by sources and entities.

pub mod coils;
pub mod simulation;

pub use simulation::SimulatedHeatPump;

use crate::error::FetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Register number identifying one coil on the heat pump.
pub type Address = u16;

/// Outcome of a single read or write against a source.
pub type FetchResult = Result<CoilValue, FetchError>;

/// Value held by a coil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoilValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CoilValue {
    /// Numeric view of the value. Text is parsed if it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CoilValue::Integer(v) => Some(*v as f64),
            CoilValue::Float(v) => Some(*v),
            CoilValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Parse a value typed on a command line or in a config file.
    ///
    /// Integers win over floats; anything non-numeric is kept as text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<i64>() {
            CoilValue::Integer(v)
        } else if let Ok(v) = raw.parse::<f64>() {
            CoilValue::Float(v)
        } else {
            CoilValue::Text(raw.to_string())
        }
    }
}

impl fmt::Display for CoilValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoilValue::Integer(v) => write!(f, "{}", v),
            CoilValue::Float(v) => write!(f, "{}", v),
            CoilValue::Text(s) => f.write_str(s),
        }
    }
}

/// Static description of a coil from the heat pump's coil database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coil {
    pub address: Address,
    /// Machine name, e.g. `bt1-outdoor-temperature-40004`
    pub name: String,
    /// Human readable title
    pub title: String,
    pub unit: Option<String>,
    pub writable: bool,
}

impl Coil {
    pub fn new(address: Address, name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            title: title.into(),
            unit: None,
            writable: false,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }
}

/// Transport to a heat pump, one coil at a time.
///
/// Implementations are responsible for per-call timeouts. Calls are never
/// issued concurrently by the coordinator.
#[async_trait]
pub trait CoilSource: Send + Sync {
    /// Read the current value of a coil.
    async fn read(&self, address: Address) -> FetchResult;

    /// Write a value and return the value acknowledged by the device.
    async fn write(&self, address: Address, value: CoilValue) -> FetchResult;

    /// Open the underlying connection.
    async fn start(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Close the underlying connection.
    async fn stop(&self) {}
}
