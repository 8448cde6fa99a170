//! Lifecycle hooks around benchmark runs and scenarios.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{BenchError, Result};
use crate::model::{Endpoints, Measurement, Scenario};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookName {
    BeforeRun,
    AfterRun,
    BeforeScenario,
    AfterScenario,
}

impl HookName {
    pub const ALL: [HookName; 4] = [
        HookName::BeforeRun,
        HookName::AfterRun,
        HookName::BeforeScenario,
        HookName::AfterScenario,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeRun => "before_run",
            Self::AfterRun => "after_run",
            Self::BeforeScenario => "before_scenario",
            Self::AfterScenario => "after_scenario",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "before_run" | "onBenchmarkStart" => Some(Self::BeforeRun),
            "after_run" | "onBenchmarkCompleted" => Some(Self::AfterRun),
            "before_scenario" | "onScenarioStart" => Some(Self::BeforeScenario),
            "after_scenario" | "onScenarioCompleted" => Some(Self::AfterScenario),
            _ => None,
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookName {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            BenchError::config(format!(
                "unknown hook '{s}' (expected before_run, after_run, before_scenario or after_scenario)"
            ))
        })
    }
}

/// Payload handed to hook handlers. Serialises as `{"event": "<name>", ...}`.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HookEvent<'a> {
    BeforeRun {
        scenarios: &'a [Scenario],
    },
    AfterRun {
        scenarios: &'a [Scenario],
        endpoints: &'a Endpoints,
    },
    BeforeScenario {
        scenario: &'a Scenario,
    },
    AfterScenario {
        scenario: &'a Scenario,
        measurement: &'a Measurement,
    },
}

impl HookEvent<'_> {
    pub fn name(&self) -> HookName {
        match self {
            Self::BeforeRun { .. } => HookName::BeforeRun,
            Self::AfterRun { .. } => HookName::AfterRun,
            Self::BeforeScenario { .. } => HookName::BeforeScenario,
            Self::AfterScenario { .. } => HookName::AfterScenario,
        }
    }
}

pub type HookHandler = Arc<dyn Fn(&HookEvent<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Ordered handler lists, one per [`HookName`].
#[derive(Default, Clone)]
pub struct HookRegistry {
    handlers: HashMap<HookName, Vec<HookHandler>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for name in HookName::ALL {
            map.entry(&name.as_str(), &self.len(name));
        }
        map.finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: HookName, handler: F)
    where
        F: Fn(&HookEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.entry(name).or_default().push(Arc::new(handler));
    }

    pub fn register_named<F>(&mut self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(&HookEvent<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name: HookName = name.parse()?;
        self.register(name, handler);
        Ok(())
    }

    /// Register one handler for each capability the plugin declares.
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        for name in plugin.hooks() {
            let p = Arc::clone(&plugin);
            self.register(name, move |event| p.on_event(event));
        }
        tracing::debug!(plugin = plugin.name(), "registered plugin");
    }

    pub fn len(&self, name: HookName) -> usize {
        self.handlers.get(&name).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }

    /// Run the handlers for `event` in registration order, stopping at the first error.
    pub fn fire(&self, event: &HookEvent<'_>) -> Result<()> {
        let name = event.name();
        let Some(handlers) = self.handlers.get(&name) else {
            return Ok(());
        };
        for (i, handler) in handlers.iter().enumerate() {
            handler(event).map_err(|e| BenchError::Hook {
                hook: name.as_str(),
                message: format!("handler #{}: {e:#}", i + 1),
            })?;
        }
        Ok(())
    }
}

/// A unit of lifecycle behaviour with declared capabilities.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Events this plugin wants to receive. Read once at registration.
    fn hooks(&self) -> Vec<HookName>;

    fn on_event(&self, event: &HookEvent<'_>) -> anyhow::Result<()>;
}
