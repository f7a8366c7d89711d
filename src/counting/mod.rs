//! Counting strategies. A [Counter] turns a list of files into a single number, the
//! [CounterRegistry] keeps them by name so that a project can pick one through its
//! `project-type`.

pub mod wc;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use wc::WcCounter;

#[derive(Error, Debug)]
pub enum CountError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Counting command failed: {0}")]
    CommandFailed(String),

    #[error("Couldn't read a count from {0:?}")]
    UnparsableOutput(String),

    #[error("Unknown counter: {0}")]
    UnknownCounter(String),

    #[error("Counter {0} depends on itself")]
    DependencyCycle(String),
}

/// Contract every counting strategy implements.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Counter: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Names of counters that must be available for this one to work.
    fn requires(&self) -> &'static [&'static str];

    async fn count(&self, files: &[PathBuf]) -> Result<u64, CountError>;
}

/// Named counters in registration order.
#[derive(Default)]
pub struct CounterRegistry {
    counters: Vec<Box<dyn Counter>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the counters squirrel ships with.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(WcCounter::words()));
        registry.register(Box::new(WcCounter::lines()));
        registry
    }

    /// Adds a counter. A counter with the same name replaces the previous one.
    pub fn register(&mut self, counter: Box<dyn Counter>) {
        match self
            .counters
            .iter_mut()
            .find(|existing| existing.name() == counter.name())
        {
            Some(existing) => *existing = counter,
            None => self.counters.push(counter),
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Counter> {
        self.counters
            .iter()
            .find(|counter| counter.name() == name)
            .map(|counter| counter.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Counter> {
        self.counters.iter().map(|counter| counter.as_ref())
    }

    /// Returns `name` together with everything it requires, dependencies first.
    pub fn resolve(&self, name: &str) -> Result<Vec<&dyn Counter>, CountError> {
        let mut resolved = Vec::new();
        let mut visiting = Vec::new();
        self.visit(name, &mut visiting, &mut resolved)?;
        Ok(resolved)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        visiting: &mut Vec<String>,
        resolved: &mut Vec<&'a dyn Counter>,
    ) -> Result<(), CountError> {
        if resolved.iter().any(|counter| counter.name() == name) {
            return Ok(());
        }
        if visiting.iter().any(|visited| visited == name) {
            return Err(CountError::DependencyCycle(name.to_string()));
        }

        let counter = self
            .get(name)
            .ok_or_else(|| CountError::UnknownCounter(name.to_string()))?;

        visiting.push(name.to_string());
        for dependency in counter.requires() {
            self.visit(dependency, visiting, resolved)?;
        }
        visiting.pop();

        resolved.push(counter);
        Ok(())
    }
}
