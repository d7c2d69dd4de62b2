//! Strategy selection by adapter family.

use std::collections::HashMap;

use stepwise_adapters::{AdapterFamily, DebugSession};

use crate::config::StepConfig;
use crate::error::{Result, StepError};
use crate::executor::StepExecutor;
use crate::resolver::ThreadResolver;
use crate::wait::WaitStrategy;

/// The resolver/executor/wait triple applied to one adapter family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategySet {
    pub resolver: ThreadResolver,
    pub executor: StepExecutor,
    pub wait: WaitStrategy,
}

impl StrategySet {
    /// Creates a strategy set.
    pub fn new(resolver: ThreadResolver, executor: StepExecutor, wait: WaitStrategy) -> Self {
        Self {
            resolver,
            executor,
            wait,
        }
    }

    /// Built-in strategies for a family.
    pub fn for_family(family: AdapterFamily, config: &StepConfig) -> Self {
        match family {
            AdapterFamily::SingleThread => Self::new(
                ThreadResolver::Single { sentinel: None },
                StepExecutor::Single,
                WaitStrategy::EventDriven,
            ),
            AdapterFamily::MultiContext => Self::new(
                ThreadResolver::Multi,
                StepExecutor::Multi,
                WaitStrategy::EventDriven,
            ),
            AdapterFamily::SingleThreadPolling => Self::new(
                ThreadResolver::Single { sentinel: None },
                StepExecutor::Single,
                WaitStrategy::Polling {
                    interval: config.poll_interval,
                },
            ),
        }
    }
}

/// Lookup table from adapter family tag to strategies.
///
/// Unknown families are an error, never a default.
///
/// # Example
///
/// ```
/// use stepwise_runtime::{StepConfig, StrategyTable};
///
/// let table = StrategyTable::new(&StepConfig::default());
/// assert!(table.get("multi-context").is_ok());
/// assert!(table.get("lldb").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct StrategyTable {
    entries: HashMap<String, StrategySet>,
}

impl StrategyTable {
    /// Creates a table with every built-in family.
    pub fn new(config: &StepConfig) -> Self {
        let mut table = Self::empty();
        for family in AdapterFamily::ALL {
            table.register(family.as_str(), StrategySet::for_family(family, config));
        }
        table
    }

    /// Creates an empty table.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Adds or replaces the entry for a family tag.
    pub fn register(&mut self, family: impl Into<String>, strategies: StrategySet) {
        self.entries.insert(family.into(), strategies);
    }

    /// Strategies for a family tag.
    pub fn get(&self, family: &str) -> Result<StrategySet> {
        self.entries
            .get(family)
            .copied()
            .ok_or_else(|| StepError::UnknownAdapter(family.to_string()))
    }

    /// Strategies for a session.
    ///
    /// Sessions that report a raw adapter type (`dart`, `pwa-node`, ...)
    /// instead of a family tag are mapped through
    /// [`AdapterFamily::for_session_type`].
    pub fn for_session(&self, session: &dyn DebugSession) -> Result<StrategySet> {
        let tag = session.adapter_family();
        if let Some(set) = self.entries.get(tag) {
            return Ok(*set);
        }

        AdapterFamily::for_session_type(tag)
            .and_then(|family| self.entries.get(family.as_str()).copied())
            .ok_or_else(|| StepError::UnknownAdapter(tag.to_string()))
    }

    /// Lists registered family tags.
    pub fn list(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::new(&StepConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stepwise_adapters::ScriptedSession;
    use stepwise_models::ExecutionContextId;

    #[test]
    fn test_builtin_entries() {
        let table = StrategyTable::default();
        assert_eq!(table.len(), 3);

        let list = table.list();
        assert!(list.contains(&"single-thread"));
        assert!(list.contains(&"multi-context"));
        assert!(list.contains(&"single-thread-polling"));
    }

    #[test]
    fn test_family_mapping() {
        let table = StrategyTable::default();

        let single = table.get("single-thread").unwrap();
        assert_eq!(single.resolver, ThreadResolver::Single { sentinel: None });
        assert_eq!(single.executor, StepExecutor::Single);
        assert_eq!(single.wait, WaitStrategy::EventDriven);

        let multi = table.get("multi-context").unwrap();
        assert_eq!(multi.resolver, ThreadResolver::Multi);
        assert_eq!(multi.executor, StepExecutor::Multi);
        assert_eq!(multi.wait, WaitStrategy::EventDriven);
    }

    #[test]
    fn test_polling_uses_configured_interval() {
        let config = StepConfig::new().with_poll_interval(Duration::from_millis(20));
        let table = StrategyTable::new(&config);

        let polling = table.get("single-thread-polling").unwrap();
        assert_eq!(
            polling.wait,
            WaitStrategy::Polling {
                interval: Duration::from_millis(20)
            }
        );
    }

    #[test]
    fn test_unknown_family_fails() {
        let table = StrategyTable::default();
        assert_eq!(
            table.get("multi-thread"),
            Err(StepError::UnknownAdapter("multi-thread".into()))
        );
    }

    #[test]
    fn test_register_new_family() {
        let mut table = StrategyTable::empty();
        assert!(table.is_empty());

        table.register(
            "embedded",
            StrategySet::new(
                ThreadResolver::Single {
                    sentinel: Some(ExecutionContextId::new(1)),
                },
                StepExecutor::Single,
                WaitStrategy::Polling {
                    interval: Duration::from_millis(250),
                },
            ),
        );

        assert_eq!(table.len(), 1);
        assert!(table.get("embedded").is_ok());
        assert!(table.get("single-thread").is_err());
    }

    #[test]
    fn test_for_session_maps_raw_types() {
        let table = StrategyTable::default();

        let dart = ScriptedSession::new("s1", "dart");
        assert_eq!(table.for_session(&dart).unwrap().resolver, ThreadResolver::Multi);

        let node = ScriptedSession::new("s2", "pwa-node");
        assert_eq!(
            table.for_session(&node).unwrap().executor,
            StepExecutor::Single
        );

        let lldb = ScriptedSession::new("s3", "lldb");
        assert_eq!(
            table.for_session(&lldb),
            Err(StepError::UnknownAdapter("lldb".into()))
        );
    }
}
