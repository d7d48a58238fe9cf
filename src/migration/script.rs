//! Migration scripts and the registry that chains them.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::EventPayload;

/// Error returned by a transform
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

/// Transform signature: takes the payload at `from_version`, returns it at
/// `to_version`.
pub type TransformFn = Arc<dyn Fn(EventPayload) -> Result<EventPayload, TransformError> + Send + Sync>;

/// One registered single-hop migration.
#[derive(Clone)]
pub struct MigrationScript {
    pub event_type: String,
    pub from_version: String,
    pub to_version: String,
    pub transform: TransformFn,
    pub description: String,
}

impl MigrationScript {
    pub fn new<F>(
        event_type: impl Into<String>,
        from_version: impl Into<String>,
        to_version: impl Into<String>,
        transform: F,
    ) -> Self
    where
        F: Fn(EventPayload) -> Result<EventPayload, TransformError> + Send + Sync + 'static,
    {
        Self {
            event_type: event_type.into(),
            from_version: from_version.into(),
            to_version: to_version.into(),
            transform: Arc::new(transform),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn apply(&self, payload: EventPayload) -> Result<EventPayload, TransformError> {
        (self.transform)(payload)
    }

    fn key(&self) -> ScriptKey {
        (self.from_version.clone(), self.to_version.clone())
    }
}

impl fmt::Debug for MigrationScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationScript")
            .field("event_type", &self.event_type)
            .field("from_version", &self.from_version)
            .field("to_version", &self.to_version)
            .field("description", &self.description)
            .finish()
    }
}

/// (from_version, to_version)
type ScriptKey = (String, String);

/// Scripts per event type, keyed by version pair.
#[derive(Default)]
pub(crate) struct ScriptRegistry {
    scripts: RwLock<HashMap<String, BTreeMap<ScriptKey, MigrationScript>>>,
}

impl ScriptRegistry {
    /// Store `script`, returning the one it replaced
    pub fn insert(&self, script: MigrationScript) -> Option<MigrationScript> {
        self.scripts
            .write()
            .entry(script.event_type.clone())
            .or_default()
            .insert(script.key(), script)
    }

    pub fn remove(&self, event_type: &str, from_version: &str, to_version: &str) -> bool {
        let mut scripts = self.scripts.write();
        let Some(by_pair) = scripts.get_mut(event_type) else {
            return false;
        };
        let removed = by_pair
            .remove(&(from_version.to_string(), to_version.to_string()))
            .is_some();
        if by_pair.is_empty() {
            scripts.remove(event_type);
        }
        removed
    }

    pub fn get(&self, event_type: &str, from_version: &str, to_version: &str) -> Option<MigrationScript> {
        self.scripts
            .read()
            .get(event_type)?
            .get(&(from_version.to_string(), to_version.to_string()))
            .cloned()
    }

    /// All scripts for `event_type`, ordered by (from, to)
    pub fn for_event_type(&self, event_type: &str) -> Vec<MigrationScript> {
        self.scripts
            .read()
            .get(event_type)
            .map(|by_pair| by_pair.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.scripts.read().values().map(BTreeMap::len).sum()
    }

    /// Shortest chain of scripts from `from_version` to `to_version`.
    ///
    /// Breadth-first over the registered `(from, to)` edges of one event
    /// type; ties resolve in version-pair order. Equal versions yield an
    /// empty chain.
    pub fn shortest_path(
        &self,
        event_type: &str,
        from_version: &str,
        to_version: &str,
    ) -> Option<Vec<MigrationScript>> {
        if from_version == to_version {
            return Some(Vec::new());
        }

        let scripts = self.scripts.read();
        let by_pair = scripts.get(event_type)?;

        let mut edges: HashMap<&str, Vec<&MigrationScript>> = HashMap::new();
        for script in by_pair.values() {
            edges.entry(script.from_version.as_str()).or_default().push(script);
        }

        // node -> script that first reached it
        let mut reached_by: HashMap<&str, &MigrationScript> = HashMap::new();
        let mut queue = VecDeque::from([from_version]);

        while let Some(current) = queue.pop_front() {
            for &script in edges.get(current).into_iter().flatten() {
                let next = script.to_version.as_str();
                if next == from_version || reached_by.contains_key(next) {
                    continue;
                }
                reached_by.insert(next, script);

                if next == to_version {
                    let mut path = vec![script.clone()];
                    let mut node = script.from_version.as_str();
                    while node != from_version {
                        let step = reached_by.get(node)?;
                        path.push((*step).clone());
                        node = step.from_version.as_str();
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }
}
