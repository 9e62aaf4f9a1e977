use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which family of scalars a snapshot read returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Scalars,
    KeyedScalars,
}

/// A single recorded telemetry value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Count(u64),
    Flag(bool),
    Text(String),
    Keyed(BTreeMap<String, u64>),
}

impl ScalarValue {
    pub fn is_keyed(&self) -> bool {
        matches!(self, ScalarValue::Keyed(_))
    }

    pub fn as_count(&self) -> Option<u64> {
        match self {
            ScalarValue::Count(count) => Some(*count),
            _ => None,
        }
    }

    pub fn keyed(&self, key: &str) -> Option<u64> {
        match self {
            ScalarValue::Keyed(values) => values.get(key).copied(),
            _ => None,
        }
    }
}

/// Scalars of one process, by scalar name.
pub type ProcessScalars = BTreeMap<String, ScalarValue>;

/// Point-in-time read of the telemetry store: process name -> scalar name -> value.
///
/// Processes without any scalar are never listed, so "process present" and "process recorded
/// something" mean the same thing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    processes: BTreeMap<String, ProcessScalars>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn processes(&self) -> impl Iterator<Item = &str> {
        self.processes.keys().map(String::as_str)
    }

    pub fn process(&self, process: &str) -> Option<&ProcessScalars> {
        self.processes.get(process)
    }

    pub fn has_process(&self, process: &str) -> bool {
        self.processes.contains_key(process)
    }

    /// True when every given process recorded at least one scalar.
    pub fn has_processes<'a>(&self, processes: impl IntoIterator<Item = &'a str>) -> bool {
        processes
            .into_iter()
            .all(|process| self.has_process(process))
    }

    pub fn scalar(&self, process: &str, name: &str) -> Option<&ScalarValue> {
        self.processes.get(process)?.get(name)
    }

    pub fn keyed_value(&self, process: &str, name: &str, key: &str) -> Option<u64> {
        self.scalar(process, name)?.keyed(key)
    }

    pub fn insert(&mut self, process: &str, name: &str, value: ScalarValue) {
        self.processes
            .entry(process.to_owned())
            .or_default()
            .insert(name.to_owned(), value);
    }

    /// Adds `delta` to a counting scalar, creating it when missing.
    pub fn add_count(&mut self, process: &str, name: &str, delta: u64) {
        let scalars = self.processes.entry(process.to_owned()).or_default();
        match scalars.get_mut(name) {
            Some(ScalarValue::Count(count)) => *count += delta,
            _ => {
                scalars.insert(name.to_owned(), ScalarValue::Count(delta));
            }
        }
    }

    /// Adds `delta` to a keyed scalar, creating it when missing. A plain scalar stored under the
    /// same name is replaced.
    pub fn add_keyed(&mut self, process: &str, name: &str, key: &str, delta: u64) {
        let scalars = self.processes.entry(process.to_owned()).or_default();
        let value = scalars
            .entry(name.to_owned())
            .or_insert_with(|| ScalarValue::Keyed(BTreeMap::new()));
        if !value.is_keyed() {
            *value = ScalarValue::Keyed(BTreeMap::new());
        }
        if let ScalarValue::Keyed(values) = value {
            *values.entry(key.to_owned()).or_default() += delta;
        }
    }

    /// Copy restricted to one family of scalars. Processes left without scalars are dropped.
    pub fn of_kind(&self, kind: SnapshotKind) -> Snapshot {
        let keyed = kind == SnapshotKind::KeyedScalars;
        let processes = self
            .processes
            .iter()
            .filter_map(|(process, scalars)| {
                let scalars: ProcessScalars = scalars
                    .iter()
                    .filter(|(_, value)| value.is_keyed() == keyed)
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                (!scalars.is_empty()).then(|| (process.clone(), scalars))
            })
            .collect();
        Snapshot { processes }
    }

    /// Removes one family of scalars and returns what was removed.
    pub fn take_kind(&mut self, kind: SnapshotKind) -> Snapshot {
        let taken = self.of_kind(kind);
        let other = match kind {
            SnapshotKind::Scalars => SnapshotKind::KeyedScalars,
            SnapshotKind::KeyedScalars => SnapshotKind::Scalars,
        };
        *self = self.of_kind(other);
        taken
    }
}
