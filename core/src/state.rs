use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::PipelineError;

/// Key under which the runner seeds the user's query.
pub const USER_QUERY_KEY: &str = "user_query";

pub type StateSnapshot = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    values: Arc<RwLock<HashMap<String, String>>>,
    parent: Option<Box<SessionState>>,
    claims: Vec<(Arc<WriteScope>, usize)>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let local = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();

        match local {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|p| p.get(key)),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_local(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), PipelineError> {
        let key = key.into();

        for (scope, sibling) in &self.claims {
            scope.claim(&key, *sibling)?;
        }

        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.into());
        Ok(())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let mut snapshot = self
            .parent
            .as_ref()
            .map(|p| p.snapshot())
            .unwrap_or_default();

        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        snapshot.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        snapshot
    }

    pub fn layered(&self) -> SessionState {
        SessionState {
            values: Arc::default(),
            parent: Some(Box::new(self.clone())),
            claims: Vec::new(),
        }
    }

    pub fn in_scope(&self, scope: &Arc<WriteScope>, sibling: usize) -> SessionState {
        let mut scoped = self.clone();
        scoped.claims.push((scope.clone(), sibling));
        scoped
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SessionState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<HashMap<_, _>>();

        Self {
            values: Arc::new(RwLock::new(values)),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct WriteScope {
    owners: Mutex<HashMap<String, usize>>,
}

impl WriteScope {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&self, key: &str, sibling: usize) -> Result<(), PipelineError> {
        let mut owners = self.owners.lock().unwrap_or_else(PoisonError::into_inner);
        match owners.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(sibling);
                Ok(())
            }
            Entry::Occupied(owner) if *owner.get() == sibling => Ok(()),
            Entry::Occupied(_) => Err(PipelineError::WriteCollision {
                key: key.to_string(),
            }),
        }
    }
}
