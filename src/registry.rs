//! Scoped Registry - publish stores to descendant consumers
//!
//! A [`Registry`] maps injection keys to shared values. Scopes form a tree:
//! a child sees everything its ancestors published and may shadow it.
//! Lookups fail loudly with [`RegistryError::NotFound`] when nothing up the
//! chain published the key.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Name a value is published under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InjectionKey(Cow<'static, str>);

impl InjectionKey {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InjectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for InjectionKey {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

pub const LIST_STORE_KEY: InjectionKey = InjectionKey::from_static("ListStore");
pub const EDIT_STORE_KEY: InjectionKey = InjectionKey::from_static("EditStore");
pub const EDIT_MODAL_STORE_KEY: InjectionKey = InjectionKey::from_static("EditModalStore");
pub const REMOVE_STORE_KEY: InjectionKey = InjectionKey::from_static("RemoveStore");
pub const MODAL_STORE_KEY: InjectionKey = InjectionKey::from_static("ModalStore");

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No value published for key '{0}'")]
    NotFound(InjectionKey),

    #[error("Value published for key '{0}' has a different type")]
    TypeMismatch(InjectionKey),

    #[error("Injection key is not defined")]
    MissingKey,
}

/// Values that know the key they are normally published under
pub trait Injectable {
    fn injection_key(&self) -> Option<InjectionKey> {
        None
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    parent: Option<Arc<Registry>>,
    entries: RwLock<HashMap<InjectionKey, Entry>>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(ToString::to_string)
            .collect();
        f.debug_struct("Registry")
            .field("keys", &keys)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Registry {
    pub fn root() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// New scope whose lookups fall back to `self`
    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(self)),
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Publish `value` in this scope, replacing anything under the same key
    pub fn publish<T: Any + Send + Sync>(&self, key: InjectionKey, value: T) {
        tracing::debug!("[registry] publish {}", key);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::new(value));
    }

    /// Nearest value published under `key`, walking up the scope chain
    pub fn lookup<T: Any + Clone>(&self, key: &InjectionKey) -> Result<T, RegistryError> {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();

        match entry {
            Some(entry) => entry
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| RegistryError::TypeMismatch(key.clone())),
            None => match &self.parent {
                Some(parent) => parent.lookup(key),
                None => Err(RegistryError::NotFound(key.clone())),
            },
        }
    }

    pub fn contains(&self, key: &InjectionKey) -> bool {
        let here = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key);
        here || self.parent.as_ref().is_some_and(|p| p.contains(key))
    }
}

/// Publish `value` under `key`, or under its own default key
pub fn with_injection<T>(
    registry: &Registry,
    value: T,
    key: Option<InjectionKey>,
) -> Result<T, RegistryError>
where
    T: Injectable + Clone + Any + Send + Sync,
{
    let key = key
        .or_else(|| value.injection_key())
        .ok_or(RegistryError::MissingKey)?;
    registry.publish(key, value.clone());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter(u32);

    impl Injectable for Counter {
        fn injection_key(&self) -> Option<InjectionKey> {
            Some(InjectionKey::from_static("Counter"))
        }
    }

    #[derive(Debug, Clone)]
    struct Anonymous;

    impl Injectable for Anonymous {}

    #[test]
    fn test_lookup_walks_up_scopes() {
        let root = Registry::root();
        root.publish("answer".into(), 42_u32);
        let child = root.child().child();

        assert_eq!(child.lookup::<u32>(&"answer".into()), Ok(42));
        assert!(child.contains(&"answer".into()));
    }

    #[test]
    fn test_child_shadows_parent() {
        let root = Registry::root();
        root.publish("name".into(), "root".to_string());
        let child = root.child();
        child.publish("name".into(), "child".to_string());

        assert_eq!(child.lookup::<String>(&"name".into()).unwrap(), "child");
        assert_eq!(root.lookup::<String>(&"name".into()).unwrap(), "root");
    }

    #[test]
    fn test_missing_key_fails_loudly() {
        let root = Registry::root();
        let err = root.lookup::<u32>(&LIST_STORE_KEY).unwrap_err();
        assert_eq!(err, RegistryError::NotFound(LIST_STORE_KEY));
        assert_eq!(err.to_string(), "No value published for key 'ListStore'");
    }

    #[test]
    fn test_type_mismatch() {
        let root = Registry::root();
        root.publish("n".into(), 1_u8);
        assert!(matches!(
            root.lookup::<String>(&"n".into()),
            Err(RegistryError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_with_injection_uses_default_or_explicit_key() {
        let root = Registry::root();
        with_injection(&root, Counter(1), None).unwrap();
        with_injection(&root, Counter(2), Some(InjectionKey::new("Other"))).unwrap();

        assert_eq!(root.lookup::<Counter>(&"Counter".into()), Ok(Counter(1)));
        assert_eq!(root.lookup::<Counter>(&InjectionKey::new("Other")), Ok(Counter(2)));
        assert_eq!(
            with_injection(&root, Anonymous, None).unwrap_err(),
            RegistryError::MissingKey
        );
    }
}
