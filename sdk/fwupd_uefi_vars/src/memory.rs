//! In-memory variable store.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use alloc::{collections::BTreeMap, string::String, vec::Vec};
use core::cell::RefCell;

use r_efi::efi;

use crate::{invalid_name, Result, VariableAttributes, VariableError, VariableStore};

type VariableKey = ([u8; 16], String);

/// [`VariableStore`] that keeps every variable in memory.
///
/// Not thread safe; the store is meant for single-threaded tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryVariableStore {
    variables: RefCell<BTreeMap<VariableKey, (Vec<u8>, VariableAttributes)>>,
}

impl MemoryVariableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the variable exists.
    pub fn contains(&self, namespace: &efi::Guid, name: &str) -> bool {
        self.variables.borrow().contains_key(&Self::key(namespace, name))
    }

    /// Number of stored variables across all namespaces.
    pub fn len(&self) -> usize {
        self.variables.borrow().len()
    }

    /// Returns true if no variable is stored.
    pub fn is_empty(&self) -> bool {
        self.variables.borrow().is_empty()
    }

    fn key(namespace: &efi::Guid, name: &str) -> VariableKey {
        (*namespace.as_bytes(), String::from(name))
    }
}

impl VariableStore for MemoryVariableStore {
    fn get_variable(&self, namespace: &efi::Guid, name: &str) -> Result<(Vec<u8>, VariableAttributes)> {
        self.variables.borrow().get(&Self::key(namespace, name)).cloned().ok_or(VariableError::NotFound)
    }

    fn set_variable(
        &self,
        namespace: &efi::Guid,
        name: &str,
        data: &[u8],
        attributes: VariableAttributes,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(invalid_name(name));
        }
        self.variables.borrow_mut().insert(Self::key(namespace, name), (data.to_vec(), attributes));
        Ok(())
    }

    fn delete_variable(&self, namespace: &efi::Guid, name: &str) -> Result<()> {
        self.variables.borrow_mut().remove(&Self::key(namespace, name)).map(|_| ()).ok_or(VariableError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FWUPDATE_NAMESPACE;

    const OTHER_NAMESPACE: efi::Guid = efi::Guid::from_fields(1, 2, 3, 4, 5, &[6, 7, 8, 9, 10, 11]);

    #[test]
    fn test_set_get_delete() {
        let store = MemoryVariableStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get_variable(&FWUPDATE_NAMESPACE, "a"), Err(VariableError::NotFound));

        store.set_variable(&FWUPDATE_NAMESPACE, "a", &[1, 2, 3], VariableAttributes::PERSISTENT).unwrap();
        assert!(store.contains(&FWUPDATE_NAMESPACE, "a"));
        assert_eq!(
            store.get_variable(&FWUPDATE_NAMESPACE, "a"),
            Ok((vec![1, 2, 3], VariableAttributes::PERSISTENT))
        );

        store.delete_variable(&FWUPDATE_NAMESPACE, "a").unwrap();
        assert!(!store.contains(&FWUPDATE_NAMESPACE, "a"));
        assert_eq!(store.delete_variable(&FWUPDATE_NAMESPACE, "a"), Err(VariableError::NotFound));
    }

    #[test]
    fn test_namespaces_are_separate() {
        let store = MemoryVariableStore::new();
        store.set_variable(&FWUPDATE_NAMESPACE, "a", &[1], VariableAttributes::PERSISTENT).unwrap();
        store.set_variable(&OTHER_NAMESPACE, "a", &[2], VariableAttributes::NON_VOLATILE).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_variable(&OTHER_NAMESPACE, "a").unwrap().0, vec![2]);
        assert_eq!(store.get_variable(&FWUPDATE_NAMESPACE, "a").unwrap().0, vec![1]);
    }

    #[test]
    fn test_set_replaces_existing() {
        let store = MemoryVariableStore::new();
        store.set_variable(&FWUPDATE_NAMESPACE, "a", &[1], VariableAttributes::PERSISTENT).unwrap();
        store.set_variable(&FWUPDATE_NAMESPACE, "a", &[9, 9], VariableAttributes::NON_VOLATILE).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get_variable(&FWUPDATE_NAMESPACE, "a"),
            Ok((vec![9, 9], VariableAttributes::NON_VOLATILE))
        );
    }
}
