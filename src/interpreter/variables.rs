//! Shell Variables
//!
//! The variable table: scalars and sparse indexed arrays, the export flag,
//! the readonly set, and `local` frames.
//!
//! A local frame records the binding each name had before the first `local`
//! in that frame (including "was unset"). Popping the frame restores those
//! bindings verbatim, innermost frame first.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::interpreter::errors::ExpansionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    Scalar(String),
    Array(BTreeMap<usize, String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellVariable {
    pub value: VarValue,
    pub exported: bool,
}

impl ShellVariable {
    pub fn scalar(value: impl Into<String>) -> Self {
        Self {
            value: VarValue::Scalar(value.into()),
            exported: false,
        }
    }

    /// Scalar value, or element 0 of an array.
    pub fn as_scalar(&self) -> Option<&str> {
        match &self.value {
            VarValue::Scalar(s) => Some(s),
            VarValue::Array(items) => items.get(&0).map(String::as_str),
        }
    }

    /// Values in index order; a scalar is a one-element list.
    pub fn values(&self) -> Vec<String> {
        match &self.value {
            VarValue::Scalar(s) => vec![s.clone()],
            VarValue::Array(items) => items.values().cloned().collect(),
        }
    }

    /// Environment representation: arrays are joined with spaces.
    pub fn env_value(&self) -> String {
        match &self.value {
            VarValue::Scalar(s) => s.clone(),
            VarValue::Array(items) => items.values().cloned().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Saved prior bindings for one function call.
#[derive(Debug, Default)]
struct LocalFrame {
    saved: Vec<(String, Option<ShellVariable>)>,
}

#[derive(Debug, Default)]
pub struct VariableStore {
    vars: HashMap<String, ShellVariable>,
    readonly: HashSet<String>,
    frames: Vec<LocalFrame>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Import the process environment; every imported variable is exported.
    pub fn import_env<I>(&mut self, env: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in env {
            self.vars.insert(
                name,
                ShellVariable {
                    value: VarValue::Scalar(value),
                    exported: true,
                },
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<&ShellVariable> {
        self.vars.get(name)
    }

    pub fn get_scalar(&self, name: &str) -> Option<&str> {
        self.vars.get(name).and_then(ShellVariable::as_scalar)
    }

    pub fn get_element(&self, name: &str, index: usize) -> Option<&str> {
        match &self.vars.get(name)?.value {
            VarValue::Scalar(s) if index == 0 => Some(s),
            VarValue::Scalar(_) => None,
            VarValue::Array(items) => items.get(&index).map(String::as_str),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn is_readonly(&self, name: &str) -> bool {
        self.readonly.contains(name)
    }

    pub fn mark_readonly(&mut self, name: &str) {
        self.readonly.insert(name.to_string());
    }

    pub fn readonly_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.readonly.iter().cloned().collect();
        names.sort();
        names
    }

    fn check_writable(&self, name: &str) -> Result<(), ExpansionError> {
        if self.readonly.contains(name) {
            return Err(ExpansionError::Readonly(name.to_string()));
        }
        Ok(())
    }

    /// Assign a scalar, keeping the export flag of an existing variable.
    pub fn set_scalar(&mut self, name: &str, value: impl Into<String>) -> Result<(), ExpansionError> {
        self.check_writable(name)?;
        let value = value.into();
        match self.vars.get_mut(name) {
            Some(var) => match &mut var.value {
                VarValue::Array(items) => {
                    items.insert(0, value);
                }
                VarValue::Scalar(s) => *s = value,
            },
            None => {
                self.vars.insert(name.to_string(), ShellVariable::scalar(value));
            }
        }
        Ok(())
    }

    pub fn append_scalar(&mut self, name: &str, suffix: &str) -> Result<(), ExpansionError> {
        let current = self.get_scalar(name).unwrap_or_default().to_string();
        self.set_scalar(name, current + suffix)
    }

    /// Replace the whole variable with an array.
    pub fn set_array(&mut self, name: &str, values: Vec<String>) -> Result<(), ExpansionError> {
        self.check_writable(name)?;
        let items: BTreeMap<usize, String> = values.into_iter().enumerate().collect();
        let exported = self.vars.get(name).is_some_and(|v| v.exported);
        self.vars.insert(
            name.to_string(),
            ShellVariable {
                value: VarValue::Array(items),
                exported,
            },
        );
        Ok(())
    }

    /// `name+=(...)`: append after the highest index.
    pub fn append_array(&mut self, name: &str, values: Vec<String>) -> Result<(), ExpansionError> {
        self.check_writable(name)?;
        let var = self
            .vars
            .entry(name.to_string())
            .or_insert_with(|| ShellVariable {
                value: VarValue::Array(BTreeMap::new()),
                exported: false,
            });
        if let VarValue::Scalar(s) = &var.value {
            let mut items = BTreeMap::new();
            items.insert(0, s.clone());
            var.value = VarValue::Array(items);
        }
        if let VarValue::Array(items) = &mut var.value {
            let mut next = items.keys().next_back().map_or(0, |k| k + 1);
            for value in values {
                items.insert(next, value);
                next += 1;
            }
        }
        Ok(())
    }

    /// `name[index]=value`; a scalar becomes an array with its value at 0.
    pub fn set_element(&mut self, name: &str, index: usize, value: String) -> Result<(), ExpansionError> {
        self.check_writable(name)?;
        let var = self
            .vars
            .entry(name.to_string())
            .or_insert_with(|| ShellVariable {
                value: VarValue::Array(BTreeMap::new()),
                exported: false,
            });
        match &mut var.value {
            VarValue::Scalar(s) if index == 0 => *s = value,
            VarValue::Scalar(s) => {
                let mut items = BTreeMap::new();
                items.insert(0, std::mem::take(s));
                items.insert(index, value);
                var.value = VarValue::Array(items);
            }
            VarValue::Array(items) => {
                items.insert(index, value);
            }
        }
        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> Result<(), ExpansionError> {
        self.check_writable(name)?;
        self.vars.remove(name);
        Ok(())
    }

    pub fn unset_element(&mut self, name: &str, index: usize) -> Result<(), ExpansionError> {
        self.check_writable(name)?;
        let remove_whole = match self.vars.get_mut(name).map(|v| &mut v.value) {
            Some(VarValue::Array(items)) => {
                items.remove(&index);
                false
            }
            Some(VarValue::Scalar(_)) => index == 0,
            None => false,
        };
        if remove_whole {
            self.vars.remove(name);
        }
        Ok(())
    }

    /// Mark a variable exported, creating it empty-and-unset-valued if needed.
    pub fn export(&mut self, name: &str) {
        if let Some(var) = self.vars.get_mut(name) {
            var.exported = true;
        } else {
            self.vars.insert(
                name.to_string(),
                ShellVariable {
                    value: VarValue::Scalar(String::new()),
                    exported: true,
                },
            );
        }
    }

    pub fn unexport(&mut self, name: &str) {
        if let Some(var) = self.vars.get_mut(name) {
            var.exported = false;
        }
    }

    pub fn is_exported(&self, name: &str) -> bool {
        self.vars.get(name).is_some_and(|v| v.exported)
    }

    /// `NAME=value` pairs for a child's environment.
    pub fn exported_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .vars
            .iter()
            .filter(|(_, v)| v.exported)
            .map(|(k, v)| (k.clone(), v.env_value()))
            .collect();
        pairs.sort();
        pairs
    }

    /// Every variable name, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.keys().cloned().collect();
        names.sort();
        names
    }

    // ------------------------------------------------------------------
    // Binding snapshots (temporary assignments, local frames)
    // ------------------------------------------------------------------

    /// Current binding of `name`, `None` when unset.
    pub fn snapshot(&self, name: &str) -> Option<ShellVariable> {
        self.vars.get(name).cloned()
    }

    /// Put back a binding taken with [`snapshot`](Self::snapshot),
    /// bypassing the readonly check.
    pub fn restore(&mut self, name: &str, binding: Option<ShellVariable>) {
        match binding {
            Some(var) => {
                self.vars.insert(name.to_string(), var);
            }
            None => {
                self.vars.remove(name);
            }
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(LocalFrame::default());
    }

    pub fn pop_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            for (name, binding) in frame.saved.into_iter().rev() {
                self.restore(&name, binding);
            }
        }
    }

    pub fn in_frame(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Make `name` local to the innermost frame. The prior binding is saved
    /// the first time only; the variable keeps its current value.
    pub fn declare_local(&mut self, name: &str) -> Result<(), ExpansionError> {
        self.check_writable(name)?;
        let prior = self.snapshot(name);
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        if !frame.saved.iter().any(|(saved, _)| saved == name) {
            frame.saved.push((name.to_string(), prior));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_and_array() {
        let mut store = VariableStore::new();
        store.set_scalar("a", "1").unwrap();
        assert_eq!(store.get_scalar("a"), Some("1"));

        store.set_element("a", 3, "x".into()).unwrap();
        assert_eq!(store.get("a").unwrap().values(), vec!["1", "x"]);
        assert_eq!(store.get_element("a", 3), Some("x"));

        store.append_array("a", vec!["y".into()]).unwrap();
        assert_eq!(store.get_element("a", 4), Some("y"));
        assert_eq!(store.get("a").unwrap().env_value(), "1 x y");
    }

    #[test]
    fn test_readonly_rejects_writes() {
        let mut store = VariableStore::new();
        store.set_scalar("r", "v").unwrap();
        store.mark_readonly("r");
        assert!(matches!(store.set_scalar("r", "w"), Err(ExpansionError::Readonly(_))));
        assert!(store.unset("r").is_err());
        assert_eq!(store.get_scalar("r"), Some("v"));
    }

    #[test]
    fn test_local_frames_restore_absence() {
        let mut store = VariableStore::new();
        store.set_scalar("outer", "1").unwrap();

        store.push_frame();
        store.declare_local("outer").unwrap();
        store.set_scalar("outer", "2").unwrap();
        store.declare_local("fresh").unwrap();
        store.set_scalar("fresh", "x").unwrap();
        store.declare_local("outer").unwrap();
        store.set_scalar("outer", "3").unwrap();
        store.pop_frame();

        assert_eq!(store.get_scalar("outer"), Some("1"));
        assert!(!store.contains("fresh"));
    }

    #[test]
    fn test_nested_frames() {
        let mut store = VariableStore::new();
        store.push_frame();
        store.declare_local("x").unwrap();
        store.set_scalar("x", "a").unwrap();
        store.push_frame();
        store.declare_local("x").unwrap();
        store.set_scalar("x", "b").unwrap();
        store.pop_frame();
        assert_eq!(store.get_scalar("x"), Some("a"));
        store.pop_frame();
        assert_eq!(store.get_scalar("x"), None);
    }

    #[test]
    fn test_exported_pairs() {
        let mut store = VariableStore::new();
        store.import_env(vec![("HOME".to_string(), "/root".to_string())]);
        store.set_scalar("plain", "p").unwrap();
        store.set_array("list", vec!["a".into(), "b".into()]).unwrap();
        store.export("list");
        assert_eq!(
            store.exported_pairs(),
            vec![
                ("HOME".to_string(), "/root".to_string()),
                ("list".to_string(), "a b".to_string())
            ]
        );
    }
}
