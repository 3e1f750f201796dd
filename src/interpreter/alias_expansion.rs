//! Alias Table
//!
//! Name to replacement-text map consulted by the parser for the first word
//! of each simple command. Expansion itself happens while parsing (see
//! [`Parser::with_aliases`](crate::parser::Parser::with_aliases)), which
//! tracks the aliases being expanded and bounds the chain depth.

use std::collections::BTreeMap;

use crate::interpreter::expansion::parameter_ops::quote_value;
use crate::parser::AliasLookup;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Returns false when no alias had that name.
    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `alias name='value'`, the form `alias` prints and reads back.
    pub fn format_entry(&self, name: &str) -> Option<String> {
        self.lookup(name)
            .map(|value| format!("alias {}={}", name, quote_value(value)))
    }

    /// All definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl AliasLookup for AliasTable {
    fn lookup_alias(&self, name: &str) -> Option<&str> {
        self.lookup(name)
    }
}

/// Valid alias names: no quoting, expansion or command syntax characters.
pub fn is_valid_alias_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(|c: char| {
            c.is_whitespace() || matches!(c, '=' | '/' | '$' | '`' | '\'' | '"' | '\\' | ';' | '|' | '&' | '<' | '>' | '(' | ')')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Command;
    use crate::parser::Parser;

    #[test]
    fn test_insert_lookup_remove() {
        let mut table = AliasTable::default();
        table.insert("ll", "ls -l");
        assert_eq!(table.lookup("ll"), Some("ls -l"));
        assert_eq!(table.format_entry("ll").as_deref(), Some("alias ll='ls -l'"));
        assert!(table.remove("ll"));
        assert!(!table.remove("ll"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_parser_uses_table() {
        let mut table = AliasTable::default();
        table.insert("greet", "echo hi");
        let list = Parser::new("greet there")
            .unwrap()
            .with_aliases(&table, 16)
            .parse_program()
            .unwrap();
        match &list.entries[0].command {
            Command::Pipeline(p) => {
                let words: Vec<&str> = p.segments[0].words.iter().map(|w| w.text.as_str()).collect();
                assert_eq!(words, vec!["echo", "hi", "there"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_stops() {
        let mut table = AliasTable::default();
        table.insert("ls", "ls -F");
        let list = Parser::new("ls")
            .unwrap()
            .with_aliases(&table, 16)
            .parse_program()
            .unwrap();
        match &list.entries[0].command {
            Command::Pipeline(p) => assert_eq!(p.segments[0].words.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_alias_names() {
        assert!(is_valid_alias_name("ll"));
        assert!(is_valid_alias_name("g++"));
        assert!(!is_valid_alias_name("a=b"));
        assert!(!is_valid_alias_name("a b"));
        assert!(!is_valid_alias_name(""));
    }
}
