//! IFS (Internal Field Separator) Handling
//!
//! Centralized utilities for IFS-based word splitting used by:
//! - Word expansion (unquoted expansion results)
//! - `$*` and `${!prefix*}` joining

use crate::interpreter::variables::VariableStore;

/// Default IFS value: space, tab, newline
pub const DEFAULT_IFS: &str = " \t\n";

/// Get the effective IFS value.
/// Returns DEFAULT_IFS if IFS is unset, or the actual value (including empty string).
pub fn get_ifs(vars: &VariableStore) -> &str {
    vars.get_scalar("IFS").unwrap_or(DEFAULT_IFS)
}

/// Get the first character of IFS (used for joining with $* and ${!prefix*}).
/// Returns space if IFS is unset, empty string if IFS is empty.
pub fn get_ifs_separator(vars: &VariableStore) -> String {
    match vars.get_scalar("IFS") {
        None => " ".to_string(),
        Some(s) => s.chars().next().map(String::from).unwrap_or_default(),
    }
}

/// Check if a character is an IFS whitespace character.
pub fn is_ifs_whitespace(ch: char) -> bool {
    ch == ' ' || ch == '\t' || ch == '\n'
}

/// How one character behaves during field splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfsClass {
    /// Not a separator
    Plain,
    /// IFS whitespace: runs collapse, leading and trailing runs vanish
    Whitespace,
    /// Any other IFS character: each occurrence delimits a field
    Delimiter,
}

/// Classifier for one IFS value.
#[derive(Debug, Clone)]
pub struct Ifs {
    chars: Vec<char>,
}

impl Ifs {
    pub fn new(ifs: &str) -> Self {
        Self {
            chars: ifs.chars().collect(),
        }
    }

    pub fn from_vars(vars: &VariableStore) -> Self {
        Self::new(get_ifs(vars))
    }

    /// Empty IFS disables splitting.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn classify(&self, ch: char) -> IfsClass {
        if !self.chars.contains(&ch) {
            IfsClass::Plain
        } else if is_ifs_whitespace(ch) {
            IfsClass::Whitespace
        } else {
            IfsClass::Delimiter
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator() {
        let mut vars = VariableStore::new();
        assert_eq!(get_ifs_separator(&vars), " ");
        vars.set_scalar("IFS", ":-").unwrap();
        assert_eq!(get_ifs_separator(&vars), ":");
        vars.set_scalar("IFS", "").unwrap();
        assert_eq!(get_ifs_separator(&vars), "");
    }

    #[test]
    fn test_classify() {
        let ifs = Ifs::new(" :");
        assert_eq!(ifs.classify(' '), IfsClass::Whitespace);
        assert_eq!(ifs.classify(':'), IfsClass::Delimiter);
        assert_eq!(ifs.classify('\t'), IfsClass::Plain);
        assert!(Ifs::new("").is_empty());
    }
}
