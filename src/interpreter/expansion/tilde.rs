//! Tilde Expansion
//!
//! Resolves the tilde prefix of a word: the unquoted characters between a
//! leading `~` and the first `/` (or the end of the word). In assignment
//! values the same applies after every `:`.

use crate::interpreter::sys;
use crate::interpreter::variables::VariableStore;

/// Expand a tilde prefix (the text after `~`). `None` keeps the word
/// literal, as for an unknown user.
pub fn expand_tilde_prefix(vars: &VariableStore, user: &str) -> Option<String> {
    match user {
        // HOME if set (even if empty), otherwise the passwd entry
        "" => vars
            .get_scalar("HOME")
            .map(str::to_string)
            .or_else(sys::current_home_dir),
        "+" => vars.get_scalar("PWD").map(str::to_string),
        "-" => vars.get_scalar("OLDPWD").map(str::to_string),
        name if name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')) =>
        {
            sys::home_dir_of(name)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_home(home: Option<&str>) -> VariableStore {
        let mut vars = VariableStore::new();
        if let Some(h) = home {
            vars.set_scalar("HOME", h).unwrap();
        }
        vars
    }

    #[test]
    fn test_tilde_alone() {
        let vars = store_with_home(Some("/home/user"));
        assert_eq!(expand_tilde_prefix(&vars, ""), Some("/home/user".to_string()));
    }

    #[test]
    fn test_tilde_empty_home() {
        let vars = store_with_home(Some(""));
        assert_eq!(expand_tilde_prefix(&vars, ""), Some(String::new()));
    }

    #[test]
    fn test_tilde_pwd_forms() {
        let mut vars = store_with_home(None);
        vars.set_scalar("PWD", "/a").unwrap();
        vars.set_scalar("OLDPWD", "/b").unwrap();
        assert_eq!(expand_tilde_prefix(&vars, "+"), Some("/a".to_string()));
        assert_eq!(expand_tilde_prefix(&vars, "-"), Some("/b".to_string()));
    }

    #[test]
    fn test_tilde_users() {
        let vars = store_with_home(None);
        assert_eq!(expand_tilde_prefix(&vars, "root"), Some("/root".to_string()));
        assert_eq!(expand_tilde_prefix(&vars, "no_such_user_plush_x"), None);
        assert_eq!(expand_tilde_prefix(&vars, "a b"), None);
    }
}
