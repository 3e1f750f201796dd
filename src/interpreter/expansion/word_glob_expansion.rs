//! Pathname Expansion
//!
//! Expands the unquoted glob metacharacters of a split field against the
//! filesystem. A pattern that matches nothing stays as the literal word.

use glob::MatchOptions;
use log::trace;

use crate::interpreter::expansion::word_split::Field;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Turn one field into its final words.
pub fn glob_field(field: Field, noglob: bool) -> Vec<String> {
    if noglob || !field.globbable {
        return vec![field.value];
    }
    let paths = match glob::glob_with(&field.glob_pattern, MATCH_OPTIONS) {
        Ok(paths) => paths,
        Err(err) => {
            trace!("invalid glob pattern {:?}: {}", field.glob_pattern, err);
            return vec![field.value];
        }
    };
    let mut matches: Vec<String> = paths
        .filter_map(Result::ok)
        .map(|path| path.to_string_lossy().into_owned())
        .collect();
    if matches.is_empty() {
        return vec![field.value];
    }
    matches.sort();
    matches
}

/// Glob every field, in order.
pub fn glob_fields(fields: Vec<Field>, noglob: bool) -> Vec<String> {
    fields
        .into_iter()
        .flat_map(|field| glob_field(field, noglob))
        .collect()
}
