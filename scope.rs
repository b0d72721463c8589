//! Component C: name/scope/path tables. Lookup, creation, and visibility of
//! names across nested scopes and branching paths.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;

use crate::state::State;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PathId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Mapping from `PathId` to (mapping from fully-scoped name to `State`).
pub type NameMap = BTreeMap<PathId, BTreeMap<String, Rc<State>>>;

fn scope_prefix(scope_chain: &[ScopeId]) -> String {
    scope_chain.iter().map(|s| s.0.to_string()).collect::<Vec<_>>().join("/")
}

/// `fully-scoped name`: the scope chain, innermost first, joined by `/`,
/// with `name` appended.
pub fn fully_scoped_name(scope_chain: &[ScopeId], name: &str) -> String {
    format!("{}/{}", scope_prefix(scope_chain), name)
}

pub struct FindResult {
    pub exists: bool,
    pub in_scope: bool,
    pub scoped_name: String,
    pub state: Option<Rc<State>>,
}

impl FindResult {
    fn not_found() -> FindResult {
        FindResult { exists: false, in_scope: false, scoped_name: String::new(), state: None }
    }
}

/// `find-in-scope(name)`. Walks outward from the innermost scope: for each
/// suffix of the scope chain (innermost first, then progressively stripping
/// inner scopes) and each `PathId` in the path chain, tests
/// `scopeSuffix + "/" + name`. `in_scope` is true only when the match came
/// from the full (untouched) chain.
pub fn find_in_scope(
    name: &str,
    scope_chain: &[ScopeId],
    path_chain: &[PathId],
    name_map: &NameMap,
) -> FindResult {
    for strip in 0..scope_chain.len() {
        let suffix = &scope_chain[strip..];
        let candidate = fully_scoped_name(suffix, name);
        for path in path_chain {
            if let Some(state) = name_map.get(path).and_then(|m| m.get(&candidate)) {
                return FindResult {
                    exists: true,
                    in_scope: strip == 0,
                    scoped_name: candidate,
                    state: Some(state.clone()),
                };
            }
        }
    }
    FindResult::not_found()
}

/// `find-out-of-scope(name)`. Scans every `PathId` in the name map for an
/// entry whose last path segment equals `name`, regardless of scope or
/// current path. Used to tell an out-of-scope read apart from a truly
/// undefined one.
pub fn find_out_of_scope(name: &str, name_map: &NameMap) -> bool {
    let suffix = format!("/{name}");
    name_map.values().any(|scoped| scoped.keys().any(|k| k.ends_with(&suffix)))
}

/// `same-scope(fullName, scopeChain)`: the scope prefix of `fullName` equals
/// the scope chain (innermost first, matching our `ScopeId` ordering).
pub fn same_scope(full_name: &str, scope_chain: &[ScopeId]) -> bool {
    match full_name.rsplit_once('/') {
        Some((prefix, _name)) => prefix == scope_prefix(scope_chain),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fully_scoped_name_joins_innermost_first() {
        assert_eq!(fully_scoped_name(&[ScopeId(2), ScopeId(0)], "x"), "2/0/x");
        assert_eq!(fully_scoped_name(&[ScopeId(0)], "x"), "0/x");
    }

    #[test]
    fn find_in_scope_walks_outward_across_scope_suffixes() {
        let mut name_map = NameMap::new();
        let path = PathId(0);
        let outer_key = fully_scoped_name(&[ScopeId(0)], "x");
        let state = Rc::new(State::fresh(outer_key.clone(), crate::types::Type::Num, "store"));
        name_map.entry(path).or_default().insert(outer_key, state);

        let inner_chain = [ScopeId(1), ScopeId(0)];
        let result = find_in_scope("x", &inner_chain, &[path], &name_map);
        assert!(result.exists);
        assert!(!result.in_scope);
        assert_eq!(result.scoped_name, "0/x");
    }

    #[test]
    fn find_in_scope_prefers_innermost_binding() {
        let mut name_map = NameMap::new();
        let path = PathId(0);
        let inner_key = fully_scoped_name(&[ScopeId(1), ScopeId(0)], "x");
        let outer_key = fully_scoped_name(&[ScopeId(0)], "x");
        name_map.entry(path).or_default().insert(inner_key.clone(), Rc::new(State::fresh(inner_key.clone(), crate::types::Type::Num, "store")));
        name_map.entry(path).or_default().insert(outer_key, Rc::new(State::fresh("0/x".into(), crate::types::Type::Str, "store")));

        let chain = [ScopeId(1), ScopeId(0)];
        let result = find_in_scope("x", &chain, &[path], &name_map);
        assert!(result.in_scope);
        assert_eq!(result.scoped_name, inner_key);
    }

    #[test]
    fn same_scope_checks_prefix() {
        assert!(same_scope("1/0/x", &[ScopeId(1), ScopeId(0)]));
        assert!(!same_scope("0/x", &[ScopeId(1), ScopeId(0)]));
    }
}
