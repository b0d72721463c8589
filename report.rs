//! Component F: categorized issue list + final variable dump.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::scope::{NameMap, Position};
use crate::state::State;
use crate::types::Type;

/// The 24 named diagnostic kinds from §6.2. A handful are part of the output
/// contract but have no triggering rule anywhere in §4. `Parser Failure`
/// belongs to the external parser collaborator and is never raised by this
/// crate (a parse failure short-circuits to `Report::failure` instead, per
/// §6.3/§7); `Used iteration list`, `Unused iteration variable`,
/// `Unknown functions` and `Method not in Type` are declared for schema
/// completeness but unreachable, since §4 defines no condition for them
/// (recorded in DESIGN.md rather than guessed at).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum IssueKind {
    #[serde(rename = "Parser Failure")]
    ParserFailure,
    #[serde(rename = "Unconnected blocks")]
    UnconnectedBlocks,
    #[serde(rename = "Empty Body")]
    EmptyBody,
    #[serde(rename = "Unnecessary Pass")]
    UnnecessaryPass,
    #[serde(rename = "Unread variables")]
    UnreadVariables,
    #[serde(rename = "Undefined variables")]
    UndefinedVariables,
    #[serde(rename = "Possibly undefined variables")]
    PossiblyUndefinedVariables,
    #[serde(rename = "Overwritten variables")]
    OverwrittenVariables,
    #[serde(rename = "Append to non-list")]
    AppendToNonList,
    #[serde(rename = "Used iteration list")]
    UsedIterationList,
    #[serde(rename = "Unused iteration variable")]
    UnusedIterationVariable,
    #[serde(rename = "Non-list iterations")]
    NonListIterations,
    #[serde(rename = "Empty iterations")]
    EmptyIterations,
    #[serde(rename = "Type changes")]
    TypeChanges,
    #[serde(rename = "Iteration variable is iteration list")]
    IterationVariableIsIterationList,
    #[serde(rename = "Unknown functions")]
    UnknownFunctions,
    #[serde(rename = "Not a function")]
    NotAFunction,
    #[serde(rename = "Action after return")]
    ActionAfterReturn,
    #[serde(rename = "Incompatible types")]
    IncompatibleTypes,
    #[serde(rename = "Return outside function")]
    ReturnOutsideFunction,
    #[serde(rename = "Read out of scope")]
    ReadOutOfScope,
    #[serde(rename = "Write out of scope")]
    WriteOutOfScope,
    #[serde(rename = "Aliased built-in")]
    AliasedBuiltin,
    #[serde(rename = "Method not in Type")]
    MethodNotInType,
}

/// One occurrence of an issue. Every field is optional per §6.2; only the
/// ones relevant to the kind raising it are filled in.
#[derive(Clone, Debug, Default, Serialize)]
pub struct IssueData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl IssueData {
    pub fn at(position: Position) -> IssueData {
        IssueData { position: Some(position), ..Default::default() }
    }

    pub fn name(mut self, name: impl Into<String>) -> IssueData {
        self.name = Some(name.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> IssueData {
        self.scope = Some(scope.into());
        self
    }

    pub fn ty(mut self, ty: Type) -> IssueData {
        self.ty = Some(ty);
        self
    }

    pub fn old_new(mut self, old: Type, new: Type) -> IssueData {
        self.old = Some(old);
        self.new = Some(new);
        self
    }

    pub fn left_right(mut self, left: Type, right: Type) -> IssueData {
        self.left = Some(left);
        self.right = Some(right);
        self
    }

    pub fn operation(mut self, operation: impl Into<String>) -> IssueData {
        self.operation = Some(operation.into());
        self
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub issues: BTreeMap<IssueKind, Vec<IssueData>>,
    pub variables: BTreeMap<String, BTreeMap<String, State>>,
    #[serde(rename = "topLevelVariables")]
    pub top_level_variables: BTreeMap<String, State>,
}

impl Report {
    pub fn failure(error: impl Into<String>) -> Report {
        Report {
            success: false,
            error: Some(error.into()),
            issues: BTreeMap::new(),
            variables: BTreeMap::new(),
            top_level_variables: BTreeMap::new(),
        }
    }

    /// Flattens the analyzer's `PathId`-keyed name map into the serializable
    /// `variables` shape, and extracts `topLevelVariables`: module-path
    /// entries whose fully-scoped name has exactly two segments (the module
    /// scope and the bare name).
    pub fn finish(name_map: &NameMap, issues: BTreeMap<IssueKind, Vec<IssueData>>) -> Report {
        let mut variables = BTreeMap::new();
        let mut top_level_variables = BTreeMap::new();
        for (path, scoped) in name_map {
            let mut flat = BTreeMap::new();
            for (name, state) in scoped {
                flat.insert(name.clone(), (**state).clone());
                if path.0 == 0 && name.split('/').count() == 2 {
                    if let Some((_, bare)) = name.rsplit_once('/') {
                        top_level_variables.insert(bare.to_string(), (**state).clone());
                    }
                }
            }
            variables.insert(path.0.to_string(), flat);
        }
        Report { success: true, error: None, issues, variables, top_level_variables }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use crate::scope::PathId;
    use crate::state::{Axis, State};
    use crate::types::Type;

    use super::*;

    #[test]
    fn finish_extracts_top_level_variables_from_module_path() {
        let mut name_map = NameMap::new();
        let state = Rc::new(State { name: "0/x".into(), ty: Type::Num, set: Axis::Yes, read: Axis::Yes, over: Axis::No, trace: None, produced_by: "store" });
        name_map.entry(PathId(0)).or_default().insert("0/x".to_string(), state);

        let report = Report::finish(&name_map, BTreeMap::new());
        assert!(report.success);
        assert!(report.top_level_variables.contains_key("x"));
        assert_eq!(report.top_level_variables["x"].set, Axis::Yes);
    }

    #[test]
    fn finish_excludes_nested_scope_names_from_top_level() {
        let mut name_map = NameMap::new();
        let state = Rc::new(State::fresh("1/0/x".into(), Type::Num, "store"));
        name_map.entry(PathId(0)).or_default().insert("1/0/x".to_string(), state);

        let report = Report::finish(&name_map, BTreeMap::new());
        assert!(report.top_level_variables.is_empty());
    }

    #[test]
    fn failure_report_carries_no_issues_or_variables() {
        let report = Report::failure("boom");
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("boom"));
        assert!(report.issues.is_empty());
    }

    #[test]
    fn issue_kind_serializes_to_exact_spec_strings() {
        let json = serde_json::to_string(&IssueKind::OverwrittenVariables).unwrap();
        assert_eq!(json, "\"Overwritten variables\"");
        let json = serde_json::to_string(&IssueKind::AliasedBuiltin).unwrap();
        assert_eq!(json, "\"Aliased built-in\"");
    }
}
