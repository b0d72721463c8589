//! Component E (data half): the stored shape of a callable `Type`, and the
//! built-in function/attribute tables consulted by `visit_Call` /
//! `visit_Attribute`. Actually *invoking* a `FunctionDef` is re-entry into
//! the visitor (Component D) with a substituted scope, so that logic lives
//! on `Analyzer` in `analyzer.rs`; this module only carries the data a
//! `Type::Function` closes over.

use std::rc::Rc;

use crate::ast::AstNode;
use crate::scope::ScopeId;
use crate::types::Type;

/// What a built-in's `definition` returns, independent of its arguments.
/// Per §4.E, built-ins "ignore arguments unless specified", and none of the
/// five listed ones inspect their arguments at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Range,
    Set,
    Print,
    Input,
    Open,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Range => "range",
            Builtin::Set => "set",
            Builtin::Print => "print",
            Builtin::Input => "input",
            Builtin::Open => "open",
        }
    }

    pub fn result_type(self) -> Type {
        match self {
            Builtin::Range => Type::list_of(Type::Num),
            Builtin::Set => Type::empty_set(),
            Builtin::Print => Type::None,
            Builtin::Input => Type::Str,
            Builtin::Open => Type::File,
        }
    }

    pub const ALL: [Builtin; 5] = [Builtin::Range, Builtin::Set, Builtin::Print, Builtin::Input, Builtin::Open];

    pub fn lookup(name: &str) -> Option<Builtin> {
        Builtin::ALL.into_iter().find(|b| b.name() == name)
    }
}

/// The captured data behind a `Type::Function`: either a user-defined
/// function (name, parameter names, body, and the scope chain in effect
/// where it was *defined*), one of the fixed built-ins, or one of the two
/// bound methods §4.E calls out by name (`List.append`, `Dict.items`).
/// These close over their receiver instead of a defining scope, since they
/// never re-enter the visitor over a user-written body.
#[derive(Debug)]
pub enum FunctionDef {
    UserDefined {
        name: String,
        params: Vec<String>,
        body: Rc<Vec<AstNode>>,
        defining_scope: Vec<ScopeId>,
    },
    Builtin(Builtin),
    /// `some_list.append`. `root_name` is the fully-scoped name of the
    /// receiver when it resolves back to a plain `Name`, so the call site
    /// can narrow that binding's recorded type as well as the aliased cell.
    ListAppend {
        receiver: Type,
        root_name: Option<String>,
    },
    /// `some_dict.items`.
    DictItems {
        receiver: Type,
    },
}

impl FunctionDef {
    pub fn display_name(&self) -> &str {
        match self {
            FunctionDef::UserDefined { name, .. } => name,
            FunctionDef::Builtin(b) => b.name(),
            FunctionDef::ListAppend { .. } => "append",
            FunctionDef::DictItems { .. } => "items",
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn lookup_finds_all_five_builtins_by_name() {
        for b in Builtin::ALL {
            assert_eq!(Builtin::lookup(b.name()), Some(b));
        }
    }

    #[test]
    fn lookup_rejects_unknown_names() {
        assert_eq!(Builtin::lookup("sorted"), None);
    }

    #[test]
    fn result_types_match_the_builtin_table() {
        assert_eq!(Builtin::Range.result_type().tag(), "List");
        assert_eq!(Builtin::Set.result_type().tag(), "Set");
        assert_eq!(Builtin::Print.result_type().tag(), "None");
        assert_eq!(Builtin::Input.result_type().tag(), "Str");
        assert_eq!(Builtin::Open.result_type().tag(), "File");
    }
}
