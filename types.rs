//! Component A: the inferred type lattice and its operators.
//!
//! `Type` is a tagged sum. Immutable tags (`Num`, `Str`, `Bool`, `None`,
//! `Unknown`, `File`) carry no payload worth sharing, so cloning one is
//! already "a fresh value" per `copy-type`. `List`/`Dict`/`Set` wrap their
//! refinable fields in `Rc<RefCell<_>>`: cloning one of *those* shares the
//! backing cell, which is exactly `copy-type`'s "mutable tags return the
//! same instance" rule: a `.append` on a parameter narrows the caller's
//! list too, because they're the same `Rc`.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use crate::builtins::FunctionDef;

#[derive(Clone, Debug, Default)]
pub struct ListFields {
    pub empty: bool,
    pub subtype: Option<Box<Type>>,
}

#[derive(Clone, Debug)]
pub struct DictFields {
    pub empty: bool,
    pub keys: Box<Type>,
    pub values: Box<Type>,
}

#[derive(Clone, Debug, Default)]
pub struct SetFields {
    pub empty: bool,
    pub subtype: Option<Box<Type>>,
}

#[derive(Clone, Debug)]
pub enum Type {
    Num,
    Str,
    Bool,
    None,
    List(Rc<RefCell<ListFields>>),
    Tuple(Vec<Type>),
    Dict(Rc<RefCell<DictFields>>),
    Set(Rc<RefCell<SetFields>>),
    File,
    Function(Rc<FunctionDef>),
    Unknown,
}

impl Type {
    pub fn empty_list() -> Type {
        Type::List(Rc::new(RefCell::new(ListFields { empty: true, subtype: None })))
    }

    pub fn list_of(subtype: Type) -> Type {
        Type::List(Rc::new(RefCell::new(ListFields { empty: false, subtype: Some(Box::new(subtype)) })))
    }

    pub fn empty_tuple() -> Type {
        Type::Tuple(Vec::new())
    }

    pub fn tuple_of(subtypes: Vec<Type>) -> Type {
        Type::Tuple(subtypes)
    }

    pub fn empty_dict() -> Type {
        Type::Dict(Rc::new(RefCell::new(DictFields { empty: true, keys: Box::new(Type::Unknown), values: Box::new(Type::Unknown) })))
    }

    pub fn dict_of(keys: Type, values: Type) -> Type {
        Type::Dict(Rc::new(RefCell::new(DictFields { empty: false, keys: Box::new(keys), values: Box::new(values) })))
    }

    pub fn empty_set() -> Type {
        Type::Set(Rc::new(RefCell::new(SetFields { empty: true, subtype: None })))
    }

    pub fn set_of(subtype: Type) -> Type {
        Type::Set(Rc::new(RefCell::new(SetFields { empty: false, subtype: Some(Box::new(subtype)) })))
    }

    /// Tag name, used for diagnostics and the asymmetric-equality / table
    /// lookups below. Not exposed as a `Display` impl since it is an
    /// internal discriminant, not user-facing text.
    pub fn tag(&self) -> &'static str {
        match self {
            Type::Num => "Num",
            Type::Str => "Str",
            Type::Bool => "Bool",
            Type::None => "None",
            Type::List(_) => "List",
            Type::Tuple(_) => "Tuple",
            Type::Dict(_) => "Dict",
            Type::Set(_) => "Set",
            Type::File => "File",
            Type::Function(_) => "Function",
            Type::Unknown => "Unknown",
        }
    }
}

/// The serialized shape of a `Type` in a report: just the tag plus whatever
/// nested-type information is meaningful to read back out. The `Rc`-shared
/// backing cells are an implementation detail the report doesn't expose.
#[derive(Serialize)]
struct TypeSnapshot {
    tag: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keys: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    subtypes: Vec<String>,
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let snapshot = match self {
            Type::List(cell) => {
                let f = cell.borrow();
                TypeSnapshot {
                    tag: "List",
                    subtype: f.subtype.as_ref().map(|t| t.tag().to_string()),
                    keys: None,
                    values: None,
                    subtypes: Vec::new(),
                }
            }
            Type::Dict(cell) => {
                let f = cell.borrow();
                TypeSnapshot {
                    tag: "Dict",
                    subtype: None,
                    keys: Some(f.keys.tag().to_string()),
                    values: Some(f.values.tag().to_string()),
                    subtypes: Vec::new(),
                }
            }
            Type::Set(cell) => {
                let f = cell.borrow();
                TypeSnapshot {
                    tag: "Set",
                    subtype: f.subtype.as_ref().map(|t| t.tag().to_string()),
                    keys: None,
                    values: None,
                    subtypes: Vec::new(),
                }
            }
            Type::Tuple(subtypes) => TypeSnapshot {
                tag: "Tuple",
                subtype: None,
                keys: None,
                values: None,
                subtypes: subtypes.iter().map(|t| t.tag().to_string()).collect(),
            },
            other => TypeSnapshot { tag: other.tag(), subtype: None, keys: None, values: None, subtypes: Vec::new() },
        };
        snapshot.serialize(serializer)
    }
}

/// `areTypesEqual`. `false` if either side is `Unknown`; for two `List`s,
/// `true` if either is empty (empty literals are polymorphic), else
/// recursive equality of subtypes; otherwise equality on the tag alone.
pub fn are_types_equal(a: &Type, b: &Type) -> bool {
    if matches!(a, Type::Unknown) || matches!(b, Type::Unknown) {
        return false;
    }
    match (a, b) {
        (Type::List(la), Type::List(lb)) => {
            let fa = la.borrow();
            let fb = lb.borrow();
            if fa.empty || fb.empty {
                return true;
            }
            match (&fa.subtype, &fb.subtype) {
                (Some(sa), Some(sb)) => are_types_equal(sa, sb),
                _ => true,
            }
        }
        _ => a.tag() == b.tag(),
    }
}

/// `indexSequenceType(T, i)`.
pub fn index_sequence_type(t: &Type, i: usize) -> Type {
    match t {
        Type::Tuple(subtypes) => subtypes.get(i).cloned().unwrap_or(Type::Unknown),
        Type::List(cell) => cell.borrow().subtype.as_deref().cloned().unwrap_or(Type::Unknown),
        Type::Str | Type::File => Type::Str,
        _ => Type::Unknown,
    }
}

/// `is-sequence`.
pub fn is_sequence(t: &Type) -> bool {
    matches!(t, Type::List(_) | Type::Set(_) | Type::Tuple(_) | Type::Str | Type::File)
}

/// `is-empty-list`.
pub fn is_empty_list(t: &Type) -> bool {
    matches!(t, Type::List(cell) if cell.borrow().empty)
}

/// `copy-type`. Immutable tags clone into a fresh value (there is nothing
/// shared to begin with); mutable tags clone the `Rc`, so the copy aliases
/// the original's backing cell.
pub fn copy_type(t: &Type) -> Type {
    t.clone()
}

/// `merge-types`. Lists/sets: adopt the non-empty side's subtype, preferring
/// the left when both are non-empty. Tuples: concatenate `subtypes`.
pub fn merge_types(left: &Type, right: &Type) -> Type {
    match (left, right) {
        (Type::List(la), Type::List(lb)) => {
            let fa = la.borrow();
            let fb = lb.borrow();
            if fa.empty {
                Type::List(Rc::new(RefCell::new(ListFields { empty: fb.empty, subtype: fb.subtype.clone() })))
            } else {
                Type::List(Rc::new(RefCell::new(ListFields { empty: false, subtype: fa.subtype.clone() })))
            }
        }
        (Type::Set(sa), Type::Set(sb)) => {
            let fa = sa.borrow();
            let fb = sb.borrow();
            if fa.empty {
                Type::Set(Rc::new(RefCell::new(SetFields { empty: fb.empty, subtype: fb.subtype.clone() })))
            } else {
                Type::Set(Rc::new(RefCell::new(SetFields { empty: false, subtype: fa.subtype.clone() })))
            }
        }
        (Type::Tuple(a), Type::Tuple(b)) => {
            let mut merged = a.clone();
            merged.extend(b.clone());
            Type::Tuple(merged)
        }
        _ => left.clone(),
    }
}

/// §4.A's binary-op table. `None` means the pair is incompatible.
pub fn binary_op(op: &str, left: &Type, right: &Type) -> Option<Type> {
    use Type::*;
    Some(match (op, left, right) {
        ("Add", Num, Num) => Num,
        ("Add", Str, Str) => Str,
        ("Add", List(_), List(_)) => merge_types(left, right),
        ("Add", Tuple(_), Tuple(_)) => merge_types(left, right),
        ("Sub", Num, Num) => Num,
        ("Sub", Set(_), Set(_)) => merge_types(left, right),
        ("Mult", Num, Num) => Num,
        ("Mult", Num, Str) => Str,
        ("Mult", Num, List(_)) => right.clone(),
        ("Mult", Num, Tuple(_)) => right.clone(),
        ("Mult", Str, Num) => Str,
        ("Mult", List(_), Num) => left.clone(),
        ("Mult", Tuple(_), Num) => left.clone(),
        ("Div", Num, Num) => Num,
        ("Mod", Num, Num) => Num,
        ("Pow", Num, Num) => Num,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_list_equals_any_list() {
        let empty = Type::empty_list();
        let nums = Type::list_of(Type::Num);
        assert!(are_types_equal(&empty, &nums));
        assert!(are_types_equal(&nums, &empty));
    }

    #[test]
    fn unknown_never_equals_anything() {
        assert!(!are_types_equal(&Type::Unknown, &Type::Unknown));
        assert!(!are_types_equal(&Type::Unknown, &Type::Num));
    }

    #[test]
    fn copy_type_aliases_mutable_tags() {
        let list = Type::list_of(Type::Num);
        let copy = copy_type(&list);
        if let (Type::List(a), Type::List(b)) = (&list, &copy) {
            assert!(Rc::ptr_eq(a, b));
        } else {
            panic!("expected List");
        }
    }

    #[test]
    fn copy_type_is_independent_for_immutable_tags() {
        assert_eq!(copy_type(&Type::Num).tag(), "Num");
    }

    #[test]
    fn binary_op_table_matches_spec() {
        assert_eq!(binary_op("Add", &Type::Num, &Type::Num).unwrap().tag(), "Num");
        assert_eq!(binary_op("Add", &Type::Str, &Type::Str).unwrap().tag(), "Str");
        assert!(binary_op("Add", &Type::Str, &Type::Num).is_none());
        assert_eq!(binary_op("Mult", &Type::Num, &Type::Str).unwrap().tag(), "Str");
    }

    #[test]
    fn index_sequence_type_out_of_range_tuple_is_unknown() {
        let tup = Type::tuple_of(vec![Type::Num]);
        assert_eq!(index_sequence_type(&tup, 1).tag(), "Unknown");
    }
}
