//! Component B: per-name three-axis state and its trace; join operator.

use std::rc::Rc;

use serde::Serialize;

use crate::types::Type;

/// One axis of a variable's flow fact. `Maybe` is the conservative join of a
/// `Yes` and a `No` (or of two diverging values) across two paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    No,
    Yes,
    Maybe,
}

impl Axis {
    /// The value an axis takes when a name is only present on one side of a
    /// join (§4.B `combine-states`, the `r is null` case).
    pub fn degrade(self) -> Axis {
        match self {
            Axis::No => Axis::No,
            Axis::Yes | Axis::Maybe => Axis::Maybe,
        }
    }

    fn join(self, other: Axis) -> Axis {
        if self == other {
            self
        } else {
            Axis::Maybe
        }
    }
}

/// A flow fact for one fully-scoped name at one point in one path. States are
/// immutable once built; every update allocates a successor linked to its
/// predecessor via `trace`, so a `State` handed out to one path map and
/// another still share the history up to their common ancestor.
#[derive(Clone, Debug, Serialize)]
pub struct State {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub set: Axis,
    pub read: Axis,
    pub over: Axis,
    #[serde(skip)]
    pub trace: Option<Rc<State>>,
    /// The method that produced this state: `"store"`, `"load"`, `"join"`, ...
    pub produced_by: &'static str,
}

impl State {
    pub fn fresh(name: String, ty: Type, produced_by: &'static str) -> State {
        State { name, ty, set: Axis::No, read: Axis::No, over: Axis::No, trace: None, produced_by }
    }

    /// `trace-state(s, method)`: a successor with the same axes and type,
    /// linked back to `s`.
    pub fn successor(prev: &Rc<State>, method: &'static str) -> State {
        State {
            name: prev.name.clone(),
            ty: prev.ty.clone(),
            set: prev.set,
            read: prev.read,
            over: prev.over,
            trace: Some(prev.clone()),
            produced_by: method,
        }
    }
}

/// `combine-states(l, r, p)`. Returns the joined state and whether a
/// `Type changes` diagnostic should be raised for it (left undone here so the
/// caller can attach position/name context to the issue).
pub fn combine_states(
    name: &str,
    l: Option<&Rc<State>>,
    r: Option<&Rc<State>>,
) -> (State, Option<(Type, Type)>) {
    match (l, r) {
        (Some(l), None) => (
            State {
                name: name.to_string(),
                ty: l.ty.clone(),
                set: l.set.degrade(),
                read: l.read.degrade(),
                over: l.over.degrade(),
                trace: Some(l.clone()),
                produced_by: "join",
            },
            None,
        ),
        (None, Some(r)) => (
            State {
                name: name.to_string(),
                ty: r.ty.clone(),
                set: r.set.degrade(),
                read: r.read.degrade(),
                over: r.over.degrade(),
                trace: Some(r.clone()),
                produced_by: "join",
            },
            None,
        ),
        (Some(l), Some(r)) => {
            let type_change = if crate::types::are_types_equal(&l.ty, &r.ty) {
                None
            } else {
                Some((l.ty.clone(), r.ty.clone()))
            };
            (
                State {
                    name: name.to_string(),
                    ty: l.ty.clone(),
                    set: l.set.join(r.set),
                    read: l.read.join(r.read),
                    over: l.over.join(r.over),
                    trace: Some(l.clone()),
                    produced_by: "join",
                },
                type_change,
            )
        }
        (None, None) => unreachable!("combine_states called with no state on either side"),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn fresh(set: Axis) -> Rc<State> {
        Rc::new(State { name: "x".into(), ty: Type::Num, set, read: Axis::No, over: Axis::No, trace: None, produced_by: "store" })
    }

    #[test]
    fn degrade_keeps_no_but_maybes_everything_else() {
        assert_eq!(Axis::No.degrade(), Axis::No);
        assert_eq!(Axis::Yes.degrade(), Axis::Maybe);
        assert_eq!(Axis::Maybe.degrade(), Axis::Maybe);
    }

    #[test]
    fn one_sided_join_degrades() {
        let l = fresh(Axis::Yes);
        let (joined, change) = combine_states("x", Some(&l), None);
        assert_eq!(joined.set, Axis::Maybe);
        assert!(change.is_none());
    }

    #[test]
    fn two_sided_join_is_commutative_on_axes() {
        let l = fresh(Axis::Yes);
        let r = fresh(Axis::No);
        let (ab, _) = combine_states("x", Some(&l), Some(&r));
        let (ba, _) = combine_states("x", Some(&r), Some(&l));
        assert_eq!(ab.set, Axis::Maybe);
        assert_eq!(ba.set, Axis::Maybe);
    }

    #[test]
    fn two_sided_join_detects_type_change() {
        let l = Rc::new(State { name: "x".into(), ty: Type::Num, set: Axis::Yes, read: Axis::No, over: Axis::No, trace: None, produced_by: "store" });
        let r = Rc::new(State { name: "x".into(), ty: Type::Str, set: Axis::Yes, read: Axis::No, over: Axis::No, trace: None, produced_by: "store" });
        let (_, change) = combine_states("x", Some(&l), Some(&r));
        assert!(change.is_some());
    }
}
