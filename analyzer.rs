//! Component D (and the `Analyzer` half of E/F): the AST visitor core, the
//! RAII scope/path guards from §5, and the two public entry points.

use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, trace};

use crate::ast::AstNode;
use crate::builtins::{Builtin, FunctionDef};
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::report::{IssueData, IssueKind, Report};
use crate::scope::{fully_scoped_name, find_in_scope, find_out_of_scope, NameMap, PathId, Position, ScopeId};
use crate::state::{combine_states, Axis, State};
use crate::types::{
    are_types_equal, binary_op, copy_type, index_sequence_type, is_empty_list, is_sequence, Type,
};

/// Owns every piece of mutable state for one `analyze()` call (§5): the
/// scope chain, the path chain, the `PathId`-keyed name map, the three
/// monotonic counters, and the accumulated issues. No instance is ever
/// reused across analyses.
pub struct Analyzer {
    scope_chain: Vec<ScopeId>,
    path_chain: Vec<PathId>,
    name_map: NameMap,
    next_scope: u32,
    next_path: u32,
    issues: BTreeMap<IssueKind, Vec<IssueData>>,
    last_pos: Position,
}

impl Analyzer {
    fn new() -> Analyzer {
        Analyzer {
            scope_chain: Vec::new(),
            path_chain: Vec::new(),
            name_map: NameMap::new(),
            next_scope: 0,
            next_path: 0,
            issues: BTreeMap::new(),
            last_pos: Position { line: 0, column: 0 },
        }
    }

    fn raise(&mut self, kind: IssueKind, data: IssueData) {
        self.issues.entry(kind).or_default().push(data);
    }

    fn required_field(&self, node: &AstNode, name: &str) -> AnalyzerResult<AstNode> {
        node.node_field(name)
            .ok_or_else(|| AnalyzerError::MalformedAst(format!("{} missing field `{name}`", node.astname)))
    }

    // ---- scope/path plumbing (§4.C, §5) ------------------------------

    fn find(&self, name: &str) -> crate::scope::FindResult {
        find_in_scope(name, &self.scope_chain, &self.path_chain, &self.name_map)
    }

    fn current_path(&self) -> PathId {
        *self.path_chain.first().expect("path chain is never empty while visiting")
    }

    /// `If`/`While` branch bodies each get a fresh, empty-backed `PathId`
    /// pushed onto the path chain; popped by the returned guard, joined into
    /// the parent by the caller via `join_paths`.
    fn enter_path(&mut self) -> PathGuard<'_> {
        let id = PathId(self.next_path);
        self.next_path += 1;
        self.path_chain.insert(0, id);
        self.name_map.entry(id).or_default();
        debug!("enter path {id:?}");
        PathGuard { analyzer: self, id }
    }

    /// A function invocation replaces the whole scope chain with
    /// `[newScope, ...definingScope]` (lexical, not dynamic, scoping); the
    /// returned guard restores the caller's chain on drop, after running
    /// `finish-scope` against the callee's.
    fn enter_function_scope(&mut self, defining_scope: &[ScopeId]) -> ScopeGuard<'_> {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        let mut chain = vec![id];
        chain.extend_from_slice(defining_scope);
        let saved = std::mem::replace(&mut self.scope_chain, chain);
        debug!("enter scope {id:?}");
        ScopeGuard { analyzer: self, saved_chain: Some(saved) }
    }

    /// §4.F `finish-scope`: for every name in the current path whose scope
    /// prefix equals the current scope chain, raise `Overwritten variables`
    /// / `Unread variables`. Runs on every scope exit, including function
    /// return.
    fn finish_scope(&mut self) {
        let prefix_len = self.scope_chain.len();
        let path = self.current_path();
        let Some(scoped) = self.name_map.get(&path) else { return };
        let mut flagged = Vec::new();
        for (name, state) in scoped {
            if crate::scope::same_scope(name, &self.scope_chain) && name.split('/').count() == prefix_len + 1 {
                flagged.push((name.clone(), state.clone()));
            }
        }
        let pos = self.last_pos;
        for (name, state) in flagged {
            let bare = name.rsplit('/').next().unwrap_or(&name).to_string();
            if state.over == Axis::Yes {
                self.raise(IssueKind::OverwrittenVariables, IssueData::at(pos).name(bare.clone()).scope(name.clone()));
            }
            if state.read == Axis::No {
                self.raise(IssueKind::UnreadVariables, IssueData::at(pos).name(bare).scope(name));
            }
        }
    }

    fn join_paths(&mut self, left: PathId, right: PathId, pos: Position) {
        let left_map = self.name_map.get(&left).cloned().unwrap_or_default();
        let right_map = self.name_map.get(&right).cloned().unwrap_or_default();
        let mut names: std::collections::BTreeSet<String> = left_map.keys().cloned().collect();
        names.extend(right_map.keys().cloned());
        let parent = self.current_path();
        for name in names {
            let (joined, type_change) = combine_states(&name, left_map.get(&name), right_map.get(&name));
            if let Some((old, new)) = type_change {
                self.raise(IssueKind::TypeChanges, IssueData::at(pos).name(name.clone()).old_new(old, new));
            }
            self.name_map.entry(parent).or_default().insert(name, Rc::new(joined));
        }
    }

    // ---- store/load (§4.B) -------------------------------------------

    fn store_impl(&mut self, name: &str, ty: Type, pos: Position, force_read: bool, method: &'static str) -> Rc<State> {
        let find = self.find(name);
        let state = if !find.exists {
            if Builtin::lookup(name).is_some() {
                self.raise(IssueKind::AliasedBuiltin, IssueData::at(pos).name(name.to_string()));
            }
            State {
                name: fully_scoped_name(&self.scope_chain, name),
                ty,
                set: Axis::Yes,
                read: if force_read { Axis::Yes } else { Axis::No },
                over: Axis::No,
                trace: None,
                produced_by: method,
            }
        } else {
            let prev = find.state.clone().expect("exists implies state");
            let mut successor = State::successor(&prev, method);
            if !find.in_scope {
                self.raise(IssueKind::WriteOutOfScope, IssueData::at(pos).name(name.to_string()).scope(find.scoped_name.clone()));
            }
            if !are_types_equal(&ty, &prev.ty) {
                self.raise(IssueKind::TypeChanges, IssueData::at(pos).name(name.to_string()).old_new(prev.ty.clone(), ty.clone()));
            }
            successor.ty = ty;
            if prev.set == Axis::Yes && prev.read == Axis::No {
                successor.over = Axis::Yes;
            } else {
                successor.set = Axis::Yes;
                successor.read = Axis::No;
            }
            if force_read {
                successor.read = Axis::Yes;
            }
            successor
        };
        let key = fully_scoped_name(&self.scope_chain, name);
        let path = self.current_path();
        let rc = Rc::new(state);
        self.name_map.entry(path).or_default().insert(key, rc.clone());
        rc
    }

    /// `store`.
    fn store(&mut self, name: &str, ty: Type, pos: Position) -> Rc<State> {
        self.store_impl(name, ty, pos, false, "store")
    }

    /// `store-iter`: a store that immediately marks `read:=yes`, so a loop
    /// variable is never flagged `Unread variables`.
    fn store_iter(&mut self, name: &str, ty: Type, pos: Position) -> Rc<State> {
        self.store_impl(name, ty, pos, true, "store")
    }

    /// A narrower sibling of `store` used only by `List.append`'s side
    /// effect (§4.E): re-records the (already-mutated-in-place, via the
    /// shared `Rc<RefCell<_>>`) list type against the name table, without
    /// touching the set/read/over axes or raising `Type changes`. `.append`
    /// refines a binding, it does not rebind it.
    fn append_store(&mut self, name: &str, ty: Type) {
        let find = self.find(name);
        let Some(prev) = find.state else { return };
        let mut successor = State::successor(&prev, "append");
        successor.ty = ty;
        let path = self.current_path();
        self.name_map.entry(path).or_default().insert(find.scoped_name, Rc::new(successor));
    }

    /// `load`.
    fn load(&mut self, name: &str, pos: Position) -> Rc<State> {
        let find = self.find(name);
        if !find.exists {
            if find_out_of_scope(name, &self.name_map) {
                self.raise(IssueKind::ReadOutOfScope, IssueData::at(pos).name(name.to_string()));
            } else {
                self.raise(IssueKind::UndefinedVariables, IssueData::at(pos).name(name.to_string()));
            }
            let key = fully_scoped_name(&self.scope_chain, name);
            let state = State {
                name: key.clone(),
                ty: Type::Unknown,
                set: Axis::No,
                read: Axis::Yes,
                over: Axis::No,
                trace: None,
                produced_by: "load",
            };
            let rc = Rc::new(state);
            let path = self.current_path();
            self.name_map.entry(path).or_default().insert(key, rc.clone());
            return rc;
        }

        let prev = find.state.clone().expect("exists implies state");
        let mut successor = State::successor(&prev, "load");
        if prev.set == Axis::No {
            self.raise(IssueKind::UndefinedVariables, IssueData::at(pos).name(name.to_string()));
        } else if prev.set == Axis::Maybe {
            self.raise(IssueKind::PossiblyUndefinedVariables, IssueData::at(pos).name(name.to_string()));
        }
        successor.read = Axis::Yes;

        let key = if !find.in_scope && matches!(successor.ty, Type::Function(_)) {
            find.scoped_name.clone()
        } else {
            fully_scoped_name(&self.scope_chain, name)
        };
        let rc = Rc::new(successor);
        let path = self.current_path();
        self.name_map.entry(path).or_default().insert(key, rc.clone());
        rc
    }

    // ---- dispatch (§4.D) ----------------------------------------------

    /// The bookkeeping key `Return` stores its value under: scoped only to
    /// the innermost (current call's) scope, not the whole lexical chain.
    /// A return marker shouldn't accumulate the defining-scope suffix the
    /// way an ordinary variable's fully-scoped name does.
    fn return_key(&self) -> String {
        fully_scoped_name(&self.scope_chain[..1], "*return")
    }

    fn return_already_fired(&self) -> bool {
        if self.scope_chain.len() <= 1 {
            return false;
        }
        let key = self.return_key();
        self.path_chain
            .iter()
            .filter_map(|p| self.name_map.get(p).and_then(|m| m.get(&key)))
            .any(|s| s.set == Axis::Yes)
    }

    /// Checked for a statement suite the author actually wrote (`Module`,
    /// `If`/`While`/`For`/`With` bodies, function bodies): an empty one
    /// raises `Empty Body`, a multi-statement one containing a bare `Pass`
    /// raises `Unnecessary Pass` for each occurrence.
    fn visit_body(&mut self, stmts: &[AstNode], pos: Position) -> AnalyzerResult<()> {
        if stmts.is_empty() {
            self.raise(IssueKind::EmptyBody, IssueData::at(pos));
            return Ok(());
        }
        if stmts.len() > 1 {
            for stmt in stmts {
                if stmt.astname == "Pass" {
                    self.raise(IssueKind::UnnecessaryPass, IssueData::at(stmt.position()));
                }
            }
        }
        self.visit_stmts(stmts)
    }

    /// Unchecked sibling of `visit_body`, for AST fields that are bookkeeping
    /// rather than an authored suite. `orelse` on `If`/`While`/`For` is
    /// conventionally `[]` whenever the source has no `else`/`else` clause,
    /// so treating that absence as an "Empty Body" would flag every such
    /// statement.
    fn visit_stmts(&mut self, stmts: &[AstNode]) -> AnalyzerResult<()> {
        for stmt in stmts {
            self.visit(stmt)?;
        }
        Ok(())
    }

    pub fn visit(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        self.last_pos = pos;
        trace!("visit {} at {:?}", node.astname, pos);

        if self.return_already_fired() {
            self.raise(IssueKind::ActionAfterReturn, IssueData::at(pos));
        }

        match node.astname.as_str() {
            "Module" | "Interactive" => {
                self.visit_body(&node.list_field("body"), pos)?;
                Ok(Type::None)
            }
            "Pass" => Ok(Type::None),
            "Assign" => self.visit_assign(node),
            "BinOp" => self.visit_binop(node),
            "Call" => self.visit_call(node),
            "If" => self.visit_if(node),
            "While" => self.visit_while(node),
            "For" => self.visit_for(node),
            "ListComp" | "SetComp" | "GeneratorExp" => self.visit_comprehension(node),
            "FunctionDef" => self.visit_functiondef(node),
            "Return" => self.visit_return(node),
            "Attribute" => self.visit_attribute(node),
            "Subscript" => self.visit_subscript(node),
            "Name" => self.visit_name(node),
            "Num" => Ok(Type::Num),
            "Str" => Ok(Type::Str),
            "Bool" => Ok(Type::Bool),
            "NoneType" | "NoneLiteral" => Ok(Type::None),
            "List" => self.visit_list(node),
            "Tuple" => self.visit_tuple(node),
            "Set" => self.visit_set(node),
            "Dict" => self.visit_dict(node),
            "With" => self.visit_with(node),
            "Expr" => match node.node_field("value") {
                Some(v) => self.visit(&v),
                None => Ok(Type::None),
            },
            other => Err(AnalyzerError::MalformedAst(format!("unrecognized AST node `{other}`"))),
        }
    }

    fn visit_assign(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let value_node = self.required_field(node, "value")?;
        let value_ty = self.visit(&value_node)?;
        // Open Question #1 (SPEC_FULL §4): targets are destructured directly,
        // never pre-visited as loads.
        for target in node.list_field("targets") {
            self.destructure(&target, &value_ty, false)?;
        }
        Ok(Type::None)
    }

    fn destructure(&mut self, target: &AstNode, ty: &Type, via_iter: bool) -> AnalyzerResult<()> {
        match target.astname.as_str() {
            "Name" => {
                let id = target.identifier().unwrap_or_default();
                let pos = target.position();
                if id == "___" {
                    self.raise(IssueKind::UnconnectedBlocks, IssueData::at(pos));
                    return Ok(());
                }
                if via_iter {
                    self.store_iter(&id, ty.clone(), pos);
                } else {
                    self.store(&id, ty.clone(), pos);
                }
                Ok(())
            }
            "Tuple" | "List" => {
                for (i, elt) in target.list_field("elts").iter().enumerate() {
                    let elem_ty = index_sequence_type(ty, i);
                    self.destructure(elt, &elem_ty, via_iter)?;
                }
                Ok(())
            }
            _ => {
                self.visit(target)?;
                Ok(())
            }
        }
    }

    fn visit_binop(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        let left_node = self.required_field(node, "left")?;
        let right_node = self.required_field(node, "right")?;
        let op = node.tag_field("op").ok_or_else(|| AnalyzerError::MalformedAst("BinOp missing op".into()))?;
        let left_ty = self.visit(&left_node)?;
        let right_ty = self.visit(&right_node)?;
        match binary_op(&op, &left_ty, &right_ty) {
            Some(t) => Ok(t),
            None => {
                self.raise(
                    IssueKind::IncompatibleTypes,
                    IssueData::at(pos).operation(op).left_right(left_ty, right_ty),
                );
                Ok(Type::Unknown)
            }
        }
    }

    fn root_name(node: &AstNode) -> Option<String> {
        match node.astname.as_str() {
            "Name" => node.identifier(),
            "Call" => node.node_field("func").and_then(|f| Analyzer::root_name(&f)),
            "Attribute" | "Subscript" => node.node_field("value").and_then(|v| Analyzer::root_name(&v)),
            _ => None,
        }
    }

    fn visit_call(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        let func_node = self.required_field(node, "func")?;
        let func_ty = self.visit(&func_node)?;
        let callee = Analyzer::root_name(&func_node);
        let mut arg_types = Vec::new();
        for arg in node.list_field("args") {
            arg_types.push(self.visit(&arg)?);
        }
        match func_ty {
            Type::Function(def) => self.invoke(&def, arg_types, pos),
            _ => {
                let mut issue = IssueData::at(pos);
                if let Some(name) = callee {
                    issue = issue.name(name);
                }
                self.raise(IssueKind::NotAFunction, issue);
                Ok(Type::Unknown)
            }
        }
    }

    fn invoke(&mut self, def: &Rc<FunctionDef>, args: Vec<Type>, pos: Position) -> AnalyzerResult<Type> {
        match def.as_ref() {
            FunctionDef::Builtin(b) => Ok(b.result_type()),
            FunctionDef::ListAppend { receiver, root_name } => {
                if let Type::List(cell) = receiver {
                    let arg_ty = args.into_iter().next().unwrap_or(Type::Unknown);
                    {
                        let mut fields = cell.borrow_mut();
                        fields.empty = false;
                        fields.subtype = Some(Box::new(arg_ty));
                    }
                    if let Some(name) = root_name {
                        self.append_store(name, receiver.clone());
                    }
                }
                Ok(Type::None)
            }
            FunctionDef::DictItems { receiver } => {
                if let Type::Dict(cell) = receiver {
                    let fields = cell.borrow();
                    Ok(Type::list_of(Type::tuple_of(vec![(*fields.keys).clone(), (*fields.values).clone()])))
                } else {
                    Ok(Type::Unknown)
                }
            }
            FunctionDef::UserDefined { params, body, defining_scope, .. } => {
                let defining_scope = defining_scope.clone();
                let params = params.clone();
                let body = body.clone();
                let mut guard = self.enter_function_scope(&defining_scope);
                for (param, arg_ty) in params.iter().zip(args.into_iter()) {
                    guard.store(param, copy_type(&arg_ty), pos);
                }
                let result = guard.visit_body(&body, pos);
                let ret_ty = result.map(|()| {
                    let ret_key = guard.return_key();
                    guard
                        .path_chain_snapshot()
                        .iter()
                        .find_map(|p| guard.name_map_ref().get(p).and_then(|m| m.get(&ret_key)))
                        .map(|s| s.ty.clone())
                        .unwrap_or(Type::None)
                });
                drop(guard);
                ret_ty
            }
        }
    }

    fn visit_if(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        let test_node = self.required_field(node, "test")?;
        self.visit(&test_node)?;
        let body = node.list_field("body");
        let orelse = node.list_field("orelse");

        let then_id = {
            let mut g = self.enter_path();
            let id = g.path_id();
            g.visit_body(&body, pos)?;
            id
        };
        let else_id = {
            let mut g = self.enter_path();
            let id = g.path_id();
            g.visit_stmts(&orelse)?;
            id
        };

        self.join_paths(then_id, else_id, pos);
        Ok(Type::None)
    }

    fn visit_while(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        let test_node = self.required_field(node, "test")?;
        self.visit(&test_node)?;
        let body = node.list_field("body");
        let orelse = node.list_field("orelse");

        let then_id = {
            let mut g = self.enter_path();
            let id = g.path_id();
            g.visit_body(&body, pos)?;
            id
        };
        let else_id = {
            let mut g = self.enter_path();
            let id = g.path_id();
            g.visit_stmts(&orelse)?;
            id
        };

        // SPEC_FULL §4 (Open Question #2): re-visit the test once more, to
        // model one extra iteration of the loop-variable bindings, while
        // restoring the body visit the original distillation dropped.
        self.visit(&test_node)?;

        self.join_paths(then_id, else_id, pos);
        Ok(Type::None)
    }

    fn iteration_source_type(&mut self, iter_node: &AstNode) -> AnalyzerResult<Type> {
        if iter_node.astname == "Name" {
            let id = iter_node.identifier().unwrap_or_default();
            let pos = iter_node.position();
            if id == "___" {
                self.raise(IssueKind::UnconnectedBlocks, IssueData::at(pos));
                return Ok(Type::Unknown);
            }
            Ok(self.load(&id, pos).ty.clone())
        } else {
            self.visit(iter_node)
        }
    }

    fn check_iteration(&mut self, iter_node: &AstNode, target: &AstNode, iter_ty: &Type) {
        let pos = iter_node.position();
        // `Unknown` means inference already failed upstream (an undefined
        // name via `load`'s placeholder rule, or the `"___"` sentinel).
        // Don't pile a second diagnostic on top of that one.
        if !matches!(iter_ty, Type::Unknown) {
            if is_empty_list(iter_ty) {
                self.raise(IssueKind::EmptyIterations, IssueData::at(pos));
            } else if !is_sequence(iter_ty) {
                self.raise(IssueKind::NonListIterations, IssueData::at(pos));
            }
        }
        if iter_node.astname == "Name" && target.astname == "Name" {
            if let (Some(iter_name), Some(target_name)) = (iter_node.identifier(), target.identifier()) {
                if iter_name == target_name {
                    self.raise(
                        IssueKind::IterationVariableIsIterationList,
                        IssueData::at(target.position()).name(target_name),
                    );
                }
            }
        }
    }

    fn visit_for(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        let iter_node = self.required_field(node, "iter")?;
        let target = self.required_field(node, "target")?;
        let iter_ty = self.iteration_source_type(&iter_node)?;
        self.check_iteration(&iter_node, &target, &iter_ty);
        let elem_ty = index_sequence_type(&iter_ty, 0);
        self.destructure(&target, &elem_ty, true)?;
        self.visit_body(&node.list_field("body"), pos)?;
        self.visit_stmts(&node.list_field("orelse"))?;
        Ok(Type::None)
    }

    fn visit_comprehension(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        for gen in node.list_field("generators") {
            let iter_node = self.required_field(&gen, "iter")?;
            let target = self.required_field(&gen, "target")?;
            let iter_ty = self.iteration_source_type(&iter_node)?;
            self.check_iteration(&iter_node, &target, &iter_ty);
            let elem_ty = index_sequence_type(&iter_ty, 0);
            self.destructure(&target, &elem_ty, true)?;
            for cond in gen.list_field("ifs") {
                self.visit(&cond)?;
            }
        }
        let elt = self.required_field(node, "elt")?;
        let elt_ty = self.visit(&elt)?;
        Ok(Type::list_of(elt_ty))
    }

    fn visit_functiondef(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        let name = node
            .string_field("name")
            .ok_or_else(|| AnalyzerError::MalformedAst("FunctionDef missing name".into()))?;
        let params = node.param_names();
        let body = Rc::new(node.list_field("body"));
        let def = FunctionDef::UserDefined { name: name.clone(), params, body, defining_scope: self.scope_chain.clone() };
        let ty = Type::Function(Rc::new(def));
        self.store(&name, ty, pos);
        Ok(Type::None)
    }

    fn visit_return(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        if self.scope_chain.len() <= 1 {
            self.raise(IssueKind::ReturnOutsideFunction, IssueData::at(pos));
        }
        let value_ty = match node.node_field("value") {
            Some(v) => self.visit(&v)?,
            None => Type::None,
        };
        let key = self.return_key();
        let state = State { name: key.clone(), ty: value_ty, set: Axis::Yes, read: Axis::No, over: Axis::No, trace: None, produced_by: "store" };
        let path = self.current_path();
        self.name_map.entry(path).or_default().insert(key, Rc::new(state));
        Ok(Type::None)
    }

    fn visit_attribute(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        let value_node = self.required_field(node, "value")?;
        let attr = node
            .string_field("attr")
            .ok_or_else(|| AnalyzerError::MalformedAst("Attribute missing attr".into()))?;
        let value_ty = self.visit(&value_node)?;

        if attr == "append" {
            return if matches!(value_ty, Type::List(_)) {
                let root_name = Analyzer::root_name(&value_node);
                Ok(Type::Function(Rc::new(FunctionDef::ListAppend { receiver: value_ty, root_name })))
            } else {
                self.raise(IssueKind::AppendToNonList, IssueData::at(pos).ty(value_ty));
                Ok(Type::Unknown)
            };
        }
        if attr == "items" && matches!(value_ty, Type::Dict(_)) {
            return Ok(Type::Function(Rc::new(FunctionDef::DictItems { receiver: value_ty })));
        }
        // Method lookup miss: no type, no diagnostic (§4.E).
        Ok(Type::Unknown)
    }

    fn visit_subscript(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let value_node = self.required_field(node, "value")?;
        let value_ty = self.visit(&value_node)?;
        let slice_kind = node.node_field("slice").map(|s| s.astname.clone()).unwrap_or_else(|| "Index".into());
        if slice_kind == "Slice" {
            Ok(value_ty)
        } else {
            Ok(index_sequence_type(&value_ty, 0))
        }
    }

    fn visit_name(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let id = node.identifier().unwrap_or_default();
        let pos = node.position();
        if id == "___" {
            self.raise(IssueKind::UnconnectedBlocks, IssueData::at(pos));
            return Ok(Type::Unknown);
        }
        let ctx = node.tag_field("ctx").unwrap_or_else(|| "Load".into());
        if ctx != "Load" {
            let find = self.find(&id);
            return Ok(find.state.map(|s| s.ty.clone()).unwrap_or(Type::Unknown));
        }
        match id.as_str() {
            "True" | "False" => return Ok(Type::Bool),
            "None" => return Ok(Type::None),
            _ => {}
        }
        if self.find(&id).exists {
            return Ok(self.load(&id, pos).ty.clone());
        }
        // A bare reference to a built-in name (e.g. the `print` in
        // `print(x)`) is a callable value, not its result. The call is what
        // invokes it, via `invoke`'s `FunctionDef::Builtin` arm.
        if let Some(b) = Builtin::lookup(&id) {
            return Ok(Type::Function(Rc::new(FunctionDef::Builtin(b))));
        }
        Ok(self.load(&id, pos).ty.clone())
    }

    fn visit_list(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let elts = node.list_field("elts");
        if elts.is_empty() {
            return Ok(Type::empty_list());
        }
        let mut last = Type::Unknown;
        for e in &elts {
            last = self.visit(e)?;
        }
        Ok(Type::list_of(last))
    }

    fn visit_tuple(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let elts = node.list_field("elts");
        if elts.is_empty() {
            return Ok(Type::empty_tuple());
        }
        let mut subtypes = Vec::with_capacity(elts.len());
        for e in &elts {
            subtypes.push(self.visit(e)?);
        }
        Ok(Type::tuple_of(subtypes))
    }

    fn visit_set(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let elts = node.list_field("elts");
        if elts.is_empty() {
            return Ok(Type::empty_set());
        }
        let mut last = Type::Unknown;
        for e in &elts {
            last = self.visit(e)?;
        }
        Ok(Type::set_of(last))
    }

    fn visit_dict(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let keys = node.list_field("keys");
        let values = node.list_field("values");
        if keys.is_empty() {
            return Ok(Type::empty_dict());
        }
        let mut k = Type::Unknown;
        for key_node in &keys {
            k = self.visit(key_node)?;
        }
        let mut v = Type::Unknown;
        for val_node in &values {
            v = self.visit(val_node)?;
        }
        Ok(Type::dict_of(k, v))
    }

    fn visit_with(&mut self, node: &AstNode) -> AnalyzerResult<Type> {
        let pos = node.position();
        let context_node = self.required_field(node, "context_expr")?;
        let context_ty = self.visit(&context_node)?;
        if let Some(target) = node.node_field("optional_vars") {
            self.destructure(&target, &context_ty, false)?;
        }
        self.visit_body(&node.list_field("body"), pos)?;
        Ok(Type::None)
    }

    // ---- entry points (§6.3) -------------------------------------------

    pub fn analyze(ast: &AstNode) -> Report {
        let mut analyzer = Analyzer::new();

        let root_path = PathId(analyzer.next_path);
        analyzer.next_path += 1;
        analyzer.path_chain.push(root_path);
        analyzer.name_map.entry(root_path).or_default();

        let root_scope = ScopeId(analyzer.next_scope);
        analyzer.next_scope += 1;
        analyzer.scope_chain.push(root_scope);

        let outcome = analyzer.visit(ast).map(|_| ());

        match outcome {
            Ok(()) => {
                analyzer.finish_scope();
                let issue_count: usize = analyzer.issues.values().map(Vec::len).sum();
                log::info!("analysis complete: {issue_count} issue(s) raised");
                let issues = std::mem::take(&mut analyzer.issues);
                Report::finish(&analyzer.name_map, issues)
            }
            Err(e) => {
                log::warn!("analysis aborted: {e}");
                Report::failure(e.to_string())
            }
        }
    }

    pub fn analyze_source(source: &str) -> Report {
        match serde_json::from_str::<AstNode>(source) {
            Ok(ast) => Analyzer::analyze(&ast),
            Err(e) => Report::failure(AnalyzerError::ParseFailure(e.to_string()).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn node(astname: &str, fields: serde_json::Value) -> AstNode {
        let fields = match fields {
            serde_json::Value::Object(obj) => obj.into_iter().collect(),
            _ => Default::default(),
        };
        AstNode { astname: astname.to_string(), lineno: 1, col_offset: 0, fields }
    }

    #[test]
    fn malformed_ast_is_caught_at_the_entry_point_not_panicked() {
        let ast = node("Assign", json!({})); // missing required `value`
        let report = Analyzer::analyze(&ast);
        assert!(!report.success);
        assert!(report.error.is_some());
    }

    #[test]
    fn calling_a_non_function_value_raises_not_a_function() {
        let ast = node(
            "Module",
            json!({ "body": [
                node("Assign", json!({ "targets": [node("Name", json!({"id": "x"}))], "value": node("Num", json!({})) })),
                node("Expr", json!({ "value": node("Call", json!({ "func": node("Name", json!({"id": "x"})), "args": Vec::<serde_json::Value>::new() })) })),
            ] }),
        );
        let report = Analyzer::analyze(&ast);
        assert!(report.success);
        assert_eq!(report.issues.get(&IssueKind::NotAFunction).map(Vec::len), Some(1));
    }

    #[test]
    fn analyze_source_reports_failure_on_invalid_json() {
        let report = Analyzer::analyze_source("not json");
        assert!(!report.success);
    }
}

/// RAII handle for a branch path (§5): pops the path chain on drop,
/// guaranteeing the pairing holds even if a visit inside the branch returns
/// `Err` early.
pub struct PathGuard<'a> {
    analyzer: &'a mut Analyzer,
    id: PathId,
}

impl PathGuard<'_> {
    pub fn path_id(&self) -> PathId {
        self.id
    }
}

impl std::ops::Deref for PathGuard<'_> {
    type Target = Analyzer;
    fn deref(&self) -> &Analyzer {
        self.analyzer
    }
}

impl std::ops::DerefMut for PathGuard<'_> {
    fn deref_mut(&mut self) -> &mut Analyzer {
        self.analyzer
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        let popped = self.analyzer.path_chain.remove(0);
        debug_assert_eq!(popped, self.id);
        debug!("exit path {:?}", self.id);
    }
}

/// RAII handle for a function-call scope (§5): runs `finish-scope` and
/// restores the caller's scope chain on drop.
pub struct ScopeGuard<'a> {
    analyzer: &'a mut Analyzer,
    saved_chain: Option<Vec<ScopeId>>,
}

impl ScopeGuard<'_> {
    fn path_chain_snapshot(&self) -> Vec<PathId> {
        self.analyzer.path_chain.clone()
    }

    fn name_map_ref(&self) -> &NameMap {
        &self.analyzer.name_map
    }
}

impl std::ops::Deref for ScopeGuard<'_> {
    type Target = Analyzer;
    fn deref(&self) -> &Analyzer {
        self.analyzer
    }
}

impl std::ops::DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Analyzer {
        self.analyzer
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.analyzer.finish_scope();
        if let Some(saved) = self.saved_chain.take() {
            let id = self.analyzer.scope_chain.first().copied();
            self.analyzer.scope_chain = saved;
            debug!("exit scope {id:?}");
        }
    }
}
