// End-to-end scenarios, built by hand as small AstNode trees (no parser
// dependency) and asserted against the resulting Report.

use std::collections::BTreeMap;

use flowtutor::{analyze, AstNode, IssueKind};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn node(astname: &str, fields: Value) -> AstNode {
    let fields: BTreeMap<String, Value> = match fields {
        Value::Object(obj) => obj.into_iter().collect(),
        _ => Default::default(),
    };
    AstNode { astname: astname.to_string(), lineno: 1, col_offset: 0, fields }
}

fn module(body: Vec<AstNode>) -> AstNode {
    node("Module", json!({ "body": body }))
}

fn name(id: &str) -> AstNode {
    node("Name", json!({ "id": id }))
}

fn num() -> AstNode {
    node("Num", json!({}))
}

fn assign(target: AstNode, value: AstNode) -> AstNode {
    node("Assign", json!({ "targets": [target], "value": value }))
}

fn expr(value: AstNode) -> AstNode {
    node("Expr", json!({ "value": value }))
}

fn call(func: AstNode, args: Vec<AstNode>) -> AstNode {
    node("Call", json!({ "func": func, "args": args }))
}

fn issue_names(report: &flowtutor::Report, kind: IssueKind) -> Vec<String> {
    report.issues.get(&kind).map(|v| v.iter().filter_map(|d| d.name.clone()).collect()).unwrap_or_default()
}

// 1. `x = 5\nprint(x)` -> no issues; topLevelVariables.x = {type:Num, set:yes, read:yes, over:no}
#[test]
fn scenario_1_clean_assignment_and_use() {
    let ast = module(vec![assign(name("x"), num()), expr(call(name("print"), vec![name("x")]))]);
    let report = analyze(&ast);
    assert!(report.success);
    assert!(report.issues.is_empty(), "expected no issues, got {:?}", report.issues);
    let x = report.top_level_variables.get("x").expect("x should be in topLevelVariables");
    assert_eq!(x.ty.tag(), "Num");
    assert_eq!(format!("{:?}", x.set), "Yes");
    assert_eq!(format!("{:?}", x.read), "Yes");
    assert_eq!(format!("{:?}", x.over), "No");
}

// 2. `print(y)` -> ["Undefined variables": y]
#[test]
fn scenario_2_undefined_variable_read() {
    let ast = module(vec![expr(call(name("print"), vec![name("y")]))]);
    let report = analyze(&ast);
    assert!(report.success);
    assert_eq!(issue_names(&report, IssueKind::UndefinedVariables), vec!["y"]);
}

// 3. `x = 5\nx = 7` -> ["Overwritten variables": x, "Unread variables": x]
#[test]
fn scenario_3_overwrite_without_read() {
    let ast = module(vec![assign(name("x"), num()), assign(name("x"), num())]);
    let report = analyze(&ast);
    assert!(report.success);
    assert_eq!(issue_names(&report, IssueKind::OverwrittenVariables), vec!["x"]);
    assert_eq!(issue_names(&report, IssueKind::UnreadVariables), vec!["x"]);
}

// 4. `if c:\n    x = 1\nprint(x)` -> ["Possibly undefined variables": x]
#[test]
fn scenario_4_conditional_definition_is_possibly_undefined() {
    let if_node = node(
        "If",
        json!({ "test": name("c"), "body": [assign(name("x"), num())], "orelse": Value::Array(vec![]) }),
    );
    let ast = module(vec![if_node, expr(call(name("print"), vec![name("x")]))]);
    let report = analyze(&ast);
    assert!(report.success);
    assert_eq!(issue_names(&report, IssueKind::PossiblyUndefinedVariables), vec!["x"]);
}

// 5. `xs = []\nxs.append(3)\nprint(xs[0])` -> no issues; xs.type = List{subtype: Num}
#[test]
fn scenario_5_list_append_narrows_subtype_through_alias() {
    let xs_list = node("List", json!({ "elts": Value::Array(vec![]) }));
    let append_call = call(node("Attribute", json!({ "value": name("xs"), "attr": "append" })), vec![num()]);
    let subscript = node("Subscript", json!({ "value": name("xs"), "slice": num() }));
    let ast = module(vec![
        assign(name("xs"), xs_list),
        expr(append_call),
        expr(call(name("print"), vec![subscript])),
    ]);
    let report = analyze(&ast);
    assert!(report.success);
    assert!(report.issues.is_empty(), "expected no issues, got {:?}", report.issues);
    let xs = report.top_level_variables.get("xs").expect("xs should be tracked");
    assert_eq!(xs.ty.tag(), "List");
}

// 6. `for x in x:\n    pass` -> ["Iteration variable is iteration list": x]
//    plus ["Undefined variables": x] at the iter position.
#[test]
fn scenario_6_iteration_variable_is_iteration_list() {
    let for_node = node(
        "For",
        json!({ "target": name("x"), "iter": name("x"), "body": [node("Pass", json!({}))], "orelse": Value::Array(vec![]) }),
    );
    let ast = module(vec![for_node]);
    let report = analyze(&ast);
    assert!(report.success);
    assert_eq!(issue_names(&report, IssueKind::IterationVariableIsIterationList), vec!["x"]);
    assert_eq!(issue_names(&report, IssueKind::UndefinedVariables), vec!["x"]);
    assert!(
        !report.issues.contains_key(&IssueKind::NonListIterations),
        "an Unknown iteration type (undefined x) must not also raise Non-list iterations: {:?}",
        report.issues
    );
}

// 7. `"a" + 1` -> ["Incompatible types": op=Add, left=Str, right=Num]
#[test]
fn scenario_7_incompatible_binary_operands() {
    let binop = node("BinOp", json!({ "op": "Add", "left": node("Str", json!({})), "right": num() }));
    let ast = module(vec![expr(binop)]);
    let report = analyze(&ast);
    assert!(report.success);
    let issues = report.issues.get(&IssueKind::IncompatibleTypes).expect("expected Incompatible types");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].operation.as_deref(), Some("Add"));
    assert_eq!(issues[0].left.as_ref().unwrap().tag(), "Str");
    assert_eq!(issues[0].right.as_ref().unwrap().tag(), "Num");
}

// 8. `def f():\n    return 1\nreturn 2` -> ["Return outside function"];
//    f has type Function; calling f() infers Num.
#[test]
fn scenario_8_return_outside_function_and_function_type() {
    let func_def = node(
        "FunctionDef",
        json!({ "name": "f", "args": Value::Array(vec![]), "body": [node("Return", json!({ "value": num() }))] }),
    );
    let top_return = node("Return", json!({ "value": num() }));
    let ast = module(vec![func_def, top_return]);
    let report = analyze(&ast);
    assert!(report.success);
    assert_eq!(report.issues.get(&IssueKind::ReturnOutsideFunction).map(Vec::len), Some(1));
    let f = report.top_level_variables.get("f").expect("f should be tracked");
    assert_eq!(f.ty.tag(), "Function");
}

// Supplementary to scenario 8: calling f() after definition infers Num,
// since FunctionDef bodies are only visited lazily at call time.
#[test]
fn scenario_8_supplement_calling_f_infers_num() {
    let func_def = node(
        "FunctionDef",
        json!({ "name": "f", "args": Value::Array(vec![]), "body": [node("Return", json!({ "value": num() }))] }),
    );
    let call_f = assign(name("result"), call(name("f"), vec![]));
    let ast = module(vec![func_def, call_f]);
    let report = analyze(&ast);
    assert!(report.success);
    let result = report.top_level_variables.get("result").expect("result should be tracked");
    assert_eq!(result.ty.tag(), "Num");
}
