//! Tree-walking evaluator over JSON values.

use serde_json::{Number, Value};

use super::ast::{AssignOp, BinaryOp, Expr, LogicalOp, PathSegment, Place, Stmt, UnaryOp};
use super::{ExprError, RESPONSES_IDENT};
use crate::context::ExecutionContext;

/// Largest integer an f64 represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Evaluate an expression against the context.
pub fn evaluate(expr: &Expr, ctx: &ExecutionContext) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => lookup(name, ctx),
        Expr::Member(base, property) => {
            let base = evaluate(base, ctx)?;
            member(&base, property)
        }
        Expr::Index(base, index) => {
            let base = evaluate(base, ctx)?;
            let index = evaluate(index, ctx)?;
            index_value(&base, &index)
        }
        Expr::Unary(op, operand) => {
            let operand = evaluate(operand, ctx)?;
            unary(*op, &operand)
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            binary(*op, &left, &right)
        }
        Expr::Logical(op, left, right) => {
            let left = is_truthy(&evaluate(left, ctx)?);
            let result = match (op, left) {
                (LogicalOp::And, false) => false,
                (LogicalOp::Or, true) => true,
                _ => is_truthy(&evaluate(right, ctx)?),
            };
            Ok(Value::Bool(result))
        }
    }
}

/// Run statements in order, stopping at the first error.
pub fn execute(statements: &[Stmt], ctx: &mut ExecutionContext) -> Result<(), ExprError> {
    for statement in statements {
        match statement {
            Stmt::Expr(expr) => {
                evaluate(expr, ctx)?;
            }
            Stmt::Assign { target, op, value } => assign(target, *op, value, ctx)?,
        }
    }
    Ok(())
}

/// `null`, `false`, `0`, `NaN` and `""` are false; everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn lookup(name: &str, ctx: &ExecutionContext) -> Result<Value, ExprError> {
    if name == RESPONSES_IDENT {
        return Ok(ctx.responses_value());
    }
    ctx.get(name)
        .cloned()
        .ok_or_else(|| ExprError::UndefinedVariable(name.to_string()))
}

// ----------------------------------------------------------------------
// Access
// ----------------------------------------------------------------------

fn member(base: &Value, property: &str) -> Result<Value, ExprError> {
    match base {
        Value::Null => Err(ExprError::NullAccess {
            property: property.to_string(),
        }),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if property == "length" => Ok(Value::from(items.len())),
        Value::String(s) if property == "length" => Ok(Value::from(s.chars().count())),
        _ => Ok(Value::Null),
    }
}

fn index_value(base: &Value, index: &Value) -> Result<Value, ExprError> {
    match base {
        Value::Array(items) => {
            let i = array_index(index)?;
            Ok(items.get(i).cloned().unwrap_or(Value::Null))
        }
        Value::Null => Err(ExprError::NullAccess {
            property: display(index),
        }),
        other => member(other, &object_key(index)?),
    }
}

fn array_index(index: &Value) -> Result<usize, ExprError> {
    let invalid = || ExprError::InvalidIndex {
        found: type_name(index),
    };
    let n = index.as_f64().ok_or_else(invalid)?;
    if n < 0.0 || n.fract() != 0.0 || n >= MAX_SAFE_INTEGER {
        return Err(invalid());
    }
    Ok(n as usize)
}

fn object_key(index: &Value) -> Result<String, ExprError> {
    match index {
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) => Ok(display(index)),
        other => Err(ExprError::InvalidIndex {
            found: type_name(other),
        }),
    }
}

// ----------------------------------------------------------------------
// Operators
// ----------------------------------------------------------------------

fn unary(op: UnaryOp, operand: &Value) -> Result<Value, ExprError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!is_truthy(operand))),
        UnaryOp::Neg => match operand.as_f64() {
            Some(n) => number(-n),
            None => Err(ExprError::InvalidOperand {
                op: op.symbol(),
                operand: type_name(operand),
            }),
        },
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::Ne => return Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Add if left.is_string() || right.is_string() => {
            return Ok(Value::String(display(left) + &display(right)));
        }
        _ => {}
    }

    let mismatch = || ExprError::TypeMismatch {
        op: op.symbol(),
        left: type_name(left),
        right: type_name(right),
    };

    if let (Value::String(a), Value::String(b)) = (left, right) {
        return match op {
            BinaryOp::Lt => Ok(Value::Bool(a < b)),
            BinaryOp::Le => Ok(Value::Bool(a <= b)),
            BinaryOp::Gt => Ok(Value::Bool(a > b)),
            BinaryOp::Ge => Ok(Value::Bool(a >= b)),
            _ => Err(mismatch()),
        };
    }

    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(mismatch());
    };

    match op {
        BinaryOp::Add => number(a + b),
        BinaryOp::Sub => number(a - b),
        BinaryOp::Mul => number(a * b),
        BinaryOp::Div => number(a / b),
        BinaryOp::Rem => number(a % b),
        BinaryOp::Lt => Ok(Value::Bool(a < b)),
        BinaryOp::Le => Ok(Value::Bool(a <= b)),
        BinaryOp::Gt => Ok(Value::Bool(a > b)),
        BinaryOp::Ge => Ok(Value::Bool(a >= b)),
        BinaryOp::Eq => Ok(Value::Bool(a == b)),
        BinaryOp::Ne => Ok(Value::Bool(a != b)),
    }
}

/// Numbers compare by value (`1 == 1.0`); everything else structurally.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Wrap an arithmetic result, keeping integral values as JSON integers.
fn number(n: f64) -> Result<Value, ExprError> {
    if !n.is_finite() {
        return Err(ExprError::NonFiniteNumber);
    }
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        return Ok(Value::from(n as i64));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or(ExprError::NonFiniteNumber)
}

/// String form used by concatenation.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ----------------------------------------------------------------------
// Assignment
// ----------------------------------------------------------------------

enum Key {
    Field(String),
    Index(Value),
}

fn assign(
    target: &Place,
    op: AssignOp,
    value: &Expr,
    ctx: &mut ExecutionContext,
) -> Result<(), ExprError> {
    if target.root == RESPONSES_IDENT {
        return Err(ExprError::ReadOnly(RESPONSES_IDENT.to_string()));
    }

    // Keys and the right-hand side are evaluated before anything is written.
    let keys = target
        .path
        .iter()
        .map(|segment| match segment {
            PathSegment::Field(name) => Ok(Key::Field(name.clone())),
            PathSegment::Index(expr) => evaluate(expr, ctx).map(Key::Index),
        })
        .collect::<Result<Vec<_>, ExprError>>()?;
    let mut value = evaluate(value, ctx)?;

    if let Some(arith) = op.binary() {
        let current = read_place(&target.root, &keys, ctx)?;
        value = binary(arith, &current, &value)?;
    }

    let Some((last, parents)) = keys.split_last() else {
        ctx.set(target.root.clone(), value);
        return Ok(());
    };

    let mut slot = ctx
        .get_mut(&target.root)
        .ok_or_else(|| ExprError::UndefinedVariable(target.root.clone()))?;
    let mut name = target.root.clone();
    for key in parents {
        let (child, child_name) = step_mut(slot, key, &name)?;
        slot = child;
        name = child_name;
    }
    write(slot, last, value)
}

fn read_place(root: &str, keys: &[Key], ctx: &ExecutionContext) -> Result<Value, ExprError> {
    let mut current = lookup(root, ctx)?;
    for key in keys {
        current = match key {
            Key::Field(name) => member(&current, name)?,
            Key::Index(index) => index_value(&current, index)?,
        };
    }
    Ok(current)
}

/// Descend one step for writing; the step must already exist.
fn step_mut<'v>(
    slot: &'v mut Value,
    key: &Key,
    parent: &str,
) -> Result<(&'v mut Value, String), ExprError> {
    match slot {
        Value::Array(items) => {
            let Key::Index(index) = key else {
                return Err(ExprError::NotAContainer { found: "array" });
            };
            let i = array_index(index)?;
            let len = items.len();
            let child = items
                .get_mut(i)
                .ok_or(ExprError::IndexOutOfBounds { index: i, len })?;
            Ok((child, format!("{}[{}]", parent, i)))
        }
        Value::Object(map) => {
            let field = key_name(key)?;
            let child = map.get_mut(&field).ok_or_else(|| ExprError::MissingProperty {
                property: format!("{}.{}", parent, field),
            })?;
            Ok((child, format!("{}.{}", parent, field)))
        }
        Value::Null => Err(ExprError::MissingProperty {
            property: parent.to_string(),
        }),
        other => Err(ExprError::NotAContainer {
            found: type_name(other),
        }),
    }
}

fn write(slot: &mut Value, key: &Key, value: Value) -> Result<(), ExprError> {
    match slot {
        Value::Object(map) => {
            map.insert(key_name(key)?, value);
            Ok(())
        }
        Value::Array(items) => {
            let Key::Index(index) = key else {
                return Err(ExprError::NotAContainer { found: "array" });
            };
            let i = array_index(index)?;
            let len = items.len();
            match i.cmp(&len) {
                std::cmp::Ordering::Less => items[i] = value,
                std::cmp::Ordering::Equal => items.push(value),
                std::cmp::Ordering::Greater => {
                    return Err(ExprError::IndexOutOfBounds { index: i, len })
                }
            }
            Ok(())
        }
        other => Err(ExprError::NotAContainer {
            found: type_name(other),
        }),
    }
}

fn key_name(key: &Key) -> Result<String, ExprError> {
    match key {
        Key::Field(name) => Ok(name.clone()),
        Key::Index(index) => object_key(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{parse_expression, parse_script};
    use serde_json::json;

    fn ctx_with(vars: Value) -> ExecutionContext {
        ExecutionContext::with_variables(vars.as_object().cloned().unwrap_or_default())
    }

    fn eval(source: &str, ctx: &ExecutionContext) -> Result<Value, ExprError> {
        evaluate(&parse_expression(source).unwrap(), ctx)
    }

    fn run(source: &str, ctx: &mut ExecutionContext) -> Result<(), ExprError> {
        execute(&parse_script(source).unwrap(), ctx)
    }

    #[test]
    fn test_decision_condition() {
        let positive = ctx_with(json!({"x": 5}));
        let negative = ctx_with(json!({"x": -1}));

        assert_eq!(eval("x > 0", &positive).unwrap(), json!(true));
        assert_eq!(eval("x > 0", &negative).unwrap(), json!(false));
    }

    #[test]
    fn test_arithmetic_keeps_integers() {
        let ctx = ExecutionContext::new();
        assert_eq!(eval("7 / 2", &ctx).unwrap(), json!(3.5));
        assert_eq!(eval("6 / 2", &ctx).unwrap(), json!(3));
        assert_eq!(eval("7 % 4 - -1", &ctx).unwrap(), json!(4));
        assert_eq!(eval("1 / 0", &ctx).unwrap_err(), ExprError::NonFiniteNumber);
    }

    #[test]
    fn test_concatenation() {
        let ctx = ctx_with(json!({"items": [1, 2]}));
        assert_eq!(eval("'n=' + 2", &ctx).unwrap(), json!("n=2"));
        assert_eq!(eval("'v' + null + true", &ctx).unwrap(), json!("vnulltrue"));
        assert_eq!(eval("'items: ' + items", &ctx).unwrap(), json!("items: [1,2]"));
    }

    #[test]
    fn test_type_mismatch() {
        let ctx = ExecutionContext::new();
        assert_eq!(
            eval("true - 1", &ctx).unwrap_err(),
            ExprError::TypeMismatch {
                op: "-",
                left: "boolean",
                right: "number",
            }
        );
        assert!(matches!(
            eval("'a' < 1", &ctx).unwrap_err(),
            ExprError::TypeMismatch { op: "<", .. }
        ));
        assert_eq!(eval("'apple' < 'banana'", &ctx).unwrap(), json!(true));
    }

    #[test]
    fn test_equality() {
        let ctx = ctx_with(json!({"a": 1.0, "b": 1, "s": "1"}));
        assert_eq!(eval("a == b", &ctx).unwrap(), json!(true));
        assert_eq!(eval("b === s", &ctx).unwrap(), json!(false));
        assert_eq!(eval("null != false", &ctx).unwrap(), json!(true));
    }

    #[test]
    fn test_logical_short_circuit() {
        let ctx = ctx_with(json!({"ok": false}));
        // `missing` would fail if evaluated
        assert_eq!(eval("ok && missing", &ctx).unwrap(), json!(false));
        assert_eq!(eval("!ok || missing", &ctx).unwrap(), json!(true));
        assert_eq!(
            eval("ok || missing", &ctx).unwrap_err(),
            ExprError::UndefinedVariable("missing".to_string())
        );
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&falsy), "{} should be falsy", falsy);
        }
        for truthy in [json!(true), json!(-1), json!("0"), json!([]), json!({})] {
            assert!(is_truthy(&truthy), "{} should be truthy", truthy);
        }
    }

    #[test]
    fn test_member_and_index_access() {
        let mut ctx = ctx_with(json!({"user": {"name": "ada", "tags": ["x", "y"]}}));
        ctx.store_response("api-1", json!({"status": "ok"}));

        assert_eq!(eval("user.name", &ctx).unwrap(), json!("ada"));
        assert_eq!(eval("user['tags'][1]", &ctx).unwrap(), json!("y"));
        assert_eq!(eval("user.tags.length", &ctx).unwrap(), json!(2));
        assert_eq!(eval("user.name.length", &ctx).unwrap(), json!(3));
        assert_eq!(eval("user.missing", &ctx).unwrap(), json!(null));
        assert_eq!(eval("user.tags[5]", &ctx).unwrap(), json!(null));
        assert_eq!(eval("responses['api-1'].status", &ctx).unwrap(), json!("ok"));
        assert_eq!(
            eval("user.missing.deeper", &ctx).unwrap_err(),
            ExprError::NullAccess {
                property: "deeper".to_string()
            }
        );
        assert_eq!(
            eval("user.tags[-1]", &ctx).unwrap_err(),
            ExprError::InvalidIndex { found: "number" }
        );
    }

    #[test]
    fn test_assignment() {
        let mut ctx = ctx_with(json!({"counter": 1, "cart": {"items": []}}));
        run(
            "counter += 2\ncart.items[0] = 'apple'\ncart['total'] = counter * 10\nflag = !false",
            &mut ctx,
        )
        .unwrap();

        assert_eq!(ctx.get("counter"), Some(&json!(3)));
        assert_eq!(
            ctx.get("cart"),
            Some(&json!({"items": ["apple"], "total": 30}))
        );
        assert_eq!(ctx.get("flag"), Some(&json!(true)));
    }

    #[test]
    fn test_assignment_errors() {
        let mut ctx = ctx_with(json!({"cart": {"items": []}, "n": 1}));

        assert_eq!(
            run("responses = 1", &mut ctx).unwrap_err(),
            ExprError::ReadOnly("responses".to_string())
        );
        assert_eq!(
            run("total += 1", &mut ctx).unwrap_err(),
            ExprError::UndefinedVariable("total".to_string())
        );
        assert_eq!(
            run("cart.meta.size = 1", &mut ctx).unwrap_err(),
            ExprError::MissingProperty {
                property: "cart.meta".to_string()
            }
        );
        assert_eq!(
            run("cart.items[3] = 1", &mut ctx).unwrap_err(),
            ExprError::IndexOutOfBounds { index: 3, len: 0 }
        );
        assert_eq!(
            run("n.x = 1", &mut ctx).unwrap_err(),
            ExprError::NotAContainer { found: "number" }
        );
    }
}
