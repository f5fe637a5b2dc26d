//! Rule compiler.
//!
//! Turns rule text into a `Predicate<S>`: the parsed expression is
//! type-checked against the schema of `S` and lowered into a tree of
//! `Node`s in which every identifier is already resolved to a field index,
//! a lambda slot or a helper index. Nothing is evaluated here.
//!
//! # Name resolution
//!
//! A bare identifier is looked up, in order, as
//!
//! 1. a lambda parameter in scope (innermost first, `it` included),
//! 2. a field of an implicit lambda's element (`Tags.Any(Contains("x"))`
//!    style bodies see the element's fields unqualified),
//! 3. a field of the root record.
//!
//! `Namespace.Member` resolves to a string constant when `Namespace` is one
//! of the schema's enums, and to a `StringComparison` mode for
//! `StringComparison.Ordinal` / `StringComparison.OrdinalIgnoreCase`.

use crate::ast::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
use crate::error::{CompileError, EvalError};
use crate::eval;
use crate::parser::parse;
use crate::schema::{ElemType, Helper, RecordInfo, Schema, Type};
use crate::value::CaseMode;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Comparison(CaseMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Runtime representation both operands are read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operands {
    Int,
    Float,
    Str,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StrTest {
    Contains,
    StartsWith,
    EndsWith,
    Equals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StrMap {
    ToLower,
    ToUpper,
    Trim,
}

/// A lambda body bound to one local slot.
#[derive(Debug)]
pub(crate) struct Lambda {
    pub slot: usize,
    pub body: Box<Node>,
}

/// Resolved, type-checked expression tree.
#[derive(Debug)]
pub(crate) enum Node {
    Const(Literal),
    Root,
    Local(usize),
    Field {
        target: Box<Node>,
        index: usize,
    },
    ToFloat(Box<Node>),
    Not(Box<Node>),
    Neg {
        operand: Box<Node>,
        float: bool,
    },
    /// Short-circuiting `&&` over any number of operands.
    AllOf(Vec<Node>),
    /// Short-circuiting `||` over any number of operands.
    AnyOf(Vec<Node>),
    Compare {
        op: CmpOp,
        operands: Operands,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Arith {
        op: ArithOp,
        float: bool,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Concat(Box<Node>, Box<Node>),
    Conditional {
        cond: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    Array(Vec<Node>),
    Index {
        target: Box<Node>,
        index: Box<Node>,
    },
    StatIndex {
        target: Box<Node>,
        key: Box<Node>,
    },
    StrLen(Box<Node>),
    StrTest {
        test: StrTest,
        target: Box<Node>,
        arg: Box<Node>,
        mode: Option<Box<Node>>,
    },
    StrMap {
        map: StrMap,
        target: Box<Node>,
    },
    Count {
        target: Box<Node>,
        filter: Option<Lambda>,
    },
    Any {
        target: Box<Node>,
        filter: Option<Lambda>,
    },
    All {
        target: Box<Node>,
        filter: Lambda,
    },
    Contains {
        target: Box<Node>,
        item: Box<Node>,
    },
    Where {
        target: Box<Node>,
        filter: Lambda,
    },
    Select {
        target: Box<Node>,
        map: Lambda,
    },
    Sum {
        target: Box<Node>,
        map: Option<Lambda>,
        float: bool,
    },
    First {
        target: Box<Node>,
        filter: Option<Lambda>,
    },
    GetStats(Box<Node>),
    StatsCount(Box<Node>),
    ContainsKey {
        target: Box<Node>,
        key: Box<Node>,
    },
    Helper {
        index: usize,
        args: Vec<Node>,
    },
    /// A lambda passed to a helper; evaluates to a callable value.
    Closure(Lambda),
}

/// A compiled rule expression.
///
/// Holds nothing but the resolved node tree, so it is cheap to clone and
/// can be evaluated from several threads at once.
///
/// # Examples
///
/// ```rust
/// use itemfilter::{compile, ItemAttributes, ItemRarity, ItemSnapshot};
///
/// let predicate = compile::<ItemSnapshot>("Rarity == ItemRarity.Rare && ItemLevel >= 80").unwrap();
///
/// let item = ItemSnapshot::new(ItemAttributes {
///     rarity: ItemRarity::Rare,
///     item_level: 84,
///     ..Default::default()
/// });
/// assert!(predicate.evaluate(&item).unwrap());
/// ```
pub struct Predicate<S> {
    root: Arc<Node>,
    _schema: PhantomData<fn(&S) -> bool>,
}

impl<S> Clone for Predicate<S> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            _schema: PhantomData,
        }
    }
}

impl<S> fmt::Debug for Predicate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("root", &self.root).finish()
    }
}

impl<S: Schema> Predicate<S> {
    /// Run the predicate against one item.
    pub fn evaluate(&self, item: &S) -> Result<bool, EvalError> {
        eval::run(&self.root, item)
    }
}

/// Compile rule text against the schema of `S`.
///
/// Fails if the text does not parse, names something the schema does not
/// have, is ill-typed, or is not a boolean expression.
///
/// ```rust
/// use itemfilter::{compile, ItemSnapshot};
///
/// assert!(compile::<ItemSnapshot>("SocketInfo.LargestLinkSize >= 5").is_ok());
///
/// let err = compile::<ItemSnapshot>("ItemLevel + 1").unwrap_err();
/// assert!(err.message.contains("Boolean"));
///
/// let err = compile::<ItemSnapshot>("NoSuchField == 1").unwrap_err();
/// assert_eq!(err.position, Some(0));
/// ```
pub fn compile<S: Schema>(text: &str) -> Result<Predicate<S>, CompileError> {
    let expr = parse(text)?;
    let mut compiler = Compiler::<S> {
        scopes: Vec::new(),
        _schema: PhantomData,
    };
    let (root, ty) = compiler.lower(&expr)?;
    if ty != Type::Bool {
        return Err(CompileError::at(
            format!("Expression of type 'Boolean' expected, found '{}'", ty),
            expr.pos,
        ));
    }
    Ok(Predicate {
        root: Arc::new(root),
        _schema: PhantomData,
    })
}

struct Scope {
    name: String,
    ty: Type,
    implicit: bool,
}

struct Compiler<S> {
    scopes: Vec<Scope>,
    _schema: PhantomData<fn() -> S>,
}

type Lowered = (Node, Type);

/// How a helper's trailing variadic arguments are passed.
#[derive(Clone, Copy)]
enum Rest {
    Absent,
    PassArray,
    Pack,
}

fn boxed(node: Node) -> Box<Node> {
    Box::new(node)
}

fn widen((node, ty): Lowered, to: Type) -> Node {
    if to == Type::Float && ty == Type::Int {
        Node::ToFloat(boxed(node))
    } else {
        node
    }
}

/// Common type of two branches or array elements.
fn unify(a: Type, b: Type) -> Option<Type> {
    if a == b {
        Some(a)
    } else if a.is_numeric() && b.is_numeric() {
        Some(Type::Float)
    } else {
        None
    }
}

fn arg_fits(param: Type, arg: &Option<Lowered>) -> bool {
    match (param, arg) {
        (Type::Predicate(_), arg) => arg.is_none(),
        (_, None) => false,
        (param, Some((_, ty))) => param.accepts(*ty),
    }
}

fn select_overload<S>(helper: &Helper<S>, args: &[Option<Lowered>]) -> Option<Rest> {
    let fixed = helper.params.len();
    if args.len() < fixed {
        return None;
    }
    if !helper.params.iter().zip(args).all(|(p, a)| arg_fits(*p, a)) {
        return None;
    }
    let rest = &args[fixed..];
    match helper.variadic {
        None => rest.is_empty().then_some(Rest::Absent),
        Some(elem) => {
            if rest.len() == 1 && arg_fits(Type::List(elem), &rest[0]) {
                Some(Rest::PassArray)
            } else if rest.iter().all(|a| arg_fits(elem.to_type(), a)) {
                Some(Rest::Pack)
            } else {
                None
            }
        }
    }
}

fn describe_args(args: &[Option<Lowered>]) -> String {
    args.iter()
        .map(|a| match a {
            Some((_, ty)) => ty.to_string(),
            None => "lambda".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl<S: Schema> Compiler<S> {
    fn lower(&mut self, expr: &Expr) -> Result<Lowered, CompileError> {
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Bool(b) => Ok((Node::Const(Literal::Bool(*b)), Type::Bool)),
            ExprKind::Int(i) => Ok((Node::Const(Literal::Int(*i)), Type::Int)),
            ExprKind::Float(f) => Ok((Node::Const(Literal::Float(*f)), Type::Float)),
            ExprKind::Str(s) => Ok((Node::Const(Literal::Str(s.clone())), Type::Str)),
            ExprKind::Ident(name) => self.identifier(name, pos),
            ExprKind::Member { target, name } => {
                if let ExprKind::Ident(namespace) = &target.kind {
                    if let Some(constant) = self.enum_constant(namespace, name, pos)? {
                        return Ok(constant);
                    }
                }
                let target = self.lower(target)?;
                self.member(target, name, pos)
            }
            ExprKind::Call { target: None, name, args } => {
                if name == "iif" {
                    return match args.as_slice() {
                        [cond, then, otherwise] => self.conditional(cond, then, otherwise),
                        _ => Err(CompileError::at("iif expects 3 arguments", pos)),
                    };
                }
                self.helper_call(name, args, pos)
            }
            ExprKind::Call {
                target: Some(target),
                name,
                args,
            } => {
                let target = self.lower(target)?;
                self.method(target, name, args, pos)
            }
            ExprKind::Index { target, index } => {
                let target = self.lower(target)?;
                let index = self.lower(index)?;
                self.index(target, index, pos)
            }
            ExprKind::Unary { op, operand } => {
                let (node, ty) = self.lower(operand)?;
                match (op, ty) {
                    (UnaryOp::Not, Type::Bool) => Ok((Node::Not(boxed(node)), Type::Bool)),
                    (UnaryOp::Neg, Type::Int | Type::Float) => Ok((
                        Node::Neg {
                            operand: boxed(node),
                            float: ty == Type::Float,
                        },
                        ty,
                    )),
                    (UnaryOp::Not, ty) => Err(CompileError::at(
                        format!("Operator '!' incompatible with operand type '{}'", ty),
                        pos,
                    )),
                    (UnaryOp::Neg, ty) => Err(CompileError::at(
                        format!("Operator '-' incompatible with operand type '{}'", ty),
                        pos,
                    )),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.lower(lhs)?;
                let rhs = self.lower(rhs)?;
                self.binary(*op, lhs, rhs, pos)
            }
            ExprKind::Logical { op, operands } => self.logical(*op, operands),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => self.conditional(cond, then, otherwise),
            ExprKind::Array(items) => self.array(items, pos),
            ExprKind::Lambda { .. } => Err(CompileError::at(
                "Lambda expressions are only allowed as method arguments",
                pos,
            )),
        }
    }

    fn identifier(&self, name: &str, pos: usize) -> Result<Lowered, CompileError> {
        for (slot, scope) in self.scopes.iter().enumerate().rev() {
            if scope.name == name {
                return Ok((Node::Local(slot), scope.ty));
            }
        }
        for (slot, scope) in self.scopes.iter().enumerate().rev() {
            if let (true, Type::Record(info)) = (scope.implicit, scope.ty) {
                if let Some((index, ty)) = info.field(name) {
                    let node = Node::Field {
                        target: boxed(Node::Local(slot)),
                        index,
                    };
                    return Ok((node, ty));
                }
            }
        }
        match RecordInfo::of::<S>().field(name) {
            Some((index, ty)) => Ok((
                Node::Field {
                    target: boxed(Node::Root),
                    index,
                },
                ty,
            )),
            None => Err(CompileError::at(
                format!("No property or field '{}' exists in type '{}'", name, S::NAME),
                pos,
            )),
        }
    }

    fn enum_constant(
        &self,
        namespace: &str,
        member: &str,
        pos: usize,
    ) -> Result<Option<Lowered>, CompileError> {
        if self.scopes.iter().any(|s| s.name == namespace) {
            return Ok(None);
        }
        if namespace == "StringComparison" {
            let mode = match member {
                "Ordinal" => CaseMode::Ordinal,
                "OrdinalIgnoreCase" => CaseMode::IgnoreCase,
                _ => {
                    return Err(CompileError::at(
                        format!("'{}' is not a member of 'StringComparison'", member),
                        pos,
                    ))
                }
            };
            return Ok(Some((Node::Const(Literal::Comparison(mode)), Type::Comparison)));
        }
        let Some((_, members)) = S::enums().iter().find(|(name, _)| *name == namespace) else {
            return Ok(None);
        };
        if members.contains(&member) {
            Ok(Some((Node::Const(Literal::Str(member.to_string())), Type::Str)))
        } else {
            Err(CompileError::at(
                format!("'{}' is not a member of '{}'", member, namespace),
                pos,
            ))
        }
    }

    fn member(&mut self, (node, ty): Lowered, name: &str, pos: usize) -> Result<Lowered, CompileError> {
        match (ty, name) {
            (Type::Record(info), _) => match info.field(name) {
                Some((index, field_ty)) => Ok((
                    Node::Field {
                        target: boxed(node),
                        index,
                    },
                    field_ty,
                )),
                None => Err(CompileError::at(
                    format!("No property or field '{}' exists in type '{}'", name, info.name),
                    pos,
                )),
            },
            (Type::Str, "Length") => Ok((Node::StrLen(boxed(node)), Type::Int)),
            (Type::List(_) | Type::Mods, "Count" | "Length") => Ok((
                Node::Count {
                    target: boxed(node),
                    filter: None,
                },
                Type::Int,
            )),
            (Type::IntStats | Type::FloatStats, "Count") => Ok((Node::StatsCount(boxed(node)), Type::Int)),
            _ => Err(CompileError::at(
                format!("No property or field '{}' exists in type '{}'", name, ty),
                pos,
            )),
        }
    }

    fn index(&mut self, (target, ty): Lowered, (index, index_ty): Lowered, pos: usize) -> Result<Lowered, CompileError> {
        match (ty, index_ty) {
            (Type::List(_) | Type::Mods, Type::Int) => {
                let elem = ty.element().unwrap_or(Type::Bool);
                Ok((
                    Node::Index {
                        target: boxed(target),
                        index: boxed(index),
                    },
                    elem,
                ))
            }
            (Type::IntStats, Type::Str) => Ok((
                Node::StatIndex {
                    target: boxed(target),
                    key: boxed(index),
                },
                Type::Int,
            )),
            (Type::FloatStats, Type::Str) => Ok((
                Node::StatIndex {
                    target: boxed(target),
                    key: boxed(index),
                },
                Type::Float,
            )),
            _ => Err(CompileError::at(
                format!("Cannot index '{}' with '{}'", ty, index_ty),
                pos,
            )),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: Lowered, rhs: Lowered, pos: usize) -> Result<Lowered, CompileError> {
        let (lt, rt) = (lhs.1, rhs.1);
        let incompatible = || {
            CompileError::at(
                format!(
                    "Operator '{}' incompatible with operand types '{}' and '{}'",
                    op.symbol(),
                    lt,
                    rt
                ),
                pos,
            )
        };

        match op {
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = !matches!(op, BinaryOp::Eq | BinaryOp::Ne);
                let operands = match (lt, rt) {
                    (Type::Int, Type::Int) => Operands::Int,
                    (a, b) if a.is_numeric() && b.is_numeric() => Operands::Float,
                    (Type::Str, Type::Str) => Operands::Str,
                    (Type::Bool, Type::Bool) if !ordering => Operands::Bool,
                    _ => return Err(incompatible()),
                };
                let cmp = match op {
                    BinaryOp::Eq => CmpOp::Eq,
                    BinaryOp::Ne => CmpOp::Ne,
                    BinaryOp::Lt => CmpOp::Lt,
                    BinaryOp::Le => CmpOp::Le,
                    BinaryOp::Gt => CmpOp::Gt,
                    _ => CmpOp::Ge,
                };
                Ok((
                    Node::Compare {
                        op: cmp,
                        operands,
                        lhs: boxed(lhs.0),
                        rhs: boxed(rhs.0),
                    },
                    Type::Bool,
                ))
            }
            BinaryOp::Add if lt == Type::Str || rt == Type::Str => {
                let printable = |t: Type| matches!(t, Type::Str | Type::Int | Type::Float | Type::Bool);
                if !printable(lt) || !printable(rt) {
                    return Err(incompatible());
                }
                Ok((Node::Concat(boxed(lhs.0), boxed(rhs.0)), Type::Str))
            }
            _ => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    return Err(incompatible());
                }
                let float = lt == Type::Float || rt == Type::Float;
                let arith = match op {
                    BinaryOp::Add => ArithOp::Add,
                    BinaryOp::Sub => ArithOp::Sub,
                    BinaryOp::Mul => ArithOp::Mul,
                    BinaryOp::Div => ArithOp::Div,
                    _ => ArithOp::Rem,
                };
                Ok((
                    Node::Arith {
                        op: arith,
                        float,
                        lhs: boxed(lhs.0),
                        rhs: boxed(rhs.0),
                    },
                    if float { Type::Float } else { Type::Int },
                ))
            }
        }
    }

    /// Lower a flat `&&`/`||` chain. Parenthesised chains of the same
    /// operator are merged into it.
    fn logical(&mut self, op: LogicalOp, operands: &[Expr]) -> Result<Lowered, CompileError> {
        let mut nodes = Vec::with_capacity(operands.len());
        for operand in operands {
            let (node, ty) = self.lower(operand)?;
            if ty != Type::Bool {
                return Err(CompileError::at(
                    format!("Operator '{}' incompatible with operand type '{}'", op.symbol(), ty),
                    operand.pos,
                ));
            }
            match (op, node) {
                (LogicalOp::And, Node::AllOf(inner)) | (LogicalOp::Or, Node::AnyOf(inner)) => nodes.extend(inner),
                (_, node) => nodes.push(node),
            }
        }
        let node = match op {
            LogicalOp::And => Node::AllOf(nodes),
            LogicalOp::Or => Node::AnyOf(nodes),
        };
        Ok((node, Type::Bool))
    }

    fn conditional(&mut self, cond: &Expr, then: &Expr, otherwise: &Expr) -> Result<Lowered, CompileError> {
        let (cond_node, cond_ty) = self.lower(cond)?;
        if cond_ty != Type::Bool {
            return Err(CompileError::at(
                format!("Condition must be 'Boolean', found '{}'", cond_ty),
                cond.pos,
            ));
        }
        let then = self.lower(then)?;
        let other = self.lower(otherwise)?;
        let ty = unify(then.1, other.1).ok_or_else(|| {
            CompileError::at(
                format!(
                    "Both branches of a conditional must have the same type, found '{}' and '{}'",
                    then.1, other.1
                ),
                otherwise.pos,
            )
        })?;
        Ok((
            Node::Conditional {
                cond: boxed(cond_node),
                then: boxed(widen(then, ty)),
                otherwise: boxed(widen(other, ty)),
            },
            ty,
        ))
    }

    fn array(&mut self, items: &[Expr], pos: usize) -> Result<Lowered, CompileError> {
        let lowered = items
            .iter()
            .map(|item| self.lower(item))
            .collect::<Result<Vec<_>, _>>()?;
        let mut common: Option<Type> = None;
        for (item, (_, ty)) in items.iter().zip(&lowered) {
            common = match common {
                None => Some(*ty),
                Some(c) => Some(unify(c, *ty).ok_or_else(|| {
                    CompileError::at(format!("Array element of type '{}' does not match '{}'", ty, c), item.pos)
                })?),
            };
        }
        let common = common.ok_or_else(|| CompileError::at("Cannot infer the element type of an empty array", pos))?;
        let elem = ElemType::from_type(common)
            .ok_or_else(|| CompileError::at(format!("Arrays of '{}' are not supported", common), pos))?;
        let nodes = lowered.into_iter().map(|l| widen(l, common)).collect();
        Ok((Node::Array(nodes), Type::List(elem)))
    }

    /// Lower a lambda argument: either `x => body` or an implicit body over `it`.
    fn lambda(&mut self, arg: &Expr, elem: Type) -> Result<(Lambda, Type), CompileError> {
        let slot = self.scopes.len();
        let (name, body, implicit) = match &arg.kind {
            ExprKind::Lambda { param, body } => (param.clone(), body.as_ref(), false),
            _ => ("it".to_string(), arg, true),
        };
        self.scopes.push(Scope {
            name,
            ty: elem,
            implicit,
        });
        let result = self.lower(body);
        self.scopes.pop();
        let (node, ty) = result?;
        Ok((
            Lambda {
                slot,
                body: boxed(node),
            },
            ty,
        ))
    }

    fn predicate(&mut self, arg: &Expr, elem: Type) -> Result<Lambda, CompileError> {
        let (lambda, ty) = self.lambda(arg, elem)?;
        if ty != Type::Bool {
            return Err(CompileError::at(
                format!("Lambda body must be 'Boolean', found '{}'", ty),
                arg.pos,
            ));
        }
        Ok(lambda)
    }

    fn method(&mut self, (target, ty): Lowered, name: &str, args: &[Expr], pos: usize) -> Result<Lowered, CompileError> {
        let no_method = || {
            CompileError::at(
                format!(
                    "No applicable method '{}' exists in type '{}' for {} argument(s)",
                    name,
                    ty,
                    args.len()
                ),
                pos,
            )
        };

        match ty {
            Type::Str => self.string_method(target, name, args, pos).and_then(|r| r.ok_or_else(no_method)),
            Type::List(_) | Type::Mods => self.sequence_method(target, ty, name, args, pos).and_then(|r| r.ok_or_else(no_method)),
            Type::IntStats | Type::FloatStats => match (name, args) {
                ("ContainsKey", [key]) => {
                    let (key, key_ty) = self.lower(key)?;
                    if key_ty != Type::Str {
                        return Err(CompileError::at("ContainsKey expects a 'String' key", pos));
                    }
                    Ok((
                        Node::ContainsKey {
                            target: boxed(target),
                            key: boxed(key),
                        },
                        Type::Bool,
                    ))
                }
                _ => Err(no_method()),
            },
            _ => Err(no_method()),
        }
    }

    fn string_method(&mut self, target: Node, name: &str, args: &[Expr], pos: usize) -> Result<Option<Lowered>, CompileError> {
        let test = match name {
            "Contains" => StrTest::Contains,
            "StartsWith" => StrTest::StartsWith,
            "EndsWith" => StrTest::EndsWith,
            "Equals" => StrTest::Equals,
            "ToLower" | "ToUpper" | "Trim" if args.is_empty() => {
                let map = match name {
                    "ToLower" => StrMap::ToLower,
                    "ToUpper" => StrMap::ToUpper,
                    _ => StrMap::Trim,
                };
                return Ok(Some((
                    Node::StrMap {
                        map,
                        target: boxed(target),
                    },
                    Type::Str,
                )));
            }
            _ => return Ok(None),
        };

        let (arg, mode) = match args {
            [arg] => (arg, None),
            [arg, mode] => (arg, Some(mode)),
            _ => return Ok(None),
        };
        let (arg, arg_ty) = self.lower(arg)?;
        if arg_ty != Type::Str {
            return Err(CompileError::at(
                format!("'{}' expects a 'String' argument, found '{}'", name, arg_ty),
                pos,
            ));
        }
        let mode = match mode {
            Some(expr) => {
                let (node, ty) = self.lower(expr)?;
                if ty != Type::Comparison {
                    return Err(CompileError::at(
                        format!("'{}' expects a 'StringComparison', found '{}'", name, ty),
                        expr.pos,
                    ));
                }
                Some(boxed(node))
            }
            None => None,
        };
        Ok(Some((
            Node::StrTest {
                test,
                target: boxed(target),
                arg: boxed(arg),
                mode,
            },
            Type::Bool,
        )))
    }

    fn sequence_method(
        &mut self,
        target: Node,
        ty: Type,
        name: &str,
        args: &[Expr],
        pos: usize,
    ) -> Result<Option<Lowered>, CompileError> {
        let Some(elem) = ty.element() else {
            return Ok(None);
        };
        let target = boxed(target);
        let lowered = match (name, args) {
            ("Count", []) => (Node::Count { target, filter: None }, Type::Int),
            ("Count", [pred]) => {
                let filter = Some(self.predicate(pred, elem)?);
                (Node::Count { target, filter }, Type::Int)
            }
            ("Any", []) => (Node::Any { target, filter: None }, Type::Bool),
            ("Any", [pred]) => {
                let filter = Some(self.predicate(pred, elem)?);
                (Node::Any { target, filter }, Type::Bool)
            }
            ("All", [pred]) => {
                let filter = self.predicate(pred, elem)?;
                (Node::All { target, filter }, Type::Bool)
            }
            ("Where", [pred]) => {
                let filter = self.predicate(pred, elem)?;
                (Node::Where { target, filter }, ty)
            }
            ("First", []) => (Node::First { target, filter: None }, elem),
            ("First", [pred]) => {
                let filter = Some(self.predicate(pred, elem)?);
                (Node::First { target, filter }, elem)
            }
            ("Select", [map]) => {
                let (map, mapped) = self.lambda(map, elem)?;
                let mapped_elem = ElemType::from_type(mapped).ok_or_else(|| {
                    CompileError::at(format!("Cannot select values of type '{}'", mapped), pos)
                })?;
                (Node::Select { target, map }, Type::List(mapped_elem))
            }
            ("Sum", []) => {
                if !elem.is_numeric() {
                    return Err(CompileError::at(format!("Cannot sum values of type '{}'", elem), pos));
                }
                let float = elem == Type::Float;
                (Node::Sum { target, map: None, float }, elem)
            }
            ("Sum", [map]) => {
                let (map, mapped) = self.lambda(map, elem)?;
                if !mapped.is_numeric() {
                    return Err(CompileError::at(format!("Cannot sum values of type '{}'", mapped), pos));
                }
                let float = mapped == Type::Float;
                (Node::Sum { target, map: Some(map), float }, mapped)
            }
            ("Contains", [item]) => {
                let (item, item_ty) = self.lower(item)?;
                if unify(elem, item_ty).is_none() || matches!(elem, Type::Record(_)) {
                    return Err(CompileError::at(
                        format!("Cannot search a sequence of '{}' for '{}'", elem, item_ty),
                        pos,
                    ));
                }
                (Node::Contains { target, item: boxed(item) }, Type::Bool)
            }
            ("GetStats", []) if ty == Type::Mods => (Node::GetStats(target), Type::IntStats),
            _ => return Ok(None),
        };
        Ok(Some(lowered))
    }

    fn helper_call(&mut self, name: &str, args: &[Expr], pos: usize) -> Result<Lowered, CompileError> {
        let helpers = S::helpers();
        let candidates: Vec<usize> = helpers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.name == name)
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return Err(CompileError::at(
                format!("No applicable method '{}' exists in type '{}'", name, S::NAME),
                pos,
            ));
        }

        let lowered = args
            .iter()
            .map(|arg| match arg.kind {
                ExprKind::Lambda { .. } => Ok(None),
                _ => self.lower(arg).map(Some),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let chosen = candidates
            .iter()
            .find_map(|&i| select_overload(&helpers[i], &lowered).map(|rest| (i, rest)));
        let Some((index, rest)) = chosen else {
            return Err(CompileError::at(
                format!(
                    "No overload of '{}' accepts arguments ({})",
                    name,
                    describe_args(&lowered)
                ),
                pos,
            ));
        };

        let helper = &helpers[index];
        let mut nodes = Vec::with_capacity(helper.params.len() + 1);
        let mut lowered = lowered.into_iter();
        for (arg, param) in args.iter().zip(helper.params) {
            match (lowered.next().flatten(), param) {
                (Some((node, _)), _) => nodes.push(node),
                (None, Type::Predicate(elem)) => {
                    let lambda = self.predicate(arg, elem.to_type())?;
                    nodes.push(Node::Closure(lambda));
                }
                (None, _) => return Err(CompileError::at("Unexpected lambda argument", arg.pos)),
            }
        }
        let remaining: Vec<Node> = lowered.flatten().map(|(node, _)| node).collect();
        match rest {
            Rest::Absent => {}
            Rest::PassArray => nodes.extend(remaining),
            Rest::Pack => nodes.push(Node::Array(remaining)),
        }

        Ok((Node::Helper { index, args: nodes }, helper.returns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemSnapshot;

    fn compiles(text: &str) -> bool {
        compile::<ItemSnapshot>(text).is_ok()
    }

    fn error(text: &str) -> CompileError {
        compile::<ItemSnapshot>(text).unwrap_err()
    }

    #[test]
    fn test_basic_fields() {
        assert!(compiles("ItemLevel >= 80"));
        assert!(compiles("Rarity == \"Rare\""));
        assert!(compiles("Rarity == ItemRarity.Unique"));
        assert!(compiles("IsCorrupted"));
        assert!(compiles("Corrupted"));
        assert!(compiles("!IsIdentified && Width * Height <= 4"));
    }

    #[test]
    fn test_nested_records() {
        assert!(compiles("SocketInfo.LargestLinkSize >= 5"));
        assert!(compiles("MapInfo.Type.Blighted"));
        assert!(compiles("ModsInfo.ExplicitMods.Count >= 3"));
        assert!(compiles("PlayerInfo.Level > 90"));
    }

    #[test]
    fn test_sequences_and_lambdas() {
        assert!(compiles("Tags.Any(it == \"weapon\")"));
        assert!(compiles("Tags.Any(t => t.Contains(\"wea\"))"));
        assert!(compiles("ModsInfo.ExplicitMods.Any(Name.StartsWith(\"Increased\"))"));
        assert!(compiles("ModsInfo.ExplicitMods.Where(m => m.Affix == \"Prefix\").Count() >= 2"));
        assert!(compiles("ModsInfo.ImplicitMods.GetStats()[\"base_maximum_life\"] > 10"));
        assert!(compiles("SocketInfo.SocketedGems.Select(g => g.GemInfo.Level).Sum() > 20"));
        assert!(compiles("SocketInfo.SocketGroups.First().Length == 6"));
    }

    #[test]
    fn test_helpers_and_overloads() {
        assert!(compiles("HasTag(\"jewel\")"));
        assert!(compiles("HasTag(Tags, \"jewel\")"));
        assert!(compiles("HasMods(\"a\", \"b\")"));
        assert!(compiles("HasMods(new[] { \"a\", \"b\" })"));
        assert!(compiles("ContainsString(BaseName, \"Ring\", \"Amulet\")"));
        assert!(compiles("ModWeightedStatSum(new[] {\"a\"}, new[] {1})[\"life\"] > 0"));
        assert!(compiles("HasAnyModSet(new[] { new[] {\"a\", \"b\"} })"));
        assert!(compiles("IsUnownedItem(x => x.BaseName == BaseName)"));
        assert!(compiles("HasSockets(\"rgb\") || HasSockets(\"rgb\", true)"));
    }

    #[test]
    fn test_non_boolean_rejected() {
        let err = error("ItemLevel");
        assert!(err.message.contains("Boolean"));
    }

    #[test]
    fn test_unknown_identifier() {
        let err = error("ItemLevel > 1 && Foo");
        assert_eq!(err.position, Some(17));
        assert!(err.message.contains("Foo"));
    }

    #[test]
    fn test_type_errors() {
        assert!(error("ItemLevel == \"80\"").message.contains("incompatible"));
        assert!(error("BaseName < 3").message.contains("incompatible"));
        assert!(error("IsCorrupted > false").message.contains("incompatible"));
        assert!(error("HasTag(1)").message.contains("HasTag"));
        assert!(error("ItemRarity.Legendary == Rarity").message.contains("Legendary"));
    }

    #[test]
    fn test_logical_chains_flatten() {
        let predicate = compile::<ItemSnapshot>("(IsCorrupted || IsIdentified) || (ItemLevel > 1 || Width > 1)").unwrap();
        match predicate.root.as_ref() {
            Node::AnyOf(operands) => assert_eq!(operands.len(), 4),
            other => panic!("unexpected {:?}", other),
        }

        let predicate = compile::<ItemSnapshot>("IsCorrupted && (IsIdentified || Width > 1)").unwrap();
        match predicate.root.as_ref() {
            Node::AllOf(operands) => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(&operands[1], Node::AnyOf(inner) if inner.len() == 2));
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = error("ItemLevel > 1 || ItemLevel");
        assert_eq!(err.position, Some(17));
        assert!(err.message.contains("'||'"));
    }

    #[test]
    fn test_case_sensitive_fields() {
        assert!(!compiles("itemlevel > 1"));
    }

    #[test]
    fn test_lambda_outside_arguments() {
        assert!(!compiles("x => true"));
    }
}
