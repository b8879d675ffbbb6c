use crate::language::ast::{BinaryOp, IncDecOp, UnaryOp};
use crate::runtime::binder::Binder;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{RuntimeType, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Operator vocabulary the resolver hands to the host type system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Neg,
    Not,
    Increment,
    Decrement,
}

impl OpKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            OpKind::Add => "+",
            OpKind::Sub => "-",
            OpKind::Mul => "*",
            OpKind::Div => "/",
            OpKind::Rem => "%",
            OpKind::Pow => "**",
            OpKind::Eq => "==",
            OpKind::NotEq => "!=",
            OpKind::Lt => "<",
            OpKind::LtEq => "<=",
            OpKind::Gt => ">",
            OpKind::GtEq => ">=",
            OpKind::BitAnd => "&",
            OpKind::BitOr => "|",
            OpKind::BitXor => "^",
            OpKind::Neg => "-",
            OpKind::Not => "!",
            OpKind::Increment => "++",
            OpKind::Decrement => "--",
        }
    }
}

impl From<BinaryOp> for OpKind {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => OpKind::Add,
            BinaryOp::Sub => OpKind::Sub,
            BinaryOp::Mul => OpKind::Mul,
            BinaryOp::Div => OpKind::Div,
            BinaryOp::Rem => OpKind::Rem,
            BinaryOp::Pow => OpKind::Pow,
            BinaryOp::Eq => OpKind::Eq,
            BinaryOp::NotEq => OpKind::NotEq,
            BinaryOp::Lt => OpKind::Lt,
            BinaryOp::LtEq => OpKind::LtEq,
            BinaryOp::Gt => OpKind::Gt,
            BinaryOp::GtEq => OpKind::GtEq,
            BinaryOp::BitAnd => OpKind::BitAnd,
            BinaryOp::BitOr => OpKind::BitOr,
            BinaryOp::BitXor => OpKind::BitXor,
        }
    }
}

impl From<UnaryOp> for OpKind {
    fn from(op: UnaryOp) -> Self {
        match op {
            UnaryOp::Neg => OpKind::Neg,
            UnaryOp::Not => OpKind::Not,
        }
    }
}

impl From<IncDecOp> for OpKind {
    fn from(op: IncDecOp) -> Self {
        match op {
            IncDecOp::Increment => OpKind::Increment,
            IncDecOp::Decrement => OpKind::Decrement,
        }
    }
}

pub type NativeFn = Rc<dyn Fn(Option<&Value>, &[Value]) -> RuntimeResult<Value>>;

#[derive(Clone, Debug)]
pub struct ParamInfo {
    pub ty: RuntimeType,
    pub variadic: bool,
}

impl ParamInfo {
    pub fn of(ty: RuntimeType) -> Self {
        Self {
            ty,
            variadic: false,
        }
    }

    /// Trailing variadic parameter; `ty` is the element type.
    pub fn rest(ty: RuntimeType) -> Self {
        Self { ty, variadic: true }
    }
}

/// An invocable target the host type system produced: a method, an
/// operator implementation, a property accessor, or a conversion.
pub struct CallableDescriptor {
    pub name: Rc<str>,
    pub params: Vec<ParamInfo>,
    pub ret: RuntimeType,
    func: NativeFn,
}

impl CallableDescriptor {
    pub fn native(
        name: &str,
        params: Vec<ParamInfo>,
        ret: RuntimeType,
        func: impl Fn(Option<&Value>, &[Value]) -> RuntimeResult<Value> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            params,
            ret,
            func: Rc::new(func),
        })
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }
}

impl fmt::Debug for CallableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property,
    Method,
}

#[derive(Clone, Debug)]
pub struct MemberDescriptor {
    pub name: Rc<str>,
    pub kind: MemberKind,
    pub is_static: bool,
    pub value_type: RuntimeType,
    pub getter: Option<Rc<CallableDescriptor>>,
    pub setter: Option<Rc<CallableDescriptor>>,
    pub method: Option<Rc<CallableDescriptor>>,
}

impl MemberDescriptor {
    pub fn property(
        name: &str,
        value_type: RuntimeType,
        getter: Rc<CallableDescriptor>,
        setter: Option<Rc<CallableDescriptor>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Property,
            is_static: false,
            value_type,
            getter: Some(getter),
            setter,
            method: None,
        }
    }

    pub fn field(
        name: &str,
        value_type: RuntimeType,
        getter: Rc<CallableDescriptor>,
        setter: Option<Rc<CallableDescriptor>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Field,
            is_static: false,
            value_type,
            getter: Some(getter),
            setter,
            method: None,
        }
    }

    pub fn method(name: &str, callable: Rc<CallableDescriptor>) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            is_static: false,
            value_type: RuntimeType::Function,
            getter: None,
            setter: None,
            method: Some(callable),
        }
    }

    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// A get/set indexer pair on a type. The setter takes the index arguments
/// with the assigned value appended as the final argument.
#[derive(Clone, Debug)]
pub struct IndexerDescriptor {
    pub getter: Rc<CallableDescriptor>,
    pub setter: Option<Rc<CallableDescriptor>>,
}

/// Introspection capability the evaluation core queries; implemented by
/// the embedding host, never by the core itself.
pub trait TypeSystem {
    fn find_members(&self, ty: &RuntimeType, name: &str) -> Vec<MemberDescriptor>;

    /// Full member enumeration; drives static imports.
    fn members(&self, ty: &RuntimeType) -> Vec<MemberDescriptor>;

    fn find_operators(&self, op: OpKind, operands: &[RuntimeType]) -> Vec<Rc<CallableDescriptor>>;

    fn find_indexers(&self, ty: &RuntimeType) -> Vec<IndexerDescriptor>;

    fn try_implicit_conversion(
        &self,
        from: &RuntimeType,
        to: &RuntimeType,
    ) -> Option<Rc<CallableDescriptor>>;

    fn invoke(
        &self,
        callable: &CallableDescriptor,
        target: Option<&Value>,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        (callable.func)(target, args)
    }

    /// The boolean-coercion operator; `None` means the value has no
    /// boolean interpretation.
    fn coerce_bool(&self, value: &Value) -> Option<bool> {
        match value {
            Value::Null => None,
            other => Some(other.as_bool()),
        }
    }
}

/// Pluggable fallback consulted only after the host type system finds
/// nothing; lets an embedder supply names that are not reflected members.
pub trait MemberResolver {
    fn resolve_name(&self, name: &str) -> Option<Binder>;

    fn resolve_member(&self, target: &Value, name: &str) -> Option<Binder>;

    fn resolve_call(
        &self,
        name: &str,
        target: Option<&Value>,
        args: &[RuntimeType],
    ) -> Option<Rc<CallableDescriptor>>;
}

/// A host-registered type: reflected members, operators, and indexers.
#[derive(Default)]
pub struct HostTypeDef {
    pub members: Vec<MemberDescriptor>,
    pub operators: Vec<(OpKind, Rc<CallableDescriptor>)>,
    pub indexers: Vec<IndexerDescriptor>,
}

/// Batteries-included type system: operators and members for the boxed
/// primitive types, array/object indexers, and a registry for host types.
#[derive(Default)]
pub struct StdTypeSystem {
    types: HashMap<Rc<str>, HostTypeDef>,
    conversions: Vec<(RuntimeType, RuntimeType, Rc<CallableDescriptor>)>,
}

impl StdTypeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, name: &str, def: HostTypeDef) -> RuntimeType {
        let name: Rc<str> = name.into();
        self.types.insert(name.clone(), def);
        RuntimeType::Host(name)
    }

    pub fn register_conversion(
        &mut self,
        from: RuntimeType,
        to: RuntimeType,
        converter: Rc<CallableDescriptor>,
    ) {
        self.conversions.push((from, to, converter));
    }

    fn host_def(&self, ty: &RuntimeType) -> Option<&HostTypeDef> {
        match ty {
            RuntimeType::Host(name) => self.types.get(name),
            _ => None,
        }
    }

    fn builtin_members(&self, ty: &RuntimeType) -> Vec<MemberDescriptor> {
        match ty {
            RuntimeType::Str => vec![MemberDescriptor::property(
                "length",
                RuntimeType::Int,
                CallableDescriptor::native("length", vec![], RuntimeType::Int, |target, _| {
                    match target {
                        Some(Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
                        _ => Err(type_error("string", target)),
                    }
                }),
                None,
            )],
            RuntimeType::Array => vec![
                MemberDescriptor::property(
                    "length",
                    RuntimeType::Int,
                    CallableDescriptor::native("length", vec![], RuntimeType::Int, |target, _| {
                        match target {
                            Some(Value::Array(items)) => Ok(Value::Int(items.borrow().len() as i64)),
                            _ => Err(type_error("array", target)),
                        }
                    }),
                    None,
                ),
                MemberDescriptor::method(
                    "push",
                    CallableDescriptor::native(
                        "push",
                        vec![ParamInfo::rest(RuntimeType::Any)],
                        RuntimeType::Int,
                        |target, args| match (target, args) {
                            (Some(Value::Array(items)), [Value::Array(packed)]) => {
                                // `packed` may alias the receiver (a.push(a));
                                // snapshot it before borrowing mutably.
                                let incoming: Vec<Value> = packed.borrow().clone();
                                let mut items = items.borrow_mut();
                                items.extend(incoming);
                                Ok(Value::Int(items.len() as i64))
                            }
                            _ => Err(type_error("array", target)),
                        },
                    ),
                ),
                MemberDescriptor::method(
                    "pop",
                    CallableDescriptor::native(
                        "pop",
                        vec![],
                        RuntimeType::Any,
                        |target, _| match target {
                            Some(Value::Array(items)) => {
                                Ok(items.borrow_mut().pop().unwrap_or(Value::Null))
                            }
                            _ => Err(type_error("array", target)),
                        },
                    ),
                ),
            ],
            _ => Vec::new(),
        }
    }

    fn builtin_operators(&self, op: OpKind) -> Vec<Rc<CallableDescriptor>> {
        use OpKind::*;
        match op {
            Add => vec![
                int_binop("+", |a, b| Ok(a.wrapping_add(b))),
                float_binop("+", |a, b| a + b),
                str_concat(),
            ],
            Sub => vec![
                int_binop("-", |a, b| Ok(a.wrapping_sub(b))),
                float_binop("-", |a, b| a - b),
            ],
            Mul => vec![
                int_binop("*", |a, b| Ok(a.wrapping_mul(b))),
                float_binop("*", |a, b| a * b),
            ],
            Div => vec![
                int_binop("/", |a, b| {
                    if b == 0 {
                        Err(RuntimeError::InvalidOperation {
                            message: "division by zero".into(),
                        })
                    } else {
                        Ok(a.wrapping_div(b))
                    }
                }),
                float_binop("/", |a, b| a / b),
            ],
            Rem => vec![
                int_binop("%", |a, b| {
                    if b == 0 {
                        Err(RuntimeError::InvalidOperation {
                            message: "remainder by zero".into(),
                        })
                    } else {
                        Ok(a.wrapping_rem(b))
                    }
                }),
                float_binop("%", |a, b| a % b),
            ],
            Pow => vec![
                int_binop("**", |a, b| {
                    let exp = u32::try_from(b).map_err(|_| RuntimeError::InvalidOperation {
                        message: "integer exponent must be non-negative".into(),
                    })?;
                    Ok(a.wrapping_pow(exp))
                }),
                float_binop("**", f64::powf),
            ],
            BitAnd => vec![int_binop("&", |a, b| Ok(a & b))],
            BitOr => vec![int_binop("|", |a, b| Ok(a | b))],
            BitXor => vec![int_binop("^", |a, b| Ok(a ^ b))],
            Lt => compare_ops("<", |o| o == std::cmp::Ordering::Less),
            LtEq => compare_ops("<=", |o| o != std::cmp::Ordering::Greater),
            Gt => compare_ops(">", |o| o == std::cmp::Ordering::Greater),
            GtEq => compare_ops(">=", |o| o != std::cmp::Ordering::Less),
            Eq => vec![equality_op("==", false)],
            NotEq => vec![equality_op("!=", true)],
            Neg => vec![
                CallableDescriptor::native(
                    "-",
                    vec![ParamInfo::of(RuntimeType::Int)],
                    RuntimeType::Int,
                    |_, args| match args {
                        [Value::Int(v)] => Ok(Value::Int(v.wrapping_neg())),
                        _ => Err(operand_error("-", args)),
                    },
                ),
                CallableDescriptor::native(
                    "-",
                    vec![ParamInfo::of(RuntimeType::Float)],
                    RuntimeType::Float,
                    |_, args| match args {
                        [Value::Float(v)] => Ok(Value::Float(-v)),
                        _ => Err(operand_error("-", args)),
                    },
                ),
            ],
            Not => vec![CallableDescriptor::native(
                "!",
                vec![ParamInfo::of(RuntimeType::Any)],
                RuntimeType::Bool,
                |_, args| match args {
                    [value] => Ok(Value::Bool(!value.as_bool())),
                    _ => Err(operand_error("!", args)),
                },
            )],
            Increment => vec![step_op("++", 1)],
            Decrement => vec![step_op("--", -1)],
        }
    }
}

impl TypeSystem for StdTypeSystem {
    fn find_members(&self, ty: &RuntimeType, name: &str) -> Vec<MemberDescriptor> {
        self.members(ty)
            .into_iter()
            .filter(|m| &*m.name == name)
            .collect()
    }

    fn members(&self, ty: &RuntimeType) -> Vec<MemberDescriptor> {
        if let Some(def) = self.host_def(ty) {
            return def.members.clone();
        }
        self.builtin_members(ty)
    }

    fn find_operators(&self, op: OpKind, operands: &[RuntimeType]) -> Vec<Rc<CallableDescriptor>> {
        let mut candidates = Vec::new();
        for ty in operands {
            if let Some(def) = self.host_def(ty) {
                candidates.extend(
                    def.operators
                        .iter()
                        .filter(|(kind, _)| *kind == op)
                        .map(|(_, callable)| callable.clone()),
                );
            }
        }
        candidates.extend(self.builtin_operators(op));
        candidates
    }

    fn find_indexers(&self, ty: &RuntimeType) -> Vec<IndexerDescriptor> {
        if let Some(def) = self.host_def(ty) {
            return def.indexers.clone();
        }
        match ty {
            RuntimeType::Array => vec![array_indexer()],
            RuntimeType::Object => vec![object_indexer()],
            _ => Vec::new(),
        }
    }

    fn try_implicit_conversion(
        &self,
        from: &RuntimeType,
        to: &RuntimeType,
    ) -> Option<Rc<CallableDescriptor>> {
        self.conversions
            .iter()
            .find(|(f, t, _)| f == from && t == to)
            .map(|(_, _, converter)| converter.clone())
    }
}

fn type_error(expected: &str, target: Option<&Value>) -> RuntimeError {
    RuntimeError::InvalidOperation {
        message: format!(
            "expected {expected} receiver, found `{}`",
            target.map_or_else(|| "nothing".to_string(), |v| v.runtime_type().to_string())
        ),
    }
}

fn operand_error(op: &str, args: &[Value]) -> RuntimeError {
    RuntimeError::InvalidOperation {
        message: format!(
            "operator `{op}` not applicable to ({})",
            args.iter()
                .map(|v| v.runtime_type().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn int_binop(
    name: &str,
    f: impl Fn(i64, i64) -> RuntimeResult<i64> + 'static,
) -> Rc<CallableDescriptor> {
    let symbol = name.to_string();
    CallableDescriptor::native(
        name,
        vec![ParamInfo::of(RuntimeType::Int), ParamInfo::of(RuntimeType::Int)],
        RuntimeType::Int,
        move |_, args| match args {
            [Value::Int(a), Value::Int(b)] => f(*a, *b).map(Value::Int),
            _ => Err(operand_error(&symbol, args)),
        },
    )
}

fn float_binop(name: &str, f: impl Fn(f64, f64) -> f64 + 'static) -> Rc<CallableDescriptor> {
    let symbol = name.to_string();
    CallableDescriptor::native(
        name,
        vec![
            ParamInfo::of(RuntimeType::Float),
            ParamInfo::of(RuntimeType::Float),
        ],
        RuntimeType::Float,
        move |_, args| match args {
            [Value::Float(a), Value::Float(b)] => Ok(Value::Float(f(*a, *b))),
            _ => Err(operand_error(&symbol, args)),
        },
    )
}

fn str_concat() -> Rc<CallableDescriptor> {
    CallableDescriptor::native(
        "+",
        vec![ParamInfo::of(RuntimeType::Str), ParamInfo::of(RuntimeType::Str)],
        RuntimeType::Str,
        |_, args| match args {
            [Value::Str(a), Value::Str(b)] => Ok(Value::Str(format!("{a}{b}").into())),
            _ => Err(operand_error("+", args)),
        },
    )
}

fn compare_ops(
    name: &'static str,
    accept: impl Fn(std::cmp::Ordering) -> bool + Copy + 'static,
) -> Vec<Rc<CallableDescriptor>> {
    vec![
        CallableDescriptor::native(
            name,
            vec![ParamInfo::of(RuntimeType::Int), ParamInfo::of(RuntimeType::Int)],
            RuntimeType::Bool,
            move |_, args| match args {
                [Value::Int(a), Value::Int(b)] => Ok(Value::Bool(accept(a.cmp(b)))),
                _ => Err(operand_error(name, args)),
            },
        ),
        CallableDescriptor::native(
            name,
            vec![
                ParamInfo::of(RuntimeType::Float),
                ParamInfo::of(RuntimeType::Float),
            ],
            RuntimeType::Bool,
            move |_, args| match args {
                [Value::Float(a), Value::Float(b)] => Ok(Value::Bool(
                    a.partial_cmp(b).is_some_and(accept),
                )),
                _ => Err(operand_error(name, args)),
            },
        ),
        CallableDescriptor::native(
            name,
            vec![ParamInfo::of(RuntimeType::Str), ParamInfo::of(RuntimeType::Str)],
            RuntimeType::Bool,
            move |_, args| match args {
                [Value::Str(a), Value::Str(b)] => Ok(Value::Bool(accept(a.cmp(b)))),
                _ => Err(operand_error(name, args)),
            },
        ),
    ]
}

fn equality_op(name: &'static str, negate: bool) -> Rc<CallableDescriptor> {
    CallableDescriptor::native(
        name,
        vec![ParamInfo::of(RuntimeType::Any), ParamInfo::of(RuntimeType::Any)],
        RuntimeType::Bool,
        move |_, args| match args {
            [a, b] => {
                let eq = match (a, b) {
                    (Value::Int(a), Value::Float(b)) => *a as f64 == *b,
                    (Value::Float(a), Value::Int(b)) => *a == *b as f64,
                    _ => a.identity_eq(b),
                };
                Ok(Value::Bool(eq != negate))
            }
            _ => Err(operand_error(name, args)),
        },
    )
}

fn step_op(name: &'static str, delta: i64) -> Rc<CallableDescriptor> {
    CallableDescriptor::native(
        name,
        vec![ParamInfo::of(RuntimeType::Any)],
        RuntimeType::Any,
        move |_, args| match args {
            [Value::Int(v)] => Ok(Value::Int(v.wrapping_add(delta))),
            [Value::Float(v)] => Ok(Value::Float(v + delta as f64)),
            _ => Err(operand_error(name, args)),
        },
    )
}

fn array_indexer() -> IndexerDescriptor {
    IndexerDescriptor {
        getter: CallableDescriptor::native(
            "get_index",
            vec![ParamInfo::of(RuntimeType::Int)],
            RuntimeType::Any,
            |target, args| match (target, args) {
                (Some(Value::Array(items)), [Value::Int(index)]) => {
                    let items = items.borrow();
                    usize::try_from(*index)
                        .ok()
                        .and_then(|i| items.get(i).cloned())
                        .ok_or_else(|| RuntimeError::InvalidOperation {
                            message: format!(
                                "index {index} out of range for array of {}",
                                items.len()
                            ),
                        })
                }
                _ => Err(type_error("array", target)),
            },
        ),
        setter: Some(CallableDescriptor::native(
            "set_index",
            vec![ParamInfo::of(RuntimeType::Int), ParamInfo::of(RuntimeType::Any)],
            RuntimeType::Null,
            |target, args| match (target, args) {
                (Some(Value::Array(items)), [Value::Int(index), value]) => {
                    let mut items = items.borrow_mut();
                    let len = items.len();
                    let slot = usize::try_from(*index)
                        .ok()
                        .and_then(|i| items.get_mut(i))
                        .ok_or_else(|| RuntimeError::InvalidOperation {
                            message: format!("index {index} out of range for array of {len}"),
                        })?;
                    *slot = value.clone();
                    Ok(Value::Null)
                }
                _ => Err(type_error("array", target)),
            },
        )),
    }
}

fn object_indexer() -> IndexerDescriptor {
    IndexerDescriptor {
        getter: CallableDescriptor::native(
            "get_index",
            vec![ParamInfo::of(RuntimeType::Str)],
            RuntimeType::Any,
            |target, args| match (target, args) {
                (Some(Value::Object(object)), [Value::Str(name)]) => {
                    Ok(object.get(name).unwrap_or(Value::Null))
                }
                _ => Err(type_error("object", target)),
            },
        ),
        setter: Some(CallableDescriptor::native(
            "set_index",
            vec![ParamInfo::of(RuntimeType::Str), ParamInfo::of(RuntimeType::Any)],
            RuntimeType::Null,
            |target, args| match (target, args) {
                (Some(Value::Object(object)), [Value::Str(name), value]) => {
                    object.set(name, value.clone());
                    Ok(Value::Null)
                }
                _ => Err(type_error("object", target)),
            },
        )),
    }
}
