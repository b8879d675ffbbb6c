use crate::runtime::host::CallableDescriptor;
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Runtime type tag. Host-defined types carry their registered name;
/// `Any` only appears in parameter positions and matches every value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RuntimeType {
    Any,
    Null,
    Bool,
    Int,
    Float,
    Str,
    Array,
    Object,
    Function,
    Host(Rc<str>),
}

impl RuntimeType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, RuntimeType::Int | RuntimeType::Float)
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeType::Any => write!(f, "any"),
            RuntimeType::Null => write!(f, "null"),
            RuntimeType::Bool => write!(f, "bool"),
            RuntimeType::Int => write!(f, "int"),
            RuntimeType::Float => write!(f, "float"),
            RuntimeType::Str => write!(f, "string"),
            RuntimeType::Array => write!(f, "array"),
            RuntimeType::Object => write!(f, "object"),
            RuntimeType::Function => write!(f, "function"),
            RuntimeType::Host(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<DynamicObject>),
    Function(Rc<CallableDescriptor>),
    Host(HostValue),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn str(value: &str) -> Value {
        Value::Str(value.into())
    }

    pub fn runtime_type(&self) -> RuntimeType {
        match self {
            Value::Null => RuntimeType::Null,
            Value::Bool(_) => RuntimeType::Bool,
            Value::Int(_) => RuntimeType::Int,
            Value::Float(_) => RuntimeType::Float,
            Value::Str(_) => RuntimeType::Str,
            Value::Array(_) => RuntimeType::Array,
            Value::Object(_) => RuntimeType::Object,
            Value::Function(_) => RuntimeType::Function,
            Value::Host(host) => host.ty.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Host(_) => true,
        }
    }

    /// Reference equality for aggregates, value equality for primitives.
    /// This is what equality degrades to when an operand is null.
    pub fn identity_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(&a.data, &b.data),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (idx, value) in items.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Value::Object(object) => write!(f, "{object}"),
            Value::Function(callable) => write!(f, "<function {}>", callable.name),
            Value::Host(host) => write!(f, "<{}>", host.ty),
        }
    }
}

/// Opaque host-owned value; the host type system knows how to reach its
/// members, the engine only carries it around.
#[derive(Clone)]
pub struct HostValue {
    pub ty: RuntimeType,
    pub data: Rc<dyn Any>,
}

impl HostValue {
    pub fn new(ty: RuntimeType, data: Rc<dyn Any>) -> Self {
        Self { ty, data }
    }

    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostValue").field("ty", &self.ty).finish()
    }
}

/// Open/extensible object: members live in the object's own name table and
/// are looked up by name rather than through static reflection.
#[derive(Debug, Default)]
pub struct DynamicObject {
    members: RefCell<BTreeMap<Rc<str>, Value>>,
}

impl DynamicObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.members.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.members.borrow_mut().insert(Rc::from(name), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<Rc<str>> {
        self.members.borrow().keys().cloned().collect()
    }
}

impl fmt::Display for DynamicObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (name, value) in self.members.borrow().iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}
