use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::host::{MemberDescriptor, TypeSystem};
use crate::runtime::scope::{ScopeStore, SlotIndex};
use crate::runtime::value::{DynamicObject, RuntimeType, Value};
use std::rc::Rc;

/// A resolved, reusable way to reach a named value. Binders do not own
/// their target; they are a relation applied to whatever target the call
/// site supplies on each visit.
#[derive(Clone, Debug)]
pub enum Binder {
    Local(SlotIndex),
    Field { member: MemberDescriptor },
    Dynamic { object: Rc<DynamicObject>, member: Rc<str> },
    Empty,
}

impl Binder {
    pub fn is_empty(&self) -> bool {
        matches!(self, Binder::Empty)
    }

    /// Declared type of the bound slot/member, used by assignment to
    /// decide whether an implicit conversion is needed. `Any` means the
    /// binding is dynamically typed.
    pub fn declared_type(&self) -> RuntimeType {
        match self {
            Binder::Field { member } => member.value_type.clone(),
            Binder::Local(_) | Binder::Dynamic { .. } | Binder::Empty => RuntimeType::Any,
        }
    }

    pub fn get(
        &self,
        scopes: &ScopeStore,
        host: &dyn TypeSystem,
        target: Option<&Value>,
    ) -> RuntimeResult<Value> {
        match self {
            Binder::Local(slot) => scopes.read(*slot),
            Binder::Field { member } => {
                if let Some(method) = &member.method {
                    return Ok(Value::Function(method.clone()));
                }
                let getter =
                    member
                        .getter
                        .as_ref()
                        .ok_or_else(|| RuntimeError::InvalidOperation {
                            message: format!("member `{}` is write-only", member.name),
                        })?;
                host.invoke(getter, target, &[])
            }
            Binder::Dynamic { object, member } => {
                let table = dynamic_table(object, target);
                table
                    .get(member)
                    .ok_or_else(|| RuntimeError::MissingMember {
                        name: member.to_string(),
                        type_name: RuntimeType::Object.to_string(),
                    })
            }
            Binder::Empty => Err(RuntimeError::InvalidOperation {
                message: "binding did not resolve".into(),
            }),
        }
    }

    pub fn set(
        &self,
        scopes: &ScopeStore,
        host: &dyn TypeSystem,
        target: Option<&Value>,
        value: Value,
    ) -> RuntimeResult<()> {
        match self {
            Binder::Local(slot) => scopes.write(*slot, value),
            Binder::Field { member } => {
                let setter =
                    member
                        .setter
                        .as_ref()
                        .ok_or_else(|| RuntimeError::InvalidOperation {
                            message: format!("member `{}` is read-only", member.name),
                        })?;
                host.invoke(setter, target, &[value])?;
                Ok(())
            }
            Binder::Dynamic { object, member } => {
                dynamic_table(object, target).set(member, value);
                Ok(())
            }
            Binder::Empty => Err(RuntimeError::InvalidOperation {
                message: "binding did not resolve".into(),
            }),
        }
    }
}

/// The call-time target wins when it is an open object; the object seen
/// at resolution time is only a fallback (it keeps bare-name bindings to
/// the global object working when no target is passed).
fn dynamic_table<'a>(resolved: &'a Rc<DynamicObject>, target: Option<&'a Value>) -> &'a DynamicObject {
    match target {
        Some(Value::Object(object)) => object,
        _ => resolved,
    }
}
