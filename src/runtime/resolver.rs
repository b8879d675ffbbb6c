use crate::runtime::binder::Binder;
use crate::runtime::convert::ConversionPlan;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::host::{CallableDescriptor, MemberDescriptor, OpKind, ParamInfo};
use crate::runtime::scope::SlotIndex;
use crate::runtime::value::{RuntimeType, Value};
use std::rc::Rc;

/// What a syntax node's first execution resolved to. Cached on the node
/// and replayed on every later visit without consulting the host again.
#[derive(Clone, Debug)]
pub enum Resolved {
    Binding(Binder),
    Operator {
        callable: Rc<CallableDescriptor>,
        plan: ConversionPlan,
    },
    Call {
        target: CallTarget,
        callable: Rc<CallableDescriptor>,
        plan: ConversionPlan,
    },
    Index {
        getter: Rc<CallableDescriptor>,
        setter: Option<Rc<CallableDescriptor>>,
        plan: ConversionPlan,
    },
}

/// How a resolved call reaches its callable at invocation time.
#[derive(Clone, Debug)]
pub enum CallTarget {
    /// A local slot holding a first-class function value; the slot is
    /// re-read on every visit.
    LocalSlot(SlotIndex),
    /// A reflected method invoked against the call-time receiver.
    Receiver,
    /// A dynamic member holding a function value, fetched by name from
    /// the call-time receiver's own table.
    DynamicMember(Rc<str>),
    /// The callee expression itself evaluates to the callable.
    Value,
    /// Supplied by the pluggable external member resolver.
    External,
}

impl Evaluator {
    /// Bare-name resolution: local slots first, then the implicit
    /// receivers (invocation target, global object), then the external
    /// resolver. Returns `Empty` when nothing applies.
    pub(crate) fn resolve_identifier(&self, name: &str, recv: Option<&Value>) -> Binder {
        if let Some(var) = self.scopes.lookup(name) {
            return Binder::Local(var.slot);
        }
        let global = self.global_value();
        for candidate in [recv, Some(&global)].into_iter().flatten() {
            if let Some(member) = self.first_member(candidate, name) {
                return Binder::Field { member };
            }
            if let Value::Object(object) = candidate {
                if object.contains(name) {
                    return Binder::Dynamic {
                        object: object.clone(),
                        member: name.into(),
                    };
                }
            }
        }
        if let Some(external) = &self.external {
            if let Some(binder) = external.resolve_name(name) {
                return binder;
            }
        }
        Binder::Empty
    }

    /// Member resolution against an evaluated target: reflected members
    /// first, the target's own name table if it is an open object, then
    /// the external resolver.
    pub(crate) fn resolve_member(&self, target: &Value, name: &str) -> Binder {
        if let Some(member) = self.first_member(target, name) {
            return Binder::Field { member };
        }
        if let Value::Object(object) = target {
            if object.contains(name) {
                return Binder::Dynamic {
                    object: object.clone(),
                    member: name.into(),
                };
            }
        }
        if let Some(external) = &self.external {
            if let Some(binder) = external.resolve_member(target, name) {
                return binder;
            }
        }
        Binder::Empty
    }

    fn first_member(&self, target: &Value, name: &str) -> Option<MemberDescriptor> {
        self.host
            .find_members(&target.runtime_type(), name)
            .into_iter()
            .next()
    }

    pub(crate) fn resolve_operator(
        &self,
        op: OpKind,
        operands: &[RuntimeType],
    ) -> RuntimeResult<(Rc<CallableDescriptor>, ConversionPlan)> {
        let candidates = self.host.find_operators(op, operands);
        if candidates.is_empty() {
            return Err(RuntimeError::InvalidOperation {
                message: format!(
                    "no implementation of operator `{}` for ({})",
                    op.symbol(),
                    type_list(operands)
                ),
            });
        }
        self.pick_overload(candidates, operands)
            .ok_or_else(|| RuntimeError::ArgumentMismatch {
                name: op.symbol().to_string(),
                message: format!("operand types ({})", type_list(operands)),
            })
    }

    /// Identity-equality callable that equality degrades to when either
    /// operand is null.
    pub(crate) fn identity_equality(
        &self,
        negate: bool,
    ) -> (Rc<CallableDescriptor>, ConversionPlan) {
        let callable = CallableDescriptor::native(
            if negate { "!=" } else { "==" },
            vec![
                ParamInfo::of(RuntimeType::Any),
                ParamInfo::of(RuntimeType::Any),
            ],
            RuntimeType::Bool,
            move |_, args| match args {
                [a, b] => Ok(Value::Bool(a.identity_eq(b) != negate)),
                _ => Err(RuntimeError::InvalidOperation {
                    message: "identity equality expects two operands".into(),
                }),
            },
        );
        (callable, ConversionPlan::default())
    }

    pub(crate) fn resolve_bare_call(
        &self,
        name: &str,
        recv: Option<&Value>,
        args: &[RuntimeType],
    ) -> RuntimeResult<Resolved> {
        if let Some(var) = self.scopes.lookup(name) {
            let value = self.scopes.read(var.slot)?;
            let Value::Function(callable) = value else {
                return Err(RuntimeError::InvalidOperation {
                    message: format!("`{name}` holds a non-callable {}", value.runtime_type()),
                });
            };
            let plan = self.plan_for(name, &callable, args)?;
            return Ok(Resolved::Call {
                target: CallTarget::LocalSlot(var.slot),
                callable,
                plan,
            });
        }

        let global = self.global_value();
        for candidate in [recv, Some(&global)].into_iter().flatten() {
            let methods = self.method_overloads(candidate, name);
            if !methods.is_empty() {
                let (callable, plan) = self
                    .pick_overload(methods, args)
                    .ok_or_else(|| mismatch(name, args))?;
                return Ok(Resolved::Call {
                    target: CallTarget::Receiver,
                    callable,
                    plan,
                });
            }
            if let Value::Object(object) = candidate {
                if let Some(Value::Function(callable)) = object.get(name) {
                    let plan = self.plan_for(name, &callable, args)?;
                    return Ok(Resolved::Call {
                        target: CallTarget::DynamicMember(name.into()),
                        callable,
                        plan,
                    });
                }
            }
        }

        if let Some(external) = &self.external {
            if let Some(callable) = external.resolve_call(name, recv, args) {
                let plan = self.plan_for(name, &callable, args)?;
                return Ok(Resolved::Call {
                    target: CallTarget::External,
                    callable,
                    plan,
                });
            }
        }

        Err(RuntimeError::MissingMethod {
            name: name.to_string(),
            argc: args.len(),
        })
    }

    pub(crate) fn resolve_member_call(
        &self,
        target: &Value,
        name: &str,
        args: &[RuntimeType],
    ) -> RuntimeResult<Resolved> {
        let methods = self.method_overloads(target, name);
        if !methods.is_empty() {
            let (callable, plan) = self
                .pick_overload(methods, args)
                .ok_or_else(|| mismatch(name, args))?;
            return Ok(Resolved::Call {
                target: CallTarget::Receiver,
                callable,
                plan,
            });
        }
        if let Value::Object(object) = target {
            if let Some(Value::Function(callable)) = object.get(name) {
                let plan = self.plan_for(name, &callable, args)?;
                return Ok(Resolved::Call {
                    target: CallTarget::DynamicMember(name.into()),
                    callable,
                    plan,
                });
            }
        }
        if let Some(external) = &self.external {
            if let Some(callable) = external.resolve_call(name, Some(target), args) {
                let plan = self.plan_for(name, &callable, args)?;
                return Ok(Resolved::Call {
                    target: CallTarget::External,
                    callable,
                    plan,
                });
            }
        }
        Err(RuntimeError::MissingMethod {
            name: name.to_string(),
            argc: args.len(),
        })
    }

    pub(crate) fn resolve_index_get(
        &self,
        target: &Value,
        args: &[RuntimeType],
    ) -> RuntimeResult<Resolved> {
        let indexers = self.host.find_indexers(&target.runtime_type());
        let mut best: Option<(u32, Resolved)> = None;
        for indexer in indexers {
            if let Some(plan) =
                ConversionPlan::build(self.host.as_ref(), &indexer.getter.params, args)
            {
                let cost = plan.cost();
                if best.as_ref().map_or(true, |(c, _)| cost < *c) {
                    best = Some((
                        cost,
                        Resolved::Index {
                            getter: indexer.getter.clone(),
                            setter: indexer.setter.clone(),
                            plan,
                        },
                    ));
                }
            }
        }
        best.map(|(_, resolved)| resolved)
            .ok_or_else(|| RuntimeError::MissingIndexer {
                type_name: target.runtime_type().to_string(),
                argc: args.len(),
            })
    }

    /// Resolves a "set" indexer overload; `args` already carries the
    /// assigned value's type as its final element.
    pub(crate) fn resolve_index_set(
        &self,
        target: &Value,
        args: &[RuntimeType],
    ) -> RuntimeResult<Resolved> {
        let indexers = self.host.find_indexers(&target.runtime_type());
        let mut best: Option<(u32, Resolved)> = None;
        for indexer in indexers {
            let Some(setter) = indexer.setter.clone() else {
                continue;
            };
            if let Some(plan) = ConversionPlan::build(self.host.as_ref(), &setter.params, args) {
                let cost = plan.cost();
                if best.as_ref().map_or(true, |(c, _)| cost < *c) {
                    best = Some((
                        cost,
                        Resolved::Index {
                            getter: indexer.getter.clone(),
                            setter: Some(setter),
                            plan,
                        },
                    ));
                }
            }
        }
        best.map(|(_, resolved)| resolved)
            .ok_or_else(|| RuntimeError::MissingIndexer {
                type_name: target.runtime_type().to_string(),
                argc: args.len().saturating_sub(1),
            })
    }

    /// Overload selection: the candidate with the cheapest conversion
    /// plan wins; earlier candidates win ties.
    pub(crate) fn pick_overload(
        &self,
        candidates: Vec<Rc<CallableDescriptor>>,
        args: &[RuntimeType],
    ) -> Option<(Rc<CallableDescriptor>, ConversionPlan)> {
        let mut best: Option<(u32, Rc<CallableDescriptor>, ConversionPlan)> = None;
        for candidate in candidates {
            if let Some(plan) = ConversionPlan::build(self.host.as_ref(), &candidate.params, args)
            {
                let cost = plan.cost();
                if best.as_ref().map_or(true, |(c, _, _)| cost < *c) {
                    best = Some((cost, candidate, plan));
                }
            }
        }
        best.map(|(_, callable, plan)| (callable, plan))
    }

    fn method_overloads(&self, target: &Value, name: &str) -> Vec<Rc<CallableDescriptor>> {
        self.host
            .find_members(&target.runtime_type(), name)
            .into_iter()
            .filter_map(|member| member.method)
            .collect()
    }

    fn plan_for(
        &self,
        name: &str,
        callable: &Rc<CallableDescriptor>,
        args: &[RuntimeType],
    ) -> RuntimeResult<ConversionPlan> {
        ConversionPlan::build(self.host.as_ref(), &callable.params, args)
            .ok_or_else(|| mismatch(name, args))
    }
}

fn mismatch(name: &str, args: &[RuntimeType]) -> RuntimeError {
    RuntimeError::ArgumentMismatch {
        name: name.to_string(),
        message: format!("argument types ({})", type_list(args)),
    }
}

fn type_list(types: &[RuntimeType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
