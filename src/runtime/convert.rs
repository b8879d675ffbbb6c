use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::host::{CallableDescriptor, ParamInfo, TypeSystem};
use crate::runtime::value::{RuntimeType, Value};
use std::rc::Rc;

/// One per-argument conversion action. Plans are applied left-to-right;
/// `PackVariadic` always terminates a plan.
#[derive(Clone, Debug)]
pub enum ConversionStep {
    Identity { arg: usize },
    Widen { arg: usize, to: RuntimeType },
    UserImplicit { arg: usize, converter: Rc<CallableDescriptor> },
    PackVariadic { from: usize },
}

impl ConversionStep {
    fn cost(&self) -> u32 {
        match self {
            ConversionStep::Identity { .. } => 0,
            ConversionStep::Widen { .. } => 1,
            ConversionStep::UserImplicit { .. } => 2,
            ConversionStep::PackVariadic { .. } => 3,
        }
    }
}

/// The argument-conversion half of a resolved call: produced once next to
/// the chosen callable, replayed on every subsequent invocation.
#[derive(Clone, Debug, Default)]
pub struct ConversionPlan {
    steps: Vec<ConversionStep>,
}

impl ConversionPlan {
    /// Plans the conversions that make `args` applicable to `params`, or
    /// `None` if no conversion sequence exists.
    pub fn build(
        host: &dyn TypeSystem,
        params: &[ParamInfo],
        args: &[RuntimeType],
    ) -> Option<ConversionPlan> {
        let variadic = params.last().is_some_and(|p| p.variadic);
        let fixed = if variadic { params.len() - 1 } else { params.len() };
        if variadic {
            if args.len() < fixed {
                return None;
            }
        } else if args.len() != params.len() {
            return None;
        }

        let mut steps = Vec::with_capacity(args.len());
        for (index, param) in params[..fixed].iter().enumerate() {
            steps.push(convert_one(host, &param.ty, &args[index], index)?);
        }
        if variadic {
            let elem = &params[fixed].ty;
            // A single argument that already is an array passes through.
            if args.len() == params.len() && args[fixed] == RuntimeType::Array {
                steps.push(ConversionStep::Identity { arg: fixed });
                return Some(ConversionPlan { steps });
            }
            for (offset, arg) in args[fixed..].iter().enumerate() {
                match convert_one(host, elem, arg, fixed + offset)? {
                    ConversionStep::Identity { .. } => {}
                    widen @ ConversionStep::Widen { .. } => steps.push(widen),
                    conv @ ConversionStep::UserImplicit { .. } => steps.push(conv),
                    ConversionStep::PackVariadic { .. } => unreachable!(),
                }
            }
            steps.push(ConversionStep::PackVariadic { from: fixed });
        }
        Some(ConversionPlan { steps })
    }

    pub fn steps(&self) -> &[ConversionStep] {
        &self.steps
    }

    /// Total cost used to rank overload candidates:
    /// identity < widen < user-implicit < variadic pack.
    pub fn cost(&self) -> u32 {
        self.steps.iter().map(ConversionStep::cost).sum()
    }

    pub fn apply(&self, host: &dyn TypeSystem, mut args: Vec<Value>) -> RuntimeResult<Vec<Value>> {
        for step in &self.steps {
            match step {
                ConversionStep::Identity { .. } => {}
                ConversionStep::Widen { arg, to } => {
                    args[*arg] = widen_value(&args[*arg], to)?;
                }
                ConversionStep::UserImplicit { arg, converter } => {
                    let converted = host.invoke(converter, None, &args[*arg..=*arg])?;
                    args[*arg] = converted;
                }
                ConversionStep::PackVariadic { from } => {
                    let rest = args.split_off(*from);
                    args.push(Value::array(rest));
                }
            }
        }
        Ok(args)
    }
}

fn convert_one(
    host: &dyn TypeSystem,
    param: &RuntimeType,
    arg: &RuntimeType,
    index: usize,
) -> Option<ConversionStep> {
    if *param == RuntimeType::Any || param == arg {
        return Some(ConversionStep::Identity { arg: index });
    }
    if *param == RuntimeType::Float && *arg == RuntimeType::Int {
        return Some(ConversionStep::Widen {
            arg: index,
            to: RuntimeType::Float,
        });
    }
    host.try_implicit_conversion(arg, param)
        .map(|converter| ConversionStep::UserImplicit {
            arg: index,
            converter,
        })
}

fn widen_value(value: &Value, to: &RuntimeType) -> RuntimeResult<Value> {
    match (value, to) {
        (Value::Int(v), RuntimeType::Float) => Ok(Value::Float(*v as f64)),
        _ => Err(RuntimeError::InvalidCast {
            from: value.runtime_type().to_string(),
            to: to.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::host::StdTypeSystem;

    fn plan(params: Vec<ParamInfo>, args: &[RuntimeType]) -> Option<ConversionPlan> {
        ConversionPlan::build(&StdTypeSystem::new(), &params, args)
    }

    #[test]
    fn identity_plan_has_zero_cost() {
        let plan = plan(
            vec![ParamInfo::of(RuntimeType::Int), ParamInfo::of(RuntimeType::Int)],
            &[RuntimeType::Int, RuntimeType::Int],
        )
        .unwrap();
        assert_eq!(plan.cost(), 0);
        assert_eq!(plan.steps().len(), 2);
    }

    #[test]
    fn widens_int_argument_to_float_parameter() {
        let host = StdTypeSystem::new();
        let plan = plan(
            vec![
                ParamInfo::of(RuntimeType::Float),
                ParamInfo::of(RuntimeType::Float),
            ],
            &[RuntimeType::Float, RuntimeType::Int],
        )
        .unwrap();
        let widens: Vec<_> = plan
            .steps()
            .iter()
            .filter(|s| matches!(s, ConversionStep::Widen { .. }))
            .collect();
        assert_eq!(widens.len(), 1);
        assert!(matches!(widens[0], ConversionStep::Widen { arg: 1, .. }));

        let out = plan
            .apply(&host, vec![Value::Float(1.5), Value::Int(2)])
            .unwrap();
        assert!(matches!(out[1], Value::Float(v) if v == 2.0));
    }

    #[test]
    fn packs_trailing_arguments_into_one_array() {
        let host = StdTypeSystem::new();
        let plan = plan(
            vec![ParamInfo::of(RuntimeType::Str), ParamInfo::rest(RuntimeType::Any)],
            &[RuntimeType::Str, RuntimeType::Int, RuntimeType::Int, RuntimeType::Bool],
        )
        .unwrap();
        assert!(matches!(
            plan.steps().last(),
            Some(ConversionStep::PackVariadic { from: 1 })
        ));

        let out = plan
            .apply(
                &host,
                vec![
                    Value::str("fmt"),
                    Value::Int(1),
                    Value::Int(2),
                    Value::Bool(true),
                ],
            )
            .unwrap();
        assert_eq!(out.len(), 2);
        match &out[1] {
            Value::Array(items) => assert_eq!(items.borrow().len(), 3),
            other => panic!("expected packed array, got {other:?}"),
        }
    }

    #[test]
    fn arity_mismatch_yields_no_plan() {
        assert!(plan(
            vec![ParamInfo::of(RuntimeType::Int)],
            &[RuntimeType::Int, RuntimeType::Int]
        )
        .is_none());
    }

    #[test]
    fn pack_costs_more_than_widen() {
        let widen = plan(
            vec![ParamInfo::of(RuntimeType::Float)],
            &[RuntimeType::Int],
        )
        .unwrap();
        let pack = plan(
            vec![ParamInfo::rest(RuntimeType::Any)],
            &[RuntimeType::Int],
        )
        .unwrap();
        assert!(widen.cost() < pack.cost());
    }
}
