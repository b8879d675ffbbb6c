use crate::language::ast::{BinaryOp, Expr, ExprKind, Literal, Stmt, StmtKind};
use crate::runtime::binder::Binder;
use crate::runtime::branch::BranchContext;
use crate::runtime::convert::ConversionPlan;
use crate::runtime::error::{EvalResult, RuntimeError};
use crate::runtime::host::{CallableDescriptor, MemberResolver, OpKind, TypeSystem};
use crate::runtime::resolver::{CallTarget, Resolved};
use crate::runtime::scope::{ScopeGuard, ScopeStore};
use crate::runtime::value::{DynamicObject, RuntimeType, Value};
use std::rc::Rc;

/// Tree-walking evaluation engine. One evaluator owns the scope store,
/// the branch context, and the handle to the host type system; syntax
/// trees are evaluated against it repeatedly and cache their resolution
/// decisions on their own nodes.
pub struct Evaluator {
    pub(crate) host: Rc<dyn TypeSystem>,
    pub(crate) external: Option<Rc<dyn MemberResolver>>,
    pub(crate) global: Rc<DynamicObject>,
    pub(crate) scopes: ScopeStore,
    pub(crate) branch: BranchContext,
}

impl Evaluator {
    pub fn new(host: Rc<dyn TypeSystem>) -> Self {
        Self {
            host,
            external: None,
            global: Rc::new(DynamicObject::new()),
            scopes: ScopeStore::new(),
            branch: BranchContext::new(),
        }
    }

    pub fn with_external_resolver(mut self, resolver: Rc<dyn MemberResolver>) -> Self {
        self.external = Some(resolver);
        self
    }

    /// The engine-lifetime object bare names fall back to; embedders
    /// seed it with ambient values before evaluating.
    pub fn global_object(&self) -> &Rc<DynamicObject> {
        &self.global
    }

    pub(crate) fn global_value(&self) -> Value {
        Value::Object(self.global.clone())
    }

    pub fn enter_scope(&self) -> ScopeGuard<'_> {
        self.scopes.enter()
    }

    /// Declares every static member of `ty` as a root-scope variable, so
    /// scripts reach them as bare names.
    pub fn declare_static_import(&self, ty: &RuntimeType) -> EvalResult<()> {
        for member in self.host.members(ty) {
            if !member.is_static {
                continue;
            }
            let value = if let Some(method) = &member.method {
                Value::Function(method.clone())
            } else if let Some(getter) = &member.getter {
                self.host.invoke(getter, None, &[])?
            } else {
                continue;
            };
            self.scopes
                .declare_at_root(&member.name, member.value_type.clone(), value)?;
        }
        Ok(())
    }

    /// Runs a statement tree as one invocation: frame scopes start
    /// fresh, branch state is cleared, and a pending `return` becomes
    /// the result. With no `return` the last evaluated value is the
    /// result. `target` is the implicit receiver for bare names.
    pub fn invoke(&self, stmt: &Stmt, target: Option<&Value>) -> EvalResult<Value> {
        self.scopes.begin_invocation();
        self.branch.reset();
        let last = self.eval_stmt(stmt, target)?;
        self.finish_invocation(last)
    }

    pub fn invoke_expr(&self, expr: &Expr, target: Option<&Value>) -> EvalResult<Value> {
        self.scopes.begin_invocation();
        self.branch.reset();
        self.eval_expr(expr, target)
    }

    fn finish_invocation(&self, last: Value) -> EvalResult<Value> {
        if let Some(value) = self.branch.take_return() {
            return Ok(value);
        }
        if !self.branch.is_normal() {
            self.branch.reset();
            return Err(RuntimeError::InvalidOperation {
                message: "break or continue outside of a loop".into(),
            }
            .into());
        }
        Ok(last)
    }

    pub fn eval_stmt(&self, stmt: &Stmt, recv: Option<&Value>) -> EvalResult<Value> {
        self.eval_stmt_inner(stmt, recv)
            .map_err(|e| e.with_stmt(stmt))
    }

    fn eval_stmt_inner(&self, stmt: &Stmt, recv: Option<&Value>) -> EvalResult<Value> {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.eval_expr(expr, recv),
            StmtKind::Declare { name, init } => {
                let value = match init {
                    Some(init) => self.eval_expr(init, recv)?,
                    None => Value::Null,
                };
                self.scopes.declare(name, RuntimeType::Any, value)?;
                Ok(Value::Null)
            }
            StmtKind::Block(stmts) => {
                let _scope = self.scopes.enter();
                let mut last = Value::Null;
                for stmt in stmts {
                    last = self.eval_stmt(stmt, recv)?;
                    if !self.branch.is_normal() {
                        break;
                    }
                }
                Ok(last)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(condition, recv)? {
                    self.eval_branch(then_branch, recv)
                } else if let Some(else_branch) = else_branch {
                    self.eval_branch(else_branch, recv)
                } else {
                    Ok(Value::Null)
                }
            }
            StmtKind::While {
                condition,
                body,
                check_after,
            } => {
                if *check_after {
                    loop {
                        self.eval_branch(body, recv)?;
                        if self.loop_should_stop() {
                            break;
                        }
                        if !self.eval_condition(condition, recv)? {
                            break;
                        }
                    }
                } else {
                    while self.eval_condition(condition, recv)? {
                        self.eval_branch(body, recv)?;
                        if self.loop_should_stop() {
                            break;
                        }
                    }
                }
                Ok(Value::Null)
            }
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => {
                // The init declaration scopes over condition, step, and
                // body, and unwinds when the loop exits.
                let _scope = self.scopes.enter();
                if let Some(init) = init {
                    self.eval_stmt(init, recv)?;
                }
                loop {
                    if let Some(condition) = condition {
                        if !self.eval_condition(condition, recv)? {
                            break;
                        }
                    }
                    self.eval_branch(body, recv)?;
                    if self.loop_should_stop() {
                        break;
                    }
                    // A consumed `continue` still runs the step.
                    if let Some(step) = step {
                        self.eval_expr(step, recv)?;
                    }
                }
                Ok(Value::Null)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, recv)?,
                    None => Value::Null,
                };
                self.branch.set_return(value);
                Ok(Value::Null)
            }
            StmtKind::Throw(expr) => {
                let value = self.eval_expr(expr, recv)?;
                Err(RuntimeError::Thrown {
                    value: value.to_string(),
                }
                .into())
            }
            StmtKind::Break => {
                self.branch.set_break();
                Ok(Value::Null)
            }
            StmtKind::Continue => {
                self.branch.set_continue();
                Ok(Value::Null)
            }
        }
    }

    /// Branch and loop bodies that are not blocks still run in their own
    /// scope, so a declaration in an un-braced branch cannot shift the
    /// enclosing frame's slot layout between iterations.
    fn eval_branch(&self, stmt: &Stmt, recv: Option<&Value>) -> EvalResult<Value> {
        if matches!(stmt.kind, StmtKind::Block(_)) {
            return self.eval_stmt(stmt, recv);
        }
        let _scope = self.scopes.enter();
        self.eval_stmt(stmt, recv)
    }

    /// Loop boundary: `return` propagates, `break` is consumed and stops
    /// the loop, `continue` is consumed and the loop goes on.
    fn loop_should_stop(&self) -> bool {
        if self.branch.is_return() {
            return true;
        }
        if self.branch.consume_break() {
            return true;
        }
        self.branch.consume_continue();
        false
    }

    fn eval_condition(&self, expr: &Expr, recv: Option<&Value>) -> EvalResult<bool> {
        let value = self.eval_expr(expr, recv)?;
        Ok(self.host.coerce_bool(&value).unwrap_or(false))
    }

    pub fn eval_expr(&self, expr: &Expr, recv: Option<&Value>) -> EvalResult<Value> {
        self.eval_expr_inner(expr, recv)
            .map_err(|e| e.with_expr(expr))
    }

    fn eval_expr_inner(&self, expr: &Expr, recv: Option<&Value>) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Identifier(name) => {
                let binder = self.binding_for_identifier(expr, name, recv)?;
                if binder.is_empty() {
                    return Err(RuntimeError::MissingMember {
                        name: name.to_string(),
                        type_name: scope_name(recv),
                    }
                    .into());
                }
                let target = self.binder_target(&binder, recv);
                Ok(binder.get(&self.scopes, self.host.as_ref(), target.as_ref())?)
            }
            ExprKind::Member { target, name } => {
                let object = self.eval_expr(target, recv)?;
                if object.is_null() {
                    return Err(RuntimeError::NullReference {
                        context: format!("member `{name}` of null"),
                    }
                    .into());
                }
                let binder = self.binding_for_member(expr, &object, name)?;
                if binder.is_empty() {
                    return Err(RuntimeError::MissingMember {
                        name: name.to_string(),
                        type_name: object.runtime_type().to_string(),
                    }
                    .into());
                }
                Ok(binder.get(&self.scopes, self.host.as_ref(), Some(&object))?)
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand, recv)?;
                if *op == crate::language::ast::UnaryOp::Neg && value.is_null() {
                    return Err(RuntimeError::NullReference {
                        context: "operand of `-`".into(),
                    }
                    .into());
                }
                let (callable, plan) =
                    self.operator_for(expr, (*op).into(), &[value.runtime_type()])?;
                let args = plan.apply(self.host.as_ref(), vec![value])?;
                Ok(self.host.invoke(&callable, None, &args)?)
            }
            ExprKind::IncDec { op, prefix, target } => {
                let (binder, object) = self.resolve_lvalue(target, recv)?;
                let current =
                    binder.get(&self.scopes, self.host.as_ref(), object.as_ref())?;
                if current.is_null() {
                    return Err(RuntimeError::NullReference {
                        context: format!("operand of `{}`", OpKind::from(*op).symbol()),
                    }
                    .into());
                }
                let (callable, plan) =
                    self.operator_for(expr, (*op).into(), &[current.runtime_type()])?;
                let args = plan.apply(self.host.as_ref(), vec![current.clone()])?;
                let stepped = self.host.invoke(&callable, None, &args)?;
                binder.set(
                    &self.scopes,
                    self.host.as_ref(),
                    object.as_ref(),
                    stepped.clone(),
                )?;
                Ok(if *prefix { stepped } else { current })
            }
            ExprKind::Binary { op, left, right } => self.eval_binary(expr, *op, left, right, recv),
            ExprKind::Logical { op, left, right } => {
                use crate::language::ast::LogicalOp;
                let lhs = self.eval_expr(left, recv)?;
                // Operands with no boolean interpretation do not
                // short-circuit; they count as true.
                let lhs_true = self.host.coerce_bool(&lhs).unwrap_or(true);
                match op {
                    LogicalOp::And if !lhs_true => return Ok(Value::Bool(false)),
                    LogicalOp::Or if lhs_true => return Ok(Value::Bool(true)),
                    _ => {}
                }
                let rhs = self.eval_expr(right, recv)?;
                Ok(Value::Bool(self.host.coerce_bool(&rhs).unwrap_or(true)))
            }
            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(condition, recv)? {
                    self.eval_expr(then_branch, recv)
                } else {
                    self.eval_expr(else_branch, recv)
                }
            }
            ExprKind::NullCoalesce { left, right } => {
                let lhs = self.eval_expr(left, recv)?;
                if lhs.is_null() {
                    self.eval_expr(right, recv)
                } else {
                    Ok(lhs)
                }
            }
            ExprKind::Assign { target, value } => self.eval_assign(expr, target, value, recv),
            ExprKind::Call { callee, args } => self.eval_call(expr, callee, args, recv),
            ExprKind::Index { target, args } => {
                let object = self.eval_expr(target, recv)?;
                if object.is_null() {
                    return Err(RuntimeError::NullReference {
                        context: "index target is null".into(),
                    }
                    .into());
                }
                let values = self.eval_args(args, recv)?;
                let (getter, plan) = self.index_get_for(expr, &object, &values)?;
                let converted = plan.apply(self.host.as_ref(), values)?;
                Ok(self.host.invoke(&getter, Some(&object), &converted)?)
            }
            ExprKind::ArrayLiteral(items) => {
                let values = self.eval_args(items, recv)?;
                Ok(Value::array(values))
            }
            ExprKind::ObjectLiteral(entries) => {
                let object = DynamicObject::new();
                for (name, value_expr) in entries {
                    let value = self.eval_expr(value_expr, recv)?;
                    object.set(name, value);
                }
                Ok(Value::Object(Rc::new(object)))
            }
        }
    }

    fn eval_binary(
        &self,
        expr: &Expr,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        recv: Option<&Value>,
    ) -> EvalResult<Value> {
        let lhs = self.eval_expr(left, recv)?;
        let rhs = self.eval_expr(right, recv)?;
        let has_null = lhs.is_null() || rhs.is_null();
        if has_null {
            // Equality degrades to identity comparison; every other
            // operator refuses null operands.
            if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
                let (callable, plan) = self.equality_for(expr, op == BinaryOp::NotEq);
                let args = plan.apply(self.host.as_ref(), vec![lhs, rhs])?;
                return Ok(self.host.invoke(&callable, None, &args)?);
            }
            return Err(RuntimeError::NullReference {
                context: format!("operand of `{}`", OpKind::from(op).symbol()),
            }
            .into());
        }
        let (callable, plan) = self.operator_for(
            expr,
            op.into(),
            &[lhs.runtime_type(), rhs.runtime_type()],
        )?;
        let args = plan.apply(self.host.as_ref(), vec![lhs, rhs])?;
        Ok(self.host.invoke(&callable, None, &args)?)
    }

    fn eval_assign(
        &self,
        node: &Expr,
        target: &Expr,
        value_expr: &Expr,
        recv: Option<&Value>,
    ) -> EvalResult<Value> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                let binder = self.binding_for_identifier(target, name, recv)?;
                let value = self.eval_expr(value_expr, recv)?;
                if binder.is_empty() {
                    // Assignment to an unknown bare name promotes it to
                    // an engine-lifetime root variable.
                    let var =
                        self.scopes
                            .declare_at_root(name, RuntimeType::Any, value.clone())?;
                    let _ = target
                        .cache
                        .binding
                        .set(Resolved::Binding(Binder::Local(var.slot)));
                    return Ok(value);
                }
                let value = self.convert_assigned(&binder, value)?;
                let bt = self.binder_target(&binder, recv);
                binder.set(&self.scopes, self.host.as_ref(), bt.as_ref(), value.clone())?;
                Ok(value)
            }
            ExprKind::Member {
                target: object_expr,
                name,
            } => {
                let object = self.eval_expr(object_expr, recv)?;
                if object.is_null() {
                    return Err(RuntimeError::NullReference {
                        context: format!("member `{name}` of null"),
                    }
                    .into());
                }
                let mut binder = self.binding_for_member(target, &object, name)?;
                if binder.is_empty() {
                    // Open objects grow a member on first assignment.
                    let Value::Object(dynamic) = &object else {
                        return Err(RuntimeError::MissingMember {
                            name: name.to_string(),
                            type_name: object.runtime_type().to_string(),
                        }
                        .into());
                    };
                    binder = Binder::Dynamic {
                        object: dynamic.clone(),
                        member: name.clone(),
                    };
                    let _ = target.cache.binding.set(Resolved::Binding(binder.clone()));
                }
                let value = self.eval_expr(value_expr, recv)?;
                let value = self.convert_assigned(&binder, value)?;
                binder.set(&self.scopes, self.host.as_ref(), Some(&object), value.clone())?;
                Ok(value)
            }
            ExprKind::Index {
                target: object_expr,
                args,
            } => {
                let object = self.eval_expr(object_expr, recv)?;
                if object.is_null() {
                    return Err(RuntimeError::NullReference {
                        context: "index target is null".into(),
                    }
                    .into());
                }
                let mut values = self.eval_args(args, recv)?;
                let value = self.eval_expr(value_expr, recv)?;
                values.push(value.clone());
                let (setter, plan) = self.index_set_for(node, &object, &values)?;
                let converted = plan.apply(self.host.as_ref(), values)?;
                self.host.invoke(&setter, Some(&object), &converted)?;
                Ok(value)
            }
            _ => Err(RuntimeError::InvalidOperation {
                message: format!("{} is not assignable", target.kind_name()),
            }
            .into()),
        }
    }

    fn eval_call(
        &self,
        node: &Expr,
        callee: &Expr,
        args: &[Expr],
        recv: Option<&Value>,
    ) -> EvalResult<Value> {
        match &callee.kind {
            ExprKind::Identifier(name) => {
                let values = self.eval_args(args, recv)?;
                let resolved = self.call_resolution(node, &values, |types| {
                    self.resolve_bare_call(name, recv, types)
                })?;
                self.dispatch_call(&resolved, None, recv, values)
            }
            ExprKind::Member { target, name } => {
                let object = self.eval_expr(target, recv)?;
                if object.is_null() {
                    return Err(RuntimeError::NullReference {
                        context: format!("method `{name}` of null"),
                    }
                    .into());
                }
                let values = self.eval_args(args, recv)?;
                let resolved = self.call_resolution(node, &values, |types| {
                    self.resolve_member_call(&object, name, types)
                })?;
                self.dispatch_call(&resolved, Some(&object), recv, values)
            }
            _ => {
                // Arbitrary callee expression: it must evaluate to a
                // first-class function value.
                let callee_value = self.eval_expr(callee, recv)?;
                let values = self.eval_args(args, recv)?;
                let Value::Function(callable) = &callee_value else {
                    return Err(RuntimeError::InvalidOperation {
                        message: format!(
                            "value of type `{}` is not callable",
                            callee_value.runtime_type()
                        ),
                    }
                    .into());
                };
                let resolved = self.call_resolution(node, &values, |types| {
                    let plan = ConversionPlan::build(self.host.as_ref(), &callable.params, types)
                        .ok_or_else(|| RuntimeError::ArgumentMismatch {
                            name: callable.name.to_string(),
                            message: format!("{} argument(s) given", types.len()),
                        })?;
                    Ok(Resolved::Call {
                        target: CallTarget::Value,
                        callable: callable.clone(),
                        plan,
                    })
                })?;
                let Resolved::Call { plan, .. } = &resolved else {
                    unreachable!()
                };
                let args = plan.apply(self.host.as_ref(), values)?;
                Ok(self.host.invoke(callable, None, &args)?)
            }
        }
    }

    fn dispatch_call(
        &self,
        resolved: &Resolved,
        explicit: Option<&Value>,
        recv: Option<&Value>,
        values: Vec<Value>,
    ) -> EvalResult<Value> {
        let Resolved::Call {
            target,
            callable,
            plan,
        } = resolved
        else {
            return Err(RuntimeError::InvalidOperation {
                message: "call site cached a non-call resolution".into(),
            }
            .into());
        };
        let global = self.global_value();
        match target {
            CallTarget::LocalSlot(slot) => {
                // The slot is re-read so reassigned function values are
                // picked up; the cached plan is reused as-is.
                let current = self.scopes.read(*slot)?;
                let Value::Function(current) = current else {
                    return Err(RuntimeError::InvalidOperation {
                        message: format!(
                            "`{}` holds a non-callable {}",
                            callable.name,
                            current.runtime_type()
                        ),
                    }
                    .into());
                };
                let args = plan.apply(self.host.as_ref(), values)?;
                Ok(self.host.invoke(&current, None, &args)?)
            }
            CallTarget::Receiver => {
                let target = explicit.or(recv).unwrap_or(&global);
                let args = plan.apply(self.host.as_ref(), values)?;
                Ok(self.host.invoke(callable, Some(target), &args)?)
            }
            CallTarget::DynamicMember(name) => {
                let owner = self.dynamic_owner(explicit, recv, name, &global);
                let Some(owner) = owner else {
                    return Err(RuntimeError::MissingMember {
                        name: name.to_string(),
                        type_name: RuntimeType::Object.to_string(),
                    }
                    .into());
                };
                let Value::Object(object) = &owner else {
                    return Err(RuntimeError::MissingMember {
                        name: name.to_string(),
                        type_name: owner.runtime_type().to_string(),
                    }
                    .into());
                };
                let Some(Value::Function(current)) = object.get(name) else {
                    return Err(RuntimeError::InvalidOperation {
                        message: format!("member `{name}` no longer holds a callable"),
                    }
                    .into());
                };
                let args = plan.apply(self.host.as_ref(), values)?;
                Ok(self.host.invoke(&current, Some(&owner), &args)?)
            }
            CallTarget::Value => {
                let args = plan.apply(self.host.as_ref(), values)?;
                Ok(self.host.invoke(callable, None, &args)?)
            }
            CallTarget::External => {
                let target = explicit.or(recv);
                let args = plan.apply(self.host.as_ref(), values)?;
                Ok(self.host.invoke(callable, target, &args)?)
            }
        }
    }

    /// Picks the call-time owner of a dynamically-bound call: the
    /// explicit receiver, else whichever implicit receiver carries the
    /// member now.
    fn dynamic_owner(
        &self,
        explicit: Option<&Value>,
        recv: Option<&Value>,
        name: &str,
        global: &Value,
    ) -> Option<Value> {
        if let Some(explicit) = explicit {
            return Some(explicit.clone());
        }
        if let Some(Value::Object(object)) = recv {
            if object.contains(name) {
                return recv.cloned();
            }
        }
        let Value::Object(object) = global else {
            return None;
        };
        object.contains(name).then(|| global.clone())
    }

    fn convert_assigned(&self, binder: &Binder, value: Value) -> EvalResult<Value> {
        let declared = binder.declared_type();
        let actual = value.runtime_type();
        if declared == RuntimeType::Any || declared == actual || value.is_null() {
            return Ok(value);
        }
        if declared == RuntimeType::Float && actual == RuntimeType::Int {
            let Value::Int(v) = value else { unreachable!() };
            return Ok(Value::Float(v as f64));
        }
        let converter = self
            .host
            .try_implicit_conversion(&actual, &declared)
            .ok_or_else(|| RuntimeError::InvalidCast {
                from: actual.to_string(),
                to: declared.to_string(),
            })?;
        Ok(self.host.invoke(&converter, None, &[value])?)
    }

    /// Lvalue resolution for increment/decrement: yields the binder and
    /// the target value `get`/`set` need.
    fn resolve_lvalue(
        &self,
        expr: &Expr,
        recv: Option<&Value>,
    ) -> EvalResult<(Binder, Option<Value>)> {
        match &expr.kind {
            ExprKind::Identifier(name) => {
                let binder = self.binding_for_identifier(expr, name, recv)?;
                if binder.is_empty() {
                    return Err(RuntimeError::MissingMember {
                        name: name.to_string(),
                        type_name: scope_name(recv),
                    }
                    .into());
                }
                let target = self.binder_target(&binder, recv);
                Ok((binder, target))
            }
            ExprKind::Member { target, name } => {
                let object = self.eval_expr(target, recv)?;
                if object.is_null() {
                    return Err(RuntimeError::NullReference {
                        context: format!("member `{name}` of null"),
                    }
                    .into());
                }
                let binder = self.binding_for_member(expr, &object, name)?;
                if binder.is_empty() {
                    return Err(RuntimeError::MissingMember {
                        name: name.to_string(),
                        type_name: object.runtime_type().to_string(),
                    }
                    .into());
                }
                Ok((binder, Some(object)))
            }
            _ => Err(RuntimeError::InvalidOperation {
                message: format!("{} is not assignable", expr.kind_name()),
            }
            .into()),
        }
    }

    /// Target value a bare-name binder should be applied to. `Dynamic`
    /// binders keep the object captured at resolution time; passing the
    /// invocation target would redirect them to the wrong table.
    fn binder_target(&self, binder: &Binder, recv: Option<&Value>) -> Option<Value> {
        match binder {
            Binder::Field { .. } => recv.cloned().or_else(|| Some(self.global_value())),
            _ => None,
        }
    }

    // Cache plumbing. A node's first execution stores its resolution;
    // later visits replay it without consulting the host. `Empty` is
    // never stored, so a name that appears later still resolves.

    fn binding_for_identifier(
        &self,
        expr: &Expr,
        name: &str,
        recv: Option<&Value>,
    ) -> EvalResult<Binder> {
        if let Some(Resolved::Binding(binder)) = expr.cache.binding.get() {
            return Ok(binder.clone());
        }
        let binder = self.resolve_identifier(name, recv);
        if !binder.is_empty() {
            let _ = expr.cache.ty.set(binder.declared_type());
            let _ = expr.cache.binding.set(Resolved::Binding(binder.clone()));
        }
        Ok(binder)
    }

    fn binding_for_member(&self, expr: &Expr, object: &Value, name: &str) -> EvalResult<Binder> {
        if let Some(Resolved::Binding(binder)) = expr.cache.binding.get() {
            return Ok(binder.clone());
        }
        let binder = self.resolve_member(object, name);
        if !binder.is_empty() {
            let _ = expr.cache.ty.set(binder.declared_type());
            let _ = expr.cache.binding.set(Resolved::Binding(binder.clone()));
        }
        Ok(binder)
    }

    fn operator_for(
        &self,
        expr: &Expr,
        op: OpKind,
        operands: &[RuntimeType],
    ) -> EvalResult<(Rc<CallableDescriptor>, ConversionPlan)> {
        if let Some(Resolved::Operator { callable, plan }) = expr.cache.binding.get() {
            return Ok((callable.clone(), plan.clone()));
        }
        let (callable, plan) = self.resolve_operator(op, operands)?;
        let _ = expr.cache.ty.set(callable.ret.clone());
        let _ = expr.cache.binding.set(Resolved::Operator {
            callable: callable.clone(),
            plan: plan.clone(),
        });
        Ok((callable, plan))
    }

    fn equality_for(
        &self,
        expr: &Expr,
        negate: bool,
    ) -> (Rc<CallableDescriptor>, ConversionPlan) {
        if let Some(Resolved::Operator { callable, plan }) = expr.cache.binding.get() {
            return (callable.clone(), plan.clone());
        }
        let (callable, plan) = self.identity_equality(negate);
        let _ = expr.cache.ty.set(RuntimeType::Bool);
        let _ = expr.cache.binding.set(Resolved::Operator {
            callable: callable.clone(),
            plan: plan.clone(),
        });
        (callable, plan)
    }

    fn call_resolution(
        &self,
        node: &Expr,
        values: &[Value],
        resolve: impl FnOnce(&[RuntimeType]) -> crate::runtime::error::RuntimeResult<Resolved>,
    ) -> EvalResult<Resolved> {
        if let Some(cached @ Resolved::Call { .. }) = node.cache.binding.get() {
            return Ok(cached.clone());
        }
        let types = arg_types(values);
        let resolved = resolve(&types)?;
        if let Resolved::Call { callable, .. } = &resolved {
            let _ = node.cache.ty.set(callable.ret.clone());
        }
        let _ = node.cache.binding.set(resolved.clone());
        Ok(resolved)
    }

    fn index_get_for(
        &self,
        expr: &Expr,
        object: &Value,
        values: &[Value],
    ) -> EvalResult<(Rc<CallableDescriptor>, ConversionPlan)> {
        if let Some(Resolved::Index { getter, plan, .. }) = expr.cache.binding.get() {
            return Ok((getter.clone(), plan.clone()));
        }
        let resolved = self.resolve_index_get(object, &arg_types(values))?;
        let Resolved::Index { getter, plan, .. } = &resolved else {
            unreachable!()
        };
        let out = (getter.clone(), plan.clone());
        let _ = expr.cache.ty.set(getter.ret.clone());
        let _ = expr.cache.binding.set(resolved.clone());
        Ok(out)
    }

    fn index_set_for(
        &self,
        node: &Expr,
        object: &Value,
        values: &[Value],
    ) -> EvalResult<(Rc<CallableDescriptor>, ConversionPlan)> {
        if let Some(Resolved::Index {
            setter: Some(setter),
            plan,
            ..
        }) = node.cache.binding.get()
        {
            return Ok((setter.clone(), plan.clone()));
        }
        let resolved = self.resolve_index_set(object, &arg_types(values))?;
        let Resolved::Index {
            setter: Some(setter),
            plan,
            ..
        } = &resolved
        else {
            unreachable!()
        };
        let out = (setter.clone(), plan.clone());
        let _ = node.cache.binding.set(resolved.clone());
        Ok(out)
    }

    fn eval_args(&self, args: &[Expr], recv: Option<&Value>) -> EvalResult<Vec<Value>> {
        args.iter().map(|arg| self.eval_expr(arg, recv)).collect()
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(v) => Value::Bool(*v),
        Literal::Int(v) => Value::Int(*v),
        Literal::Float(v) => Value::Float(*v),
        Literal::Str(v) => Value::Str(v.clone()),
    }
}

fn arg_types(values: &[Value]) -> Vec<RuntimeType> {
    values.iter().map(Value::runtime_type).collect()
}

fn scope_name(recv: Option<&Value>) -> String {
    recv.map_or_else(
        || "the global scope".to_string(),
        |v| v.runtime_type().to_string(),
    )
}
