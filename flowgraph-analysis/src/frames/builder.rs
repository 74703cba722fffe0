//! First pass: build the frame tree, the scope tree, and the
//! resolution side tables for one method.
//!
//! Resolution failures are tolerated at expression granularity — the
//! offending expression types as `Unknown` and the pass continues. Only
//! a construct outside the modeled set aborts the method.

use tracing::debug;

use flowgraph_core::config::{AnalysisConfig, UncheckedExceptionPolicy};
use flowgraph_core::errors::AnalysisError;
use flowgraph_core::types::collections::FxHashMap;

use crate::ast::{CatchClause, Expr, ExprKind, LambdaBody, LiteralKind, Stmt, StmtKind};
use crate::klass::{CallStyle, KlassId, KlassTable, LookupStyle, MethodId, PrimKind, Type};
use crate::scopes::{Ref, ScopeId, ScopeTree};

use super::types::{FrameId, FrameLabel, FrameTree, Resolutions};

/// Output of the first pass over one method body.
#[derive(Debug)]
pub struct FramePass {
    pub scopes: ScopeTree,
    pub frames: FrameTree,
    pub res: Resolutions,
}

pub struct FrameBuilder<'a> {
    table: &'a mut KlassTable,
    config: &'a AnalysisConfig,
    method: MethodId,
    klass: Option<KlassId>,
    method_type_params: Vec<String>,
    scopes: ScopeTree,
    frames: FrameTree,
    res: Resolutions,
    /// Types of locals and other builder-created refs.
    ref_types: FxHashMap<Ref, Type>,
}

impl<'a> FrameBuilder<'a> {
    /// Build the frame/scope trees for a source method.
    pub fn run(
        table: &'a mut KlassTable,
        config: &'a AnalysisConfig,
        method: MethodId,
    ) -> Result<FramePass, AnalysisError> {
        let m = table.method(method);
        let klass = m.klass;
        let signature = m.signature.clone();
        let ret_name = table.type_name(&m.func.ret);
        let is_instance = matches!(m.style, CallStyle::Instance | CallStyle::Constructor);
        let this_name = match (is_instance, klass) {
            (true, Some(k)) => Some(table.klass(k).qualified.clone()),
            _ => None,
        };
        let decl = table.source_method_decl(method).ok_or_else(|| {
            AnalysisError::from(flowgraph_core::errors::ResolveError::KlassNotLoaded {
                name: signature.clone(),
            })
        })?;

        let scopes = ScopeTree::new(&signature, &ret_name, this_name.as_deref());
        let mut builder = Self {
            table,
            config,
            method,
            klass,
            method_type_params: decl.type_params.clone(),
            scopes,
            frames: FrameTree::new(),
            res: Resolutions::default(),
            ref_types: FxHashMap::default(),
        };

        let param_types = builder.table.method(method).func.params.clone();
        for (p, ty) in decl.params.iter().zip(param_types) {
            let ty_name = builder.table.type_name(&ty);
            let r = builder.scopes.add_local(ScopeTree::ROOT, &p.name, &ty_name);
            builder.ref_types.insert(r, ty);
        }

        if let Some(body) = &decl.body {
            builder
                .build_stmt(FrameTree::ROOT, ScopeTree::ROOT, body)
                .map_err(|e| e.in_method(signature))?;
        }

        Ok(FramePass {
            scopes: builder.scopes,
            frames: builder.frames,
            res: builder.res,
        })
    }

    fn read(&mut self, frame: FrameId, r: &Ref) {
        self.frames.frame_mut(frame).inputs.insert(r.clone());
    }

    fn write(&mut self, frame: FrameId, r: &Ref) {
        self.frames.frame_mut(frame).outputs.insert(r.clone());
    }

    fn type_of_ref(&self, r: &Ref) -> Type {
        self.ref_types.get(r).cloned().unwrap_or(Type::Unknown)
    }

    // ---- statements ----

    fn build_stmt(
        &mut self,
        frame: FrameId,
        scope: ScopeId,
        stmt: &Stmt,
    ) -> Result<(), AnalysisError> {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                let inner_scope = self.scopes.add_child(scope, stmt.id);
                let inner = self.frames.add_child(
                    frame,
                    stmt.id,
                    FrameLabel::Block,
                    None,
                    Some(inner_scope),
                );
                for s in stmts {
                    self.build_stmt(inner, inner_scope, s)?;
                }
            }
            StmtKind::Empty => {}
            StmtKind::LocalDecl { ty, decls } => {
                let resolved = self
                    .table
                    .resolve_type_name(ty, self.klass, &self.method_type_params)
                    .unwrap_or(Type::Unknown);
                for (name, init) in decls {
                    let ty_name = self.table.type_name(&resolved);
                    let r = self.scopes.add_local(scope, name, &ty_name);
                    self.ref_types.insert(r.clone(), resolved.clone());
                    self.write(frame, &r);
                    if let Some(init) = init {
                        self.build_expr(frame, scope, init)?;
                    }
                }
            }
            StmtKind::Expr(expr) => {
                self.build_expr(frame, scope, expr)?;
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.build_expr(frame, scope, cond)?;
                let then_frame =
                    self.frames
                        .add_child(frame, then_branch.id, FrameLabel::Block, None, None);
                self.build_stmt(then_frame, scope, then_branch)?;
                if let Some(else_branch) = else_branch {
                    let else_frame = self.frames.add_child(
                        frame,
                        else_branch.id,
                        FrameLabel::Block,
                        None,
                        None,
                    );
                    self.build_stmt(else_frame, scope, else_branch)?;
                }
            }
            StmtKind::Switch { value, cases } => {
                self.build_expr(frame, scope, value)?;
                let switch_scope = self.scopes.add_child(scope, stmt.id);
                let switch_frame = self.frames.add_child(
                    frame,
                    stmt.id,
                    FrameLabel::Breakable,
                    None,
                    Some(switch_scope),
                );
                for case in cases {
                    let case_frame = self.frames.add_child(
                        switch_frame,
                        case.id,
                        FrameLabel::Block,
                        None,
                        None,
                    );
                    for label in case.labels.iter().flatten() {
                        self.build_expr(case_frame, switch_scope, label)?;
                    }
                    for s in &case.body {
                        self.build_stmt(case_frame, switch_scope, s)?;
                    }
                }
            }
            StmtKind::While { cond, body } => {
                let loop_scope = self.scopes.add_child(scope, stmt.id);
                let loop_frame = self.frames.add_child(
                    frame,
                    stmt.id,
                    FrameLabel::Breakable,
                    None,
                    Some(loop_scope),
                );
                self.build_expr(loop_frame, scope, cond)?;
                self.build_stmt(loop_frame, loop_scope, body)?;
            }
            StmtKind::Do { body, cond } => {
                let loop_scope = self.scopes.add_child(scope, stmt.id);
                let loop_frame = self.frames.add_child(
                    frame,
                    stmt.id,
                    FrameLabel::Breakable,
                    None,
                    Some(loop_scope),
                );
                self.build_stmt(loop_frame, loop_scope, body)?;
                self.build_expr(loop_frame, loop_scope, cond)?;
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let loop_scope = self.scopes.add_child(scope, stmt.id);
                for s in init {
                    self.build_stmt(frame, loop_scope, s)?;
                }
                let loop_frame = self.frames.add_child(
                    frame,
                    stmt.id,
                    FrameLabel::Breakable,
                    None,
                    Some(loop_scope),
                );
                if let Some(cond) = cond {
                    self.build_expr(loop_frame, loop_scope, cond)?;
                }
                self.build_stmt(loop_frame, loop_scope, body)?;
                for u in update {
                    self.build_expr(loop_frame, loop_scope, u)?;
                }
            }
            StmtKind::ForEach {
                var_ty,
                var_name,
                iterable,
                body,
            } => {
                self.build_expr(frame, scope, iterable)?;
                let loop_scope = self.scopes.add_child(scope, stmt.id);
                let resolved = self
                    .table
                    .resolve_type_name(var_ty, self.klass, &self.method_type_params)
                    .unwrap_or(Type::Unknown);
                let ty_name = self.table.type_name(&resolved);
                let r = self.scopes.add_local(loop_scope, var_name, &ty_name);
                self.ref_types.insert(r, resolved);
                let loop_frame = self.frames.add_child(
                    frame,
                    stmt.id,
                    FrameLabel::Breakable,
                    None,
                    Some(loop_scope),
                );
                self.build_stmt(loop_frame, loop_scope, body)?;
            }
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.build_expr(frame, scope, expr)?;
                }
                // Return is an exit, not an output.
            }
            StmtKind::Break(_) | StmtKind::Continue(_) => {}
            StmtKind::Labeled { label, body } => {
                let inner = self.frames.add_child(
                    frame,
                    stmt.id,
                    FrameLabel::Labeled(label.clone()),
                    None,
                    None,
                );
                self.build_stmt(inner, scope, body)?;
            }
            StmtKind::Synchronized { lock, body } => {
                self.build_expr(frame, scope, lock)?;
                self.build_stmt(frame, scope, body)?;
            }
            StmtKind::Try {
                resources,
                body,
                catches,
                finally,
            } => {
                let try_scope = self.scopes.add_child(scope, stmt.id);
                for r in resources {
                    self.build_stmt(frame, try_scope, r)?;
                }
                // Chain catch frames in reverse declaration order so the
                // nearest-catch search prefers the first matching clause.
                let mut catch_frame = frame;
                for cc in catches.iter().rev() {
                    catch_frame = self.add_catch_frame(catch_frame, frame, scope, cc)?;
                }
                self.build_stmt(catch_frame, try_scope, body)?;
                if let Some(fin) = finally {
                    self.build_stmt(frame, scope, fin)?;
                }
            }
            StmtKind::Throw(expr) => {
                let thrown = self.build_expr(frame, scope, expr)?;
                let thrown_name = self.table.type_name(&thrown);
                let exc_ref = self.scopes.lookup_exception(&thrown_name);
                let target =
                    self.frames
                        .find_catch_target(frame, thrown.klass_id(), self.table);
                self.res.throws.insert(stmt.id, (exc_ref, target));
            }
            StmtKind::Assert { .. } => {
                // Asserts carry no dataflow.
            }
            StmtKind::ThisCall(args) => {
                if let Some(k) = self.klass {
                    self.build_delegate_call(frame, scope, stmt.id, k, args)?;
                }
            }
            StmtKind::SuperCall(args) => {
                if let Some(base) = self.klass.and_then(|k| self.table.klass(k).base) {
                    self.build_delegate_call(frame, scope, stmt.id, base, args)?;
                }
            }
            StmtKind::Unsupported(kind) => {
                return Err(AnalysisError::unsupported(kind.clone(), Some(stmt.span)));
            }
        }
        Ok(())
    }

    fn add_catch_frame(
        &mut self,
        parent: FrameId,
        outer_frame: FrameId,
        outer_scope: ScopeId,
        cc: &CatchClause,
    ) -> Result<FrameId, AnalysisError> {
        let catch_ty = self
            .table
            .resolve_type_name(&cc.ty, self.klass, &self.method_type_params)
            .unwrap_or(Type::Unknown);
        let catch_klass = catch_ty.klass_id().or_else(|| {
            let fallback = self.table.resolve_qualified("java.lang.Throwable")?;
            self.table.load(fallback).ok()?;
            Some(fallback)
        });
        if let Some(k) = catch_klass {
            let _ = self.table.load(k);
        }
        let catch_scope = self.scopes.add_child(outer_scope, cc.id);
        let ty_name = self.table.type_name(&catch_ty);
        let r = self.scopes.add_local(catch_scope, &cc.name, &ty_name);
        self.ref_types.insert(r, catch_ty);
        let frame = self.frames.add_child(
            parent,
            cc.id,
            FrameLabel::Catch,
            catch_klass,
            Some(catch_scope),
        );
        // The body runs outside the handler chain: a throw inside a
        // catch body escapes to outer handlers only.
        self.build_stmt(outer_frame, catch_scope, &cc.body)?;
        Ok(frame)
    }

    fn build_delegate_call(
        &mut self,
        frame: FrameId,
        scope: ScopeId,
        node: crate::ast::NodeId,
        klass: KlassId,
        args: &[Expr],
    ) -> Result<(), AnalysisError> {
        if let Some(this_ref) = self.scopes.lookup_this() {
            self.read(frame, &this_ref);
        }
        let mut arg_types = Vec::new();
        for arg in args {
            arg_types.push(self.build_expr(frame, scope, arg)?);
        }
        match self
            .table
            .find_method(klass, LookupStyle::Constructor, None, &arg_types)
        {
            Some(callee) => self.record_call(frame, node, callee),
            None => {
                debug!(klass = %self.table.klass(klass).qualified, "constructor not found");
                self.res.unknown_calls.insert(node);
            }
        }
        Ok(())
    }

    /// Record a resolved call: caller/callee links, the enclosing
    /// frame's call-site list, and declared-exception exit candidates.
    fn record_call(&mut self, frame: FrameId, node: crate::ast::NodeId, callee: MethodId) {
        self.res.calls.insert(node, callee);
        self.table.add_call(self.method, callee);
        self.frames.frame_mut(frame).call_sites.push(callee);
        if self.config.unchecked_exceptions == UncheckedExceptionPolicy::NearestTry {
            let throws = self.table.method(callee).throws.clone();
            let mut exits = Vec::new();
            for t in throws {
                let name = self.table.type_name(&t);
                let exc_ref = self.scopes.lookup_exception(&name);
                let target = self
                    .frames
                    .find_catch_target(frame, t.klass_id(), self.table);
                exits.push((exc_ref, target));
            }
            if !exits.is_empty() {
                self.res.call_throws.insert(node, exits);
            }
        }
    }

    // ---- expressions ----

    fn build_expr(
        &mut self,
        frame: FrameId,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<Type, AnalysisError> {
        match &expr.kind {
            ExprKind::Literal { kind, text } => Ok(match kind {
                LiteralKind::Bool => Type::Prim(PrimKind::Boolean),
                LiteralKind::Char => Type::Prim(PrimKind::Char),
                LiteralKind::Int => {
                    if text.ends_with('l') || text.ends_with('L') {
                        Type::Prim(PrimKind::Long)
                    } else {
                        Type::Prim(PrimKind::Int)
                    }
                }
                LiteralKind::Float => Type::Prim(PrimKind::Double),
                LiteralKind::Str => self
                    .table
                    .resolve_qualified("java.lang.String")
                    .map(Type::Klass)
                    .unwrap_or(Type::Unknown),
                LiteralKind::Null => Type::Null,
            }),
            ExprKind::Name(name) => {
                if let Some(r) = self.scopes.lookup_var(scope, name) {
                    self.read(frame, &r);
                    self.res.refs.insert(expr.id, r.clone());
                    return Ok(self.type_of_ref(&r));
                }
                if let Some(k) = self.klass {
                    if let Some((r, ty)) = self.table.field_of(k, name) {
                        if let Some(this_ref) = self.scopes.lookup_this() {
                            self.read(frame, &this_ref);
                        }
                        self.read(frame, &r);
                        self.res.refs.insert(expr.id, r);
                        return Ok(ty);
                    }
                }
                debug!(name = %name, "variable not found");
                Ok(Type::Unknown)
            }
            ExprKind::This => {
                if let Some(r) = self.scopes.lookup_this() {
                    self.read(frame, &r);
                }
                Ok(self
                    .klass
                    .map(Type::Klass)
                    .unwrap_or(Type::Unknown))
            }
            ExprKind::Super => Ok(self
                .klass
                .and_then(|k| self.table.klass(k).base)
                .map(Type::Klass)
                .unwrap_or(Type::Unknown)),
            ExprKind::TypeLit(_) => Ok(Type::Unknown),
            ExprKind::FieldAccess { object, field } => {
                let owner = self.resolve_field_owner(frame, scope, object)?;
                match owner {
                    Some(k) => {
                        if let Some((r, ty)) = self.table.field_of(k, field) {
                            self.read(frame, &r);
                            self.res.refs.insert(expr.id, r);
                            Ok(ty)
                        } else {
                            debug!(
                                klass = %self.table.klass(k).qualified,
                                field = %field,
                                "field not found"
                            );
                            Ok(Type::Unknown)
                        }
                    }
                    None => Ok(Type::Unknown),
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                self.build_expr(frame, scope, index)?;
                let array_ty = self.build_expr(frame, scope, array)?;
                match array_ty.elem() {
                    Some(elem) => {
                        let elem = elem.clone();
                        let name = self.table.type_name(&elem);
                        let r = self.table.array_elem_ref(&name);
                        self.read(frame, &r);
                        self.res.refs.insert(expr.id, r);
                        Ok(elem)
                    }
                    None => Ok(Type::Unknown),
                }
            }
            ExprKind::Unary { op, operand, .. } => {
                let ty = self.build_expr(frame, scope, operand)?;
                if op == "++" || op == "--" {
                    self.build_assignment(frame, scope, operand)?;
                }
                if op == "!" {
                    Ok(Type::Prim(PrimKind::Boolean))
                } else {
                    Ok(ty)
                }
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.build_expr(frame, scope, left)?;
                let r = self.build_expr(frame, scope, right)?;
                Ok(self.infer_binary(op, &l, &r))
            }
            ExprKind::Paren(inner) => self.build_expr(frame, scope, inner),
            ExprKind::Assign { op, target, value } => {
                let target_ref = self.build_assignment(frame, scope, target)?;
                if op.is_some() {
                    // Compound assignment also reads the old value.
                    if let Some(r) = &target_ref {
                        self.read(frame, r);
                    }
                }
                let value_ty = self.build_expr(frame, scope, value)?;
                Ok(match target_ref {
                    Some(r) => self.type_of_ref_or(&r, value_ty),
                    None => value_ty,
                })
            }
            ExprKind::MethodCall {
                receiver,
                name,
                args,
            } => self.build_method_call(frame, scope, expr, receiver.as_deref(), name, args),
            ExprKind::New { ty, args } => {
                let inst = self
                    .table
                    .resolve_type_name(ty, self.klass, &self.method_type_params)
                    .unwrap_or(Type::Unknown);
                let mut arg_types = Vec::new();
                for arg in args {
                    arg_types.push(self.build_expr(frame, scope, arg)?);
                }
                match inst.klass_id() {
                    Some(k) => {
                        match self
                            .table
                            .find_method(k, LookupStyle::Constructor, None, &arg_types)
                        {
                            Some(callee) => self.record_call(frame, expr.id, callee),
                            None => {
                                // Implicit default constructors are common;
                                // only a mismatched argument list is notable.
                                if !arg_types.is_empty() {
                                    debug!(
                                        klass = %self.table.klass(k).qualified,
                                        "constructor not found"
                                    );
                                }
                                self.res.unknown_calls.insert(expr.id);
                            }
                        }
                        Ok(inst)
                    }
                    None => {
                        self.res.unknown_calls.insert(expr.id);
                        Ok(Type::Unknown)
                    }
                }
            }
            ExprKind::ArrayNew {
                elem_ty,
                dims,
                init,
            } => {
                for d in dims {
                    self.build_expr(frame, scope, d)?;
                }
                if let Some(init) = init {
                    self.build_expr(frame, scope, init)?;
                }
                let elem = self
                    .table
                    .resolve_type_name(elem_ty, self.klass, &self.method_type_params)
                    .unwrap_or(Type::Unknown);
                let mut out = elem;
                for _ in 0..dims.len().max(1) {
                    out = out.array();
                }
                Ok(out)
            }
            ExprKind::ArrayInit(values) => {
                let mut elem = Type::Unknown;
                for v in values {
                    elem = self.build_expr(frame, scope, v)?;
                }
                Ok(elem.array())
            }
            ExprKind::Cast { ty, value } => {
                self.build_expr(frame, scope, value)?;
                Ok(self
                    .table
                    .resolve_type_name(ty, self.klass, &self.method_type_params)
                    .unwrap_or(Type::Unknown))
            }
            ExprKind::InstanceOf { value, .. } => {
                self.build_expr(frame, scope, value)?;
                Ok(Type::Prim(PrimKind::Boolean))
            }
            ExprKind::Ternary {
                cond,
                then_value,
                else_value,
            } => {
                self.build_expr(frame, scope, cond)?;
                let t = self.build_expr(frame, scope, then_value)?;
                let e = self.build_expr(frame, scope, else_value)?;
                Ok(if t == Type::Unknown { e } else { t })
            }
            ExprKind::Lambda { params, body } => {
                self.build_lambda(frame, scope, expr, params, body);
                Ok(Type::Unknown)
            }
            ExprKind::Unsupported(kind) => {
                Err(AnalysisError::unsupported(kind.clone(), Some(expr.span)))
            }
        }
    }

    /// Resolve the left side of a `.field` access to a klass: a value
    /// expression, or a type qualifier for static access.
    fn resolve_field_owner(
        &mut self,
        frame: FrameId,
        scope: ScopeId,
        object: &Expr,
    ) -> Result<Option<KlassId>, AnalysisError> {
        // Prefer the variable interpretation, as the original language
        // rules do; fall back to a type name for static access.
        if let Some(name) = dotted_name(object) {
            let is_var = match &object.kind {
                ExprKind::Name(n) => {
                    self.scopes.lookup_var(scope, n).is_some()
                        || self
                            .klass
                            .map(|k| self.table.field_of(k, n).is_some())
                            .unwrap_or(false)
                }
                _ => false,
            };
            if !is_var {
                let ty = crate::ast::TypeName::simple(name);
                if let Ok(Type::Klass(k)) =
                    self.table
                        .resolve_type_name(&ty, self.klass, &self.method_type_params)
                {
                    self.res.type_qualifiers.insert(object.id);
                    let _ = self.table.load(k);
                    return Ok(Some(k));
                }
            }
        }
        let ty = self.build_expr(frame, scope, object)?;
        Ok(match ty {
            Type::Klass(k) => Some(k),
            _ => None,
        })
    }

    fn build_method_call(
        &mut self,
        frame: FrameId,
        scope: ScopeId,
        expr: &Expr,
        receiver: Option<&Expr>,
        name: &str,
        args: &[Expr],
    ) -> Result<Type, AnalysisError> {
        let (klass, style) = match receiver {
            None => {
                if let Some(this_ref) = self.scopes.lookup_this() {
                    self.read(frame, &this_ref);
                }
                (self.klass, LookupStyle::InstanceOrStatic)
            }
            Some(recv) if matches!(recv.kind, ExprKind::Super) => {
                if let Some(this_ref) = self.scopes.lookup_this() {
                    self.read(frame, &this_ref);
                }
                (
                    self.klass.and_then(|k| self.table.klass(k).base),
                    LookupStyle::Instance,
                )
            }
            Some(recv) => {
                // "ClassName.method()" is a static call when the name
                // resolves to a type and not to a variable.
                let static_klass = match dotted_name(recv) {
                    Some(qname) => {
                        let shadowed = match dotted_root(recv) {
                            Some(root) => self.scopes.lookup_var(scope, root).is_some(),
                            None => true,
                        };
                        if shadowed {
                            None
                        } else {
                            let ty = crate::ast::TypeName::simple(qname);
                            match self.table.resolve_type_name(
                                &ty,
                                self.klass,
                                &self.method_type_params,
                            ) {
                                Ok(Type::Klass(k)) => Some(k),
                                _ => None,
                            }
                        }
                    }
                    None => None,
                };
                match static_klass {
                    Some(k) => {
                        self.res.type_qualifiers.insert(recv.id);
                        (Some(k), LookupStyle::Static)
                    }
                    None => {
                        let ty = self.build_expr(frame, scope, recv)?;
                        (ty.klass_id(), LookupStyle::Instance)
                    }
                }
            }
        };
        let mut arg_types = Vec::new();
        for arg in args {
            arg_types.push(self.build_expr(frame, scope, arg)?);
        }
        let Some(klass) = klass else {
            self.res.unknown_calls.insert(expr.id);
            return Ok(Type::Unknown);
        };
        match self.table.find_method(klass, style, Some(name), &arg_types) {
            Some(callee) => {
                self.record_call(frame, expr.id, callee);
                Ok(self.table.method(callee).func.ret.clone())
            }
            None => {
                debug!(
                    klass = %self.table.klass(klass).qualified,
                    name, "method not found; downgrading to unknown-effect call"
                );
                self.res.unknown_calls.insert(expr.id);
                Ok(Type::Unknown)
            }
        }
    }

    /// Resolve an assignment target, recording the written ref.
    fn build_assignment(
        &mut self,
        frame: FrameId,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<Option<Ref>, AnalysisError> {
        match &expr.kind {
            ExprKind::Name(name) => {
                if let Some(r) = self.scopes.lookup_var(scope, name) {
                    self.write(frame, &r);
                    self.res.refs.insert(expr.id, r.clone());
                    return Ok(Some(r));
                }
                if let Some(k) = self.klass {
                    if let Some((r, _)) = self.table.field_of(k, name) {
                        if let Some(this_ref) = self.scopes.lookup_this() {
                            self.read(frame, &this_ref);
                        }
                        self.write(frame, &r);
                        self.res.refs.insert(expr.id, r.clone());
                        return Ok(Some(r));
                    }
                }
                debug!(name = %name, "assignment target not found");
                Ok(None)
            }
            ExprKind::FieldAccess { object, field } => {
                match self.resolve_field_owner(frame, scope, object)? {
                    Some(k) => {
                        if let Some((r, _)) = self.table.field_of(k, field) {
                            self.write(frame, &r);
                            self.res.refs.insert(expr.id, r.clone());
                            Ok(Some(r))
                        } else {
                            debug!(field = %field, "assigned field not found");
                            Ok(None)
                        }
                    }
                    None => Ok(None),
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                let array_ty = self.build_expr(frame, scope, array)?;
                self.build_expr(frame, scope, index)?;
                match array_ty.elem() {
                    Some(elem) => {
                        let name = self.table.type_name(elem);
                        let r = self.table.array_elem_ref(&name);
                        self.write(frame, &r);
                        self.res.refs.insert(expr.id, r.clone());
                        Ok(Some(r))
                    }
                    None => Ok(None),
                }
            }
            ExprKind::Paren(inner) => self.build_assignment(frame, scope, inner),
            other => Err(AnalysisError::unsupported(
                format!("assignment to {}", other.kind()),
                Some(expr.span),
            )),
        }
    }

    /// Captured-variable scan: outer locals a lambda body reads become
    /// read-only snapshots; the lambda itself stays opaque.
    fn build_lambda(
        &mut self,
        frame: FrameId,
        scope: ScopeId,
        expr: &Expr,
        params: &[String],
        body: &LambdaBody,
    ) {
        let mut names = Vec::new();
        match body {
            LambdaBody::Expr(e) => collect_names(e, &mut names),
            LambdaBody::Block(s) => collect_names_stmt(s, &mut names),
        }
        let lambda_path = format!("{}:lambda{}", self.scopes.path(scope), expr.id.0);
        let mut captured = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        for name in names {
            if params.iter().any(|p| *p == name) || !seen.insert(name.clone()) {
                continue;
            }
            if let Some(orig) = self.scopes.lookup_var(scope, &name) {
                self.read(frame, &orig);
                let snap = Ref::captured(&lambda_path, &name, orig.type_name());
                captured.push((orig, snap));
            }
        }
        self.res.lambdas.insert(expr.id, captured);
    }

    fn infer_binary(&mut self, op: &str, l: &Type, r: &Type) -> Type {
        match op {
            "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" => Type::Prim(PrimKind::Boolean),
            "+" => {
                let string = self.table.resolve_qualified("java.lang.String");
                let is_string = |t: &Type| t.klass_id().is_some() && t.klass_id() == string;
                if is_string(l) || is_string(r) {
                    return string.map(Type::Klass).unwrap_or(Type::Unknown);
                }
                promote(l, r)
            }
            _ => promote(l, r),
        }
    }

    fn type_of_ref_or(&self, r: &Ref, fallback: Type) -> Type {
        match self.ref_types.get(r) {
            Some(t) => t.clone(),
            None => fallback,
        }
    }
}

/// Numeric promotion: the wider operand wins.
fn promote(l: &Type, r: &Type) -> Type {
    match (l, r) {
        (Type::Prim(a), Type::Prim(b)) => {
            match (a.widening_rank(), b.widening_rank()) {
                (Some(ra), Some(rb)) => Type::Prim(if ra >= rb { *a } else { *b }),
                _ => l.clone(),
            }
        }
        (Type::Unknown, _) => r.clone(),
        _ => l.clone(),
    }
}

/// Reconstruct a dotted name from nested field accesses, when the whole
/// expression is name-shaped.
fn dotted_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Name(n) => Some(n.clone()),
        ExprKind::FieldAccess { object, field } => {
            Some(format!("{}.{field}", dotted_name(object)?))
        }
        _ => None,
    }
}

/// The leftmost identifier of a name-shaped expression.
fn dotted_root(expr: &Expr) -> Option<&str> {
    match &expr.kind {
        ExprKind::Name(n) => Some(n),
        ExprKind::FieldAccess { object, .. } => dotted_root(object),
        _ => None,
    }
}

fn collect_names(expr: &Expr, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Name(n) => out.push(n.clone()),
        ExprKind::FieldAccess { object, .. } => collect_names(object, out),
        ExprKind::ArrayAccess { array, index } => {
            collect_names(array, out);
            collect_names(index, out);
        }
        ExprKind::Unary { operand, .. } => collect_names(operand, out),
        ExprKind::Binary { left, right, .. } => {
            collect_names(left, out);
            collect_names(right, out);
        }
        ExprKind::Paren(e) | ExprKind::Cast { value: e, .. } => collect_names(e, out),
        ExprKind::InstanceOf { value, .. } => collect_names(value, out),
        ExprKind::Assign { target, value, .. } => {
            collect_names(target, out);
            collect_names(value, out);
        }
        ExprKind::MethodCall { receiver, args, .. } => {
            if let Some(r) = receiver {
                collect_names(r, out);
            }
            for a in args {
                collect_names(a, out);
            }
        }
        ExprKind::New { args, .. } => {
            for a in args {
                collect_names(a, out);
            }
        }
        ExprKind::ArrayNew { dims, init, .. } => {
            for d in dims {
                collect_names(d, out);
            }
            if let Some(i) = init {
                collect_names(i, out);
            }
        }
        ExprKind::ArrayInit(values) => {
            for v in values {
                collect_names(v, out);
            }
        }
        ExprKind::Ternary {
            cond,
            then_value,
            else_value,
        } => {
            collect_names(cond, out);
            collect_names(then_value, out);
            collect_names(else_value, out);
        }
        _ => {}
    }
}

fn collect_names_stmt(stmt: &Stmt, out: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::Block(stmts) => {
            for s in stmts {
                collect_names_stmt(s, out);
            }
        }
        StmtKind::Expr(e) | StmtKind::Throw(e) => collect_names(e, out),
        StmtKind::LocalDecl { decls, .. } => {
            for (_, init) in decls {
                if let Some(e) = init {
                    collect_names(e, out);
                }
            }
        }
        StmtKind::Return(Some(e)) => collect_names(e, out),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_names(cond, out);
            collect_names_stmt(then_branch, out);
            if let Some(e) = else_branch {
                collect_names_stmt(e, out);
            }
        }
        StmtKind::While { cond, body } => {
            collect_names(cond, out);
            collect_names_stmt(body, out);
        }
        StmtKind::Do { body, cond } => {
            collect_names_stmt(body, out);
            collect_names(cond, out);
        }
        _ => {}
    }
}
