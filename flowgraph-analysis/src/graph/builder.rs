//! Second pass: materialize the dataflow graph of one method, guided
//! by the frame tree and the memoized resolutions of the first pass.
//!
//! The walk threads a [`Component`] through statements left to right;
//! conditionals and loops build sub-components and reconcile them with
//! join nodes and loop quads.

use petgraph::stable_graph::NodeIndex;
use tracing::warn;

use flowgraph_core::config::AnalysisConfig;
use flowgraph_core::errors::AnalysisError;

use crate::ast::{Expr, ExprKind, LiteralKind, MethodDecl, Stmt, StmtKind};
use crate::frames::{FrameId, FrameTree, Resolutions};
use crate::klass::{CallStyle, KlassTable, MethodId};
use crate::scopes::{Ref, RefKind, ScopeId, ScopeTree};

use super::component::{Component, Exit};
use super::types::{EdgeLabel, Graph, NodeKind};

pub struct GraphBuilder<'a> {
    table: &'a KlassTable,
    scopes: &'a ScopeTree,
    frames: &'a FrameTree,
    res: &'a Resolutions,
    method: MethodId,
    g: Graph,
}

impl<'a> GraphBuilder<'a> {
    /// Build the graph for one source method. The frame pass must have
    /// run (and the effect fixpoint completed) first.
    pub fn build(
        table: &'a KlassTable,
        scopes: &'a ScopeTree,
        frames: &'a FrameTree,
        res: &'a Resolutions,
        config: &'a AnalysisConfig,
        method: MethodId,
        decl: &MethodDecl,
    ) -> Result<Graph, AnalysisError> {
        let signature = table.method(method).signature.clone();
        let mut builder = Self {
            table,
            scopes,
            frames,
            res,
            method,
            g: Graph::new(method, signature.clone()),
        };
        builder
            .build_method(decl)
            .map_err(|e| e.in_method(signature))?;
        if config.prune_dead_nodes {
            builder.g.prune();
        }
        Ok(builder.g)
    }

    fn build_method(&mut self, decl: &MethodDecl) -> Result<(), AnalysisError> {
        let mut cpt = Component::new();

        // Method boundary: the receiver, each parameter, and every
        // aggregated input ref enter through input nodes.
        if let Some(this_ref) = self.scopes.lookup_this() {
            let input = self.g.add(NodeKind::Input, Some(this_ref.clone()), None);
            cpt.preset(this_ref, input);
        }
        for p in &decl.params {
            if let Some(r) = self.scopes.lookup_var(ScopeTree::ROOT, &p.name) {
                let input = self.g.add(NodeKind::Input, Some(r.clone()), None);
                cpt.preset(r, input);
            }
        }
        for r in self.table.method(self.method).input_refs.clone() {
            if cpt.peek(&r).is_none() {
                let input = self.g.add(NodeKind::Input, Some(r.clone()), None);
                cpt.preset(r, input);
            }
        }

        if let Some(body) = &decl.body {
            self.process_stmt(&mut cpt, FrameTree::ROOT, ScopeTree::ROOT, body)?;
        }
        cpt.end_frame(&mut self.g, FrameTree::ROOT);

        // Method boundary outputs: the return slot, each exception
        // slot, and every aggregated output ref.
        let return_ref = self.scopes.lookup_return();
        if let Some(value) = cpt.peek(&return_ref) {
            let out = self.g.add(NodeKind::Output, Some(return_ref), None);
            self.g.connect(value, out, EdgeLabel::Value);
        }
        for exc in self.scopes.exception_refs() {
            if let Some(value) = cpt.peek(exc) {
                let out = self.g.add(NodeKind::Output, Some(exc.clone()), None);
                self.g.connect(value, out, EdgeLabel::Value);
            }
        }
        for r in self.table.method(self.method).output_refs.clone() {
            if let Some(value) = cpt.peek(&r) {
                let out = self.g.add(NodeKind::Output, Some(r), None);
                self.g.connect(value, out, EdgeLabel::Value);
            }
        }
        Ok(())
    }

    // ---- statements ----

    fn process_stmt(
        &mut self,
        cpt: &mut Component,
        frame: FrameId,
        scope: ScopeId,
        stmt: &Stmt,
    ) -> Result<(), AnalysisError> {
        match &stmt.kind {
            StmtKind::Block(stmts) => {
                let inner_scope = self.scopes.child_of(scope, stmt.id).unwrap_or(scope);
                let inner_frame = self.frames.child_of(frame, stmt.id).unwrap_or(frame);
                for s in stmts {
                    self.process_stmt(cpt, inner_frame, inner_scope, s)?;
                }
            }
            StmtKind::Empty | StmtKind::Assert { .. } => {}
            StmtKind::LocalDecl { decls, .. } => {
                for (name, init) in decls {
                    let Some(init) = init else { continue };
                    self.process_expr(cpt, frame, scope, init)?;
                    let value = self.rvalue(cpt, init);
                    if let Some(r) = self.scopes.lookup_var(scope, name) {
                        let assign =
                            self.g
                                .add(NodeKind::Assign, Some(r.clone()), Some(stmt.span));
                        self.g.connect(value, assign, EdgeLabel::Value);
                        cpt.set_output(r, assign);
                    }
                }
            }
            StmtKind::Expr(expr) => {
                self.process_expr(cpt, frame, scope, expr)?;
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.process_expr(cpt, frame, scope, cond)?;
                let cond_value = self.rvalue(cpt, cond);

                let then_frame = self
                    .frames
                    .child_of(frame, then_branch.id)
                    .unwrap_or(frame);
                let mut then_cpt = Component::new();
                self.process_stmt(&mut then_cpt, then_frame, scope, then_branch)?;

                let else_cpt = match else_branch {
                    Some(else_branch) => {
                        let else_frame = self
                            .frames
                            .child_of(frame, else_branch.id)
                            .unwrap_or(frame);
                        let mut c = Component::new();
                        self.process_stmt(&mut c, else_frame, scope, else_branch)?;
                        Some(c)
                    }
                    None => None,
                };
                self.process_conditional(cpt, cond_value, Some(then_cpt), else_cpt);
            }
            StmtKind::Switch { value, cases } => {
                self.process_switch(cpt, frame, scope, stmt, value, cases)?;
            }
            StmtKind::While { cond, body } => {
                let loop_scope = self.scopes.child_of(scope, stmt.id).unwrap_or(scope);
                let loop_frame = self.frames.child_of(frame, stmt.id).unwrap_or(frame);
                let mut loop_cpt = Component::new();
                // Pre-test: the condition reads loop-head values.
                self.process_expr(&mut loop_cpt, loop_frame, scope, cond)?;
                let cond_value = self.rvalue(&mut loop_cpt, cond);
                self.process_stmt(&mut loop_cpt, loop_frame, loop_scope, body)?;
                self.process_loop(cpt, cond_value, loop_frame, loop_cpt);
                cpt.end_frame(&mut self.g, loop_frame);
            }
            StmtKind::Do { body, cond } => {
                let loop_scope = self.scopes.child_of(scope, stmt.id).unwrap_or(scope);
                let loop_frame = self.frames.child_of(frame, stmt.id).unwrap_or(frame);
                let mut loop_cpt = Component::new();
                // Post-test: the condition reads post-body values. This
                // ordering is the only structural difference from while.
                self.process_stmt(&mut loop_cpt, loop_frame, loop_scope, body)?;
                self.process_expr(&mut loop_cpt, loop_frame, loop_scope, cond)?;
                let cond_value = self.rvalue(&mut loop_cpt, cond);
                self.process_loop(cpt, cond_value, loop_frame, loop_cpt);
                cpt.end_frame(&mut self.g, loop_frame);
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let loop_scope = self.scopes.child_of(scope, stmt.id).unwrap_or(scope);
                let loop_frame = self.frames.child_of(frame, stmt.id).unwrap_or(frame);
                for s in init {
                    self.process_stmt(cpt, frame, loop_scope, s)?;
                }
                let mut loop_cpt = Component::new();
                let cond_value = match cond {
                    Some(cond) => {
                        self.process_expr(&mut loop_cpt, loop_frame, loop_scope, cond)?;
                        self.rvalue(&mut loop_cpt, cond)
                    }
                    None => self
                        .g
                        .add(NodeKind::Const { text: "true".into() }, None, None),
                };
                self.process_stmt(&mut loop_cpt, loop_frame, loop_scope, body)?;
                for u in update {
                    self.process_expr(&mut loop_cpt, loop_frame, loop_scope, u)?;
                }
                self.process_loop(cpt, cond_value, loop_frame, loop_cpt);
                cpt.end_frame(&mut self.g, loop_frame);
            }
            StmtKind::ForEach {
                var_name,
                iterable,
                body,
                ..
            } => {
                let loop_scope = self.scopes.child_of(scope, stmt.id).unwrap_or(scope);
                let loop_frame = self.frames.child_of(frame, stmt.id).unwrap_or(frame);
                let mut loop_cpt = Component::new();
                self.process_expr(&mut loop_cpt, loop_frame, scope, iterable)?;
                let source = self.rvalue(&mut loop_cpt, iterable);
                let var_ref = self.scopes.lookup_var(loop_scope, var_name);
                let iter = self
                    .g
                    .add(NodeKind::Iter, var_ref.clone(), Some(stmt.span));
                self.g.connect(source, iter, EdgeLabel::Value);
                if let Some(r) = var_ref {
                    let assign = self.g.add(NodeKind::Assign, Some(r.clone()), Some(stmt.span));
                    self.g.connect(iter, assign, EdgeLabel::Value);
                    cpt.set_output(r, assign);
                }
                self.process_stmt(&mut loop_cpt, loop_frame, loop_scope, body)?;
                // The iteration value stands witness for the loop.
                self.process_loop(cpt, iter, loop_frame, loop_cpt);
                cpt.end_frame(&mut self.g, loop_frame);
            }
            StmtKind::Return(expr) => {
                let target = FrameTree::ROOT;
                if let Some(expr) = expr {
                    self.process_expr(cpt, frame, scope, expr)?;
                    let value = self.rvalue(cpt, expr);
                    cpt.add_exit(Exit {
                        node: value,
                        ref_: self.scopes.lookup_return(),
                        target,
                        cont: false,
                    });
                }
                self.escape_outputs(cpt, frame, target, false);
            }
            StmtKind::Break(label) => {
                match self.frames.find_jump_target(frame, label.as_deref()) {
                    Some(target) => self.escape_outputs(cpt, frame, target, false),
                    None => warn!(?label, "break with no enclosing target"),
                }
            }
            StmtKind::Continue(label) => {
                match self.frames.find_jump_target(frame, label.as_deref()) {
                    Some(target) => self.escape_outputs(cpt, frame, target, true),
                    None => warn!(?label, "continue with no enclosing target"),
                }
            }
            StmtKind::Labeled { body, .. } => {
                let inner = self.frames.child_of(frame, stmt.id).unwrap_or(frame);
                self.process_stmt(cpt, inner, scope, body)?;
                cpt.end_frame(&mut self.g, inner);
            }
            StmtKind::Synchronized { lock, body } => {
                self.process_expr(cpt, frame, scope, lock)?;
                self.process_stmt(cpt, frame, scope, body)?;
            }
            StmtKind::Try {
                resources,
                body,
                catches,
                finally,
            } => {
                self.process_try(cpt, frame, scope, stmt, resources, body, catches, finally)?;
            }
            StmtKind::Throw(expr) => {
                self.process_expr(cpt, frame, scope, expr)?;
                let value = self.rvalue(cpt, expr);
                if let Some((exc_ref, target)) = self.res.throws.get(&stmt.id).cloned() {
                    let raise = self
                        .g
                        .add(NodeKind::Throw, Some(exc_ref.clone()), Some(stmt.span));
                    self.g.connect(value, raise, EdgeLabel::Value);
                    cpt.add_exit(Exit {
                        node: raise,
                        ref_: exc_ref,
                        target,
                        cont: false,
                    });
                    self.escape_outputs(cpt, frame, target, false);
                }
            }
            StmtKind::ThisCall(args) | StmtKind::SuperCall(args) => {
                let unknown = self.res.unknown_calls.contains(&stmt.id);
                let callee = self.res.calls.get(&stmt.id).copied();
                let name = callee
                    .map(|m| self.table.method(m).name.clone())
                    .unwrap_or_else(|| "<init>".to_string());
                let obj = self
                    .scopes
                    .lookup_this()
                    .map(|r| cpt.value_of(&mut self.g, &r));
                let call = self.g.add(
                    NodeKind::Call {
                        name,
                        signature: callee.map(|m| self.table.method(m).signature.clone()),
                        unknown_effect: unknown,
                    },
                    None,
                    Some(stmt.span),
                );
                if let Some(obj) = obj {
                    self.g.connect(obj, call, EdgeLabel::Obj);
                }
                for (i, arg) in args.iter().enumerate() {
                    self.process_expr(cpt, frame, scope, arg)?;
                    let v = self.rvalue(cpt, arg);
                    self.g.connect(v, call, EdgeLabel::Arg(i as u32));
                }
                self.apply_call_effects(cpt, stmt.id, call);
            }
            StmtKind::Unsupported(kind) => {
                return Err(AnalysisError::unsupported(kind.clone(), Some(stmt.span)));
            }
        }
        Ok(())
    }

    /// On a non-local jump, every ref written between here and the
    /// target escapes with its current value.
    fn escape_outputs(&mut self, cpt: &mut Component, from: FrameId, target: FrameId, cont: bool) {
        for frm in self.frames.path_to(from, target) {
            for r in self.frames.frame(frm).outputs.clone() {
                let node = cpt.value_of(&mut self.g, &r);
                cpt.add_exit(Exit {
                    node,
                    ref_: r,
                    target,
                    cont,
                });
            }
        }
    }

    /// Reconcile branch components: a join per written ref, with the
    /// not-taken side closed from the pre-branch value, and branch
    /// exits re-wrapped behind condition joins.
    fn process_conditional(
        &mut self,
        cpt: &mut Component,
        cond_value: NodeIndex,
        true_cpt: Option<Component>,
        false_cpt: Option<Component>,
    ) {
        let mut out_refs: Vec<Ref> = Vec::new();
        for (sub, _) in [(true_cpt.as_ref(), true), (false_cpt.as_ref(), false)] {
            let Some(sub) = sub else { continue };
            for (r, _) in sub.output_refs() {
                if !out_refs.contains(r) {
                    out_refs.push(r.clone());
                }
            }
        }
        out_refs.sort();

        // Close the branches' open reads from the outer values.
        for sub in [true_cpt.as_ref(), false_cpt.as_ref()].into_iter().flatten() {
            let pending: Vec<(Ref, NodeIndex)> =
                sub.input_refs().map(|(r, ix)| (r.clone(), ix)).collect();
            for (r, link) in pending {
                let outer = cpt.value_of(&mut self.g, &r);
                self.g.connect(outer, link, EdgeLabel::Value);
            }
        }

        for r in out_refs {
            let join = self.g.add(
                NodeKind::Join {
                    has_true: false,
                    has_false: false,
                },
                Some(r.clone()),
                None,
            );
            self.g.connect(cond_value, join, EdgeLabel::Cond);
            if let Some(node) = true_cpt.as_ref().and_then(|c| c.output_of(&r)) {
                self.g.join_recv(join, true, node);
            }
            if let Some(node) = false_cpt.as_ref().and_then(|c| c.output_of(&r)) {
                self.g.join_recv(join, false, node);
            }
            if !self.g.join_is_closed(join) {
                let pre = cpt.value_of(&mut self.g, &r);
                self.g.join_close(join, pre);
            }
            cpt.set_output(r, join);
        }

        // Exits keep their provenance: wrap behind a condition join.
        for (sub, side) in [(true_cpt, true), (false_cpt, false)] {
            let Some(mut sub) = sub else { continue };
            for exit in sub.take_exits() {
                let join = self.g.add(
                    NodeKind::Join {
                        has_true: false,
                        has_false: false,
                    },
                    Some(exit.ref_.clone()),
                    None,
                );
                self.g.connect(cond_value, join, EdgeLabel::Cond);
                self.g.join_recv(join, side, exit.node);
                cpt.add_exit(Exit {
                    node: join,
                    ..exit
                });
            }
        }
    }

    /// Expand the loop quad for every loop-carried ref and wire the
    /// body component through it.
    fn process_loop(
        &mut self,
        cpt: &mut Component,
        cond_value: NodeIndex,
        loop_frame: FrameId,
        mut loop_cpt: Component,
    ) {
        use std::collections::BTreeMap;
        let loop_refs = self.frames.ins_and_outs(loop_frame);
        let mut begins: BTreeMap<Ref, NodeIndex> = BTreeMap::new();
        let mut repeats: BTreeMap<Ref, NodeIndex> = BTreeMap::new();
        let mut ends: BTreeMap<Ref, NodeIndex> = BTreeMap::new();
        for r in &loop_refs {
            let enter = cpt.value_of(&mut self.g, r);
            let begin = self.g.add(NodeKind::LoopBegin, Some(r.clone()), None);
            self.g.connect(enter, begin, EdgeLabel::Enter);
            let repeat = self.g.add(NodeKind::LoopRepeat, Some(r.clone()), None);
            let end = self.g.add(NodeKind::LoopEnd, Some(r.clone()), None);
            self.g.connect(cond_value, end, EdgeLabel::Cond);
            // Structural pairing keeps the zero-iteration path
            // representable without adding value inputs.
            self.g.connect(end, begin, EdgeLabel::EndMark);
            self.g.connect(begin, end, EdgeLabel::BeginMark);
            self.g.connect(repeat, begin, EdgeLabel::Repeat);
            begins.insert(r.clone(), begin);
            repeats.insert(r.clone(), repeat);
            ends.insert(r.clone(), end);
        }

        // Body reads come from the loop head; non-carried refs read the
        // outer value directly.
        let pending: Vec<(Ref, NodeIndex)> = loop_cpt
            .input_refs()
            .map(|(r, ix)| (r.clone(), ix))
            .collect();
        for (r, link) in pending {
            let src = match begins.get(&r) {
                Some(&b) => b,
                None => cpt.value_of(&mut self.g, &r),
            };
            self.g.connect(src, link, EdgeLabel::Value);
        }

        // Body writes feed the end node; non-carried writes escape.
        let outs: Vec<(Ref, NodeIndex)> = loop_cpt
            .output_refs()
            .map(|(r, ix)| (r.clone(), ix))
            .collect();
        for (r, out) in outs {
            match ends.get(&r) {
                Some(&end) => self.g.connect(out, end, EdgeLabel::Value),
                None => cpt.set_output(r, out),
            }
        }

        // Continue exits land on the end node instead of escaping.
        for exit in loop_cpt.take_exits() {
            if exit.cont && exit.target == loop_frame {
                let fallback = match ends.get(&exit.ref_) {
                    Some(&end) => end,
                    None => cpt.value_of(&mut self.g, &exit.ref_),
                };
                if matches!(self.g.node(exit.node).kind, NodeKind::Join { .. })
                    && !self.g.join_is_closed(exit.node)
                {
                    self.g.join_close(exit.node, fallback);
                }
                ends.insert(exit.ref_.clone(), exit.node);
            } else {
                cpt.add_exit(exit);
            }
        }

        // Close the quad: the end value is the value after the loop and
        // the value the next iteration starts from.
        for r in &loop_refs {
            let end = ends[r];
            let repeat = repeats[r];
            self.g.connect(end, repeat, EdgeLabel::Loop);
            cpt.set_output(r.clone(), end);
        }
    }

    /// Merge a guarded component (case body, catch body) into the outer
    /// one: per-ref joins with `witness` as the condition.
    fn merge_guarded(&mut self, cpt: &mut Component, witness: NodeIndex, mut sub: Component) {
        let pending: Vec<(Ref, NodeIndex)> =
            sub.input_refs().map(|(r, ix)| (r.clone(), ix)).collect();
        for (r, link) in pending {
            let outer = cpt.value_of(&mut self.g, &r);
            self.g.connect(outer, link, EdgeLabel::Value);
        }
        let outs: Vec<(Ref, NodeIndex)> =
            sub.output_refs().map(|(r, ix)| (r.clone(), ix)).collect();
        for (r, out) in outs {
            let join = self.g.add(
                NodeKind::Join {
                    has_true: false,
                    has_false: false,
                },
                Some(r.clone()),
                None,
            );
            self.g.connect(witness, join, EdgeLabel::Cond);
            self.g.join_recv(join, true, out);
            let pre = cpt.value_of(&mut self.g, &r);
            self.g.join_close(join, pre);
            cpt.set_output(r, join);
        }
        for exit in sub.take_exits() {
            let join = self.g.add(
                NodeKind::Join {
                    has_true: false,
                    has_false: false,
                },
                Some(exit.ref_.clone()),
                None,
            );
            self.g.connect(witness, join, EdgeLabel::Cond);
            self.g.join_recv(join, true, exit.node);
            cpt.add_exit(Exit {
                node: join,
                ..exit
            });
        }
    }

    fn process_switch(
        &mut self,
        cpt: &mut Component,
        frame: FrameId,
        scope: ScopeId,
        stmt: &Stmt,
        value: &Expr,
        cases: &[crate::ast::SwitchCase],
    ) -> Result<(), AnalysisError> {
        let switch_scope = self.scopes.child_of(scope, stmt.id).unwrap_or(scope);
        let switch_frame = self.frames.child_of(frame, stmt.id).unwrap_or(frame);
        self.process_expr(cpt, frame, scope, value)?;
        let switch_value = self.rvalue(cpt, value);

        let mut carry: Option<Component> = None;
        for (idx, case) in cases.iter().enumerate() {
            let case_frame = self.frames.child_of(switch_frame, case.id).unwrap_or(switch_frame);
            let case_node = self.g.add(
                NodeKind::Case { matches: 0 },
                None,
                Some(case.span),
            );
            self.g.connect(switch_value, case_node, EdgeLabel::Value);
            let mut match_count = 0u32;
            for label in case.labels.iter().flatten() {
                self.process_expr(cpt, frame, switch_scope, label)?;
                let m = self.rvalue(cpt, label);
                self.g.connect(m, case_node, EdgeLabel::Match(match_count));
                match_count += 1;
            }
            if let NodeKind::Case { matches } = &mut self.g.graph[case_node].kind {
                *matches = match_count;
            }

            // Fallthrough carries the previous case's component.
            let mut case_cpt = carry.take().unwrap_or_default();
            for s in &case.body {
                self.process_stmt(&mut case_cpt, case_frame, switch_scope, s)?;
            }

            let closed = case
                .body
                .last()
                .map(|s| {
                    matches!(
                        s.kind,
                        StmtKind::Break(_)
                            | StmtKind::Continue(_)
                            | StmtKind::Return(_)
                            | StmtKind::Throw(_)
                    )
                })
                .unwrap_or(false);
            if closed || idx + 1 == cases.len() {
                self.merge_guarded(cpt, case_node, case_cpt);
            } else {
                carry = Some(case_cpt);
            }
        }
        cpt.end_frame(&mut self.g, switch_frame);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn process_try(
        &mut self,
        cpt: &mut Component,
        frame: FrameId,
        scope: ScopeId,
        stmt: &Stmt,
        resources: &[Stmt],
        body: &Stmt,
        catches: &[crate::ast::CatchClause],
        finally: &Option<Box<Stmt>>,
    ) -> Result<(), AnalysisError> {
        let try_scope = self.scopes.child_of(scope, stmt.id).unwrap_or(scope);
        for r in resources {
            self.process_stmt(cpt, frame, try_scope, r)?;
        }

        // Rebuild the reverse-order catch chain the frame pass created:
        // chain[i] = (clause index, frame of that clause). Catch bodies
        // run in the outer frame, outside the handler chain.
        let mut chain: Vec<(usize, FrameId)> = Vec::new();
        let mut cur = frame;
        for (i, cc) in catches.iter().enumerate().rev() {
            cur = self.frames.child_of(cur, cc.id).unwrap_or(cur);
            chain.push((i, cur));
        }
        chain.reverse();

        self.process_stmt(cpt, cur, try_scope, body)?;

        for (i, catch_frame) in chain {
            let cc = &catches[i];
            let drained = cpt.drain_exits_for(catch_frame);
            let catch_scope = self.scopes.child_of(scope, cc.id).unwrap_or(scope);
            let var_ref = self.scopes.lookup_var(catch_scope, &cc.name);
            let assign = self.g.add(NodeKind::Assign, var_ref.clone(), Some(cc.span));
            let mut exc_i = 0u32;
            for exit in drained {
                if matches!(exit.ref_.kind(), RefKind::Exception) {
                    self.g.connect(exit.node, assign, EdgeLabel::Exc(exc_i));
                    exc_i += 1;
                } else {
                    // Values written before the throw land here too.
                    if matches!(self.g.node(exit.node).kind, NodeKind::Join { .. })
                        && !self.g.join_is_closed(exit.node)
                    {
                        let fallback = cpt.value_of(&mut self.g, &exit.ref_);
                        self.g.join_close(exit.node, fallback);
                    }
                    cpt.set_output(exit.ref_.clone(), exit.node);
                }
            }
            if let Some(r) = var_ref {
                cpt.set_output(r, assign);
            }
            // The body is guarded: it runs only when something reached
            // this handler, so its writes merge behind the assignment.
            let mut catch_cpt = Component::new();
            self.process_stmt(&mut catch_cpt, frame, catch_scope, &cc.body)?;
            self.merge_guarded(cpt, assign, catch_cpt);
        }

        if let Some(fin) = finally {
            self.process_stmt(cpt, frame, scope, fin)?;
        }
        Ok(())
    }

    // ---- expressions ----

    /// The value of the last built expression; a placeholder link when
    /// the expression produced none (unresolved reads stay tolerant).
    fn rvalue(&mut self, cpt: &mut Component, _expr: &Expr) -> NodeIndex {
        match cpt.rvalue() {
            Some(ix) => ix,
            None => self.g.add(NodeKind::Link, None, None),
        }
    }

    fn process_expr(
        &mut self,
        cpt: &mut Component,
        frame: FrameId,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<(), AnalysisError> {
        match &expr.kind {
            ExprKind::Literal { kind, text } => {
                let text = match kind {
                    LiteralKind::Null => "null".to_string(),
                    _ => text.clone(),
                };
                let node = self.g.add(NodeKind::Const { text }, None, Some(expr.span));
                cpt.set_rvalue(node);
            }
            ExprKind::TypeLit(ty) => {
                let node = self.g.add(
                    NodeKind::Const {
                        text: ty.to_string(),
                    },
                    None,
                    Some(expr.span),
                );
                cpt.set_rvalue(node);
            }
            ExprKind::Name(_) => {
                match self.res.refs.get(&expr.id) {
                    Some(r) if matches!(r.kind(), RefKind::Field { .. }) => {
                        // Implicit-this field read.
                        let value = cpt.value_of(&mut self.g, r);
                        let node = self.g.add(
                            NodeKind::FieldAccess,
                            Some(r.clone()),
                            Some(expr.span),
                        );
                        self.g.connect(value, node, EdgeLabel::Value);
                        if let Some(this_ref) = self.scopes.lookup_this() {
                            let obj = cpt.value_of(&mut self.g, &this_ref);
                            self.g.connect(obj, node, EdgeLabel::Obj);
                        }
                        cpt.set_rvalue(node);
                    }
                    Some(r) => {
                        // Locals read the current value directly.
                        let value = cpt.value_of(&mut self.g, r);
                        cpt.set_rvalue(value);
                    }
                    None => {
                        let node = self.g.add(NodeKind::Link, None, Some(expr.span));
                        cpt.set_rvalue(node);
                    }
                }
            }
            ExprKind::This | ExprKind::Super => {
                let node = match self.scopes.lookup_this() {
                    Some(r) => cpt.value_of(&mut self.g, &r),
                    None => self.g.add(NodeKind::Link, None, Some(expr.span)),
                };
                cpt.set_rvalue(node);
            }
            ExprKind::FieldAccess { object, field: _ } => {
                let obj = if self.res.type_qualifiers.contains(&object.id) {
                    None
                } else {
                    self.process_expr(cpt, frame, scope, object)?;
                    Some(self.rvalue(cpt, object))
                };
                match self.res.refs.get(&expr.id).cloned() {
                    Some(r) => {
                        let value = cpt.value_of(&mut self.g, &r);
                        let node =
                            self.g
                                .add(NodeKind::FieldAccess, Some(r), Some(expr.span));
                        self.g.connect(value, node, EdgeLabel::Value);
                        if let Some(obj) = obj {
                            self.g.connect(obj, node, EdgeLabel::Obj);
                        }
                        cpt.set_rvalue(node);
                    }
                    None => {
                        let node = self.g.add(NodeKind::Link, None, Some(expr.span));
                        cpt.set_rvalue(node);
                    }
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                self.process_expr(cpt, frame, scope, array)?;
                let array_value = self.rvalue(cpt, array);
                self.process_expr(cpt, frame, scope, index)?;
                let index_value = self.rvalue(cpt, index);
                match self.res.refs.get(&expr.id).cloned() {
                    Some(r) => {
                        let value = cpt.value_of(&mut self.g, &r);
                        let node =
                            self.g
                                .add(NodeKind::ArrayAccess, Some(r), Some(expr.span));
                        self.g.connect(array_value, node, EdgeLabel::Array);
                        self.g.connect(index_value, node, EdgeLabel::Index);
                        self.g.connect(value, node, EdgeLabel::Value);
                        cpt.set_rvalue(node);
                    }
                    None => {
                        let node = self.g.add(NodeKind::Link, None, Some(expr.span));
                        cpt.set_rvalue(node);
                    }
                }
            }
            ExprKind::Unary {
                op,
                operand,
                prefix,
            } => {
                if op == "++" || op == "--" {
                    self.process_expr(cpt, frame, scope, operand)?;
                    let old = self.rvalue(cpt, operand);
                    let assign = self.process_assignment(cpt, frame, scope, operand)?;
                    let node = self.g.add(
                        NodeKind::Unary {
                            op: op.clone(),
                            prefix: *prefix,
                        },
                        None,
                        Some(expr.span),
                    );
                    self.g.connect(old, node, EdgeLabel::Value);
                    if let Some((assign, r)) = assign {
                        self.g.connect(node, assign, EdgeLabel::Value);
                        cpt.set_output(r, assign);
                    }
                    cpt.set_rvalue(if *prefix { node } else { old });
                } else {
                    self.process_expr(cpt, frame, scope, operand)?;
                    let value = self.rvalue(cpt, operand);
                    let node = self.g.add(
                        NodeKind::Unary {
                            op: op.clone(),
                            prefix: *prefix,
                        },
                        None,
                        Some(expr.span),
                    );
                    self.g.connect(value, node, EdgeLabel::Value);
                    cpt.set_rvalue(node);
                }
            }
            ExprKind::Binary { op, left, right } => {
                self.process_expr(cpt, frame, scope, left)?;
                let l = self.rvalue(cpt, left);
                self.process_expr(cpt, frame, scope, right)?;
                let r = self.rvalue(cpt, right);
                let node = self
                    .g
                    .add(NodeKind::Binary { op: op.clone() }, None, Some(expr.span));
                self.g.connect(l, node, EdgeLabel::L);
                self.g.connect(r, node, EdgeLabel::R);
                cpt.set_rvalue(node);
            }
            ExprKind::Paren(inner) => {
                self.process_expr(cpt, frame, scope, inner)?;
            }
            ExprKind::Assign { op, target, value } => {
                let assign = self.process_assignment(cpt, frame, scope, target)?;
                self.process_expr(cpt, frame, scope, value)?;
                let rhs = self.rvalue(cpt, value);
                match assign {
                    Some((assign, r)) => {
                        let input = match op {
                            // Compound assignment routes through the
                            // operator over (old value, rhs).
                            Some(op) => {
                                let old = cpt.value_of(&mut self.g, &r);
                                let node = self.g.add(
                                    NodeKind::Binary { op: op.clone() },
                                    None,
                                    Some(expr.span),
                                );
                                self.g.connect(old, node, EdgeLabel::L);
                                self.g.connect(rhs, node, EdgeLabel::R);
                                node
                            }
                            None => rhs,
                        };
                        self.g.connect(input, assign, EdgeLabel::Value);
                        cpt.set_output(r, assign);
                        cpt.set_rvalue(assign);
                    }
                    None => cpt.set_rvalue(rhs),
                }
            }
            ExprKind::MethodCall {
                receiver,
                name,
                args,
            } => {
                let obj = match receiver {
                    Some(recv) if self.res.type_qualifiers.contains(&recv.id) => None,
                    Some(recv) if matches!(recv.kind, ExprKind::Super) => self
                        .scopes
                        .lookup_this()
                        .map(|r| cpt.value_of(&mut self.g, &r)),
                    Some(recv) => {
                        self.process_expr(cpt, frame, scope, recv)?;
                        Some(self.rvalue(cpt, recv))
                    }
                    None => self
                        .scopes
                        .lookup_this()
                        .map(|r| cpt.value_of(&mut self.g, &r)),
                };
                let callee = self.res.calls.get(&expr.id).copied();
                let call = self.g.add(
                    NodeKind::Call {
                        name: name.clone(),
                        signature: callee.map(|m| self.table.method(m).signature.clone()),
                        unknown_effect: self.res.unknown_calls.contains(&expr.id),
                    },
                    None,
                    Some(expr.span),
                );
                if let Some(obj) = obj {
                    self.g.connect(obj, call, EdgeLabel::Obj);
                }
                for (i, arg) in args.iter().enumerate() {
                    self.process_expr(cpt, frame, scope, arg)?;
                    let v = self.rvalue(cpt, arg);
                    self.g.connect(v, call, EdgeLabel::Arg(i as u32));
                }
                self.apply_call_effects(cpt, expr.id, call);
                cpt.set_rvalue(call);
            }
            ExprKind::New { ty, args } => {
                let callee = self.res.calls.get(&expr.id).copied();
                let node = self.g.add(
                    NodeKind::New {
                        ty: ty.to_string(),
                        signature: callee.map(|m| self.table.method(m).signature.clone()),
                        unknown_effect: self.res.unknown_calls.contains(&expr.id),
                    },
                    None,
                    Some(expr.span),
                );
                for (i, arg) in args.iter().enumerate() {
                    self.process_expr(cpt, frame, scope, arg)?;
                    let v = self.rvalue(cpt, arg);
                    self.g.connect(v, node, EdgeLabel::Arg(i as u32));
                }
                self.apply_call_effects(cpt, expr.id, node);
                cpt.set_rvalue(node);
            }
            ExprKind::ArrayNew { dims, init, .. } => {
                for d in dims {
                    self.process_expr(cpt, frame, scope, d)?;
                }
                match init {
                    Some(init) => self.process_expr(cpt, frame, scope, init)?,
                    None => {
                        let node = self
                            .g
                            .add(NodeKind::ArrayValue { len: 0 }, None, Some(expr.span));
                        cpt.set_rvalue(node);
                    }
                }
            }
            ExprKind::ArrayInit(values) => {
                let node = self.g.add(
                    NodeKind::ArrayValue {
                        len: values.len() as u32,
                    },
                    None,
                    Some(expr.span),
                );
                for (i, v) in values.iter().enumerate() {
                    self.process_expr(cpt, frame, scope, v)?;
                    let value = self.rvalue(cpt, v);
                    self.g.connect(value, node, EdgeLabel::Elem(i as u32));
                }
                cpt.set_rvalue(node);
            }
            ExprKind::Cast { ty, value } => {
                self.process_expr(cpt, frame, scope, value)?;
                let v = self.rvalue(cpt, value);
                let node = self.g.add(
                    NodeKind::Cast { ty: ty.to_string() },
                    None,
                    Some(expr.span),
                );
                self.g.connect(v, node, EdgeLabel::Value);
                cpt.set_rvalue(node);
            }
            ExprKind::InstanceOf { value, ty } => {
                self.process_expr(cpt, frame, scope, value)?;
                let v = self.rvalue(cpt, value);
                let node = self.g.add(
                    NodeKind::InstanceOf { ty: ty.to_string() },
                    None,
                    Some(expr.span),
                );
                self.g.connect(v, node, EdgeLabel::Value);
                cpt.set_rvalue(node);
            }
            ExprKind::Ternary {
                cond,
                then_value,
                else_value,
            } => {
                self.process_expr(cpt, frame, scope, cond)?;
                let cond_value = self.rvalue(cpt, cond);
                self.process_expr(cpt, frame, scope, then_value)?;
                let t = self.rvalue(cpt, then_value);
                self.process_expr(cpt, frame, scope, else_value)?;
                let e = self.rvalue(cpt, else_value);
                let join = self.g.add(
                    NodeKind::Join {
                        has_true: false,
                        has_false: false,
                    },
                    None,
                    Some(expr.span),
                );
                self.g.connect(cond_value, join, EdgeLabel::Cond);
                self.g.join_recv(join, true, t);
                self.g.join_recv(join, false, e);
                cpt.set_rvalue(join);
            }
            ExprKind::Lambda { .. } => {
                let captures = self.res.lambdas.get(&expr.id).cloned().unwrap_or_default();
                let node = self.g.add(
                    NodeKind::Lambda {
                        captures: captures.len() as u32,
                    },
                    None,
                    Some(expr.span),
                );
                for (orig, snap) in captures {
                    let value = cpt.value_of(&mut self.g, &orig);
                    self.g
                        .connect(value, node, EdgeLabel::RefRead(snap.name().to_string()));
                }
                cpt.set_rvalue(node);
            }
            ExprKind::Unsupported(kind) => {
                return Err(AnalysisError::unsupported(kind.clone(), Some(expr.span)));
            }
        }
        Ok(())
    }

    /// Build the assignment-target node for an lvalue expression.
    /// Returns the assign node and the written ref; the value edge is
    /// connected by the caller once the right side is built.
    fn process_assignment(
        &mut self,
        cpt: &mut Component,
        frame: FrameId,
        scope: ScopeId,
        expr: &Expr,
    ) -> Result<Option<(NodeIndex, Ref)>, AnalysisError> {
        match &expr.kind {
            ExprKind::Name(_) => match self.res.refs.get(&expr.id).cloned() {
                Some(r) if matches!(r.kind(), RefKind::Field { .. }) => {
                    let node = self
                        .g
                        .add(NodeKind::FieldAssign, Some(r.clone()), Some(expr.span));
                    if let Some(this_ref) = self.scopes.lookup_this() {
                        let obj = cpt.value_of(&mut self.g, &this_ref);
                        self.g.connect(obj, node, EdgeLabel::Obj);
                    }
                    Ok(Some((node, r)))
                }
                Some(r) => {
                    let node = self
                        .g
                        .add(NodeKind::Assign, Some(r.clone()), Some(expr.span));
                    Ok(Some((node, r)))
                }
                None => Ok(None),
            },
            ExprKind::FieldAccess { object, .. } => {
                let obj = if self.res.type_qualifiers.contains(&object.id) {
                    None
                } else {
                    self.process_expr(cpt, frame, scope, object)?;
                    Some(self.rvalue(cpt, object))
                };
                match self.res.refs.get(&expr.id).cloned() {
                    Some(r) => {
                        let node = self.g.add(
                            NodeKind::FieldAssign,
                            Some(r.clone()),
                            Some(expr.span),
                        );
                        if let Some(obj) = obj {
                            self.g.connect(obj, node, EdgeLabel::Obj);
                        }
                        Ok(Some((node, r)))
                    }
                    None => Ok(None),
                }
            }
            ExprKind::ArrayAccess { array, index } => {
                self.process_expr(cpt, frame, scope, array)?;
                let array_value = self.rvalue(cpt, array);
                self.process_expr(cpt, frame, scope, index)?;
                let index_value = self.rvalue(cpt, index);
                match self.res.refs.get(&expr.id).cloned() {
                    Some(r) => {
                        let node = self.g.add(
                            NodeKind::ArrayAssign,
                            Some(r.clone()),
                            Some(expr.span),
                        );
                        self.g.connect(array_value, node, EdgeLabel::Array);
                        self.g.connect(index_value, node, EdgeLabel::Index);
                        Ok(Some((node, r)))
                    }
                    None => Ok(None),
                }
            }
            ExprKind::Paren(inner) => self.process_assignment(cpt, frame, scope, inner),
            other => Err(AnalysisError::unsupported(
                format!("assignment to {}", other.kind()),
                Some(expr.span),
            )),
        }
    }

    /// Wire a call node's conservative effects: it reads the current
    /// values of the resolved method's (transitive, override-closed)
    /// input refs and writes fresh values to its output refs. Declared
    /// exceptions raise exit candidates toward their handler.
    fn apply_call_effects(
        &mut self,
        cpt: &mut Component,
        node_id: crate::ast::NodeId,
        call: NodeIndex,
    ) {
        if let Some(&callee) = self.res.calls.get(&node_id) {
            let mut reads = crate::scopes::RefSet::new();
            let mut writes = crate::scopes::RefSet::new();
            let closure = if matches!(self.table.method(callee).style, CallStyle::Constructor) {
                vec![callee]
            } else {
                self.table.override_closure(callee)
            };
            for m in closure {
                let method = self.table.method(m);
                reads.extend(
                    method
                        .input_refs
                        .iter()
                        .filter(|r| r.is_exported_effect())
                        .cloned(),
                );
                writes.extend(
                    method
                        .output_refs
                        .iter()
                        .filter(|r| r.is_exported_effect())
                        .cloned(),
                );
            }
            for r in reads {
                let value = cpt.value_of(&mut self.g, &r);
                self.g
                    .connect(value, call, EdgeLabel::RefRead(r.name().to_string()));
            }
            for r in writes {
                let assign = self.g.add(NodeKind::Assign, Some(r.clone()), None);
                self.g.connect(call, assign, EdgeLabel::Value);
                cpt.set_output(r, assign);
            }
        }
        if let Some(exits) = self.res.call_throws.get(&node_id).cloned() {
            for (exc_ref, target) in exits {
                cpt.add_exit(Exit {
                    node: call,
                    ref_: exc_ref,
                    target,
                    cont: false,
                });
            }
        }
    }
}
