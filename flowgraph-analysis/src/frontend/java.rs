//! Java front end: tree-sitter CST → normalized syntax tree.
//!
//! Parsing is error-tolerant: a unit with ERROR nodes still normalizes
//! best-effort, and constructs outside the modeled set become
//! `Unsupported` markers that abort only their enclosing method.

use tracing::warn;
use tree_sitter::{Node, Parser};

use flowgraph_core::errors::ParseError;
use flowgraph_core::types::Span;

use crate::ast::{
    CatchClause, CompilationUnit, Expr, ExprKind, FieldDecl, LambdaBody, LiteralKind, MethodDecl,
    NodeIdGen, ParamDecl, Stmt, StmtKind, SwitchCase, TypeDecl, TypeKind, TypeName,
};

/// Parses Java source into normalized compilation units.
pub struct JavaFrontend {
    parser: Parser,
}

impl JavaFrontend {
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| ParseError::Grammar {
                message: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    /// Parse one source file. `unit` names the file for diagnostics.
    pub fn parse_unit(&mut self, unit: &str, source: &str) -> Result<CompilationUnit, ParseError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ParseError::NoTree {
                unit: unit.to_string(),
            })?;
        let root = tree.root_node();
        if root.has_error() {
            warn!(unit, "source has syntax errors; normalizing best-effort");
        }
        let mut norm = Normalizer {
            src: source,
            ids: NodeIdGen::new(),
        };
        Ok(norm.unit(root))
    }
}

struct Normalizer<'s> {
    src: &'s str,
    ids: NodeIdGen,
}

impl<'s> Normalizer<'s> {
    fn text(&self, node: Node) -> &'s str {
        node.utf8_text(self.src.as_bytes()).unwrap_or("")
    }

    fn span(&self, node: Node) -> Span {
        let s = node.start_position();
        let e = node.end_position();
        Span::new(s.row as u32, s.column as u32, e.row as u32, e.column as u32)
    }

    fn named_children<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor).collect()
    }

    // ---- unit / types ----

    fn unit(&mut self, root: Node) -> CompilationUnit {
        let mut package = None;
        let mut imports = Vec::new();
        let mut types = Vec::new();
        for child in self.named_children(root) {
            match child.kind() {
                "package_declaration" => {
                    package = self
                        .named_children(child)
                        .into_iter()
                        .find(|n| {
                            matches!(n.kind(), "scoped_identifier" | "identifier")
                        })
                        .map(|n| self.text(n).to_string());
                }
                "import_declaration" => {
                    if let Some(path) = self
                        .named_children(child)
                        .into_iter()
                        .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                    {
                        imports.push(self.text(path).to_string());
                    }
                }
                "class_declaration" | "interface_declaration" | "enum_declaration" => {
                    if let Some(decl) = self.type_decl(child) {
                        types.push(decl);
                    }
                }
                _ => {}
            }
        }
        CompilationUnit {
            package,
            imports,
            types,
        }
    }

    fn type_decl(&mut self, node: Node) -> Option<TypeDecl> {
        let kind = match node.kind() {
            "class_declaration" => TypeKind::Class,
            "interface_declaration" => TypeKind::Interface,
            "enum_declaration" => TypeKind::Enum,
            _ => return None,
        };
        let name = self.text(node.child_by_field_name("name")?).to_string();
        let mut type_params = Vec::new();
        if let Some(tp) = node.child_by_field_name("type_parameters") {
            for p in self.named_children(tp) {
                if p.kind() == "type_parameter" {
                    if let Some(id) = self
                        .named_children(p)
                        .into_iter()
                        .find(|n| n.kind() == "identifier" || n.kind() == "type_identifier")
                    {
                        type_params.push(self.text(id).to_string());
                    }
                }
            }
        }
        let superclass = node
            .child_by_field_name("superclass")
            .and_then(|sc| self.named_children(sc).into_iter().next())
            .map(|t| self.type_name(t));
        let mut interfaces = Vec::new();
        if let Some(ifaces) = node.child_by_field_name("interfaces") {
            for list in self.named_children(ifaces) {
                if list.kind() == "type_list" {
                    for t in self.named_children(list) {
                        interfaces.push(self.type_name(t));
                    }
                }
            }
        }
        // Interface `extends` list resolves through the same slot.
        for child in self.named_children(node) {
            if child.kind() == "extends_interfaces" {
                for list in self.named_children(child) {
                    if list.kind() == "type_list" {
                        for t in self.named_children(list) {
                            interfaces.push(self.type_name(t));
                        }
                    }
                }
            }
        }

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut nested = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            self.type_body(body, kind, &mut fields, &mut methods, &mut nested);
        }
        Some(TypeDecl {
            kind,
            name,
            type_params,
            superclass,
            interfaces,
            fields,
            methods,
            nested,
            span: self.span(node),
        })
    }

    fn type_body(
        &mut self,
        body: Node,
        kind: TypeKind,
        fields: &mut Vec<FieldDecl>,
        methods: &mut Vec<MethodDecl>,
        nested: &mut Vec<TypeDecl>,
    ) {
        for member in self.named_children(body) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    self.field_decl(member, fields);
                }
                "method_declaration" => {
                    if let Some(m) = self.method_decl(member, false) {
                        methods.push(m);
                    }
                }
                "constructor_declaration" => {
                    if let Some(m) = self.method_decl(member, true) {
                        methods.push(m);
                    }
                }
                "class_declaration" | "interface_declaration" | "enum_declaration" => {
                    if let Some(t) = self.type_decl(member) {
                        nested.push(t);
                    }
                }
                "enum_constant" if kind == TypeKind::Enum => {
                    if let Some(name) = member.child_by_field_name("name") {
                        fields.push(FieldDecl {
                            name: self.text(name).to_string(),
                            ty: TypeName::simple("?enum"),
                            is_static: true,
                            init: None,
                            span: self.span(member),
                        });
                    }
                }
                "enum_body_declarations" => {
                    self.type_body(member, kind, fields, methods, nested);
                }
                _ => {}
            }
        }
    }

    fn field_decl(&mut self, node: Node, fields: &mut Vec<FieldDecl>) {
        let Some(ty_node) = node.child_by_field_name("type") else {
            return;
        };
        let base_ty = self.type_name(ty_node);
        let is_static = self.has_modifier(node, "static");
        for decl in self.named_children(node) {
            if decl.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = decl.child_by_field_name("name") else {
                continue;
            };
            let extra = self.declarator_dims(decl);
            let init = decl.child_by_field_name("value").map(|v| self.expr(v));
            fields.push(FieldDecl {
                name: self.text(name).to_string(),
                ty: base_ty.clone().array(extra),
                is_static,
                init,
                span: self.span(decl),
            });
        }
    }

    fn method_decl(&mut self, node: Node, is_constructor: bool) -> Option<MethodDecl> {
        let name = self.text(node.child_by_field_name("name")?).to_string();
        let is_static = self.has_modifier(node, "static");
        let mut type_params = Vec::new();
        if let Some(tp) = node.child_by_field_name("type_parameters") {
            for p in self.named_children(tp) {
                if p.kind() == "type_parameter" {
                    if let Some(id) = self
                        .named_children(p)
                        .into_iter()
                        .find(|n| n.kind() == "identifier" || n.kind() == "type_identifier")
                    {
                        type_params.push(self.text(id).to_string());
                    }
                }
            }
        }
        let mut params = Vec::new();
        if let Some(plist) = node.child_by_field_name("parameters") {
            for p in self.named_children(plist) {
                match p.kind() {
                    "formal_parameter" => {
                        let (Some(ty), Some(name)) =
                            (p.child_by_field_name("type"), p.child_by_field_name("name"))
                        else {
                            continue;
                        };
                        params.push(ParamDecl {
                            name: self.text(name).to_string(),
                            ty: self.type_name(ty),
                            varargs: false,
                        });
                    }
                    "spread_parameter" => {
                        // `Type... name` — tree shape: type + declarator.
                        let ty = self
                            .named_children(p)
                            .into_iter()
                            .find(|n| is_type_node(n.kind()))
                            .map(|t| self.type_name(t))
                            .unwrap_or_else(|| TypeName::simple("?"));
                        let name = self
                            .named_children(p)
                            .into_iter()
                            .find(|n| n.kind() == "variable_declarator")
                            .and_then(|d| d.child_by_field_name("name"))
                            .map(|n| self.text(n).to_string());
                        if let Some(name) = name {
                            params.push(ParamDecl {
                                name,
                                ty,
                                varargs: true,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        let return_type = if is_constructor {
            None
        } else {
            node.child_by_field_name("type").map(|t| self.type_name(t))
        };
        let mut throws = Vec::new();
        for child in self.named_children(node) {
            if child.kind() == "throws" {
                for t in self.named_children(child) {
                    throws.push(self.type_name(t));
                }
            }
        }
        let body = node.child_by_field_name("body").map(|b| self.stmt(b));
        Some(MethodDecl {
            id: self.ids.fresh(),
            name,
            is_constructor,
            is_static,
            type_params,
            params,
            return_type,
            throws,
            body,
            span: self.span(node),
        })
    }

    fn has_modifier(&self, node: Node, which: &str) -> bool {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "modifiers" {
                return self.text(child).split_whitespace().any(|m| m == which);
            }
        }
        false
    }

    fn declarator_dims(&self, decl: Node) -> u32 {
        decl.child_by_field_name("dimensions")
            .map(|d| self.text(d).matches('[').count() as u32)
            .unwrap_or(0)
    }

    // ---- types ----

    fn type_name(&mut self, node: Node) -> TypeName {
        match node.kind() {
            "array_type" => {
                let elem = node
                    .child_by_field_name("element")
                    .map(|e| self.type_name(e))
                    .unwrap_or_else(|| TypeName::simple("?"));
                let dims = node
                    .child_by_field_name("dimensions")
                    .map(|d| self.text(d).matches('[').count() as u32)
                    .unwrap_or(1);
                elem.array(dims)
            }
            "generic_type" => {
                let mut base = None;
                let mut args = Vec::new();
                for child in self.named_children(node) {
                    match child.kind() {
                        "type_identifier" | "scoped_type_identifier" => {
                            base = Some(self.text(child).to_string());
                        }
                        "type_arguments" => {
                            for arg in self.named_children(child) {
                                args.push(self.type_name(arg));
                            }
                        }
                        _ => {}
                    }
                }
                TypeName {
                    name: base.unwrap_or_else(|| "?".to_string()),
                    args,
                    dims: 0,
                }
            }
            _ => TypeName::simple(self.text(node)),
        }
    }

    // ---- statements ----

    fn stmt(&mut self, node: Node) -> Stmt {
        let id = self.ids.fresh();
        let span = self.span(node);
        let kind = self.stmt_kind(node);
        Stmt { id, span, kind }
    }

    fn stmt_kind(&mut self, node: Node) -> StmtKind {
        match node.kind() {
            "block" | "constructor_body" => {
                let mut stmts = Vec::new();
                for child in self.named_children(node) {
                    if child.kind() == "explicit_constructor_invocation" {
                        stmts.push(self.constructor_invocation(child));
                    } else if is_statement(child.kind()) {
                        stmts.push(self.stmt(child));
                    }
                }
                StmtKind::Block(stmts)
            }
            ";" | "empty_statement" => StmtKind::Empty,
            "local_variable_declaration" => {
                let ty = node
                    .child_by_field_name("type")
                    .map(|t| self.type_name(t))
                    .unwrap_or_else(|| TypeName::simple("?"));
                let mut decls = Vec::new();
                for decl in self.named_children(node) {
                    if decl.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name) = decl.child_by_field_name("name") else {
                        continue;
                    };
                    let init = decl.child_by_field_name("value").map(|v| self.expr(v));
                    decls.push((self.text(name).to_string(), init));
                }
                StmtKind::LocalDecl { ty, decls }
            }
            "expression_statement" => match self.named_children(node).into_iter().next() {
                Some(e) => StmtKind::Expr(self.expr(e)),
                None => StmtKind::Empty,
            },
            "if_statement" => {
                let cond = self.condition_expr(node);
                let then_branch = node
                    .child_by_field_name("consequence")
                    .map(|n| Box::new(self.stmt(n)))
                    .unwrap_or_else(|| Box::new(self.empty_stmt(node)));
                let else_branch = node
                    .child_by_field_name("alternative")
                    .map(|n| Box::new(self.stmt(n)));
                StmtKind::If {
                    cond,
                    then_branch,
                    else_branch,
                }
            }
            "while_statement" => StmtKind::While {
                cond: self.condition_expr(node),
                body: Box::new(self.body_stmt(node)),
            },
            "do_statement" => StmtKind::Do {
                body: Box::new(self.body_stmt(node)),
                cond: self.condition_expr(node),
            },
            "for_statement" => {
                let mut init = Vec::new();
                let init_nodes: Vec<Node> = {
                    let mut cursor = node.walk();
                    node.children_by_field_name("init", &mut cursor).collect()
                };
                for n in init_nodes {
                    if n.kind() == "local_variable_declaration" {
                        init.push(self.stmt(n));
                    } else {
                        let e = self.expr(n);
                        init.push(Stmt {
                            id: self.ids.fresh(),
                            span: e.span,
                            kind: StmtKind::Expr(e),
                        });
                    }
                }
                let cond = node.child_by_field_name("condition").map(|n| self.expr(n));
                let update_nodes: Vec<Node> = {
                    let mut cursor = node.walk();
                    node.children_by_field_name("update", &mut cursor).collect()
                };
                let update = update_nodes.into_iter().map(|n| self.expr(n)).collect();
                StmtKind::For {
                    init,
                    cond,
                    update,
                    body: Box::new(self.body_stmt(node)),
                }
            }
            "enhanced_for_statement" => {
                let var_ty = node
                    .child_by_field_name("type")
                    .map(|t| self.type_name(t))
                    .unwrap_or_else(|| TypeName::simple("?"));
                let var_name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                let iterable = node
                    .child_by_field_name("value")
                    .map(|n| self.expr(n))
                    .unwrap_or_else(|| self.missing_expr(node));
                StmtKind::ForEach {
                    var_ty,
                    var_name,
                    iterable,
                    body: Box::new(self.body_stmt(node)),
                }
            }
            "switch_expression" | "switch_statement" => self.switch_stmt(node),
            "return_statement" => {
                StmtKind::Return(self.named_children(node).into_iter().next().map(|e| self.expr(e)))
            }
            "break_statement" => StmtKind::Break(
                self.named_children(node)
                    .into_iter()
                    .find(|n| n.kind() == "identifier")
                    .map(|n| self.text(n).to_string()),
            ),
            "continue_statement" => StmtKind::Continue(
                self.named_children(node)
                    .into_iter()
                    .find(|n| n.kind() == "identifier")
                    .map(|n| self.text(n).to_string()),
            ),
            "labeled_statement" => {
                let label = self
                    .named_children(node)
                    .into_iter()
                    .find(|n| n.kind() == "identifier")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                let body = self
                    .named_children(node)
                    .into_iter()
                    .find(|n| is_statement(n.kind()))
                    .map(|n| Box::new(self.stmt(n)))
                    .unwrap_or_else(|| Box::new(self.empty_stmt(node)));
                StmtKind::Labeled { label, body }
            }
            "synchronized_statement" => {
                // The lock expression is an unfielded parenthesized child.
                let lock = self
                    .named_children(node)
                    .into_iter()
                    .find(|n| n.kind() == "parenthesized_expression")
                    .map(|n| self.unwrap_parens(n))
                    .unwrap_or_else(|| self.missing_expr(node));
                let body = self
                    .named_children(node)
                    .into_iter()
                    .find(|n| n.kind() == "block")
                    .map(|n| Box::new(self.stmt(n)))
                    .unwrap_or_else(|| Box::new(self.empty_stmt(node)));
                StmtKind::Synchronized { lock, body }
            }
            "try_statement" | "try_with_resources_statement" => self.try_stmt(node),
            "throw_statement" => match self.named_children(node).into_iter().next() {
                Some(e) => StmtKind::Throw(self.expr(e)),
                None => StmtKind::Empty,
            },
            "assert_statement" => {
                let mut exprs = self.named_children(node).into_iter();
                match exprs.next() {
                    Some(c) => StmtKind::Assert {
                        cond: self.expr(c),
                        message: exprs.next().map(|e| self.expr(e)),
                    },
                    None => StmtKind::Empty,
                }
            }
            "explicit_constructor_invocation" => self.constructor_invocation(node).kind,
            "local_class_declaration" | "class_declaration" => {
                // Inline classes are collected separately by the driver.
                StmtKind::Empty
            }
            other => StmtKind::Unsupported(other.to_string()),
        }
    }

    fn switch_stmt(&mut self, node: Node) -> StmtKind {
        let value = node
            .child_by_field_name("condition")
            .map(|c| self.unwrap_parens(c))
            .unwrap_or_else(|| self.missing_expr(node));
        let mut cases = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for group in self.named_children(body) {
                match group.kind() {
                    "switch_block_statement_group" => {
                        let mut labels = Vec::new();
                        let mut stmts = Vec::new();
                        for child in self.named_children(group) {
                            if child.kind() == "switch_label" {
                                let exprs = self.named_children(child);
                                if exprs.is_empty() {
                                    labels.push(None); // default
                                } else {
                                    for e in exprs {
                                        labels.push(Some(self.expr(e)));
                                    }
                                }
                            } else if is_statement(child.kind()) {
                                stmts.push(self.stmt(child));
                            }
                        }
                        cases.push(SwitchCase {
                            id: self.ids.fresh(),
                            span: self.span(group),
                            labels,
                            body: stmts,
                        });
                    }
                    "switch_rule" => {
                        return StmtKind::Unsupported("switch_rule".to_string());
                    }
                    _ => {}
                }
            }
        }
        StmtKind::Switch { value, cases }
    }

    fn try_stmt(&mut self, node: Node) -> StmtKind {
        let mut resources = Vec::new();
        if let Some(spec) = node.child_by_field_name("resources") {
            for r in self.named_children(spec) {
                if r.kind() == "resource" {
                    // A resource is a scoped local declaration.
                    let ty = r
                        .child_by_field_name("type")
                        .map(|t| self.type_name(t))
                        .unwrap_or_else(|| TypeName::simple("?"));
                    let name = r
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string());
                    let value = r.child_by_field_name("value").map(|v| self.expr(v));
                    if let Some(name) = name {
                        resources.push(Stmt {
                            id: self.ids.fresh(),
                            span: self.span(r),
                            kind: StmtKind::LocalDecl {
                                ty,
                                decls: vec![(name, value)],
                            },
                        });
                    }
                }
            }
        }
        let body = node
            .child_by_field_name("body")
            .map(|b| Box::new(self.stmt(b)))
            .unwrap_or_else(|| Box::new(self.empty_stmt(node)));
        let mut catches = Vec::new();
        let mut finally = None;
        for child in self.named_children(node) {
            match child.kind() {
                "catch_clause" => {
                    let param = self
                        .named_children(child)
                        .into_iter()
                        .find(|n| n.kind() == "catch_formal_parameter");
                    let (ty, name) = match param {
                        Some(p) => {
                            // Multi-catch takes the first alternative.
                            let ty = self
                                .named_children(p)
                                .into_iter()
                                .find(|n| n.kind() == "catch_type")
                                .and_then(|ct| self.named_children(ct).into_iter().next())
                                .map(|t| self.type_name(t))
                                .unwrap_or_else(|| TypeName::simple("Throwable"));
                            let name = self
                                .named_children(p)
                                .into_iter()
                                .find(|n| n.kind() == "identifier")
                                .map(|n| self.text(n).to_string())
                                .unwrap_or_else(|| "e".to_string());
                            (ty, name)
                        }
                        None => (TypeName::simple("Throwable"), "e".to_string()),
                    };
                    let body = child
                        .child_by_field_name("body")
                        .map(|b| self.stmt(b))
                        .unwrap_or_else(|| self.empty_stmt(child));
                    catches.push(CatchClause {
                        id: self.ids.fresh(),
                        span: self.span(child),
                        ty,
                        name,
                        body,
                    });
                }
                "finally_clause" => {
                    finally = self
                        .named_children(child)
                        .into_iter()
                        .find(|n| n.kind() == "block")
                        .map(|b| Box::new(self.stmt(b)));
                }
                _ => {}
            }
        }
        StmtKind::Try {
            resources,
            body,
            catches,
            finally,
        }
    }

    fn constructor_invocation(&mut self, node: Node) -> Stmt {
        let id = self.ids.fresh();
        let span = self.span(node);
        let mut is_super = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "super" {
                is_super = true;
            }
        }
        let args = node
            .child_by_field_name("arguments")
            .map(|a| {
                self.named_children(a)
                    .into_iter()
                    .map(|e| self.expr(e))
                    .collect()
            })
            .unwrap_or_default();
        let kind = if is_super {
            StmtKind::SuperCall(args)
        } else {
            StmtKind::ThisCall(args)
        };
        Stmt { id, span, kind }
    }

    fn condition_expr(&mut self, node: Node) -> Expr {
        node.child_by_field_name("condition")
            .map(|c| self.unwrap_parens(c))
            .unwrap_or_else(|| self.missing_expr(node))
    }

    fn body_stmt(&mut self, node: Node) -> Stmt {
        node.child_by_field_name("body")
            .map(|b| self.stmt(b))
            .unwrap_or_else(|| self.empty_stmt(node))
    }

    fn unwrap_parens(&mut self, node: Node) -> Expr {
        if node.kind() == "parenthesized_expression" {
            if let Some(inner) = self.named_children(node).into_iter().next() {
                return self.expr(inner);
            }
        }
        self.expr(node)
    }

    fn empty_stmt(&mut self, node: Node) -> Stmt {
        Stmt {
            id: self.ids.fresh(),
            span: self.span(node),
            kind: StmtKind::Empty,
        }
    }

    fn missing_expr(&mut self, node: Node) -> Expr {
        Expr {
            id: self.ids.fresh(),
            span: self.span(node),
            kind: ExprKind::Literal {
                kind: LiteralKind::Null,
                text: "null".to_string(),
            },
        }
    }

    // ---- expressions ----

    fn expr(&mut self, node: Node) -> Expr {
        let id = self.ids.fresh();
        let span = self.span(node);
        let kind = self.expr_kind(node);
        Expr { id, span, kind }
    }

    fn expr_kind(&mut self, node: Node) -> ExprKind {
        match node.kind() {
            "identifier" => ExprKind::Name(self.text(node).to_string()),
            "this" => ExprKind::This,
            "super" => ExprKind::Super,
            "true" | "false" => ExprKind::Literal {
                kind: LiteralKind::Bool,
                text: self.text(node).to_string(),
            },
            "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal" => ExprKind::Literal {
                kind: LiteralKind::Int,
                text: self.text(node).to_string(),
            },
            "decimal_floating_point_literal" | "hex_floating_point_literal" => ExprKind::Literal {
                kind: LiteralKind::Float,
                text: self.text(node).to_string(),
            },
            "character_literal" => ExprKind::Literal {
                kind: LiteralKind::Char,
                text: self.text(node).to_string(),
            },
            "string_literal" => ExprKind::Literal {
                kind: LiteralKind::Str,
                text: self.text(node).to_string(),
            },
            "null_literal" => ExprKind::Literal {
                kind: LiteralKind::Null,
                text: "null".to_string(),
            },
            "class_literal" => {
                let ty = self
                    .named_children(node)
                    .into_iter()
                    .next()
                    .map(|t| self.type_name(t))
                    .unwrap_or_else(|| TypeName::simple("?"));
                ExprKind::TypeLit(ty)
            }
            "parenthesized_expression" => match self.named_children(node).into_iter().next() {
                Some(inner) => ExprKind::Paren(Box::new(self.expr(inner))),
                None => ExprKind::Unsupported("parenthesized_expression".into()),
            },
            "field_access" => {
                let object = node
                    .child_by_field_name("object")
                    .map(|o| Box::new(self.expr(o)));
                let field = node
                    .child_by_field_name("field")
                    .map(|f| self.text(f).to_string());
                match (object, field) {
                    (Some(object), Some(field)) => ExprKind::FieldAccess { object, field },
                    _ => ExprKind::Unsupported("field_access".into()),
                }
            }
            "array_access" => {
                let array = node
                    .child_by_field_name("array")
                    .map(|a| Box::new(self.expr(a)));
                let index = node
                    .child_by_field_name("index")
                    .map(|i| Box::new(self.expr(i)));
                match (array, index) {
                    (Some(array), Some(index)) => ExprKind::ArrayAccess { array, index },
                    _ => ExprKind::Unsupported("array_access".into()),
                }
            }
            "binary_expression" => {
                let left = node.child_by_field_name("left").map(|l| self.expr(l));
                let right = node.child_by_field_name("right").map(|r| self.expr(r));
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_string());
                match (left, op, right) {
                    (Some(l), Some(op), Some(r)) => ExprKind::Binary {
                        op,
                        left: Box::new(l),
                        right: Box::new(r),
                    },
                    _ => ExprKind::Unsupported("binary_expression".into()),
                }
            }
            "unary_expression" => {
                let op = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_string())
                    .unwrap_or_default();
                match node.child_by_field_name("operand") {
                    Some(operand) => ExprKind::Unary {
                        op,
                        operand: Box::new(self.expr(operand)),
                        prefix: true,
                    },
                    None => ExprKind::Unsupported("unary_expression".into()),
                }
            }
            "update_expression" => {
                // ++x / x++ — the operator token sits before or after
                // the single named operand.
                let prefix = node
                    .child(0)
                    .map(|c| c.kind() == "++" || c.kind() == "--")
                    .unwrap_or(false);
                let op = if self.text(node).contains("++") {
                    "++"
                } else {
                    "--"
                };
                match self.named_children(node).into_iter().next() {
                    Some(operand) => ExprKind::Unary {
                        op: op.to_string(),
                        operand: Box::new(self.expr(operand)),
                        prefix,
                    },
                    None => ExprKind::Unsupported("update_expression".into()),
                }
            }
            "assignment_expression" => {
                let left = node.child_by_field_name("left").map(|l| self.expr(l));
                let right = node.child_by_field_name("right").map(|r| self.expr(r));
                let op_text = node
                    .child_by_field_name("operator")
                    .map(|o| self.text(o).to_string())
                    .unwrap_or_else(|| "=".to_string());
                let op = match op_text.as_str() {
                    "=" => None,
                    compound => Some(compound.trim_end_matches('=').to_string()),
                };
                match (left, right) {
                    (Some(target), Some(value)) => ExprKind::Assign {
                        op,
                        target: Box::new(target),
                        value: Box::new(value),
                    },
                    _ => ExprKind::Unsupported("assignment_expression".into()),
                }
            }
            "instanceof_expression" => {
                let value = node.child_by_field_name("left").map(|l| self.expr(l));
                let ty = node
                    .child_by_field_name("right")
                    .map(|t| self.type_name(t))
                    .unwrap_or_else(|| TypeName::simple("?"));
                match value {
                    Some(value) => ExprKind::InstanceOf {
                        value: Box::new(value),
                        ty,
                    },
                    None => ExprKind::Unsupported("instanceof_expression".into()),
                }
            }
            "cast_expression" => {
                let ty = node
                    .child_by_field_name("type")
                    .map(|t| self.type_name(t))
                    .unwrap_or_else(|| TypeName::simple("?"));
                match node.child_by_field_name("value") {
                    Some(value) => ExprKind::Cast {
                        ty,
                        value: Box::new(self.expr(value)),
                    },
                    None => ExprKind::Unsupported("cast_expression".into()),
                }
            }
            "ternary_expression" => {
                let cond = node.child_by_field_name("condition").map(|c| self.expr(c));
                let cons = node
                    .child_by_field_name("consequence")
                    .map(|c| self.expr(c));
                let alt = node
                    .child_by_field_name("alternative")
                    .map(|a| self.expr(a));
                match (cond, cons, alt) {
                    (Some(c), Some(t), Some(e)) => ExprKind::Ternary {
                        cond: Box::new(c),
                        then_value: Box::new(t),
                        else_value: Box::new(e),
                    },
                    _ => ExprKind::Unsupported("ternary_expression".into()),
                }
            }
            "method_invocation" => {
                let receiver = node
                    .child_by_field_name("object")
                    .map(|o| Box::new(self.expr(o)));
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_default();
                let args = node
                    .child_by_field_name("arguments")
                    .map(|a| {
                        self.named_children(a)
                            .into_iter()
                            .map(|e| self.expr(e))
                            .collect()
                    })
                    .unwrap_or_default();
                ExprKind::MethodCall {
                    receiver,
                    name,
                    args,
                }
            }
            "object_creation_expression" => {
                let ty = node
                    .child_by_field_name("type")
                    .map(|t| self.type_name(t))
                    .unwrap_or_else(|| TypeName::simple("?"));
                let args = node
                    .child_by_field_name("arguments")
                    .map(|a| {
                        self.named_children(a)
                            .into_iter()
                            .map(|e| self.expr(e))
                            .collect()
                    })
                    .unwrap_or_default();
                ExprKind::New { ty, args }
            }
            "array_creation_expression" => {
                let elem_ty = node
                    .child_by_field_name("type")
                    .map(|t| self.type_name(t))
                    .unwrap_or_else(|| TypeName::simple("?"));
                let mut dims = Vec::new();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    if child.kind() == "dimensions_expr" {
                        if let Some(e) = self.named_children(child).into_iter().next() {
                            dims.push(self.expr(e));
                        }
                    }
                }
                let init = node
                    .child_by_field_name("value")
                    .map(|v| Box::new(self.expr(v)));
                ExprKind::ArrayNew {
                    elem_ty,
                    dims,
                    init,
                }
            }
            "array_initializer" => ExprKind::ArrayInit(
                self.named_children(node)
                    .into_iter()
                    .map(|e| self.expr(e))
                    .collect(),
            ),
            "lambda_expression" => {
                let mut params = Vec::new();
                if let Some(p) = node.child_by_field_name("parameters") {
                    match p.kind() {
                        "identifier" => params.push(self.text(p).to_string()),
                        _ => {
                            for child in self.named_children(p) {
                                match child.kind() {
                                    "identifier" => params.push(self.text(child).to_string()),
                                    "formal_parameter" => {
                                        if let Some(n) = child.child_by_field_name("name") {
                                            params.push(self.text(n).to_string());
                                        }
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }
                }
                let body = match node.child_by_field_name("body") {
                    Some(b) if b.kind() == "block" => LambdaBody::Block(Box::new(self.stmt(b))),
                    Some(b) => LambdaBody::Expr(Box::new(self.expr(b))),
                    None => return ExprKind::Unsupported("lambda_expression".into()),
                };
                ExprKind::Lambda { params, body }
            }
            other => ExprKind::Unsupported(other.to_string()),
        }
    }
}

fn is_type_node(kind: &str) -> bool {
    matches!(
        kind,
        "type_identifier"
            | "scoped_type_identifier"
            | "generic_type"
            | "array_type"
            | "integral_type"
            | "floating_point_type"
            | "boolean_type"
            | "void_type"
    )
}

fn is_statement(kind: &str) -> bool {
    matches!(
        kind,
        "block"
            | "local_variable_declaration"
            | "expression_statement"
            | "if_statement"
            | "while_statement"
            | "do_statement"
            | "for_statement"
            | "enhanced_for_statement"
            | "switch_expression"
            | "switch_statement"
            | "return_statement"
            | "break_statement"
            | "continue_statement"
            | "labeled_statement"
            | "synchronized_statement"
            | "try_statement"
            | "try_with_resources_statement"
            | "throw_statement"
            | "assert_statement"
            | "yield_statement"
            | "empty_statement"
            | ";"
            | "local_class_declaration"
            | "explicit_constructor_invocation"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StmtKind;

    fn parse(source: &str) -> CompilationUnit {
        JavaFrontend::new().unwrap().parse_unit("test.java", source).unwrap()
    }

    #[test]
    fn test_class_shape() {
        let unit = parse(
            "package demo;\n\
             import java.util.List;\n\
             public class A extends B implements C, D {\n\
               int x;\n\
               static int[] ys;\n\
               public int f(int a, String... rest) { return a; }\n\
             }\n",
        );
        assert_eq!(unit.package.as_deref(), Some("demo"));
        assert_eq!(unit.imports, vec!["java.util.List".to_string()]);
        let a = &unit.types[0];
        assert_eq!(a.name, "A");
        assert_eq!(a.superclass.as_ref().unwrap().name, "B");
        assert_eq!(a.interfaces.len(), 2);
        assert_eq!(a.fields.len(), 2);
        assert_eq!(a.fields[1].ty.dims, 1);
        assert!(a.fields[1].is_static);
        let f = &a.methods[0];
        assert_eq!(f.params.len(), 2);
        assert!(f.params[1].varargs);
        assert!(f.body.is_some());
    }

    #[test]
    fn test_statement_shapes() {
        let unit = parse(
            "class A { void f(int n) {\n\
               int x = 0;\n\
               while (n > 0) { x = x + n; n--; }\n\
               if (x > 10) { x = 10; } else { x = 0; }\n\
               for (int i = 0; i < n; i++) { x += i; }\n\
               switch (x) { case 0: x = 1; break; default: x = 2; }\n\
               try { x = x / n; } catch (ArithmeticException e) { x = 0; } finally { n = 0; }\n\
               return;\n\
             } }",
        );
        let body = unit.types[0].methods[0].body.as_ref().unwrap();
        let StmtKind::Block(stmts) = &body.kind else {
            panic!("expected block body");
        };
        let kinds: Vec<&str> = stmts.iter().map(|s| s.kind.kind()).collect();
        assert_eq!(
            kinds,
            vec!["local_decl", "while", "if", "for", "switch", "try", "return"]
        );
        let StmtKind::Switch { cases, .. } = &stmts[4].kind else {
            panic!("expected switch");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].labels, vec![None]);
        let StmtKind::Try { catches, finally, .. } = &stmts[5].kind else {
            panic!("expected try");
        };
        assert_eq!(catches.len(), 1);
        assert_eq!(catches[0].ty.name, "ArithmeticException");
        assert!(finally.is_some());
    }

    #[test]
    fn test_constructor_and_delegation() {
        let unit = parse(
            "class A extends B {\n\
               int x;\n\
               A(int x) { super(x); this.x = x; }\n\
             }",
        );
        let ctor = &unit.types[0].methods[0];
        assert!(ctor.is_constructor);
        let StmtKind::Block(stmts) = &ctor.body.as_ref().unwrap().kind else {
            panic!("expected body");
        };
        assert!(matches!(stmts[0].kind, StmtKind::SuperCall(_)));
    }
}
