//! The klass table: lazy, cycle-tolerant class loading plus overload
//! and override resolution.
//!
//! The table is the only shared mutable state between method analyses.
//! Hosts parallelizing across methods must serialize access to it;
//! everything else in this crate is per-method.

pub mod library;
pub mod types;

use std::sync::Arc;

use tracing::debug;

use flowgraph_core::errors::ResolveError;
use flowgraph_core::types::collections::FxHashMap;

use crate::ast::{CompilationUnit, MethodDecl, TypeDecl, TypeKind, TypeName};
use crate::scopes::Ref;

pub use library::{
    BuiltinLibrary, LibraryFieldDesc, LibraryKlassDesc, LibraryMethodDesc, LibraryResolver,
};
pub use types::{
    CallStyle, FuncType, Klass, KlassId, KlassKind, LoadState, LookupStyle, Method, MethodId,
    PrimKind, Type,
};

/// Arena of klasses and methods for one analysis run.
pub struct KlassTable {
    klasses: Vec<Klass>,
    methods: Vec<Method>,
    by_qualified: FxHashMap<String, KlassId>,
    /// Array-element refs, memoized globally per element type.
    array_elems: FxHashMap<String, Ref>,
    libraries: Vec<Box<dyn LibraryResolver>>,
}

impl std::fmt::Debug for KlassTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlassTable")
            .field("klasses", &self.klasses.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl Default for KlassTable {
    fn default() -> Self {
        Self::new()
    }
}

impl KlassTable {
    pub fn new() -> Self {
        Self {
            klasses: Vec::new(),
            methods: Vec::new(),
            by_qualified: FxHashMap::default(),
            array_elems: FxHashMap::default(),
            libraries: vec![Box::new(BuiltinLibrary)],
        }
    }

    /// Install a library resolver ahead of the built-in one.
    pub fn install_library(&mut self, resolver: Box<dyn LibraryResolver>) {
        self.libraries.insert(0, resolver);
    }

    // ---- accessors ----

    pub fn klass(&self, id: KlassId) -> &Klass {
        &self.klasses[id.0 as usize]
    }

    fn klass_mut(&mut self, id: KlassId) -> &mut Klass {
        &mut self.klasses[id.0 as usize]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.0 as usize]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut Method {
        &mut self.methods[id.0 as usize]
    }

    pub fn klass_ids(&self) -> impl Iterator<Item = KlassId> {
        (0..self.klasses.len() as u32).map(KlassId)
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len() as u32).map(MethodId)
    }

    pub fn by_qualified_name(&self, qualified: &str) -> Option<KlassId> {
        self.by_qualified.get(qualified).copied()
    }

    /// First method of a klass with a given simple name (tests, drivers).
    pub fn method_named(&self, klass: KlassId, name: &str) -> Option<MethodId> {
        self.klass(klass)
            .methods
            .iter()
            .copied()
            .find(|&m| self.method(m).name == name)
    }

    /// The source declaration of a method, when it came from parsed
    /// source rather than a library descriptor.
    pub fn source_method_decl(&self, method: MethodId) -> Option<MethodDecl> {
        let m = self.method(method);
        let klass = self.klass(m.klass?);
        let decl = klass.decl.as_ref()?;
        decl.methods.get(m.decl_index?).cloned()
    }

    /// The shared array-element ref for one element type.
    pub fn array_elem_ref(&mut self, elem_ty: &str) -> Ref {
        self.array_elems
            .entry(elem_ty.to_string())
            .or_insert_with(|| Ref::array_elem(elem_ty))
            .clone()
    }

    // ---- declaration ----

    /// Register every type declared in a compilation unit. Bodies are
    /// not resolved yet; that happens lazily in [`Self::load`].
    pub fn declare_unit(&mut self, unit: &CompilationUnit) -> Vec<KlassId> {
        let mut declared = Vec::new();
        for decl in &unit.types {
            self.declare_type(decl, unit.package.as_deref(), &unit.imports, None, &mut declared);
        }
        declared
    }

    fn declare_type(
        &mut self,
        decl: &TypeDecl,
        package: Option<&str>,
        imports: &[String],
        outer: Option<KlassId>,
        declared: &mut Vec<KlassId>,
    ) -> KlassId {
        let qualified = match (outer, package) {
            (Some(o), _) => format!("{}.{}", self.klass(o).qualified, decl.name),
            (None, Some(p)) => format!("{p}.{}", decl.name),
            (None, None) => decl.name.clone(),
        };
        if let Some(&existing) = self.by_qualified.get(&qualified) {
            return existing;
        }
        let id = KlassId(self.klasses.len() as u32);
        self.klasses.push(Klass {
            id,
            kind: match decl.kind {
                TypeKind::Class => KlassKind::Class,
                TypeKind::Interface => KlassKind::Interface,
                TypeKind::Enum => KlassKind::Enum,
            },
            name: decl.name.clone(),
            qualified: qualified.clone(),
            package: package.map(str::to_string),
            imports: imports.to_vec(),
            state: LoadState::Unbuilt,
            base: None,
            ifaces: Vec::new(),
            outer,
            type_params: decl.type_params.clone(),
            fields: Vec::new(),
            fields_by_name: FxHashMap::default(),
            methods: Vec::new(),
            decl: Some(Arc::new(decl.clone())),
            library: None,
            generic: None,
            type_args: Vec::new(),
            param_cache: FxHashMap::default(),
            this_ref: None,
        });
        self.by_qualified.insert(qualified, id);
        declared.push(id);
        for nested in &decl.nested {
            self.declare_type(nested, package, imports, Some(id), declared);
        }
        id
    }

    fn declare_library_shell(&mut self, desc: LibraryKlassDesc) -> KlassId {
        if let Some(&existing) = self.by_qualified.get(&desc.qualified) {
            return existing;
        }
        let id = KlassId(self.klasses.len() as u32);
        let name = desc
            .qualified
            .rsplit('.')
            .next()
            .unwrap_or(&desc.qualified)
            .to_string();
        self.klasses.push(Klass {
            id,
            kind: if desc.is_interface {
                KlassKind::Interface
            } else {
                KlassKind::Class
            },
            name,
            qualified: desc.qualified.clone(),
            package: desc.qualified.rsplit_once('.').map(|(p, _)| p.to_string()),
            imports: Vec::new(),
            state: LoadState::Unbuilt,
            base: None,
            ifaces: Vec::new(),
            outer: None,
            type_params: desc.type_params.clone(),
            fields: Vec::new(),
            fields_by_name: FxHashMap::default(),
            methods: Vec::new(),
            decl: None,
            library: Some(desc.clone()),
            generic: None,
            type_args: Vec::new(),
            param_cache: FxHashMap::default(),
            this_ref: None,
        });
        self.by_qualified.insert(desc.qualified, id);
        id
    }

    /// Look a fully-qualified name up among declared klasses, then the
    /// library resolver chain.
    pub fn resolve_qualified(&mut self, qualified: &str) -> Option<KlassId> {
        if let Some(&id) = self.by_qualified.get(qualified) {
            return Some(id);
        }
        let desc = self
            .libraries
            .iter()
            .find_map(|lib| lib.lookup(qualified))?;
        Some(self.declare_library_shell(desc))
    }

    // ---- loading ----

    /// Idempotent lazy load. A klass observed while `Building` is used
    /// structurally as-is, which breaks mutual-reference cycles.
    pub fn load(&mut self, id: KlassId) -> Result<(), ResolveError> {
        if self.klass(id).state != LoadState::Unbuilt {
            return Ok(());
        }
        self.klass_mut(id).state = LoadState::Building;
        let decl = self.klass(id).decl.clone();
        let library = self.klass(id).library.clone();
        let result = if let Some(decl) = decl {
            self.load_from_decl(id, &decl)
        } else if let Some(desc) = library {
            self.load_from_library(id, &desc)
        } else {
            Ok(())
        };
        self.klass_mut(id).state = LoadState::Built;
        result
    }

    fn load_from_decl(&mut self, id: KlassId, decl: &TypeDecl) -> Result<(), ResolveError> {
        // Supertypes first, so field/method lookup can chain-walk.
        let is_object = self.klass(id).qualified == "java.lang.Object";
        let base = match &decl.superclass {
            Some(ty) => match self.resolve_type_name(ty, Some(id), &[]) {
                Ok(t) => t.klass_id(),
                Err(e) => {
                    debug!(klass = %self.klass(id).qualified, error = %e, "superclass unresolved");
                    self.resolve_qualified("java.lang.Object")
                }
            },
            None if is_object => None,
            None => self.resolve_qualified("java.lang.Object"),
        };
        // An inheritance cycle would make every chain walk diverge;
        // break it at the point of closure.
        let base = match base {
            Some(b) if self.chain_contains(b, id) => {
                debug!(klass = %self.klass(id).qualified, "inheritance cycle; dropping superclass");
                self.resolve_qualified("java.lang.Object").filter(|&o| o != id)
            }
            other => other,
        };
        let mut ifaces = Vec::new();
        for ty in &decl.interfaces {
            match self.resolve_type_name(ty, Some(id), &[]) {
                Ok(t) => {
                    if let Some(k) = t.klass_id() {
                        if !self.chain_contains(k, id) {
                            ifaces.push(k);
                        }
                    }
                }
                Err(e) => {
                    debug!(klass = %self.klass(id).qualified, error = %e, "interface unresolved");
                }
            }
        }
        self.klass_mut(id).base = base;
        self.klass_mut(id).ifaces = ifaces.clone();
        if let Some(b) = base {
            self.load(b)?;
        }
        for iface in ifaces {
            self.load(iface)?;
        }

        let qualified = self.klass(id).qualified.clone();
        self.klass_mut(id).this_ref = Some(Ref::this(&qualified));

        for field in &decl.fields {
            let ty = self
                .resolve_type_name(&field.ty, Some(id), &[])
                .unwrap_or(Type::Unknown);
            let ty_name = self.type_name(&ty);
            let r = Ref::field(&qualified, &field.name, field.is_static, &ty_name);
            self.klass_mut(id).fields.push(r.clone());
            self.klass_mut(id)
                .fields_by_name
                .insert(field.name.clone(), (r, ty));
        }

        for (index, m) in decl.methods.iter().enumerate() {
            let method_id = self.build_source_method(id, m, index)?;
            self.klass_mut(id).methods.push(method_id);
        }
        Ok(())
    }

    fn build_source_method(
        &mut self,
        klass: KlassId,
        decl: &MethodDecl,
        index: usize,
    ) -> Result<MethodId, ResolveError> {
        let mut params = Vec::new();
        let mut varargs = false;
        for p in &decl.params {
            let ty = self
                .resolve_type_name(&p.ty, Some(klass), &decl.type_params)
                .unwrap_or(Type::Unknown);
            varargs = p.varargs;
            // A trailing varargs parameter is an array of its base type.
            params.push(if p.varargs { ty.array() } else { ty });
        }
        let ret = if decl.is_constructor {
            Type::Klass(klass)
        } else {
            match &decl.return_type {
                Some(ty) if ty.name == "void" && ty.dims == 0 => Type::Void,
                Some(ty) => self
                    .resolve_type_name(ty, Some(klass), &decl.type_params)
                    .unwrap_or(Type::Unknown),
                None => Type::Void,
            }
        };
        let mut throws = Vec::new();
        for ty in &decl.throws {
            throws.push(
                self.resolve_type_name(ty, Some(klass), &decl.type_params)
                    .unwrap_or(Type::Unknown),
            );
        }
        let style = if decl.is_constructor {
            CallStyle::Constructor
        } else if decl.is_static {
            CallStyle::Static
        } else {
            CallStyle::Instance
        };
        let func = FuncType {
            params,
            ret,
            varargs,
        };
        let name = if decl.is_constructor {
            "<init>".to_string()
        } else {
            decl.name.clone()
        };
        Ok(self.push_method(
            Some(klass),
            name,
            style,
            func,
            throws,
            Some(index),
            decl.body.is_some(),
        ))
    }

    fn load_from_library(&mut self, id: KlassId, desc: &LibraryKlassDesc) -> Result<(), ResolveError> {
        let is_object = desc.qualified == "java.lang.Object";
        let base = match &desc.superclass {
            Some(name) => self.resolve_qualified(name),
            None if is_object => None,
            None => self.resolve_qualified("java.lang.Object"),
        };
        let base = base.filter(|&b| !self.chain_contains(b, id));
        let mut ifaces = Vec::new();
        for name in &desc.interfaces {
            if let Some(k) = self.resolve_qualified(name) {
                if !self.chain_contains(k, id) {
                    ifaces.push(k);
                }
            }
        }
        self.klass_mut(id).base = base;
        self.klass_mut(id).ifaces = ifaces.clone();
        if let Some(b) = base {
            self.load(b)?;
        }
        for iface in ifaces {
            self.load(iface)?;
        }

        let qualified = self.klass(id).qualified.clone();
        self.klass_mut(id).this_ref = Some(Ref::this(&qualified));

        for field in &desc.fields {
            let ty = self
                .resolve_type_name(&field.ty, Some(id), &[])
                .unwrap_or(Type::Unknown);
            let ty_name = self.type_name(&ty);
            let r = Ref::field(&qualified, &field.name, field.is_static, &ty_name);
            self.klass_mut(id).fields.push(r.clone());
            self.klass_mut(id)
                .fields_by_name
                .insert(field.name.clone(), (r, ty));
        }

        for m in desc.methods.clone() {
            let mut params = Vec::new();
            for ty in &m.params {
                params.push(self.resolve_type_name(ty, Some(id), &[]).unwrap_or(Type::Unknown));
            }
            let ret = if m.is_constructor {
                Type::Klass(id)
            } else {
                match &m.return_type {
                    Some(ty) if ty.name == "void" && ty.dims == 0 => Type::Void,
                    Some(ty) => self
                        .resolve_type_name(ty, Some(id), &[])
                        .unwrap_or(Type::Unknown),
                    None => Type::Void,
                }
            };
            let mut throws = Vec::new();
            for ty in &m.throws {
                throws.push(self.resolve_type_name(ty, Some(id), &[]).unwrap_or(Type::Unknown));
            }
            let style = if m.is_constructor {
                CallStyle::Constructor
            } else if m.is_static {
                CallStyle::Static
            } else {
                CallStyle::Instance
            };
            let name = if m.is_constructor {
                "<init>".to_string()
            } else {
                m.name.clone()
            };
            let func = FuncType {
                params,
                ret,
                varargs: m.varargs,
            };
            let method_id = self.push_method(Some(id), name, style, func, throws, None, false);
            self.klass_mut(id).methods.push(method_id);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn push_method(
        &mut self,
        klass: Option<KlassId>,
        name: String,
        style: CallStyle,
        func: FuncType,
        throws: Vec<Type>,
        decl_index: Option<usize>,
        has_body: bool,
    ) -> MethodId {
        let id = MethodId(self.methods.len() as u32);
        let signature = self.render_signature(klass, &name, &func);
        self.methods.push(Method {
            id,
            klass,
            name,
            style,
            func,
            throws,
            signature,
            decl_index,
            has_body,
            overrides: Vec::new(),
            overriders: Vec::new(),
            callers: std::collections::BTreeSet::new(),
            call_sites: Vec::new(),
            input_refs: crate::scopes::RefSet::new(),
            output_refs: crate::scopes::RefSet::new(),
        });
        id
    }

    fn render_signature(&self, klass: Option<KlassId>, name: &str, func: &FuncType) -> String {
        let owner = match klass {
            Some(k) => self.klass(k).qualified.clone(),
            None => "!".to_string(),
        };
        let params: Vec<String> = func.params.iter().map(|t| self.type_name(t)).collect();
        format!("{owner}.{name}({})", params.join(","))
    }

    // ---- type resolution ----

    /// Resolve a written type reference against a klass context.
    pub fn resolve_type_name(
        &mut self,
        ty: &TypeName,
        ctx: Option<KlassId>,
        method_type_params: &[String],
    ) -> Result<Type, ResolveError> {
        let mut base = self.resolve_base_name(&ty.name, ctx, method_type_params)?;
        if !ty.args.is_empty() {
            let mut args = Vec::new();
            for arg in &ty.args {
                args.push(
                    self.resolve_type_name(arg, ctx, method_type_params)
                        .unwrap_or(Type::Unknown),
                );
            }
            if let Type::Klass(k) = base {
                if !self.klass(k).type_params.is_empty() {
                    base = Type::Klass(self.parameterize(k, args));
                }
            }
        }
        let mut out = base;
        for _ in 0..ty.dims {
            out = out.array();
        }
        Ok(out)
    }

    fn resolve_base_name(
        &mut self,
        name: &str,
        ctx: Option<KlassId>,
        method_type_params: &[String],
    ) -> Result<Type, ResolveError> {
        if name == "void" {
            return Ok(Type::Void);
        }
        if let Some(p) = PrimKind::from_name(name) {
            return Ok(Type::Prim(p));
        }
        if method_type_params.iter().any(|p| p == name) {
            return Ok(Type::Var(name.to_string()));
        }
        // Type parameters and nested klasses along the outer chain.
        let mut cur = ctx;
        while let Some(k) = cur {
            if let Some(pos) = self.klass(k).type_params.iter().position(|p| p == name) {
                if let Some(bound) = self.klass(k).type_args.get(pos) {
                    return Ok(bound.clone());
                }
                return Ok(Type::Var(name.to_string()));
            }
            let nested = format!("{}.{name}", self.klass(k).qualified);
            if let Some(&id) = self.by_qualified.get(&nested) {
                return Ok(Type::Klass(id));
            }
            cur = self.klass(k).outer;
        }
        // Already-qualified name.
        if name.contains('.') {
            if let Some(id) = self.resolve_qualified(name) {
                return Ok(Type::Klass(id));
            }
            return Err(ResolveError::type_not_found(name));
        }
        // Same package, then default package.
        if let Some(k) = ctx {
            if let Some(pkg) = self.klass(k).package.clone() {
                if let Some(&id) = self.by_qualified.get(&format!("{pkg}.{name}")) {
                    return Ok(Type::Klass(id));
                }
            }
        }
        if let Some(&id) = self.by_qualified.get(name) {
            return Ok(Type::Klass(id));
        }
        // Single-type imports.
        if let Some(k) = ctx {
            let imports = self.klass(k).imports.clone();
            for import in imports {
                if import.ends_with(&format!(".{name}")) {
                    if let Some(id) = self.resolve_qualified(&import) {
                        return Ok(Type::Klass(id));
                    }
                }
            }
        }
        // Library fallback, `java.lang` implicit.
        if let Some(id) = self.resolve_qualified(&format!("java.lang.{name}")) {
            return Ok(Type::Klass(id));
        }
        debug!(name, "type resolution failed");
        Err(ResolveError::type_not_found(name))
    }

    // ---- generics ----

    /// Instantiate a generic klass. Instances are cached per argument
    /// tuple; they share the generic's declarations and re-resolve
    /// parameter-typed signatures at load.
    pub fn parameterize(&mut self, generic: KlassId, mut args: Vec<Type>) -> KlassId {
        let n_params = self.klass(generic).type_params.len();
        while args.len() < n_params {
            args.push(Type::Unknown);
        }
        args.truncate(n_params);
        let key = args
            .iter()
            .map(|t| self.type_name(t))
            .collect::<Vec<_>>()
            .join(",");
        if let Some(&cached) = self.klass(generic).param_cache.get(&key) {
            return cached;
        }
        let g = self.klass(generic);
        let id = KlassId(self.klasses.len() as u32);
        let name = format!("{}<{key}>", g.name);
        let qualified = format!("{}<{key}>", g.qualified);
        let shell = Klass {
            id,
            kind: g.kind,
            name,
            qualified: qualified.clone(),
            package: g.package.clone(),
            imports: g.imports.clone(),
            state: LoadState::Unbuilt,
            base: None,
            ifaces: Vec::new(),
            outer: g.outer,
            type_params: g.type_params.clone(),
            fields: Vec::new(),
            fields_by_name: FxHashMap::default(),
            methods: Vec::new(),
            decl: g.decl.clone(),
            library: g.library.clone(),
            generic: Some(generic),
            type_args: args,
            param_cache: FxHashMap::default(),
            this_ref: None,
        };
        self.klasses.push(shell);
        self.by_qualified.insert(qualified, id);
        self.klass_mut(generic).param_cache.insert(key, id);
        id
    }

    // ---- member lookup ----

    /// Field lookup: self, then base chain, then interfaces, depth
    /// first, first match wins.
    pub fn field_of(&mut self, klass: KlassId, name: &str) -> Option<(Ref, Type)> {
        self.load(klass).ok()?;
        if let Some((r, ty)) = self.klass(klass).fields_by_name.get(name) {
            return Some((r.clone(), ty.clone()));
        }
        if let Some(base) = self.klass(klass).base {
            if let Some(hit) = self.field_of(base, name) {
                return Some(hit);
            }
        }
        let ifaces = self.klass(klass).ifaces.clone();
        for iface in ifaces {
            if let Some(hit) = self.field_of(iface, name) {
                return Some(hit);
            }
        }
        None
    }

    /// Field lookup that reports `FieldNotFound` when the whole chain
    /// misses.
    pub fn lookup_field(&mut self, klass: KlassId, name: &str) -> Result<(Ref, Type), ResolveError> {
        self.field_of(klass, name).ok_or_else(|| {
            ResolveError::field_not_found(self.klass(klass).qualified.clone(), name)
        })
    }

    /// Overload resolution: the applicable candidate with the lowest
    /// total acceptance distance wins; declaration order breaks ties.
    /// Falls back self → outer klass → base chain → interfaces.
    pub fn find_method(
        &mut self,
        klass: KlassId,
        style: LookupStyle,
        name: Option<&str>,
        args: &[Type],
    ) -> Option<MethodId> {
        self.load(klass).ok()?;
        let mut best: Option<(u32, MethodId)> = None;
        for &mid in &self.klass(klass).methods {
            let m = self.method(mid);
            if !style.admits(m.style) {
                continue;
            }
            if let Some(n) = name {
                if m.name != n {
                    continue;
                }
            }
            if let Some(dist) = self.accept_distance(&m.func, args) {
                // Strict < keeps the earliest declaration on ties.
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, mid));
                }
            }
        }
        if let Some((_, mid)) = best {
            return Some(mid);
        }
        if let Some(outer) = self.klass(klass).outer {
            if let Some(m) = self.find_method(outer, style, name, args) {
                return Some(m);
            }
        }
        if let Some(base) = self.klass(klass).base {
            if let Some(m) = self.find_method(base, style, name, args) {
                return Some(m);
            }
        }
        let ifaces = self.klass(klass).ifaces.clone();
        for iface in ifaces {
            if let Some(m) = self.find_method(iface, style, name, args) {
                return Some(m);
            }
        }
        None
    }

    // ---- distances ----

    /// Subtype distance along the base/interface DAG; `None` means "not
    /// a subtype".
    pub fn subclass_distance(&self, sub: KlassId, sup: KlassId) -> Option<u32> {
        if sub == sup {
            return Some(0);
        }
        let sub_k = self.klass(sub);
        let sup_k = self.klass(sup);
        // Generic/instance relationships.
        if sub_k.generic == Some(sup) || sup_k.generic == Some(sub) {
            return Some(1);
        }
        if let (Some(g1), Some(g2)) = (sub_k.generic, sup_k.generic) {
            if g1 == g2 {
                let mut dist = 0;
                for (a, b) in sub_k.type_args.iter().zip(&sup_k.type_args) {
                    dist += self.assign_distance(b, a)?;
                }
                return Some(dist);
            }
        }
        if let Some(base) = sub_k.base {
            if let Some(d) = self.subclass_distance(base, sup) {
                return Some(d + 1);
            }
        }
        for &iface in &sub_k.ifaces {
            if let Some(d) = self.subclass_distance(iface, sup) {
                return Some(d + 1);
            }
        }
        None
    }

    /// Distance of converting a `from` value into a `to` slot;
    /// `None` = inapplicable, 0 = exact.
    pub fn assign_distance(&self, to: &Type, from: &Type) -> Option<u32> {
        if to == from {
            return Some(0);
        }
        match (to, from) {
            (Type::Unknown, _) | (_, Type::Unknown) => Some(0),
            (Type::Klass(_) | Type::Array(_), Type::Null) => Some(0),
            (Type::Var(_), _) | (_, Type::Var(_)) => Some(1),
            (Type::Prim(t), Type::Prim(f)) => {
                let (tr, fr) = (t.widening_rank()?, f.widening_rank()?);
                if fr <= tr {
                    Some(tr - fr)
                } else {
                    None
                }
            }
            // Boxing and unboxing cost one step each.
            (Type::Klass(k), Type::Prim(p)) => {
                let box_id = self.by_qualified.get(p.box_name())?;
                self.subclass_distance(*box_id, *k).map(|d| d + 1)
            }
            (Type::Prim(p), Type::Klass(k)) => {
                (self.klass(*k).qualified == p.box_name()).then_some(1)
            }
            // Arrays are covariant.
            (Type::Array(t), Type::Array(f)) => self.assign_distance(t, f),
            (Type::Klass(k), Type::Array(_)) => {
                (self.klass(*k).qualified == "java.lang.Object").then_some(1)
            }
            (Type::Klass(t), Type::Klass(f)) => self.subclass_distance(*f, *t),
            _ => None,
        }
    }

    /// Per-call acceptance distance of a signature against actual
    /// argument types. Varargs tails match the trailing actuals
    /// individually against the element type.
    pub fn accept_distance(&self, func: &FuncType, args: &[Type]) -> Option<u32> {
        if !func.varargs {
            if func.params.len() != args.len() {
                return None;
            }
            let mut total = 0;
            for (p, a) in func.params.iter().zip(args) {
                total += self.assign_distance(p, a)?;
            }
            return Some(total);
        }
        let fixed = func.params.len().checked_sub(1)?;
        if args.len() < fixed {
            return None;
        }
        let mut total = 0;
        for (p, a) in func.params[..fixed].iter().zip(args) {
            total += self.assign_distance(p, a)?;
        }
        let tail_param = &func.params[fixed];
        // Passing an array through directly, or element-wise.
        if args.len() == func.params.len() {
            if let Some(d) = self.assign_distance(tail_param, &args[fixed]) {
                return Some(total + d);
            }
        }
        let elem = tail_param.elem()?;
        for a in &args[fixed..] {
            total += self.assign_distance(elem, a)?;
        }
        Some(total)
    }

    // ---- overrides ----

    /// Link every source method to the supertype methods it overrides,
    /// bidirectionally. Requires all klasses loaded.
    pub fn link_overrides(&mut self) {
        for klass in self.klass_ids() {
            let method_ids = self.klass(klass).methods.clone();
            let ancestors = self.ancestors_of(klass);
            for mid in method_ids {
                if !matches!(self.method(mid).style, CallStyle::Instance | CallStyle::Lambda) {
                    continue;
                }
                for &anc in &ancestors {
                    let candidates = self.klass(anc).methods.clone();
                    for cand in candidates {
                        if self.signatures_match(mid, cand) {
                            if !self.method(mid).overrides.contains(&cand) {
                                self.method_mut(mid).overrides.push(cand);
                                self.method_mut(cand).overriders.push(mid);
                            }
                            break;
                        }
                    }
                }
            }
        }
    }

    /// True when `needle` already appears in `start`'s supertype graph.
    fn chain_contains(&self, start: KlassId, needle: KlassId) -> bool {
        start == needle || self.ancestors_of(start).contains(&needle)
    }

    fn ancestors_of(&self, klass: KlassId) -> Vec<KlassId> {
        let mut out = Vec::new();
        let mut stack: Vec<KlassId> = Vec::new();
        let k = self.klass(klass);
        stack.extend(k.base);
        stack.extend(k.ifaces.iter().copied());
        while let Some(a) = stack.pop() {
            if out.contains(&a) {
                continue;
            }
            out.push(a);
            let ak = self.klass(a);
            stack.extend(ak.base);
            stack.extend(ak.ifaces.iter().copied());
        }
        out
    }

    fn signatures_match(&self, a: MethodId, b: MethodId) -> bool {
        let (ma, mb) = (self.method(a), self.method(b));
        if ma.name != mb.name || !matches!(mb.style, CallStyle::Instance | CallStyle::Lambda) {
            return false;
        }
        if ma.func.params.len() != mb.func.params.len() {
            return false;
        }
        ma.func
            .params
            .iter()
            .zip(&mb.func.params)
            .all(|(x, y)| types_equal(x, y))
    }

    /// A method plus every transitive overrider, id-ordered. A virtual
    /// call must account for any of these.
    pub fn override_closure(&self, method: MethodId) -> Vec<MethodId> {
        let mut out = vec![method];
        let mut i = 0;
        while i < out.len() {
            let m = out[i];
            for &o in &self.method(m).overriders {
                if !out.contains(&o) {
                    out.push(o);
                }
            }
            i += 1;
        }
        out.sort();
        out
    }

    pub fn add_call(&mut self, caller: MethodId, callee: MethodId) {
        self.method_mut(callee).callers.insert(caller);
        if !self.method(caller).call_sites.contains(&callee) {
            self.method_mut(caller).call_sites.push(callee);
        }
    }

    // ---- rendering ----

    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Unknown => "?".to_string(),
            Type::Null => "null".to_string(),
            Type::Void => "void".to_string(),
            Type::Prim(p) => p.name().to_string(),
            Type::Array(e) => format!("{}[]", self.type_name(e)),
            Type::Klass(id) => self.klass(*id).qualified.clone(),
            Type::Var(name) => name.clone(),
        }
    }
}

/// Structural type equality for override linking.
fn types_equal(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Array(x), Type::Array(y)) => types_equal(x, y),
        (Type::Var(x), Type::Var(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::types::Span;

    fn decl(name: &str, superclass: Option<&str>) -> TypeDecl {
        TypeDecl {
            kind: TypeKind::Class,
            name: name.to_string(),
            type_params: Vec::new(),
            superclass: superclass.map(TypeName::simple),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
            span: Span::default(),
        }
    }

    fn unit(types: Vec<TypeDecl>) -> CompilationUnit {
        CompilationUnit {
            package: None,
            imports: Vec::new(),
            types,
        }
    }

    #[test]
    fn test_mutual_reference_terminates() {
        let mut table = KlassTable::new();
        // A extends B, B has no base; both reference each other by field.
        let mut a = decl("A", Some("B"));
        a.fields.push(crate::ast::FieldDecl {
            name: "b".into(),
            ty: TypeName::simple("B"),
            is_static: false,
            init: None,
            span: Span::default(),
        });
        let mut b = decl("B", None);
        b.fields.push(crate::ast::FieldDecl {
            name: "a".into(),
            ty: TypeName::simple("A"),
            is_static: false,
            init: None,
            span: Span::default(),
        });
        let ids = table.declare_unit(&unit(vec![a, b]));
        for id in ids {
            table.load(id).unwrap();
        }
        let a_id = table.by_qualified_name("A").unwrap();
        let b_id = table.by_qualified_name("B").unwrap();
        assert_eq!(table.subclass_distance(a_id, b_id), Some(1));
        assert_eq!(table.subclass_distance(b_id, a_id), None);
    }

    #[test]
    fn test_inherited_field_lookup() {
        let mut table = KlassTable::new();
        let mut b = decl("B", None);
        b.fields.push(crate::ast::FieldDecl {
            name: "x".into(),
            ty: TypeName::simple("int"),
            is_static: false,
            init: None,
            span: Span::default(),
        });
        let a = decl("A", Some("B"));
        let ids = table.declare_unit(&unit(vec![a, b]));
        for id in ids {
            table.load(id).unwrap();
        }
        let a_id = table.by_qualified_name("A").unwrap();
        let (r, ty) = table.lookup_field(a_id, "x").unwrap();
        assert_eq!(r.name(), "B.x");
        assert_eq!(ty, Type::Prim(PrimKind::Int));
        assert!(table.lookup_field(a_id, "missing").is_err());
    }

    #[test]
    fn test_widening_distance() {
        let table = KlassTable::new();
        assert_eq!(
            table.assign_distance(&Type::Prim(PrimKind::Int), &Type::Prim(PrimKind::Int)),
            Some(0)
        );
        assert_eq!(
            table.assign_distance(&Type::Prim(PrimKind::Long), &Type::Prim(PrimKind::Int)),
            Some(1)
        );
        assert_eq!(
            table.assign_distance(&Type::Prim(PrimKind::Int), &Type::Prim(PrimKind::Long)),
            None
        );
        assert_eq!(
            table.assign_distance(
                &Type::Prim(PrimKind::Boolean),
                &Type::Prim(PrimKind::Int)
            ),
            None
        );
    }

    #[test]
    fn test_parameterized_instances_are_cached() {
        let mut table = KlassTable::new();
        let mut g = decl("Box", None);
        g.type_params.push("T".into());
        let ids = table.declare_unit(&unit(vec![g]));
        for id in ids {
            table.load(id).unwrap();
        }
        let box_id = table.by_qualified_name("Box").unwrap();
        let string_ty = {
            let sid = table.resolve_qualified("java.lang.String").unwrap();
            Type::Klass(sid)
        };
        let p1 = table.parameterize(box_id, vec![string_ty.clone()]);
        let p2 = table.parameterize(box_id, vec![string_ty]);
        assert_eq!(p1, p2);
        assert_ne!(p1, box_id);
        assert_eq!(table.klass(p1).generic, Some(box_id));
    }

    #[test]
    fn test_library_chain_loads_lazily() {
        let mut table = KlassTable::new();
        let rte = table.resolve_qualified("java.lang.RuntimeException").unwrap();
        table.load(rte).unwrap();
        let throwable = table.by_qualified_name("java.lang.Throwable").unwrap();
        assert_eq!(table.subclass_distance(rte, throwable), Some(2));
    }
}
