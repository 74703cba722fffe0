//! Klass/method records and the resolved type representation.

use std::collections::BTreeSet;
use std::sync::Arc;

use flowgraph_core::types::collections::FxHashMap;

use crate::ast::TypeDecl;
use crate::scopes::{Ref, RefSet};

use super::library::LibraryKlassDesc;

/// Index of a klass in the [`super::KlassTable`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KlassId(pub u32);

/// Index of a method in the [`super::KlassTable`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId(pub u32);

/// Primitive value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "char" => Self::Char,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            _ => return None,
        })
    }

    /// Qualified name of the boxed counterpart.
    pub fn box_name(self) -> &'static str {
        match self {
            Self::Boolean => "java.lang.Boolean",
            Self::Byte => "java.lang.Byte",
            Self::Char => "java.lang.Character",
            Self::Short => "java.lang.Short",
            Self::Int => "java.lang.Integer",
            Self::Long => "java.lang.Long",
            Self::Float => "java.lang.Float",
            Self::Double => "java.lang.Double",
        }
    }

    /// Widening rank along byte < short < int < long < float < double;
    /// char widens like short. Booleans do not widen.
    pub fn widening_rank(self) -> Option<u32> {
        Some(match self {
            Self::Boolean => return None,
            Self::Byte => 0,
            Self::Char | Self::Short => 1,
            Self::Int => 2,
            Self::Long => 3,
            Self::Float => 4,
            Self::Double => 5,
        })
    }
}

/// A resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Resolution failed but analysis continues (tolerant tagging).
    Unknown,
    /// The type of the `null` literal.
    Null,
    Void,
    Prim(PrimKind),
    /// One dimension per wrap.
    Array(Box<Type>),
    Klass(KlassId),
    /// An unbound type variable.
    Var(String),
}

impl Type {
    pub fn array(self) -> Self {
        Self::Array(Box::new(self))
    }

    pub fn elem(&self) -> Option<&Type> {
        match self {
            Self::Array(e) => Some(e),
            _ => None,
        }
    }

    pub fn klass_id(&self) -> Option<KlassId> {
        match self {
            Self::Klass(id) => Some(*id),
            _ => None,
        }
    }
}

/// How a method is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    Static,
    Instance,
    Constructor,
    /// Functional-interface style target (single abstract method).
    Lambda,
}

/// What a call site is looking for. `InstanceOrStatic` covers
/// unqualified calls where either style applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStyle {
    Static,
    Instance,
    Constructor,
    InstanceOrStatic,
}

impl LookupStyle {
    pub fn admits(self, style: CallStyle) -> bool {
        match self {
            Self::Static => style == CallStyle::Static,
            Self::Instance => matches!(style, CallStyle::Instance | CallStyle::Lambda),
            Self::Constructor => style == CallStyle::Constructor,
            Self::InstanceOrStatic => {
                matches!(style, CallStyle::Instance | CallStyle::Static | CallStyle::Lambda)
            }
        }
    }
}

/// An ordered parameter list plus return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncType {
    pub params: Vec<Type>,
    pub ret: Type,
    /// The last parameter is a varargs array.
    pub varargs: bool,
}

/// Lazy-load state; `Building` breaks load cycles between mutually
/// referencing klasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unbuilt,
    Building,
    Built,
}

/// What a klass represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlassKind {
    Class,
    Interface,
    Enum,
}

/// A resolved class or interface.
///
/// Klasses reference supertypes by id only; the table owns every
/// instance, so the subtype graph carries no ownership cycles.
#[derive(Debug)]
pub struct Klass {
    pub id: KlassId,
    pub kind: KlassKind,
    /// Simple name (parameterized instances append their argument list).
    pub name: String,
    /// Package- and outer-qualified canonical name.
    pub qualified: String,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub state: LoadState,
    pub base: Option<KlassId>,
    pub ifaces: Vec<KlassId>,
    pub outer: Option<KlassId>,
    pub type_params: Vec<String>,
    /// Declared fields in declaration order.
    pub fields: Vec<Ref>,
    pub fields_by_name: FxHashMap<String, (Ref, Type)>,
    /// Declared methods in declaration order.
    pub methods: Vec<MethodId>,
    /// Source declaration, if the klass comes from parsed source.
    pub decl: Option<Arc<TypeDecl>>,
    /// Library descriptor, if the klass comes from the library resolver.
    pub library: Option<LibraryKlassDesc>,
    /// For a parameterized instance: the generic klass it instantiates.
    pub generic: Option<KlassId>,
    /// Bindings parallel to the generic klass's `type_params`.
    pub type_args: Vec<Type>,
    /// Cache of parameterized instances, keyed by argument tuple name.
    pub param_cache: FxHashMap<String, KlassId>,
    /// The receiver ref, created at load for non-static contexts.
    pub this_ref: Option<Ref>,
}

/// A resolved method.
#[derive(Debug)]
pub struct Method {
    pub id: MethodId,
    pub klass: Option<KlassId>,
    pub name: String,
    pub style: CallStyle,
    pub func: FuncType,
    pub throws: Vec<Type>,
    /// Canonical signature, e.g. `demo.A.f(int,java.lang.String)`.
    pub signature: String,
    /// Index into the declaring klass's `decl.methods`, when from source.
    pub decl_index: Option<usize>,
    /// True when a source body is available for analysis.
    pub has_body: bool,
    /// Methods this one overrides (toward supertypes).
    pub overrides: Vec<MethodId>,
    /// Subtype methods overriding this one.
    pub overriders: Vec<MethodId>,
    /// Methods that call this one.
    pub callers: BTreeSet<MethodId>,
    /// Resolved callees inside this method's body.
    pub call_sites: Vec<MethodId>,
    /// Aggregated cross-method read effects (fields, array elements).
    pub input_refs: RefSet,
    /// Aggregated cross-method write effects.
    pub output_refs: RefSet,
}

