//! Entity resolution errors.

/// A name lookup that found nothing.
///
/// Variants carry the searched name so per-method failure reports can
/// name the offending entity.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("type not found: {name}")]
    TypeNotFound { name: String },

    #[error("variable not found: {name}")]
    VariableNotFound { name: String },

    #[error("field not found: {klass}.{name}")]
    FieldNotFound { klass: String, name: String },

    #[error("no method {name}({arg_types}) applicable")]
    MethodNotFound { name: String, arg_types: String },

    #[error("klass not loaded: {name}")]
    KlassNotLoaded { name: String },
}

impl ResolveError {
    pub fn type_not_found(name: impl Into<String>) -> Self {
        Self::TypeNotFound { name: name.into() }
    }

    pub fn variable_not_found(name: impl Into<String>) -> Self {
        Self::VariableNotFound { name: name.into() }
    }

    pub fn field_not_found(klass: impl Into<String>, name: impl Into<String>) -> Self {
        Self::FieldNotFound {
            klass: klass.into(),
            name: name.into(),
        }
    }

    pub fn method_not_found(name: impl Into<String>, arg_types: impl Into<String>) -> Self {
        Self::MethodNotFound {
            name: name.into(),
            arg_types: arg_types.into(),
        }
    }
}
