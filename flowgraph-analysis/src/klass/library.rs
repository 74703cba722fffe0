//! Library type lookup — the external collaborator that supplies klass
//! descriptors for types the analysis has no source for.

use serde::{Deserialize, Serialize};

use crate::ast::TypeName;

/// A field in a library klass descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryFieldDesc {
    pub name: String,
    pub ty: TypeName,
    #[serde(default)]
    pub is_static: bool,
}

/// A method in a library klass descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryMethodDesc {
    pub name: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub params: Vec<TypeName>,
    /// `None` means void (or the klass itself for constructors).
    pub return_type: Option<TypeName>,
    #[serde(default)]
    pub throws: Vec<TypeName>,
    #[serde(default)]
    pub varargs: bool,
}

/// A loadable description of a pre-compiled klass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryKlassDesc {
    pub qualified: String,
    pub is_interface: bool,
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default)]
    pub fields: Vec<LibraryFieldDesc>,
    #[serde(default)]
    pub methods: Vec<LibraryMethodDesc>,
}

/// Resolves fully-qualified names to library klass descriptors.
pub trait LibraryResolver: Send {
    fn lookup(&self, qualified: &str) -> Option<LibraryKlassDesc>;
}

/// The handful of `java.lang` types analysis cannot do without.
///
/// Hosts with richer metadata (jar indexes, stub files) install their
/// own resolver in front of this one.
#[derive(Debug, Default)]
pub struct BuiltinLibrary;

impl BuiltinLibrary {
    fn desc(&self, qualified: &str) -> Option<LibraryKlassDesc> {
        let object = |name: &str| LibraryKlassDesc {
            qualified: name.to_string(),
            is_interface: false,
            superclass: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            type_params: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        };
        match qualified {
            "java.lang.Object" => Some(LibraryKlassDesc {
                qualified: qualified.to_string(),
                is_interface: false,
                superclass: None,
                interfaces: Vec::new(),
                type_params: Vec::new(),
                fields: Vec::new(),
                methods: vec![
                    LibraryMethodDesc {
                        name: "equals".into(),
                        is_static: false,
                        is_constructor: false,
                        params: vec![TypeName::simple("java.lang.Object")],
                        return_type: Some(TypeName::simple("boolean")),
                        throws: Vec::new(),
                        varargs: false,
                    },
                    LibraryMethodDesc {
                        name: "hashCode".into(),
                        is_static: false,
                        is_constructor: false,
                        params: Vec::new(),
                        return_type: Some(TypeName::simple("int")),
                        throws: Vec::new(),
                        varargs: false,
                    },
                    LibraryMethodDesc {
                        name: "toString".into(),
                        is_static: false,
                        is_constructor: false,
                        params: Vec::new(),
                        return_type: Some(TypeName::simple("java.lang.String")),
                        throws: Vec::new(),
                        varargs: false,
                    },
                ],
            }),
            "java.lang.String" => Some(LibraryKlassDesc {
                qualified: qualified.to_string(),
                is_interface: false,
                superclass: Some("java.lang.Object".to_string()),
                interfaces: Vec::new(),
                type_params: Vec::new(),
                fields: Vec::new(),
                methods: vec![
                    LibraryMethodDesc {
                        name: "length".into(),
                        is_static: false,
                        is_constructor: false,
                        params: Vec::new(),
                        return_type: Some(TypeName::simple("int")),
                        throws: Vec::new(),
                        varargs: false,
                    },
                    LibraryMethodDesc {
                        name: "charAt".into(),
                        is_static: false,
                        is_constructor: false,
                        params: vec![TypeName::simple("int")],
                        return_type: Some(TypeName::simple("char")),
                        throws: Vec::new(),
                        varargs: false,
                    },
                    LibraryMethodDesc {
                        name: "concat".into(),
                        is_static: false,
                        is_constructor: false,
                        params: vec![TypeName::simple("java.lang.String")],
                        return_type: Some(TypeName::simple("java.lang.String")),
                        throws: Vec::new(),
                        varargs: false,
                    },
                ],
            }),
            "java.lang.Boolean"
            | "java.lang.Byte"
            | "java.lang.Character"
            | "java.lang.Short"
            | "java.lang.Integer"
            | "java.lang.Long"
            | "java.lang.Float"
            | "java.lang.Double" => Some(object(qualified)),
            "java.lang.Throwable" => Some(LibraryKlassDesc {
                qualified: qualified.to_string(),
                is_interface: false,
                superclass: Some("java.lang.Object".to_string()),
                interfaces: Vec::new(),
                type_params: Vec::new(),
                fields: Vec::new(),
                methods: vec![LibraryMethodDesc {
                    name: "getMessage".into(),
                    is_static: false,
                    is_constructor: false,
                    params: Vec::new(),
                    return_type: Some(TypeName::simple("java.lang.String")),
                    throws: Vec::new(),
                    varargs: false,
                }],
            }),
            "java.lang.Exception" | "java.lang.Error" => Some(LibraryKlassDesc {
                superclass: Some("java.lang.Throwable".to_string()),
                ..object(qualified)
            }),
            "java.lang.RuntimeException" => Some(LibraryKlassDesc {
                superclass: Some("java.lang.Exception".to_string()),
                ..object(qualified)
            }),
            "java.lang.Iterable" => Some(LibraryKlassDesc {
                qualified: qualified.to_string(),
                is_interface: true,
                superclass: Some("java.lang.Object".to_string()),
                interfaces: Vec::new(),
                type_params: vec!["T".to_string()],
                fields: Vec::new(),
                methods: Vec::new(),
            }),
            _ => None,
        }
    }
}

impl LibraryResolver for BuiltinLibrary {
    fn lookup(&self, qualified: &str) -> Option<LibraryKlassDesc> {
        self.desc(qualified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_throwable_chain() {
        let lib = BuiltinLibrary;
        let rte = lib.lookup("java.lang.RuntimeException").unwrap();
        assert_eq!(rte.superclass.as_deref(), Some("java.lang.Exception"));
        let exc = lib.lookup("java.lang.Exception").unwrap();
        assert_eq!(exc.superclass.as_deref(), Some("java.lang.Throwable"));
        assert!(lib.lookup("java.lang.Throwable").is_some());
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        assert!(BuiltinLibrary.lookup("com.example.Missing").is_none());
    }
}
