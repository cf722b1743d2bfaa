//! The C type environment (§4.2 "Type environment").
//!
//! C types are reified separately from [`crate::ir::IrType`] because
//! they carry information the IR deliberately drops: signedness, a
//! cached derived pointer type, and struct field names (the IR only
//! knows a struct's layout, not what its fields are called — that's
//! `ir_gen`'s business, resolved once at `FIELD`-building time).
//!
//! Four name-indexed tables over a scoped chain, per the specification:
//! struct tags, union tags, enum tags, and bare types/typedefs. Union
//! and enum support is intentionally thin (this subset's non-goals
//! exclude bit-fields and the full type system) but the tables exist so
//! `struct`/`union`/`enum` tag lookup and `typedef` resolution share one
//! shape.

use rustc_hash::FxHashMap;

use crate::ir::{IrType, StructId};

#[derive(Clone, Debug, PartialEq)]
pub enum CType {
    Void,
    Int { width: u32, signed: bool },
    Pointer(Box<CType>),
    Array(Box<CType>, u64),
    Function {
        return_type: Box<CType>,
        params: Vec<CType>,
    },
    Struct { tag: String, ir_id: StructId },
}

impl CType {
    pub const INT: CType = CType::Int { width: 32, signed: true };
    pub const CHAR: CType = CType::Int { width: 8, signed: true };
    pub const LONG: CType = CType::Int { width: 64, signed: true };

    pub fn pointer_to(self) -> CType {
        CType::Pointer(Box::new(self))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, CType::Int { .. })
    }

    pub fn is_pointer_like(&self) -> bool {
        matches!(self, CType::Pointer(_) | CType::Array(_, _))
    }

    pub fn pointee(&self) -> &CType {
        match self {
            CType::Pointer(inner) => inner,
            CType::Array(inner, _) => inner,
            other => panic!("pointee() of non-pointer-like CType {other:?}"),
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, CType::Int { signed: true, .. })
    }

    /// Projects this C type down to the IR type it's represented with.
    /// This is a structural projection, not lowering: an array stays an
    /// `IrType::Array` here (needed so a `LOCAL` slot can be declared
    /// with the right size). Array-to-pointer decay — "an identifier of
    /// array type behaves as a pointer" — happens in `lower`'s
    /// lvalue/rvalue handling, not here.
    pub fn to_ir(&self) -> IrType {
        match self {
            CType::Void => IrType::Void,
            CType::Int { width, .. } => IrType::Int(*width),
            CType::Pointer(_) => IrType::Pointer,
            CType::Array(elem, count) => IrType::Array(Box::new(elem.to_ir()), *count),
            CType::Function { return_type, params } => {
                IrType::Function(std::rc::Rc::new(crate::ir::FunctionType {
                    return_type: return_type.to_ir(),
                    param_types: params.iter().map(CType::to_ir).collect(),
                }))
            }
            CType::Struct { ir_id, .. } => IrType::Struct(*ir_id),
        }
    }
}

#[derive(Default)]
struct Scope {
    struct_tags: FxHashMap<String, CType>,
    #[allow(dead_code)]
    union_tags: FxHashMap<String, CType>,
    #[allow(dead_code)]
    enum_tags: FxHashMap<String, CType>,
    bare_types: FxHashMap<String, CType>,
}

/// The scoped chain of the four name tables described in §4.2, plus a
/// translation-unit-lifetime side table from struct id to its ordered
/// `(field name, C type)` list. The IR's own struct table only tracks
/// `IrType`/byte offsets; field *names* and their full `CType` (needed
/// to resolve `a.f` / `a->f` and to type-check assignments) live here,
/// the same split the source keeps between `IrType`'s struct and
/// `CType`'s `strukt.fields`.
pub struct TypeEnv {
    scopes: Vec<Scope>,
    struct_members: FxHashMap<StructId, Vec<(String, CType)>>,
}

impl TypeEnv {
    pub fn new() -> TypeEnv {
        TypeEnv::default()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the outermost type scope");
    }

    pub fn declare_struct_tag(&mut self, tag: &str, ty: CType) {
        self.scopes
            .last_mut()
            .unwrap()
            .struct_tags
            .insert(tag.to_string(), ty);
    }

    pub fn lookup_struct_tag(&self, tag: &str) -> Option<&CType> {
        self.scopes.iter().rev().find_map(|s| s.struct_tags.get(tag))
    }

    pub fn declare_typedef(&mut self, name: &str, ty: CType) {
        self.scopes
            .last_mut()
            .unwrap()
            .bare_types
            .insert(name.to_string(), ty);
    }

    pub fn lookup_bare_type(&self, name: &str) -> Option<&CType> {
        self.scopes.iter().rev().find_map(|s| s.bare_types.get(name))
    }

    pub fn register_struct(&mut self, id: StructId, members: Vec<(String, CType)>) {
        self.struct_members.insert(id, members);
    }

    /// Looks up a struct field by name, returning its index (matching
    /// the IR struct table's field order) and its `CType`.
    pub fn struct_member(&self, id: StructId, name: &str) -> Option<(u32, CType)> {
        self.struct_members.get(&id)?.iter().position(|(n, _)| n == name).map(|i| {
            (i as u32, self.struct_members[&id][i].1.clone())
        })
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        let mut env = TypeEnv {
            scopes: Vec::new(),
            struct_members: FxHashMap::default(),
        };
        env.push_scope();
        let env_scope = env.scopes.last_mut().unwrap();
        env_scope.bare_types.insert("void".to_string(), CType::Void);
        env_scope.bare_types.insert("int".to_string(), CType::INT);
        env_scope.bare_types.insert("char".to_string(), CType::CHAR);
        env_scope.bare_types.insert("long".to_string(), CType::LONG);
        env
    }
}
