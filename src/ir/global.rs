//! Globals and translation units (§3 "Globals and translation units").

use crate::entity::PrimaryMap;
use crate::ir::entities::{Global, StructId};
use crate::ir::function::Function;
use crate::ir::types::IrType;
use crate::symbol::{Linkage, SymbolId};

/// Either a defined variable's constant initializer or a defined
/// function's body. A global with `defined == false` has neither.
#[derive(Clone, Debug)]
pub enum Initializer {
    None,
    Constant(u64),
    Function(Function),
}

#[derive(Clone, Debug)]
pub struct GlobalData {
    pub name: String,
    pub ty: IrType,
    pub defined: bool,
    pub linkage: Linkage,
    pub init: Initializer,
    /// Set by the encoder once this global has been emitted; consulted
    /// during fixup resolution. `None` until assembly emission runs.
    pub symbol: Option<SymbolId>,
}

impl GlobalData {
    pub fn function(&self) -> Option<&Function> {
        match &self.init {
            Initializer::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn function_mut(&mut self) -> Option<&mut Function> {
        match &mut self.init {
            Initializer::Function(f) => Some(f),
            _ => None,
        }
    }
}

/// A named struct type: an ordered list of `(name, type, byte offset)`
/// fields plus the total size and alignment computed once all fields
/// have been added.
#[derive(Clone, Debug, Default)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<StructField>,
    pub size: u64,
    pub align: u64,
    finished: bool,
}

#[derive(Clone, Debug)]
pub struct StructField {
    pub name: String,
    pub ty: IrType,
    pub offset: u64,
}

impl StructDef {
    pub fn field_index(&self, name: &str) -> Option<u32> {
        self.fields.iter().position(|f| f.name == name).map(|i| i as u32)
    }
}

/// The unit of input to the back end: corresponds to one C source file
/// after preprocessing. Owns every IR node transitively (globals,
/// function bodies, struct definitions) through the `PrimaryMap`s
/// below — the arena substitute for the source's pool allocator. There
/// is no per-node teardown; dropping the `TransUnit` releases
/// everything at once.
#[derive(Clone, Debug, Default)]
pub struct TransUnit {
    globals: PrimaryMap<Global, GlobalData>,
    structs: PrimaryMap<StructId, StructDef>,
}

impl TransUnit {
    pub fn new() -> TransUnit {
        TransUnit::default()
    }

    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        return_type: IrType,
        param_types: Vec<IrType>,
        linkage: Linkage,
    ) -> Global {
        let name = name.into();
        let ty = IrType::Function(std::rc::Rc::new(crate::ir::types::FunctionType {
            return_type: return_type.clone(),
            param_types: param_types.clone(),
        }));
        self.globals.push(GlobalData {
            name,
            ty,
            defined: false,
            linkage,
            init: Initializer::Function(Function::new(param_types, return_type)),
            symbol: None,
        })
    }

    pub fn add_var(&mut self, name: impl Into<String>, ty: IrType, linkage: Linkage) -> Global {
        self.globals.push(GlobalData {
            name: name.into(),
            ty,
            defined: false,
            linkage,
            init: Initializer::None,
            symbol: None,
        })
    }

    pub fn add_struct(&mut self, name: impl Into<String>, num_fields: usize) -> StructId {
        let mut fields = Vec::with_capacity(num_fields);
        fields.resize_with(num_fields, || StructField {
            name: String::new(),
            ty: IrType::Void,
            offset: 0,
        });
        self.structs.push(StructDef {
            name: name.into(),
            fields,
            size: 0,
            align: 1,
            finished: false,
        })
    }

    pub fn set_struct_field(&mut self, id: StructId, index: usize, name: impl Into<String>, ty: IrType) {
        let def = &mut self.structs[id];
        def.fields[index] = StructField {
            name: name.into(),
            ty,
            offset: 0,
        };
    }

    /// Computes field offsets and the struct's total size/alignment
    /// from its (now fully populated) field list, using each field's
    /// natural alignment — arrays collapse to their element type's
    /// alignment, matching §4.1's sizing rules. No trailing padding is
    /// inserted (§8: `size(S) = offset(last) + size(last)`).
    pub fn finish_struct(&mut self, id: StructId) {
        let mut offset = 0u64;
        let mut max_align = 1u64;
        let field_specs: Vec<(IrType, u64, u64)> = self.structs[id]
            .fields
            .iter()
            .map(|f| {
                let size = self.size_of(&f.ty);
                let align = self.align_of(&f.ty);
                (f.ty.clone(), size, align)
            })
            .collect();
        let def = &mut self.structs[id];
        for (field, (_, size, align)) in def.fields.iter_mut().zip(field_specs) {
            offset = align_up(offset, align);
            field.offset = offset;
            offset += size;
            max_align = max_align.max(align);
        }
        def.size = offset;
        def.align = max_align;
        def.finished = true;
    }

    pub fn global(&self, global: Global) -> &GlobalData {
        &self.globals[global]
    }

    pub fn global_mut(&mut self, global: Global) -> &mut GlobalData {
        &mut self.globals[global]
    }

    pub fn globals(&self) -> impl Iterator<Item = (Global, &GlobalData)> {
        self.globals.iter()
    }

    pub fn globals_mut_pairs(&mut self) -> &mut PrimaryMap<Global, GlobalData> {
        &mut self.globals
    }

    pub fn find_global_by_name(&self, name: &str) -> Option<Global> {
        self.globals.iter().find(|(_, g)| g.name == name).map(|(id, _)| id)
    }

    pub fn strukt(&self, id: StructId) -> &StructDef {
        &self.structs[id]
    }

    pub fn find_struct_by_name(&self, name: &str) -> Option<StructId> {
        self.structs.iter().find(|(_, s)| s.name == name).map(|(id, _)| id)
    }

    /// Size, in bytes, of `ty` (§4.1 "Size/alignment computation").
    pub fn size_of(&self, ty: &IrType) -> u64 {
        match ty {
            IrType::Int(bits) => (*bits as u64) / 8,
            IrType::Pointer | IrType::Function(_) => 8,
            IrType::Struct(id) => self.structs[*id].size,
            IrType::Array(elem, count) => self.size_of(elem) * count,
            IrType::Void => 0,
        }
    }

    /// Alignment, in bytes, of `ty`. Arrays collapse to their element
    /// type's alignment; structs use the max field alignment computed
    /// by `finish_struct`.
    pub fn align_of(&self, ty: &IrType) -> u64 {
        match ty {
            IrType::Int(bits) => (*bits as u64) / 8,
            IrType::Pointer | IrType::Function(_) => 8,
            IrType::Struct(id) => self.structs[*id].align,
            IrType::Array(elem, _) => self.align_of(elem),
            IrType::Void => 1,
        }
    }
}

fn align_up(offset: u64, align: u64) -> u64 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}
