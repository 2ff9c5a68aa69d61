//! Field model (C2): flattens aggregate types into field sequences and
//! computes offset/stride/modulus arithmetic over them.

use std::collections::BTreeMap as Map;

use crate::pta::error::{PtaError, Result};

/// A type as seen by the analysis. Deliberately not the front-end's real
/// type system -- just enough structure (aggregate vs. not, nesting,
/// element count) to flatten fields and compute strides.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    /// A non-aggregate leaf type, named for diagnostics (`i32`, `ptr`, ...).
    Simple(String),
    Struct {
        name: String,
        fields: Vec<Type>,
    },
    Array {
        elem: Box<Type>,
        count: u32,
    },
}

impl Type {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Struct { .. } | Type::Array { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Simple(name) if name == "function")
    }

    /// A crude, self-consistent byte-size model: every leaf is one word,
    /// structs sum their fields, arrays multiply. Good enough for stride
    /// arithmetic; the core never needs a real ABI layout.
    pub fn byte_size(&self) -> u32 {
        match self {
            Type::Simple(_) => 1,
            Type::Struct { fields, .. } => fields.iter().map(Type::byte_size).sum::<u32>().max(1),
            Type::Array { elem, count } => elem.byte_size() * (*count).max(1),
        }
    }
}

/// `(byte_offset, field_index)` into an aggregate, plus the running
/// accumulator array indexing folds into. `field_index` is signed because
/// an access path built from an unknown (variable) array index can walk
/// negative before being reflected back to `[0, limit)` by
/// [`modulus_offset`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct AccessPath {
    pub byte_offset: i64,
    pub field_index: i64,
}

impl AccessPath {
    pub fn zero() -> Self {
        AccessPath::default()
    }

    pub fn field(field_index: i64, byte_offset: i64) -> Self {
        AccessPath { byte_offset, field_index }
    }

    /// Folds a (possibly dynamic) array index into the path using the
    /// element's stride, as happens when a gep walks through an array
    /// dimension.
    pub fn offset_by_stride(mut self, index: i64, stride: i64) -> Self {
        self.byte_offset += index * stride;
        self.field_index += index;
        self
    }
}

/// Projects an access path into `[0, obj_limit)`. A limit of zero means
/// the object is field-insensitive and every access path collapses to 0.
pub fn modulus_offset(field_index: i64, obj_limit: u32) -> u32 {
    if obj_limit == 0 {
        return 0;
    }
    (field_index.unsigned_abs() as u32) % obj_limit
}

/// The flattened field/element sequence of an aggregate type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StInfo {
    pub flattened_field_types: Vec<Type>,
    pub flattened_element_types: Vec<Type>,
    /// Flat start index of each *directly declared* struct field.
    pub field_index_vector: Vec<u32>,
    /// Flat start index of each array dimension's element flattening
    /// (trivial -- arrays have exactly one dimension's worth of entries --
    /// kept as a vector for symmetry with `field_index_vector` and so a
    /// client walking both aggregates the same way).
    pub element_index_vector: Vec<u32>,
    pub stride: u32,
    pub num_flatten_fields: u32,
    pub num_flatten_elements: u32,
}

impl StInfo {
    fn leaf(ty: Type) -> StInfo {
        StInfo {
            flattened_field_types: vec![ty.clone()],
            flattened_element_types: vec![ty],
            field_index_vector: vec![0],
            element_index_vector: vec![0],
            stride: 0,
            num_flatten_fields: 1,
            num_flatten_elements: 1,
        }
    }
}

/// Computes and caches [`StInfo`] per type (C2).
#[derive(Debug, Default)]
pub struct FieldModel {
    cache: Map<Type, StInfo>,
}

impl FieldModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn st_info(&mut self, ty: &Type) -> &StInfo {
        if !self.cache.contains_key(ty) {
            let info = Self::compute(ty);
            self.cache.insert(ty.clone(), info);
        }
        &self.cache[ty]
    }

    fn compute(ty: &Type) -> StInfo {
        match ty {
            Type::Simple(_) => StInfo::leaf(ty.clone()),
            Type::Struct { fields, .. } => {
                let mut flattened_field_types = Vec::new();
                let mut field_index_vector = Vec::with_capacity(fields.len());
                for field_ty in fields {
                    field_index_vector.push(flattened_field_types.len() as u32);
                    if field_ty.is_aggregate() {
                        let inner = Self::compute(field_ty);
                        flattened_field_types.extend(inner.flattened_field_types);
                    } else {
                        flattened_field_types.push(field_ty.clone());
                    }
                }
                let num_flatten_fields = flattened_field_types.len() as u32;
                StInfo {
                    flattened_element_types: flattened_field_types.clone(),
                    flattened_field_types,
                    field_index_vector,
                    element_index_vector: vec![0],
                    stride: 0,
                    num_flatten_fields,
                    num_flatten_elements: num_flatten_fields,
                }
            }
            Type::Array { elem, count } => {
                let inner = Self::compute(elem);
                let num_flatten_elements = count * inner.num_flatten_elements;
                StInfo {
                    flattened_field_types: vec![(**elem).clone()],
                    flattened_element_types: inner.flattened_element_types,
                    field_index_vector: vec![0],
                    element_index_vector: vec![0],
                    stride: elem.byte_size(),
                    num_flatten_fields: 1,
                    num_flatten_elements,
                }
            }
        }
    }

    pub fn flattened_element_type(&mut self, ty: &Type, k: u32) -> Result<Type> {
        let info = self.st_info(ty);
        let count = info.num_flatten_elements;
        if k >= count || info.flattened_element_types.is_empty() {
            return Err(PtaError::FieldOutOfRange { field: k, count });
        }
        let idx = (k as usize) % info.flattened_element_types.len();
        Ok(info.flattened_element_types[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i32_ty() -> Type {
        Type::Simple("i32".into())
    }

    #[test]
    fn simple_type_is_one_field() {
        let mut fm = FieldModel::new();
        let info = fm.st_info(&i32_ty());
        assert_eq!(info.num_flatten_fields, 1);
        assert_eq!(info.num_flatten_elements, 1);
    }

    #[test]
    fn nested_struct_splices_inner_sequence() {
        let inner = Type::Struct {
            name: "Pair".into(),
            fields: vec![i32_ty(), i32_ty()],
        };
        let outer = Type::Struct {
            name: "Outer".into(),
            fields: vec![i32_ty(), inner, i32_ty()],
        };
        let mut fm = FieldModel::new();
        let info = fm.st_info(&outer);
        // field 0 (i32), fields 1-2 (Pair's two i32s), field 3 (i32) -> 4 flat fields
        assert_eq!(info.num_flatten_fields, 4);
        assert_eq!(info.field_index_vector, vec![0, 1, 3]);
    }

    #[test]
    fn array_flattening_multiplies_element_count() {
        let arr = Type::Array { elem: Box::new(i32_ty()), count: 5 };
        let mut fm = FieldModel::new();
        let info = fm.st_info(&arr);
        assert_eq!(info.num_flatten_elements, 5);
        assert_eq!(info.stride, 1);
    }

    #[test]
    fn out_of_range_field_errors() {
        let mut fm = FieldModel::new();
        let err = fm.flattened_element_type(&i32_ty(), 1).unwrap_err();
        assert_eq!(err, PtaError::FieldOutOfRange { field: 1, count: 1 });
    }

    #[test]
    fn modulus_offset_reflects_negative_and_collapses_to_zero_limit() {
        assert_eq!(modulus_offset(-3, 4), 3);
        assert_eq!(modulus_offset(5, 4), 1);
        assert_eq!(modulus_offset(5, 0), 0);
    }
}
