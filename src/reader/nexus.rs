//! HDF5/NeXus reader built on the `hdf5` crate.
//!
//! Soft links are followed by the HDF5 library itself, so linked groups and
//! datasets surface as ordinary nodes. Values that cannot be converted are
//! recorded as read errors on the node instead of failing the whole file.
//! Datasets of rank two or more are only read when named in `values`.

use std::path::Path;

use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::Container;
use log::debug;
use serde_json::Value;

use super::{needs_value, trim_fixed, ReaderError};
use crate::node::{Attribute, DType, Field, Group, HierarchicalNode, NX_CLASS};

/// Fixed-length strings are converted to this size on read
const FIXED_STRING_SIZE: usize = 1024;

/// Read an HDF5 file into a node tree
pub(super) fn read_file(path: &Path, values: &[String]) -> Result<Group, ReaderError> {
    let file = hdf5::File::open(path)?;
    read_group("", &file, values)
}

fn read_group(name: &str, group: &hdf5::Group, values: &[String]) -> Result<Group, ReaderError> {
    let mut node = Group::new(name);
    node.attributes = read_attributes(group)?;
    node.nx_class = node
        .attributes
        .iter()
        .find(|a| a.name == NX_CLASS)
        .and_then(|a| a.value.as_ref())
        .and_then(|v| v.as_str().map(str::to_string));

    for member in group.member_names()? {
        if let Ok(child) = group.group(&member) {
            node.children
                .push(HierarchicalNode::Group(read_group(&member, &child, values)?));
        } else if let Ok(dataset) = group.dataset(&member) {
            let mut field = Field {
                name: member.clone(),
                shape: dataset.shape(),
                attributes: read_attributes(&dataset)?,
                ..Default::default()
            };
            if needs_value(&member, &field.shape, values) {
                match read_container(&dataset) {
                    Ok((dtype, value)) => {
                        field.dtype = dtype;
                        field.value = Some(value);
                    }
                    Err(reason) => field.error = Some(reason),
                }
            } else {
                match descriptor(&dataset).and_then(|d| dtype_of(&d)) {
                    Ok(dtype) => field.dtype = dtype,
                    Err(reason) => field.error = Some(reason),
                }
            }
            node.children.push(HierarchicalNode::Field(field));
        } else {
            debug!("Skipping member '{}' of unsupported object type", member);
        }
    }
    Ok(node)
}

fn read_attributes(location: &hdf5::Location) -> Result<Vec<Attribute>, ReaderError> {
    let mut attributes = Vec::new();
    for name in location.attr_names()? {
        let mut attribute = Attribute {
            name: name.clone(),
            ..Default::default()
        };
        match location.attr(&name) {
            Ok(attr) => {
                attribute.shape = attr.shape();
                match read_container(&attr) {
                    Ok((dtype, value)) => {
                        attribute.dtype = dtype;
                        attribute.value = Some(value);
                    }
                    Err(reason) => attribute.error = Some(reason),
                }
            }
            Err(e) => attribute.error = Some(e.to_string()),
        }
        attributes.push(attribute);
    }
    Ok(attributes)
}

fn descriptor(container: &Container) -> Result<TypeDescriptor, String> {
    container
        .dtype()
        .and_then(|t| t.to_descriptor())
        .map_err(|e| e.to_string())
}

fn dtype_of(descriptor: &TypeDescriptor) -> Result<DType, String> {
    match descriptor {
        TypeDescriptor::Integer(_) => Ok(DType::Int64),
        TypeDescriptor::Unsigned(_) => Ok(DType::UInt64),
        TypeDescriptor::Float(_) => Ok(DType::Float64),
        TypeDescriptor::Boolean => Ok(DType::Bool),
        TypeDescriptor::VarLenUnicode
        | TypeDescriptor::VarLenAscii
        | TypeDescriptor::FixedAscii(_)
        | TypeDescriptor::FixedUnicode(_) => Ok(DType::String),
        other => Err(format!("unsupported datatype {:?}", other)),
    }
}

fn read_container(container: &Container) -> Result<(DType, Value), String> {
    let descriptor = descriptor(container)?;
    let dtype = dtype_of(&descriptor)?;
    let shape = container.shape();

    let flat: Vec<Value> = match descriptor {
        TypeDescriptor::Integer(_) => collect::<i64>(container)?,
        TypeDescriptor::Unsigned(_) => collect::<u64>(container)?,
        TypeDescriptor::Float(_) => collect::<f64>(container)?,
        TypeDescriptor::Boolean => collect::<bool>(container)?,
        TypeDescriptor::VarLenUnicode => container
            .read_raw::<VarLenUnicode>()
            .map_err(|e| e.to_string())?
            .iter()
            .map(|s| Value::from(s.as_str()))
            .collect(),
        TypeDescriptor::VarLenAscii => container
            .read_raw::<VarLenAscii>()
            .map_err(|e| e.to_string())?
            .iter()
            .map(|s| Value::from(s.as_str()))
            .collect(),
        TypeDescriptor::FixedAscii(_) => container
            .read_raw::<FixedAscii<FIXED_STRING_SIZE>>()
            .map_err(|e| e.to_string())?
            .iter()
            .map(|s| Value::from(trim_fixed(s.as_str())))
            .collect(),
        TypeDescriptor::FixedUnicode(_) => container
            .read_raw::<FixedUnicode<FIXED_STRING_SIZE>>()
            .map_err(|e| e.to_string())?
            .iter()
            .map(|s| Value::from(trim_fixed(s.as_str())))
            .collect(),
        other => return Err(format!("unsupported datatype {:?}", other)),
    };
    Ok((dtype, nest(flat, &shape)))
}

fn collect<T>(container: &Container) -> Result<Vec<Value>, String>
where
    T: hdf5::H5Type + Into<Value>,
{
    container
        .read_raw::<T>()
        .map(|values| values.into_iter().map(Into::into).collect())
        .map_err(|e| e.to_string())
}

/// Rebuild nested arrays from row-major flat data
fn nest(mut flat: Vec<Value>, shape: &[usize]) -> Value {
    match shape {
        [] => flat.pop().unwrap_or(Value::Null),
        [_] => Value::Array(flat),
        [_, rest @ ..] => {
            let chunk: usize = rest.iter().product::<usize>().max(1);
            let rows = flat
                .chunks(chunk)
                .map(|row| nest(row.to_vec(), rest))
                .collect();
            Value::Array(rows)
        }
    }
}
