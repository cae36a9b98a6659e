//! Rewrite engines: the seam between the caching pipeline and the code that
//! actually renames symbols inside an archive.

use crate::error::BoxError;
use crate::remap::archive::{self, entry_options};
use crate::remap::classfile::{ClassFile, ClassFormatError, Constant, ACC_PRIVATE, ACC_STATIC};
use crate::remap::jar_mapping::JarMapping;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;
use zip::ZipWriter;

pub trait RewriteEngine: Send + Sync {
    /// Writes a renamed copy of archive `input` to `output`.
    fn rewrite(&self, mapping: &JarMapping, input: &Path, output: &Path) -> Result<(), BoxError>;
}

/// Built-in engine operating directly on class files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassRemapEngine;

impl ClassRemapEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Jar signature files; renamed classes no longer match their digests.
fn is_signature_file(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };
    !file.contains('/')
        && [".SF", ".RSA", ".DSA", ".EC"]
            .iter()
            .any(|ext| file.to_ascii_uppercase().ends_with(ext))
}

impl RewriteEngine for ClassRemapEngine {
    fn rewrite(&self, mapping: &JarMapping, input: &Path, output: &Path) -> Result<(), BoxError> {
        let mut source = archive::open(input)?;
        let mut writer = ZipWriter::new(File::create(output)?);
        let options = entry_options();
        let mut classes = 0usize;

        for i in 0..source.len() {
            let mut entry = source.by_index(i)?;
            let name = entry.name().to_string();
            if entry.is_dir() {
                writer.add_directory(name, options)?;
                continue;
            }
            if is_signature_file(&name) {
                debug!("Dropping signature file {}", name);
                continue;
            }
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;

            if name.ends_with(".class") {
                let class = ClassFile::parse(&data)
                    .map_err(|e| format!("{} in {}: {}", name, input.display(), e))?;
                let original = class.this_name()?.to_string();
                let renamed = remap_class(&class, mapping)?;
                // keep any prefix such as META-INF/versions/9/
                let prefix = name
                    .strip_suffix(&format!("{}.class", original))
                    .unwrap_or("");
                let new_name = format!("{}{}.class", prefix, renamed.this_name()?);
                writer.start_file(new_name, options)?;
                writer.write_all(&renamed.to_bytes())?;
                classes += 1;
            } else {
                writer.start_file(name, options)?;
                writer.write_all(&data)?;
            }
        }
        writer.finish()?;
        debug!("Remapped {} classes from {}", classes, input.display());
        Ok(())
    }
}

/// Tracks constants appended while rewriting one class, so equal names and
/// name-and-type pairs are appended only once.
struct Interner {
    utf8: HashMap<Vec<u8>, u16>,
    name_and_type: HashMap<(u16, u16), u16>,
}

impl Interner {
    fn new(class: &ClassFile) -> Self {
        let mut utf8 = HashMap::new();
        let mut name_and_type = HashMap::new();
        for (i, constant) in class.pool.iter().enumerate() {
            match constant {
                Constant::Utf8(bytes) => {
                    utf8.entry(bytes.clone()).or_insert(i as u16);
                }
                Constant::NameAndType { name, descriptor } => {
                    name_and_type.entry((*name, *descriptor)).or_insert(i as u16);
                }
                _ => {}
            }
        }
        Self { utf8, name_and_type }
    }

    fn utf8(&mut self, class: &mut ClassFile, value: &str) -> Result<u16, ClassFormatError> {
        if let Some(index) = self.utf8.get(value.as_bytes()) {
            return Ok(*index);
        }
        let index = class.push(Constant::Utf8(value.as_bytes().to_vec()))?;
        self.utf8.insert(value.as_bytes().to_vec(), index);
        Ok(index)
    }

    fn name_and_type(
        &mut self,
        class: &mut ClassFile,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ClassFormatError> {
        let key = (self.utf8(class, name)?, self.utf8(class, descriptor)?);
        if let Some(index) = self.name_and_type.get(&key) {
            return Ok(*index);
        }
        let index = class.push(Constant::NameAndType {
            name: key.0,
            descriptor: key.1,
        })?;
        self.name_and_type.insert(key, index);
        Ok(index)
    }
}

/// Returns a renamed copy of `class`.
///
/// Existing Utf8 and NameAndType entries may be shared by unrelated uses
/// (a field name can double as a string literal), so they are never edited.
/// Renamed references are pointed at appended entries instead.
pub fn remap_class(class: &ClassFile, mapping: &JarMapping) -> Result<ClassFile, ClassFormatError> {
    let mut out = class.clone();
    let mut interner = Interner::new(class);
    let this_name = class.this_name()?;

    for (index, constant) in class.pool.iter().enumerate() {
        match constant {
            Constant::Class { name } => {
                let old = class.utf8(*name)?;
                let new = mapping.map_class_constant(old);
                if new != old {
                    let name = interner.utf8(&mut out, &new)?;
                    out.pool[index] = Constant::Class { name };
                }
            }
            Constant::FieldRef {
                class: owner,
                name_and_type,
            } => {
                let (name, descriptor) = class.name_and_type(*name_and_type)?;
                let new_name = mapping.map_field(class.class_name(*owner)?, name);
                let new_descriptor = mapping.map_descriptor(descriptor);
                if new_name != name || new_descriptor != descriptor {
                    let nat = interner.name_and_type(&mut out, &new_name, &new_descriptor)?;
                    out.pool[index] = Constant::FieldRef {
                        class: *owner,
                        name_and_type: nat,
                    };
                }
            }
            Constant::MethodRef {
                class: owner,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class: owner,
                name_and_type,
            } => {
                let (name, descriptor) = class.name_and_type(*name_and_type)?;
                let new_name = mapping.map_method(class.class_name(*owner)?, name, descriptor);
                let new_descriptor = mapping.map_descriptor(descriptor);
                if new_name != name || new_descriptor != descriptor {
                    let nat = interner.name_and_type(&mut out, &new_name, &new_descriptor)?;
                    out.pool[index] = match constant {
                        Constant::MethodRef { .. } => Constant::MethodRef {
                            class: *owner,
                            name_and_type: nat,
                        },
                        _ => Constant::InterfaceMethodRef {
                            class: *owner,
                            name_and_type: nat,
                        },
                    };
                }
            }
            Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            }
            | Constant::Dynamic {
                bootstrap,
                name_and_type,
            } => {
                let (name, descriptor) = class.name_and_type(*name_and_type)?;
                let new_descriptor = mapping.map_descriptor(descriptor);
                if new_descriptor != descriptor {
                    let nat = interner.name_and_type(&mut out, name, &new_descriptor)?;
                    out.pool[index] = match constant {
                        Constant::InvokeDynamic { .. } => Constant::InvokeDynamic {
                            bootstrap: *bootstrap,
                            name_and_type: nat,
                        },
                        _ => Constant::Dynamic {
                            bootstrap: *bootstrap,
                            name_and_type: nat,
                        },
                    };
                }
            }
            Constant::MethodType { descriptor } => {
                let old = class.utf8(*descriptor)?;
                let new = mapping.map_descriptor(old);
                if new != old {
                    let descriptor = interner.utf8(&mut out, &new)?;
                    out.pool[index] = Constant::MethodType { descriptor };
                }
            }
            _ => {}
        }
    }

    for (i, field) in class.fields.iter().enumerate() {
        let name = class.utf8(field.name)?;
        let descriptor = class.utf8(field.descriptor)?;
        let new_name = mapping.map_declared_field(this_name, name);
        let new_descriptor = mapping.map_descriptor(descriptor);
        if new_name != name {
            out.fields[i].name = interner.utf8(&mut out, &new_name)?;
        }
        if new_descriptor != descriptor {
            out.fields[i].descriptor = interner.utf8(&mut out, &new_descriptor)?;
        }
    }

    for (i, method) in class.methods.iter().enumerate() {
        let name = class.utf8(method.name)?;
        let descriptor = class.utf8(method.descriptor)?;
        let overridable = method.access & (ACC_PRIVATE | ACC_STATIC) == 0;
        let new_name = mapping.map_declared_method(this_name, name, descriptor, overridable);
        let new_descriptor = mapping.map_descriptor(descriptor);
        if new_name != name {
            out.methods[i].name = interner.utf8(&mut out, &new_name)?;
        }
        if new_descriptor != descriptor {
            out.methods[i].descriptor = interner.utf8(&mut out, &new_descriptor)?;
        }
    }

    Ok(out)
}
