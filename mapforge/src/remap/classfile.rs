//! JVM class file model.
//!
//! Covers what renaming needs: the constant pool, the class header and the
//! field and method tables. Attributes are kept as opaque byte blobs, so
//! everything the renamer does not touch is written back unchanged.

use thiserror::Error;

pub const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed class file: {0}")]
pub struct ClassFormatError(pub String);

type ClassResult<T> = std::result::Result<T, ClassFormatError>;

fn malformed<T>(message: impl Into<String>) -> ClassResult<T> {
    Err(ClassFormatError(message.into()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name: u16 },
    String { value: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
    /// Slot 0, and the slot after every `Long` and `Double`.
    Unusable,
}

impl Constant {
    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: u16,
    pub info: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access: u16,
    pub name: u16,
    pub descriptor: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: Vec<Constant>,
    pub access: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn bytes(&mut self, n: usize) -> ClassResult<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => malformed(format!("unexpected end of data at offset {}", self.pos)),
        }
    }

    fn u1(&mut self) -> ClassResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u2(&mut self) -> ClassResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> ClassResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8(&mut self) -> ClassResult<u64> {
        let hi = self.u4()? as u64;
        let lo = self.u4()? as u64;
        Ok((hi << 32) | lo)
    }

    fn attributes(&mut self) -> ClassResult<Vec<Attribute>> {
        let count = self.u2()?;
        (0..count)
            .map(|_| -> ClassResult<Attribute> {
                let name = self.u2()?;
                let len = self.u4()? as usize;
                Ok(Attribute {
                    name,
                    info: self.bytes(len)?.to_vec(),
                })
            })
            .collect()
    }

    fn members(&mut self) -> ClassResult<Vec<Member>> {
        let count = self.u2()?;
        (0..count)
            .map(|_| -> ClassResult<Member> {
                Ok(Member {
                    access: self.u2()?,
                    name: self.u2()?,
                    descriptor: self.u2()?,
                    attributes: self.attributes()?,
                })
            })
            .collect()
    }
}

fn put_u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_attributes(out: &mut Vec<u8>, attributes: &[Attribute]) {
    put_u2(out, attributes.len() as u16);
    for attr in attributes {
        put_u2(out, attr.name);
        put_u4(out, attr.info.len() as u32);
        out.extend_from_slice(&attr.info);
    }
}

fn put_members(out: &mut Vec<u8>, members: &[Member]) {
    put_u2(out, members.len() as u16);
    for m in members {
        put_u2(out, m.access);
        put_u2(out, m.name);
        put_u2(out, m.descriptor);
        put_attributes(out, &m.attributes);
    }
}

impl ClassFile {
    /// Empty class `name` extending `super_name` (`None` only for `java/lang/Object`).
    pub fn new(name: &str, super_name: Option<&str>) -> Self {
        let mut class = ClassFile {
            minor_version: 0,
            major_version: 52,
            pool: vec![Constant::Unusable],
            access: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        // a fresh pool cannot overflow
        class.this_class = class.class_index(name).unwrap_or(0);
        if let Some(super_name) = super_name {
            class.super_class = class.class_index(super_name).unwrap_or(0);
        }
        class
    }

    pub fn parse(data: &[u8]) -> ClassResult<Self> {
        let mut r = Reader { data, pos: 0 };
        if r.u4()? != MAGIC {
            return malformed("bad magic number");
        }
        let minor_version = r.u2()?;
        let major_version = r.u2()?;

        let count = r.u2()? as usize;
        let mut pool = Vec::with_capacity(count);
        pool.push(Constant::Unusable);
        while pool.len() < count {
            let tag = r.u1()?;
            let constant = match tag {
                1 => {
                    let len = r.u2()? as usize;
                    Constant::Utf8(r.bytes(len)?.to_vec())
                }
                3 => Constant::Integer(r.u4()?),
                4 => Constant::Float(r.u4()?),
                5 => Constant::Long(r.u8()?),
                6 => Constant::Double(r.u8()?),
                7 => Constant::Class { name: r.u2()? },
                8 => Constant::String { value: r.u2()? },
                9 => Constant::FieldRef {
                    class: r.u2()?,
                    name_and_type: r.u2()?,
                },
                10 => Constant::MethodRef {
                    class: r.u2()?,
                    name_and_type: r.u2()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class: r.u2()?,
                    name_and_type: r.u2()?,
                },
                12 => Constant::NameAndType {
                    name: r.u2()?,
                    descriptor: r.u2()?,
                },
                15 => Constant::MethodHandle {
                    kind: r.u1()?,
                    reference: r.u2()?,
                },
                16 => Constant::MethodType {
                    descriptor: r.u2()?,
                },
                17 => Constant::Dynamic {
                    bootstrap: r.u2()?,
                    name_and_type: r.u2()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap: r.u2()?,
                    name_and_type: r.u2()?,
                },
                19 => Constant::Module { name: r.u2()? },
                20 => Constant::Package { name: r.u2()? },
                other => {
                    return malformed(format!(
                        "unknown constant tag {} at index {}",
                        other,
                        pool.len()
                    ))
                }
            };
            let wide = constant.is_wide();
            pool.push(constant);
            if wide {
                pool.push(Constant::Unusable);
            }
        }
        if pool.len() != count {
            return malformed("wide constant overruns the constant pool");
        }

        let access = r.u2()?;
        let this_class = r.u2()?;
        let super_class = r.u2()?;
        let interface_count = r.u2()?;
        let interfaces = (0..interface_count)
            .map(|_| r.u2())
            .collect::<ClassResult<Vec<_>>>()?;
        let fields = r.members()?;
        let methods = r.members()?;
        let attributes = r.attributes()?;

        let class = ClassFile {
            minor_version,
            major_version,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        class.this_name()?;
        Ok(class)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1024);
        put_u4(&mut out, MAGIC);
        put_u2(&mut out, self.minor_version);
        put_u2(&mut out, self.major_version);
        put_u2(&mut out, self.pool.len() as u16);
        for constant in self.pool.iter().skip(1) {
            match constant {
                Constant::Utf8(bytes) => {
                    out.push(1);
                    put_u2(&mut out, bytes.len() as u16);
                    out.extend_from_slice(bytes);
                }
                Constant::Integer(v) => {
                    out.push(3);
                    put_u4(&mut out, *v);
                }
                Constant::Float(v) => {
                    out.push(4);
                    put_u4(&mut out, *v);
                }
                Constant::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Double(v) => {
                    out.push(6);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Class { name } => {
                    out.push(7);
                    put_u2(&mut out, *name);
                }
                Constant::String { value } => {
                    out.push(8);
                    put_u2(&mut out, *value);
                }
                Constant::FieldRef {
                    class,
                    name_and_type,
                } => {
                    out.push(9);
                    put_u2(&mut out, *class);
                    put_u2(&mut out, *name_and_type);
                }
                Constant::MethodRef {
                    class,
                    name_and_type,
                } => {
                    out.push(10);
                    put_u2(&mut out, *class);
                    put_u2(&mut out, *name_and_type);
                }
                Constant::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => {
                    out.push(11);
                    put_u2(&mut out, *class);
                    put_u2(&mut out, *name_and_type);
                }
                Constant::NameAndType { name, descriptor } => {
                    out.push(12);
                    put_u2(&mut out, *name);
                    put_u2(&mut out, *descriptor);
                }
                Constant::MethodHandle { kind, reference } => {
                    out.push(15);
                    out.push(*kind);
                    put_u2(&mut out, *reference);
                }
                Constant::MethodType { descriptor } => {
                    out.push(16);
                    put_u2(&mut out, *descriptor);
                }
                Constant::Dynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.push(17);
                    put_u2(&mut out, *bootstrap);
                    put_u2(&mut out, *name_and_type);
                }
                Constant::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => {
                    out.push(18);
                    put_u2(&mut out, *bootstrap);
                    put_u2(&mut out, *name_and_type);
                }
                Constant::Module { name } => {
                    out.push(19);
                    put_u2(&mut out, *name);
                }
                Constant::Package { name } => {
                    out.push(20);
                    put_u2(&mut out, *name);
                }
                Constant::Unusable => {}
            }
        }
        put_u2(&mut out, self.access);
        put_u2(&mut out, self.this_class);
        put_u2(&mut out, self.super_class);
        put_u2(&mut out, self.interfaces.len() as u16);
        for i in &self.interfaces {
            put_u2(&mut out, *i);
        }
        put_members(&mut out, &self.fields);
        put_members(&mut out, &self.methods);
        put_attributes(&mut out, &self.attributes);
        out
    }

    pub fn utf8(&self, index: u16) -> ClassResult<&str> {
        match self.pool.get(index as usize) {
            Some(Constant::Utf8(bytes)) => std::str::from_utf8(bytes)
                .or_else(|_| malformed(format!("constant {} is not valid UTF-8", index))),
            _ => malformed(format!("constant {} is not a Utf8 entry", index)),
        }
    }

    pub fn class_name(&self, index: u16) -> ClassResult<&str> {
        match self.pool.get(index as usize) {
            Some(Constant::Class { name }) => self.utf8(*name),
            _ => malformed(format!("constant {} is not a Class entry", index)),
        }
    }

    pub fn name_and_type(&self, index: u16) -> ClassResult<(&str, &str)> {
        match self.pool.get(index as usize) {
            Some(Constant::NameAndType { name, descriptor }) => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => malformed(format!("constant {} is not a NameAndType entry", index)),
        }
    }

    pub fn this_name(&self) -> ClassResult<&str> {
        self.class_name(self.this_class)
    }

    pub fn super_name(&self) -> ClassResult<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.class_name(self.super_class).map(Some)
    }

    pub fn interface_names(&self) -> ClassResult<Vec<&str>> {
        self.interfaces.iter().map(|i| self.class_name(*i)).collect()
    }

    /// Appends a constant and returns its index.
    pub fn push(&mut self, constant: Constant) -> ClassResult<u16> {
        let wide = constant.is_wide();
        let needed = if wide { 2 } else { 1 };
        if self.pool.len() + needed > u16::MAX as usize {
            return malformed("constant pool is full");
        }
        let index = self.pool.len() as u16;
        self.pool.push(constant);
        if wide {
            self.pool.push(Constant::Unusable);
        }
        Ok(index)
    }

    /// Index of a Utf8 entry equal to `value`, appending one if needed.
    pub fn utf8_index(&mut self, value: &str) -> ClassResult<u16> {
        let existing = self
            .pool
            .iter()
            .position(|c| matches!(c, Constant::Utf8(b) if b.as_slice() == value.as_bytes()));
        match existing {
            Some(i) => Ok(i as u16),
            None => self.push(Constant::Utf8(value.as_bytes().to_vec())),
        }
    }

    pub fn class_index(&mut self, name: &str) -> ClassResult<u16> {
        let name = self.utf8_index(name)?;
        self.find_or_push(Constant::Class { name })
    }

    pub fn name_and_type_index(&mut self, name: &str, descriptor: &str) -> ClassResult<u16> {
        let name = self.utf8_index(name)?;
        let descriptor = self.utf8_index(descriptor)?;
        self.find_or_push(Constant::NameAndType { name, descriptor })
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> ClassResult<u16> {
        let class = self.class_index(owner)?;
        let name_and_type = self.name_and_type_index(name, descriptor)?;
        self.find_or_push(Constant::FieldRef {
            class,
            name_and_type,
        })
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> ClassResult<u16> {
        let class = self.class_index(owner)?;
        let name_and_type = self.name_and_type_index(name, descriptor)?;
        self.find_or_push(Constant::MethodRef {
            class,
            name_and_type,
        })
    }

    pub fn string_constant(&mut self, value: &str) -> ClassResult<u16> {
        let value = self.utf8_index(value)?;
        self.find_or_push(Constant::String { value })
    }

    pub fn add_interface(&mut self, name: &str) -> ClassResult<()> {
        let index = self.class_index(name)?;
        self.interfaces.push(index);
        Ok(())
    }

    pub fn add_field(&mut self, access: u16, name: &str, descriptor: &str) -> ClassResult<()> {
        let member = self.member(access, name, descriptor)?;
        self.fields.push(member);
        Ok(())
    }

    pub fn add_method(&mut self, access: u16, name: &str, descriptor: &str) -> ClassResult<()> {
        let member = self.member(access, name, descriptor)?;
        self.methods.push(member);
        Ok(())
    }

    pub fn field_names(&self) -> ClassResult<Vec<(&str, &str)>> {
        self.member_names(&self.fields)
    }

    pub fn method_names(&self) -> ClassResult<Vec<(&str, &str)>> {
        self.member_names(&self.methods)
    }

    fn member_names<'a>(&'a self, members: &'a [Member]) -> ClassResult<Vec<(&'a str, &'a str)>> {
        members
            .iter()
            .map(|m| -> ClassResult<(&'a str, &'a str)> {
                Ok((self.utf8(m.name)?, self.utf8(m.descriptor)?))
            })
            .collect()
    }

    fn member(&mut self, access: u16, name: &str, descriptor: &str) -> ClassResult<Member> {
        Ok(Member {
            access,
            name: self.utf8_index(name)?,
            descriptor: self.utf8_index(descriptor)?,
            attributes: Vec::new(),
        })
    }

    fn find_or_push(&mut self, constant: Constant) -> ClassResult<u16> {
        match self.pool.iter().position(|c| *c == constant) {
            Some(i) => Ok(i as u16),
            None => self.push(constant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassFile {
        let mut class = ClassFile::new("a", Some("java/lang/Object"));
        class.add_interface("b").unwrap();
        class.add_field(ACC_PRIVATE, "c", "I").unwrap();
        class.add_method(ACC_PUBLIC, "d", "(La;)V").unwrap();
        class.method_ref("b", "e", "()V").unwrap();
        class.push(Constant::Long(7)).unwrap();
        class.string_constant("hello").unwrap();
        class
    }

    #[test]
    fn test_written_class_parses_back() {
        let class = sample();
        let bytes = class.to_bytes();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);

        let parsed = ClassFile::parse(&bytes).unwrap();
        assert_eq!(parsed, class);
        assert_eq!(parsed.this_name().unwrap(), "a");
        assert_eq!(parsed.super_name().unwrap(), Some("java/lang/Object"));
        assert_eq!(parsed.interface_names().unwrap(), vec!["b"]);
        assert_eq!(parsed.method_names().unwrap(), vec![("d", "(La;)V")]);
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut class = ClassFile::new("a", None);
        let long = class.push(Constant::Long(1)).unwrap();
        let next = class.utf8_index("after").unwrap();
        assert_eq!(next, long + 2);
        assert_eq!(class.pool[(long + 1) as usize], Constant::Unusable);
    }

    #[test]
    fn test_truncated_and_foreign_data_is_rejected() {
        let bytes = sample().to_bytes();
        assert!(ClassFile::parse(&bytes[..bytes.len() - 3]).is_err());
        assert!(ClassFile::parse(b"PK\x03\x04 not a class").is_err());
    }

    #[test]
    fn test_interning_reuses_entries() {
        let mut class = ClassFile::new("a", None);
        let before = class.pool.len();
        class.field_ref("a", "x", "I").unwrap();
        let after_first = class.pool.len();
        class.field_ref("a", "x", "I").unwrap();
        assert_eq!(class.pool.len(), after_first);
        assert!(after_first > before);
    }
}
