//! Typed handles onto native memory.

use std::fmt;

use wasmtime::Val;

use crate::error::{SwabError, SwabResult};
use crate::native::Native;

/// How an element is laid out in linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementTag {
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Any native pointer, including function pointers (table slots).
    Pointer,
    /// Struct or union stored inline. Reads yield the element's address;
    /// writes go through the `copy` export.
    Aggregate { copy: &'static str },
    /// Fixed-size array stored inline. Like `Aggregate`, but the value being
    /// written is a temporary buffer that is released after the copy.
    Array { copy: &'static str },
}

/// Per-element converters and size shared by every handle of one type.
pub struct ElementLayout<T> {
    pub size: u32,
    pub tag: ElementTag,
    pub from_native: fn(&mut dyn Native, Val) -> SwabResult<T>,
    pub to_native: fn(&mut dyn Native, T) -> SwabResult<Val>,
}

impl<T> Clone for ElementLayout<T> {
    fn clone(&self) -> Self {
        ElementLayout {
            size: self.size,
            tag: self.tag,
            from_native: self.from_native,
            to_native: self.to_native,
        }
    }
}

impl<T> fmt::Debug for ElementLayout<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementLayout")
            .field("size", &self.size)
            .field("tag", &self.tag)
            .finish()
    }
}

/// Read the raw value of one element at `address`.
pub fn load(rt: &mut dyn Native, address: u32, tag: ElementTag) -> SwabResult<Val> {
    let val = match tag {
        ElementTag::Bool | ElementTag::Char | ElementTag::U8 => {
            Val::I32(rt.read_bytes(address, 1)?[0] as i32)
        }
        ElementTag::I8 => Val::I32(rt.read_bytes(address, 1)?[0] as i8 as i32),
        ElementTag::I16 => Val::I32(i16::from_le_bytes(read_array(rt, address)?) as i32),
        ElementTag::U16 => Val::I32(u16::from_le_bytes(read_array(rt, address)?) as i32),
        ElementTag::I32 | ElementTag::U32 | ElementTag::Pointer => {
            Val::I32(i32::from_le_bytes(read_array(rt, address)?))
        }
        ElementTag::I64 | ElementTag::U64 => Val::I64(i64::from_le_bytes(read_array(rt, address)?)),
        ElementTag::F32 => Val::F32(u32::from_le_bytes(read_array(rt, address)?)),
        ElementTag::F64 => Val::F64(u64::from_le_bytes(read_array(rt, address)?)),
        ElementTag::Aggregate { .. } | ElementTag::Array { .. } => Val::I32(address as i32),
    };
    Ok(val)
}

/// Write the raw value of one element to `address`.
pub fn store(rt: &mut dyn Native, address: u32, tag: ElementTag, value: Val) -> SwabResult<()> {
    match tag {
        ElementTag::Bool | ElementTag::Char | ElementTag::U8 | ElementTag::I8 => {
            let v = crate::convert::expect_i32(&value)?;
            rt.write_bytes(address, &[v as u8])
        }
        ElementTag::I16 | ElementTag::U16 => {
            let v = crate::convert::expect_i32(&value)?;
            rt.write_bytes(address, &(v as u16).to_le_bytes())
        }
        ElementTag::I32 | ElementTag::U32 | ElementTag::Pointer => {
            let v = crate::convert::expect_i32(&value)?;
            rt.write_bytes(address, &v.to_le_bytes())
        }
        ElementTag::I64 | ElementTag::U64 => {
            let v = crate::convert::expect_i64(&value)?;
            rt.write_bytes(address, &v.to_le_bytes())
        }
        ElementTag::F32 => match value {
            Val::F32(bits) => rt.write_bytes(address, &bits.to_le_bytes()),
            other => Err(SwabError::unexpected("f32", &other)),
        },
        ElementTag::F64 => match value {
            Val::F64(bits) => rt.write_bytes(address, &bits.to_le_bytes()),
            other => Err(SwabError::unexpected("f64", &other)),
        },
        ElementTag::Aggregate { copy } => {
            let src = crate::address_from_native(value)?;
            rt.call(copy, &[Val::I32(address as i32), Val::I32(src as i32)])?;
            Ok(())
        }
        ElementTag::Array { copy } => {
            let src = crate::address_from_native(value)?;
            let copied = rt.call(copy, &[Val::I32(address as i32), Val::I32(src as i32)]);
            rt.free(src)?;
            copied.map(|_| ())
        }
    }
}

fn read_array<const N: usize>(rt: &mut dyn Native, address: u32) -> SwabResult<[u8; N]> {
    let bytes = rt.read_bytes(address, N as u32)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A native address plus what lives there.
///
/// The handle borrows the address; nothing is released on drop. `free`
/// hands the allocation back to the module's allocator.
pub struct WasmPointer<T> {
    address: u32,
    layout: ElementLayout<T>,
}

impl<T> Clone for WasmPointer<T> {
    fn clone(&self) -> Self {
        WasmPointer {
            address: self.address,
            layout: self.layout.clone(),
        }
    }
}

impl<T> fmt::Debug for WasmPointer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasmPointer")
            .field("address", &format_args!("{:#x}", self.address))
            .field("layout", &self.layout)
            .finish()
    }
}

impl<T> PartialEq for WasmPointer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.layout.tag == other.layout.tag
    }
}

impl<T> WasmPointer<T> {
    pub fn new(address: u32, layout: ElementLayout<T>) -> Self {
        WasmPointer { address, layout }
    }

    /// Allocate room for `count` elements.
    pub fn alloc(rt: &mut dyn Native, layout: ElementLayout<T>, count: u32) -> SwabResult<Self> {
        let size = layout
            .size
            .checked_mul(count)
            .ok_or(SwabError::CountOverflow {
                count: u64::from(count),
            })?
            .max(1);
        let address = rt.malloc(size)?;
        Ok(WasmPointer { address, layout })
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    pub fn layout(&self) -> &ElementLayout<T> {
        &self.layout
    }

    pub fn deref(&self, rt: &mut dyn Native) -> SwabResult<T> {
        if self.is_null() {
            return Err(SwabError::NullPointer);
        }
        let raw = load(rt, self.address, self.layout.tag)?;
        (self.layout.from_native)(rt, raw)
    }

    pub fn assign(&self, rt: &mut dyn Native, value: T) -> SwabResult<()> {
        if self.is_null() {
            return Err(SwabError::NullPointer);
        }
        let raw = (self.layout.to_native)(rt, value)?;
        store(rt, self.address, self.layout.tag, raw)
    }

    /// Handle `n` elements away, with the same layout.
    pub fn offset(&self, n: i32) -> Self {
        let delta = (n as i64) * (self.layout.size as i64);
        WasmPointer {
            address: (self.address as i64 + delta) as u32,
            layout: self.layout.clone(),
        }
    }

    pub fn read_array(&self, rt: &mut dyn Native, count: u32) -> SwabResult<Vec<T>> {
        let count = element_count(count)?;
        (0..count).map(|i| self.offset(i).deref(rt)).collect()
    }

    pub fn free(self, rt: &mut dyn Native) -> SwabResult<()> {
        if self.is_null() {
            return Ok(());
        }
        rt.free(self.address)
    }

    /// Raw value passed to native code.
    pub fn to_native(&self) -> Val {
        Val::I32(self.address as i32)
    }
}

/// `count` as an element offset.
fn element_count(count: u32) -> SwabResult<i32> {
    i32::try_from(count).map_err(|_| SwabError::CountOverflow {
        count: u64::from(count),
    })
}

/// Converter for any pointer handle, for use in generated layouts.
pub fn pointer_to_native<T>(_rt: &mut dyn Native, value: WasmPointer<T>) -> SwabResult<Val> {
    Ok(value.to_native())
}

/// Copy `values` into a fresh allocation of exactly `length` elements.
pub fn array_to_native<T>(
    rt: &mut dyn Native,
    layout: ElementLayout<T>,
    length: u32,
    values: Vec<T>,
) -> SwabResult<Val> {
    if values.len() != length as usize {
        return Err(SwabError::LengthMismatch {
            expected: length,
            actual: values.len(),
        });
    }
    element_count(length)?;
    let base = WasmPointer::alloc(rt, layout, length)?;
    for (i, value) in (0..).zip(values) {
        if let Err(err) = base.offset(i).assign(rt, value) {
            base.free(rt)?;
            return Err(err);
        }
    }
    Ok(base.to_native())
}
