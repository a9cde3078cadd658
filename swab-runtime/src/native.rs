//! `Native`: the object-safe view of a loaded module that generated glue
//! programs against.
//!
//! Implemented for anything that can hand out a store context over
//! [`HostState`]: the owning [`Runtime`](crate::Runtime), a bare
//! `Store<HostState>`, and the `Caller` passed to host callbacks. Generated
//! functions therefore work the same at top level and inside a callback.

use std::sync::Arc;

use wasmtime::{AsContext, AsContextMut, Extern, Func, FuncType, Instance, Module, Ref, Val, ValType};

use crate::error::{SwabError, SwabResult};
use crate::host::HostState;
use crate::trampoline::Trampoline;
use swab_abi::ValCategory;

/// Host closure installed into the table.
///
/// Receives the raw native arguments and returns the raw native result
/// (`None` for void).
pub type HostFn = Arc<dyn Fn(&mut dyn Native, &[Val]) -> SwabResult<Option<Val>> + Send + Sync>;

/// Wrap a closure as a [`HostFn`].
pub fn host_fn(
    f: impl Fn(&mut dyn Native, &[Val]) -> SwabResult<Option<Val>> + Send + Sync + 'static,
) -> HostFn {
    Arc::new(f)
}

pub trait Native {
    /// Call an exported function by name.
    fn call(&mut self, name: &str, args: &[Val]) -> SwabResult<Option<Val>>;

    /// Call the function stored in table slot `slot`.
    fn call_indirect(&mut self, slot: u32, args: &[Val]) -> SwabResult<Option<Val>>;

    fn read_bytes(&mut self, address: u32, len: u32) -> SwabResult<Vec<u8>>;

    fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> SwabResult<()>;

    /// Bytes from `address` up to, not including, the first NUL.
    fn read_c_string(&mut self, address: u32) -> SwabResult<Vec<u8>>;

    /// Allocate through the module's `malloc`. A null result is an error.
    fn malloc(&mut self, size: u32) -> SwabResult<u32>;

    fn free(&mut self, address: u32) -> SwabResult<()>;

    /// Result of the zero-argument sizeof export `symbol`, cached per store.
    fn size_of(&mut self, symbol: &str) -> SwabResult<u32>;

    /// Store a 64-bit value, returning the wide handle that stands for it.
    fn compose_wide(&mut self, value: i64) -> i32;

    /// Read and release a wide handle.
    fn take_wide(&mut self, handle: i32) -> SwabResult<i64>;

    fn release_wide(&mut self, handle: i32);

    /// Install `func` into a free table slot through `trampoline`.
    fn wrap_function(&mut self, trampoline: &'static Trampoline, func: HostFn) -> SwabResult<u32>;

    /// Clear a slot previously returned by [`Native::wrap_function`].
    fn release_function(&mut self, slot: u32) -> SwabResult<()>;
}

fn val_type(category: ValCategory) -> ValType {
    match category {
        ValCategory::I32 => ValType::I32,
        ValCategory::I64 => ValType::I64,
        ValCategory::F32 => ValType::F32,
        ValCategory::F64 => ValType::F64,
    }
}

fn invoke<C>(ctx: &mut C, func: Func, args: &[Val]) -> SwabResult<Option<Val>>
where
    C: AsContextMut<Data = HostState>,
{
    let mut results = vec![Val::I32(0); func.ty(&*ctx).results().len()];
    func.call(&mut *ctx, args, &mut results)
        .map_err(SwabError::from_wasm)?;
    Ok(results.into_iter().next())
}

fn instance<C: AsContext<Data = HostState>>(ctx: &C) -> SwabResult<Instance> {
    ctx.as_context().data().instance.ok_or(SwabError::NotLoaded)
}

impl<C> Native for C
where
    C: AsContextMut<Data = HostState>,
{
    fn call(&mut self, name: &str, args: &[Val]) -> SwabResult<Option<Val>> {
        let func = instance(&*self)?
            .get_func(&mut *self, name)
            .ok_or_else(|| SwabError::MissingExport(name.to_string()))?;
        log::trace!("call {name}({args:?})");
        invoke(self, func, args)
    }

    fn call_indirect(&mut self, slot: u32, args: &[Val]) -> SwabResult<Option<Val>> {
        let table = self.as_context().data().table.ok_or(SwabError::NotLoaded)?;
        let func = table
            .get(&mut *self, u64::from(slot))
            .and_then(|entry| entry.as_func().flatten().cloned())
            .ok_or(SwabError::NullPointer)?;
        invoke(self, func, args)
    }

    fn read_bytes(&mut self, address: u32, len: u32) -> SwabResult<Vec<u8>> {
        let memory = self.as_context().data().memory.ok_or(SwabError::NotLoaded)?;
        let mut buf = vec![0; len as usize];
        memory
            .read(&*self, address as usize, &mut buf)
            .map_err(|_| SwabError::OutOfBounds { address, len })?;
        Ok(buf)
    }

    fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> SwabResult<()> {
        let memory = self.as_context().data().memory.ok_or(SwabError::NotLoaded)?;
        memory
            .write(&mut *self, address as usize, bytes)
            .map_err(|_| SwabError::OutOfBounds {
                address,
                len: bytes.len() as u32,
            })
    }

    fn read_c_string(&mut self, address: u32) -> SwabResult<Vec<u8>> {
        let memory = self.as_context().data().memory.ok_or(SwabError::NotLoaded)?;
        let data = memory.data(&*self);
        let tail = data
            .get(address as usize..)
            .ok_or(SwabError::OutOfBounds { address, len: 1 })?;
        let end = tail.iter().position(|b| *b == 0).ok_or(SwabError::OutOfBounds {
            address,
            len: tail.len() as u32 + 1,
        })?;
        Ok(tail[..end].to_vec())
    }

    fn malloc(&mut self, size: u32) -> SwabResult<u32> {
        let raw = self.call(swab_abi::MALLOC, &[Val::I32(size as i32)])?;
        let address = crate::address_from_native(crate::expect_value(raw)?)?;
        if address == 0 {
            return Err(SwabError::AllocationExhausted { size });
        }
        Ok(address)
    }

    fn free(&mut self, address: u32) -> SwabResult<()> {
        self.call(swab_abi::FREE, &[Val::I32(address as i32)])?;
        Ok(())
    }

    fn size_of(&mut self, symbol: &str) -> SwabResult<u32> {
        if let Some(size) = self.as_context().data().sizes.get(symbol).copied() {
            return Ok(size);
        }
        let raw = self.call(symbol, &[])?;
        let size = crate::address_from_native(crate::expect_value(raw)?)?;
        self.as_context_mut()
            .data_mut()
            .sizes
            .insert(symbol.to_string(), size);
        Ok(size)
    }

    fn compose_wide(&mut self, value: i64) -> i32 {
        self.as_context_mut().data_mut().wides.insert(value)
    }

    fn take_wide(&mut self, handle: i32) -> SwabResult<i64> {
        self.as_context_mut().data_mut().wides.take(handle)
    }

    fn release_wide(&mut self, handle: i32) {
        self.as_context_mut().data_mut().wides.release(handle);
    }

    fn wrap_function(&mut self, trampoline: &'static Trampoline, func: HostFn) -> SwabResult<u32> {
        let table = self.as_context().data().table.ok_or(SwabError::NotLoaded)?;
        let engine = self.as_context().engine().clone();

        let cached = self
            .as_context()
            .data()
            .trampolines
            .get(trampoline.module)
            .cloned();
        let module = match cached {
            Some(module) => module,
            None => {
                log::debug!("compiling trampoline {} for {}", trampoline.id, trampoline.signature());
                let module = Module::new(&engine, trampoline.module)?;
                self.as_context_mut()
                    .data_mut()
                    .trampolines
                    .insert(trampoline.module, module.clone());
                module
            }
        };

        let ty = FuncType::new(
            &engine,
            trampoline.params.iter().map(|p| val_type(*p)),
            trampoline.result.map(val_type),
        );
        let host = Func::new(&mut *self, ty, move |mut caller, params, results| {
            let out = func(&mut caller, params).map_err(wasmtime::Error::new)?;
            match (out, results.first_mut()) {
                (Some(value), Some(slot)) => *slot = value,
                (None, None) => {}
                (Some(value), None) => {
                    return Err(wasmtime::Error::new(SwabError::unexpected("no value", &value)));
                }
                (None, Some(_)) => return Err(wasmtime::Error::new(SwabError::MissingResult)),
            }
            Ok(())
        });

        let shim = Instance::new(&mut *self, &module, &[Extern::Func(host)])?;
        let exported = shim
            .get_func(&mut *self, swab_abi::TRAMPOLINE_EXPORT)
            .ok_or_else(|| SwabError::MissingExport(swab_abi::TRAMPOLINE_EXPORT.to_string()))?;

        let allocation = self
            .as_context_mut()
            .data_mut()
            .allocator
            .alloc()
            .ok_or(SwabError::TableExhausted)?;
        if allocation.grew_by > 0 {
            let grown = table.grow(&mut *self, u64::from(allocation.grew_by), Ref::Func(None));
            if let Err(err) = grown {
                // The allocator must keep matching the table it tracks.
                self.as_context_mut().data_mut().allocator.rollback(allocation);
                return Err(err.into());
            }
        }
        let stored = table.set(&mut *self, u64::from(allocation.slot), Ref::Func(Some(exported)));
        if let Err(err) = stored {
            self.as_context_mut()
                .data_mut()
                .allocator
                .free(allocation.slot);
            return Err(err.into());
        }
        self.as_context_mut()
            .data_mut()
            .host_slots
            .insert(allocation.slot);
        log::debug!("installed host function in slot {}", allocation.slot);
        Ok(allocation.slot)
    }

    fn release_function(&mut self, slot: u32) -> SwabResult<()> {
        let table = self.as_context().data().table.ok_or(SwabError::NotLoaded)?;
        if !self.as_context_mut().data_mut().host_slots.remove(&slot) {
            return Err(SwabError::NotHostSlot(slot));
        }
        table.set(&mut *self, u64::from(slot), Ref::Func(None))?;
        self.as_context_mut().data_mut().allocator.free(slot);
        Ok(())
    }
}
