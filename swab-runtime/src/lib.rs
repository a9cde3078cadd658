//! swab-runtime: runtime support for generated swab bindings.
//!
//! Embeds wasmtime to load a wasm32 module compiled from C, and provides
//! what generated glue needs to call into it: typed views onto linear memory,
//! the wide-handle table backing 64-bit values, and a free-list over the
//! indirect table so host closures can be handed out as function pointers.

pub mod convert;
mod error;
mod host;
mod native;
pub mod pointer;
pub mod table;
mod trampoline;
pub mod wide;

use std::cell::RefCell;
use std::path::Path;

pub use error::{SwabError, SwabResult};
pub use host::{create_engine, HostState, LoadOptions, Runtime};
pub use native::{host_fn, HostFn, Native};
pub use pointer::{array_to_native, pointer_to_native, ElementLayout, ElementTag, WasmPointer};
pub use swab_abi::ValCategory;
pub use trampoline::Trampoline;
pub use wasmtime::Val;

// ---------------------------------------------------------------------------
// Global runtime (one per thread, no synchronization needed)
// ---------------------------------------------------------------------------

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// Load the module at `path` and publish it for [`with_runtime`].
pub fn load(path: impl AsRef<Path>, options: LoadOptions) -> SwabResult<()> {
    if is_loaded() {
        return Err(SwabError::AlreadyLoaded);
    }
    let runtime = Runtime::from_file(path, options)?;
    install(runtime)
}

/// Publish an already constructed runtime for [`with_runtime`].
pub fn install(runtime: Runtime) -> SwabResult<()> {
    RUNTIME.with(|cell| {
        let mut slot = cell.try_borrow_mut().map_err(|_| SwabError::Reentrant)?;
        if slot.is_some() {
            return Err(SwabError::AlreadyLoaded);
        }
        *slot = Some(runtime);
        Ok(())
    })
}

/// Drop the published runtime, returning it if there was one.
pub fn unload() -> SwabResult<Option<Runtime>> {
    RUNTIME.with(|cell| {
        let mut slot = cell.try_borrow_mut().map_err(|_| SwabError::Reentrant)?;
        Ok(slot.take())
    })
}

pub fn is_loaded() -> bool {
    RUNTIME.with(|cell| cell.try_borrow().map(|slot| slot.is_some()).unwrap_or(true))
}

/// Run `f` against the published runtime.
///
/// Fails with [`SwabError::Reentrant`] when called from inside a callback;
/// callbacks receive the in-flight context as their first argument instead.
pub fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> SwabResult<R>) -> SwabResult<R> {
    RUNTIME.with(|cell| {
        let mut slot = cell.try_borrow_mut().map_err(|_| SwabError::Reentrant)?;
        let runtime = slot.as_mut().ok_or(SwabError::NotLoaded)?;
        f(runtime)
    })
}

// ---------------------------------------------------------------------------
// Helpers used by generated code
// ---------------------------------------------------------------------------

/// Unwrap the single result of a native call.
pub fn expect_value(result: Option<Val>) -> SwabResult<Val> {
    result.ok_or(SwabError::MissingResult)
}

/// Argument `index` of a host callback.
pub fn arg(args: &[Val], index: usize) -> SwabResult<Val> {
    args.get(index).cloned().ok_or(SwabError::MissingArgument(index))
}

pub fn address_from_native(raw: Val) -> SwabResult<u32> {
    Ok(convert::rebias_u32(convert::expect_i32(&raw)?))
}

/// Fail with `AllocationExhausted` if `raw` is a null address.
pub fn non_null(raw: Val, size: u32) -> SwabResult<Val> {
    match raw {
        Val::I32(0) => Err(SwabError::AllocationExhausted { size }),
        other => Ok(other),
    }
}

/// Replace a wide handle returned by native code with the value it stands for.
pub fn wide_from_native(rt: &mut dyn Native, raw: Val) -> SwabResult<Val> {
    let handle = convert::expect_i32(&raw)?;
    Ok(Val::I64(rt.take_wide(handle)?))
}

/// Generated view over a struct or union living in native memory.
pub trait Aggregate: Sized {
    fn from_address(address: u32) -> Self;
    fn address(&self) -> u32;
}

pub fn aggregate_from_native<A: Aggregate>(_rt: &mut dyn Native, raw: Val) -> SwabResult<A> {
    Ok(A::from_address(address_from_native(raw)?))
}

pub fn aggregate_to_native<A: Aggregate>(_rt: &mut dyn Native, value: A) -> SwabResult<Val> {
    Ok(Val::I32(value.address() as i32))
}

/// Resources owned by one native call.
///
/// Buffers created for string and array arguments and the wide handles created
/// for 64-bit arguments are released when the call's scope ends, after its
/// result has been converted.
#[derive(Debug, Default)]
pub struct CallFrame {
    temps: Vec<u32>,
    wides: Vec<i32>,
}

impl CallFrame {
    /// Run `body` with a fresh frame, then release everything it recorded.
    pub fn scope<T>(
        rt: &mut dyn Native,
        body: impl FnOnce(&mut dyn Native, &mut CallFrame) -> SwabResult<T>,
    ) -> SwabResult<T> {
        let mut frame = CallFrame::default();
        let result = body(rt, &mut frame);
        let released = frame.release(rt);
        let value = result?;
        released?;
        Ok(value)
    }

    /// Record `raw` as a temporary allocation owned by this call.
    pub fn temp(&mut self, raw: Val) -> SwabResult<Val> {
        self.temps.push(address_from_native(raw.clone())?);
        Ok(raw)
    }

    /// Replace a raw 64-bit value with a wide handle owned by this call.
    pub fn wide(&mut self, rt: &mut dyn Native, raw: Val) -> SwabResult<Val> {
        let handle = rt.compose_wide(convert::expect_i64(&raw)?);
        self.wides.push(handle);
        Ok(Val::I32(handle))
    }

    fn release(self, rt: &mut dyn Native) -> SwabResult<()> {
        for handle in self.wides {
            rt.release_wide(handle);
        }
        let mut first_err = None;
        for address in self.temps {
            if let Err(err) = rt.free(address) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
