//! Runtime: owns the wasmtime engine, store and native module instance.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use wasmtime::*;

use crate::error::{SwabError, SwabResult};
use crate::table::TableAllocator;
use crate::wide::WideHandles;
use swab_abi::{
    CALL_CTORS, COMPOSE_WIDE, DEFAULT_TABLE_CAPACITY, ENV_MODULE, INITIALIZE, MEMORY_NAME,
    MIN_MEMORY_PAGES, TABLE_NAME, WIDE_HIGH, WIDE_LOW,
};

/// State reachable from host functions via `Caller<HostState>`.
#[derive(Default)]
pub struct HostState {
    pub(crate) instance: Option<Instance>,
    /// Linear memory, imported or exported. Set during instantiation.
    pub(crate) memory: Option<Memory>,
    /// Indirect function table, imported or exported.
    pub(crate) table: Option<Table>,
    pub(crate) allocator: TableAllocator,
    pub(crate) wides: WideHandles,
    /// Compiled trampolines keyed by their module bytes.
    pub(crate) trampolines: HashMap<&'static [u8], Module>,
    /// Results of sizeof exports.
    pub(crate) sizes: HashMap<String, u32>,
    /// Table slots holding host closures.
    pub(crate) host_slots: HashSet<u32>,
}

/// Sizing of the memory and table the host provides to the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Initial indirect table capacity.
    pub table_capacity: u32,
    /// Initial linear memory, in 64 KiB pages.
    pub memory_pages: u32,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            table_capacity: DEFAULT_TABLE_CAPACITY,
            memory_pages: MIN_MEMORY_PAGES,
        }
    }
}

/// Create a wasmtime Engine with platform-appropriate configuration.
/// iOS: Cranelift compiles to Pulley bytecode, Pulley interprets at runtime.
/// Other platforms: Cranelift compiles to native code.
pub fn create_engine() -> wasmtime::Result<Engine> {
    #[allow(unused_mut)]
    let mut config = Config::new();
    #[cfg(target_os = "ios")]
    config.target("pulley64")?;
    Engine::new(&config)
}

/// A loaded native module and everything the bindings need to drive it.
pub struct Runtime {
    store: Store<HostState>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn from_file(path: impl AsRef<Path>, options: LoadOptions) -> SwabResult<Self> {
        let path = path.as_ref();
        log::info!("loading native module from {}", path.display());
        let bytes = std::fs::read(path).map_err(|source| SwabError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(&bytes, options)
    }

    /// Compile and instantiate a module from its binary (or, with wasmtime's
    /// `wat` feature, text) form.
    pub fn new(wasm: &[u8], options: LoadOptions) -> SwabResult<Self> {
        let engine = create_engine()?;
        log::debug!("compiling native module ({} bytes)", wasm.len());
        let module = Module::new(&engine, wasm)?;

        let mut store = Store::new(&engine, HostState::default());
        let mut linker = Linker::new(&engine);
        register_wide_functions(&mut linker)?;

        for import in module.imports() {
            if import.module() != ENV_MODULE {
                continue;
            }
            match (import.name(), import.ty()) {
                (MEMORY_NAME, ExternType::Memory(ty)) => {
                    let minimum = clamp(
                        ty.minimum().max(u64::from(options.memory_pages)),
                        ty.maximum(),
                    );
                    let memory = Memory::new(
                        &mut store,
                        MemoryType::new(minimum as u32, ty.maximum().map(|m| m as u32)),
                    )?;
                    linker.define(&store, ENV_MODULE, MEMORY_NAME, memory)?;
                    store.data_mut().memory = Some(memory);
                }
                (TABLE_NAME, ExternType::Table(ty)) => {
                    let minimum = clamp(
                        ty.minimum().max(u64::from(options.table_capacity)),
                        ty.maximum(),
                    );
                    let table = Table::new(
                        &mut store,
                        TableType::new(
                            RefType::FUNCREF,
                            minimum as u32,
                            ty.maximum().map(|m| m as u32),
                        ),
                        Ref::Func(None),
                    )?;
                    linker.define(&store, ENV_MODULE, TABLE_NAME, table)?;
                    store.data_mut().table = Some(table);
                }
                _ => {}
            }
        }
        linker.define_unknown_imports_as_traps(&module)?;

        let instance = linker.instantiate(&mut store, &module)?;
        store.data_mut().instance = Some(instance);

        // Prefer what the module itself exports.
        if let Some(memory) = instance.get_memory(&mut store, MEMORY_NAME) {
            store.data_mut().memory = Some(memory);
        }
        if let Some(table) = instance.get_table(&mut store, TABLE_NAME) {
            store.data_mut().table = Some(table);
        }

        if let Some(table) = store.data().table {
            let size = table.size(&store);
            // The allocator withholds slot 0 itself, even from an empty table.
            let occupied: Vec<u32> = (1..size)
                .filter(|i| table.get(&mut store, *i).is_some_and(|r| !r.is_null()))
                .map(|i| i as u32)
                .collect();
            log::debug!("table: {size} slots, {} occupied", occupied.len());
            store.data_mut().allocator = TableAllocator::with_occupied(size as u32, occupied);
        }

        let mut runtime = Runtime { store };
        runtime.call_init()?;
        log::info!("native module initialized");
        Ok(runtime)
    }

    /// Run `_initialize` or `__wasm_call_ctors`, whichever is exported.
    fn call_init(&mut self) -> SwabResult<()> {
        let Some(instance) = self.store.data().instance else {
            return Ok(());
        };
        for name in [INITIALIZE, CALL_CTORS] {
            if let Ok(init) = instance.get_typed_func::<(), ()>(&mut self.store, name) {
                init.call(&mut self.store, ())
                    .map_err(SwabError::from_wasm)?;
                break;
            }
        }
        Ok(())
    }

    /// Runtime with no module attached, for exercising converters that
    /// never touch native memory.
    #[cfg(test)]
    pub(crate) fn detached() -> SwabResult<Self> {
        let engine = create_engine()?;
        Ok(Runtime {
            store: Store::new(&engine, HostState::default()),
        })
    }

    pub fn store(&self) -> &Store<HostState> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    /// Current size of the indirect table.
    pub fn table_size(&self) -> u64 {
        match self.store.data().table {
            Some(table) => table.size(&self.store),
            None => 0,
        }
    }

    /// Number of wide handles not yet released.
    pub fn live_wide_handles(&self) -> usize {
        self.store.data().wides.live()
    }

    /// Number of table slots currently holding host closures.
    pub fn host_slot_count(&self) -> usize {
        self.store.data().host_slots.len()
    }
}

impl AsContext for Runtime {
    type Data = HostState;

    fn as_context(&self) -> StoreContext<'_, HostState> {
        self.store.as_context()
    }
}

impl AsContextMut for Runtime {
    fn as_context_mut(&mut self) -> StoreContextMut<'_, HostState> {
        self.store.as_context_mut()
    }
}

fn clamp(minimum: u64, maximum: Option<u64>) -> u64 {
    match maximum {
        Some(max) => minimum.min(max),
        None => minimum,
    }
}

// ---------------------------------------------------------------------------
// Wide-integer primitives imported by generated shims
// ---------------------------------------------------------------------------

fn register_wide_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // Guest import: __swab_wide __swab_compose_wide(int32_t high, uint32_t low)
    linker.func_wrap(
        ENV_MODULE,
        COMPOSE_WIDE,
        |mut caller: Caller<'_, HostState>, high: i32, low: i32| -> i32 {
            caller.data_mut().wides.compose(high, low as u32)
        },
    )?;

    // Guest import: int32_t __swab_wide_high(__swab_wide handle)
    linker.func_wrap(
        ENV_MODULE,
        WIDE_HIGH,
        |caller: Caller<'_, HostState>, handle: i32| -> Result<i32> {
            Ok(caller.data().wides.high(handle)?)
        },
    )?;

    // Guest import: uint32_t __swab_wide_low(__swab_wide handle)
    linker.func_wrap(
        ENV_MODULE,
        WIDE_LOW,
        |caller: Caller<'_, HostState>, handle: i32| -> Result<i32> {
            Ok(caller.data().wides.low(handle)? as i32)
        },
    )?;

    Ok(())
}
