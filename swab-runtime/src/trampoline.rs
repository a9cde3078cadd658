// Trampoline descriptors emitted by swab-codegen.

use swab_abi::{Signature, ValCategory};

/// Binary module giving host closures of one call signature a
/// table-installable shape. Generated bindings emit one `static` per
/// distinct signature; the runtime compiles each at most once per store.
#[derive(Debug)]
pub struct Trampoline {
    pub id: u32,
    pub module: &'static [u8],
    pub params: &'static [ValCategory],
    pub result: Option<ValCategory>,
}

impl Trampoline {
    pub fn signature(&self) -> Signature {
        Signature::new(self.params.to_vec(), self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matches_module() {
        static PARAMS: [ValCategory; 2] = [ValCategory::I32, ValCategory::F64];
        let sig = Signature::new(PARAMS.to_vec(), None);
        let bytes: &'static [u8] = Box::leak(swab_abi::trampoline_module(&sig).into_boxed_slice());
        let t = Trampoline {
            id: 0,
            module: bytes,
            params: &PARAMS,
            result: None,
        };
        assert_eq!(t.signature(), sig);
        assert_eq!(&t.module[..4], b"\0asm");
    }
}
