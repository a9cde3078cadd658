// Wide-handle table: 64-bit values addressed by 32-bit handles.
//
// The native side never sees a 64-bit integer at the boundary. It receives a
// handle and asks the host for the two halves, or hands the host two halves
// and gets a handle back.

use crate::error::{SwabError, SwabResult};

/// Slab of live 64-bit values. Handle 0 is never issued.
#[derive(Debug, Default)]
pub struct WideHandles {
    slots: Vec<Option<i64>>,
    free: Vec<usize>,
}

impl WideHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, returning its handle.
    pub fn insert(&mut self, value: i64) -> i32 {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        };
        (index + 1) as i32
    }

    /// `__swab_compose_wide(high, low)`.
    pub fn compose(&mut self, high: i32, low: u32) -> i32 {
        self.insert(compose(high, low))
    }

    pub fn get(&self, handle: i32) -> SwabResult<i64> {
        self.index(handle)
            .and_then(|index| self.slots[index])
            .ok_or(SwabError::InvalidWideHandle(handle))
    }

    /// `__swab_wide_high(handle)`.
    pub fn high(&self, handle: i32) -> SwabResult<i32> {
        self.get(handle).map(high)
    }

    /// `__swab_wide_low(handle)`.
    pub fn low(&self, handle: i32) -> SwabResult<u32> {
        self.get(handle).map(low)
    }

    /// Read and release `handle`.
    pub fn take(&mut self, handle: i32) -> SwabResult<i64> {
        let value = self.get(handle)?;
        self.release(handle);
        Ok(value)
    }

    pub fn release(&mut self, handle: i32) {
        if let Some(index) = self.index(handle) {
            if self.slots[index].take().is_some() {
                self.free.push(index);
            }
        }
    }

    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn index(&self, handle: i32) -> Option<usize> {
        let index = usize::try_from(handle).ok()?.checked_sub(1)?;
        (index < self.slots.len()).then_some(index)
    }
}

pub fn high(value: i64) -> i32 {
    (value >> 32) as i32
}

pub fn low(value: i64) -> u32 {
    value as u32
}

pub fn compose(high: i32, low: u32) -> i64 {
    ((high as i64) << 32) | low as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_handles_are_reused() {
        let mut wides = WideHandles::new();
        let a = wides.insert(5);
        let b = wides.insert(6);
        assert_ne!(a, b);
        assert_eq!(wides.take(a).unwrap(), 5);
        assert_eq!(wides.insert(7), a);
        assert_eq!(wides.live(), 2);
    }

    #[test]
    fn test_invalid_handles() {
        let mut wides = WideHandles::new();
        assert!(matches!(wides.get(0), Err(SwabError::InvalidWideHandle(0))));
        assert!(wides.get(-3).is_err());
        let h = wides.insert(1);
        wides.release(h);
        assert!(wides.get(h).is_err());
        // releasing twice is harmless
        wides.release(h);
        assert_eq!(wides.live(), 0);
    }

    #[test]
    fn test_halves_of_boundary_values() {
        let mut wides = WideHandles::new();
        let h = wides.insert(i64::MIN);
        assert_eq!(wides.high(h).unwrap(), i32::MIN);
        assert_eq!(wides.low(h).unwrap(), 0);
        let h = wides.insert(-1);
        assert_eq!(wides.high(h).unwrap(), -1);
        assert_eq!(wides.low(h).unwrap(), u32::MAX);
    }

    proptest! {
        #[test]
        fn prop_compose_inverts_split(v in any::<i64>()) {
            prop_assert_eq!(compose(high(v), low(v)), v);
        }

        #[test]
        fn prop_round_trip_through_table(v in any::<i64>()) {
            let mut wides = WideHandles::new();
            let h = wides.insert(v);
            let back = wides.compose(wides.high(h).unwrap(), wides.low(h).unwrap());
            prop_assert_eq!(wides.take(back).unwrap(), v);
        }
    }
}
