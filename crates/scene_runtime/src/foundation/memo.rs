//! Memoized derived values
//!
//! A [`Memo`] caches a value derived from some configuration. It starts
//! invalid (level 0), becomes valid (level 1) after the first derivation and
//! only goes back to level 0 through [`Memo::invalidate`]. Nothing revalidates
//! it implicitly.

/// Lazily derived value with an explicit validity level
#[derive(Debug, Clone)]
pub struct Memo<T> {
    value: Option<T>,
    level: u8,
    recompute_count: u64,
}

impl<T> Memo<T> {
    /// Level of a memo whose value must be rebuilt
    pub const INVALID: u8 = 0;

    /// Level of a memo whose value is current
    pub const VALID: u8 = 1;

    /// Create an invalid memo
    pub const fn new() -> Self {
        Self {
            value: None,
            level: Self::INVALID,
            recompute_count: 0,
        }
    }

    /// Current memo level
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// Whether the cached value is current
    pub const fn is_valid(&self) -> bool {
        self.level == Self::VALID
    }

    /// Number of derivations performed so far
    pub const fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    /// Mark the cached value stale; the next access rebuilds it
    pub fn invalidate(&mut self) {
        self.level = Self::INVALID;
    }

    /// Return the cached value, deriving it first if the memo is invalid
    pub fn get_or_compute(&mut self, derive: impl FnOnce() -> T) -> &T {
        match self.get_or_try_compute(|| Ok::<T, std::convert::Infallible>(derive())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`Memo::get_or_compute`]
    ///
    /// On error the memo stays invalid and the previous value is dropped, so
    /// the next access retries the derivation.
    pub fn get_or_try_compute<E>(&mut self, derive: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        let value = match self.value.take() {
            Some(value) if self.level == Self::VALID => value,
            _ => {
                let value = derive()?;
                self.recompute_count += 1;
                self.level = Self::VALID;
                value
            }
        };
        Ok(self.value.insert(value))
    }

    /// Cached value if it is current, without deriving
    pub fn peek(&self) -> Option<&T> {
        if self.is_valid() {
            self.value.as_ref()
        } else {
            None
        }
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_starts_invalid() {
        let memo: Memo<u32> = Memo::new();
        assert_eq!(memo.level(), Memo::<u32>::INVALID);
        assert!(memo.peek().is_none());
    }

    #[test]
    fn test_memo_derives_once_until_invalidated() {
        let mut memo = Memo::new();
        assert_eq!(*memo.get_or_compute(|| 7), 7);
        assert_eq!(*memo.get_or_compute(|| 99), 7);
        assert_eq!(memo.recompute_count(), 1);
        assert_eq!(memo.level(), Memo::<i32>::VALID);

        memo.invalidate();
        assert!(memo.peek().is_none());
        assert_eq!(*memo.get_or_compute(|| 99), 99);
        assert_eq!(memo.recompute_count(), 2);
    }

    #[test]
    fn test_failed_derivation_stays_invalid() {
        let mut memo: Memo<i32> = Memo::new();
        let result: Result<&i32, &str> = memo.get_or_try_compute(|| Err("bad input"));
        assert_eq!(result, Err("bad input"));
        assert_eq!(memo.level(), Memo::<i32>::INVALID);
        assert_eq!(memo.recompute_count(), 0);

        assert_eq!(memo.get_or_try_compute::<&str>(|| Ok(3)), Ok(&3));
    }
}
