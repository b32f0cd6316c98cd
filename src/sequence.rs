//! Packet sequence counter.
//!
//! The node resets all RAM on every wake, so the counter has to live in a
//! store that survives deep sleep (NVS on the device).

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("sequence store failed: {0}")]
pub struct StoreError(pub String);

pub trait SequenceStore {
    /// Hand out the current number and persist its successor (wrapping).
    fn next(&mut self) -> Result<u32, StoreError>;
}

impl<T: SequenceStore + ?Sized> SequenceStore for &mut T {
    fn next(&mut self) -> Result<u32, StoreError> {
        (**self).next()
    }
}

/// Volatile counter for hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySequence {
    next: u32,
}

impl MemorySequence {
    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl SequenceStore for MemorySequence {
    fn next(&mut self) -> Result<u32, StoreError> {
        let current = self.next;
        self.next = current.wrapping_add(1);
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_up_and_wraps() {
        let mut seq = MemorySequence::starting_at(u32::MAX - 1);
        assert_eq!(seq.next().unwrap(), u32::MAX - 1);
        assert_eq!(seq.next().unwrap(), u32::MAX);
        assert_eq!(seq.next().unwrap(), 0);
        assert_eq!(seq.peek(), 1);
    }
}
