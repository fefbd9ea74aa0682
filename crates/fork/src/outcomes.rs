//! Last recorded write outcome per sink

use contracts::SinkError;

/// Outcome slots, one per sink, in sink order
///
/// A slot starts empty and only ever changes when a write cycle fails for
/// that sink. A later successful write leaves the previous error in place
/// (the slot keeps the *last known problem*); a later failure replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcomes {
    slots: Vec<Option<SinkError>>,
}

impl WriteOutcomes {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Last recorded error of sink `index`, if any
    pub fn get(&self, index: usize) -> Option<&SinkError> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&SinkError>> {
        self.slots.iter().map(Option::as_ref)
    }

    /// Sinks with a recorded error, as `(index, error)`
    pub fn failures(&self) -> impl Iterator<Item = (usize, &SinkError)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|err| (i, err)))
    }

    pub fn has_failures(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    /// Fold one write cycle into the slots
    ///
    /// `results` must be in sink order. Returns whether any slot changed.
    pub fn record(&mut self, results: Vec<Result<(), SinkError>>) -> bool {
        debug_assert_eq!(results.len(), self.slots.len());

        let mut changed = false;
        for (slot, result) in self.slots.iter_mut().zip(results) {
            if let Err(err) = result {
                *slot = Some(err);
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let outcomes = WriteOutcomes::new(2);
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes.has_failures());
        assert_eq!(outcomes.get(0), None);
        assert_eq!(outcomes.get(5), None);
    }

    #[test]
    fn test_success_keeps_previous_error() {
        let mut outcomes = WriteOutcomes::new(2);

        assert!(outcomes.record(vec![Err(SinkError::write("a", "disk full")), Ok(())]));
        assert!(!outcomes.record(vec![Ok(()), Ok(())]));

        // sticky: the success above did not clear slot 0
        assert_eq!(outcomes.get(0), Some(&SinkError::write("a", "disk full")));
        assert_eq!(outcomes.get(1), None);
    }

    #[test]
    fn test_new_failure_overwrites() {
        let mut outcomes = WriteOutcomes::new(1);
        outcomes.record(vec![Err(SinkError::write("a", "first"))]);
        outcomes.record(vec![Ok(())]);
        outcomes.record(vec![Err(SinkError::not_writable("a"))]);

        assert_eq!(outcomes.get(0), Some(&SinkError::not_writable("a")));
        let failures: Vec<_> = outcomes.failures().map(|(i, _)| i).collect();
        assert_eq!(failures, vec![0]);
    }

    #[test]
    fn test_zero_sinks() {
        let mut outcomes = WriteOutcomes::new(0);
        assert!(outcomes.is_empty());
        assert!(!outcomes.record(Vec::new()));
    }
}
