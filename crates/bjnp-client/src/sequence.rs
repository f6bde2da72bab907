/// Outgoing frame sequence numbers.
///
/// The first number issued is 1; the counter wraps silently after `u16::MAX`.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    last: u16,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next sequence number.
    pub fn issue(&mut self) -> u16 {
        self.last = self.last.wrapping_add(1);
        self.last
    }

    /// The last number issued, zero if none.
    pub fn last(&self) -> u16 {
        self.last
    }
}
