/// Tracks outstanding requests. The indicator reads busy until the last
/// outstanding request settles, so overlapping fetches cannot clear it early.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusyIndicator {
    in_flight: usize,
}

impl BusyIndicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        self.in_flight += 1;
    }

    pub fn settle(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
