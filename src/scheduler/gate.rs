/// Decides on which ticks the price table is re-fetched.
///
/// The first poll always refreshes. After that a refresh happens once when
/// the local hour equals the trigger hour; leaving the trigger hour re-arms
/// the gate for the next day. A refresh that fails does not re-arm it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRefreshGate {
    trigger_hour: u32,
    triggered_today: bool,
    initial: bool,
}

impl DailyRefreshGate {
    pub const fn new(trigger_hour: u32) -> Self {
        Self {
            trigger_hour,
            triggered_today: false,
            initial: true,
        }
    }

    pub const fn trigger_hour(&self) -> u32 {
        self.trigger_hour
    }

    pub const fn triggered_today(&self) -> bool {
        self.triggered_today
    }

    pub const fn is_initial(&self) -> bool {
        self.initial
    }

    /// Whether a refresh is due for a tick at local `hour`
    pub const fn poll(&mut self, hour: u32) -> bool {
        if self.initial || (hour == self.trigger_hour && !self.triggered_today) {
            self.triggered_today = true;
            self.initial = false;
            true
        } else {
            if hour != self.trigger_hour {
                self.triggered_today = false;
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_poll_always_refreshes() {
        let mut gate = DailyRefreshGate::new(20);
        assert!(gate.poll(9));
        assert!(!gate.is_initial());
        assert!(!gate.poll(9));
    }

    #[test]
    fn test_once_per_trigger_hour() {
        let mut gate = DailyRefreshGate::new(20);
        assert!(gate.poll(19));
        assert!(!gate.poll(19));
        assert!(gate.poll(20));
        assert!(!gate.poll(20));
        assert!(!gate.poll(21));
        assert!(!gate.triggered_today());
        assert!(gate.poll(20));
    }

    #[test]
    fn test_start_at_trigger_hour_refreshes_once() {
        let mut gate = DailyRefreshGate::new(20);
        assert!(gate.poll(20));
        assert!(!gate.poll(20));
        assert!(!gate.poll(21));
    }
}
