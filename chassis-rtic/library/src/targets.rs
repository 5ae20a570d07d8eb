use core::cell::Cell;

use chassis_message::WheelTarget;
use critical_section::Mutex;

/// Wheel 1 is the left wheel, wheel 2 the right one.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Wheel {
    Left,
    Right,
}

impl Wheel {
    pub const ALL: [Wheel; 2] = [Wheel::Left, Wheel::Right];

    pub fn index(self) -> usize {
        match self {
            Wheel::Left => 0,
            Wheel::Right => 1,
        }
    }
}

/// Speed targets of both wheels behind a single lock, so a reader never sees one wheel
/// from an older command than the other.
pub struct TargetStore {
    targets: Mutex<Cell<[WheelTarget; 2]>>,
}

impl TargetStore {
    pub const fn new() -> Self {
        Self {
            targets: Mutex::new(Cell::new([WheelTarget::STOP; 2])),
        }
    }

    pub fn set(&self, wheel: Wheel, target: WheelTarget) {
        critical_section::with(|cs| {
            let cell = self.targets.borrow(cs);
            let mut targets = cell.get();
            targets[wheel.index()] = target;
            cell.set(targets);
        });
    }

    pub fn set_both(&self, left: WheelTarget, right: WheelTarget) {
        critical_section::with(|cs| self.targets.borrow(cs).set([left, right]));
    }

    pub fn get(&self, wheel: Wheel) -> WheelTarget {
        self.get_all()[wheel.index()]
    }

    pub fn get_all(&self) -> [WheelTarget; 2] {
        critical_section::with(|cs| self.targets.borrow(cs).get())
    }

    pub fn stop_all(&self) {
        self.set_both(WheelTarget::STOP, WheelTarget::STOP);
    }
}

impl Default for TargetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chassis_message::Direction;

    use super::*;

    #[test]
    fn test_initially_stopped() {
        let store = TargetStore::new();
        assert_eq!(store.get_all(), [WheelTarget::STOP; 2]);
    }

    #[test]
    fn test_set_single_wheel() {
        let store = TargetStore::new();
        let forward = WheelTarget::new(Direction::Forward, 0.5);
        store.set(Wheel::Right, forward);
        assert_eq!(store.get(Wheel::Left), WheelTarget::STOP);
        assert_eq!(store.get(Wheel::Right), forward);

        store.stop_all();
        assert_eq!(store.get_all(), [WheelTarget::STOP; 2]);
    }

    #[test]
    fn test_no_torn_reads() {
        let store = Arc::new(TargetStore::new());
        let a = WheelTarget::new(Direction::Forward, 1.0);
        let b = WheelTarget::new(Direction::Backward, 2.0);

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    if i % 2 == 0 {
                        store.set_both(a, a);
                    } else {
                        store.set_both(b, b);
                    }
                }
            })
        };

        for _ in 0..10_000 {
            let [left, right] = store.get_all();
            assert_eq!(left, right);
        }
        writer.join().unwrap();
    }
}
