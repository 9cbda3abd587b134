use skadi_payload::VolumeEvent;

use super::Reducer;

/// Current output volume in percent.
///
/// Both inbound events and local user changes write the same value, the latest write wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeReducer {
    volume: u8,
}

impl VolumeReducer {
    /// Apply a user-initiated change immediately. Returns the clamped value, if it changed.
    pub fn set_local(&mut self, volume: i64) -> Option<u8> {
        self.set(clamp_percent(volume))
    }

    fn set(&mut self, volume: u8) -> Option<u8> {
        if self.volume == volume {
            None
        } else {
            self.volume = volume;
            Some(volume)
        }
    }
}

impl Reducer for VolumeReducer {
    type Delta = u8;
    type Frame = VolumeEvent;
    type Snapshot = u8;

    fn apply_frame(&mut self, event: &VolumeEvent) -> Option<u8> {
        self.set(clamp_percent(event.volume))
    }

    fn snapshot(&self) -> u8 {
        self.volume
    }
}

pub fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_write_wins() {
        let mut reducer = VolumeReducer::default();
        assert_eq!(reducer.set_local(40), Some(40));
        assert_eq!(reducer.apply_frame(&VolumeEvent { volume: 55 }), Some(55));
        assert_eq!(reducer.set_local(55), None);
        assert_eq!(reducer.snapshot(), 55);
    }

    #[test]
    fn test_clamped() {
        let mut reducer = VolumeReducer::default();
        assert_eq!(reducer.apply_frame(&VolumeEvent { volume: 153 }), Some(100));
        assert_eq!(reducer.set_local(-4), Some(0));
    }
}
