// Haptic event types
// Defines hands, frequency bands and the haptic events written to disk

use serde::{Deserialize, Serialize};

/// Which glove an event is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    /// hand_id 0, fed by the left (or mono) channel
    Left,

    /// hand_id 1, fed by the right (or mono) channel
    Right,
}

impl Hand {
    /// Numeric id used in the output records
    pub fn id(&self) -> u8 {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Hand::Left),
            1 => Some(Hand::Right),
            _ => None,
        }
    }
}

/// A named spectral region driving one finger actuator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Band name (e.g., "sub_bass", "high")
    pub name: String,

    /// Lower bound in Hz, inclusive
    pub min_hz: f32,

    /// Upper bound in Hz, inclusive
    pub max_hz: f32,

    /// Finger actuator fired by this band (0 = thumb .. 4 = pinky)
    pub finger_id: u8,
}

impl FrequencyBand {
    pub fn new(name: impl Into<String>, min_hz: f32, max_hz: f32, finger_id: u8) -> Self {
        FrequencyBand {
            name: name.into(),
            min_hz,
            max_hz,
            finger_id,
        }
    }

    /// Whether a bin center frequency falls inside this band
    pub fn contains(&self, frequency_hz: f32) -> bool {
        frequency_hz >= self.min_hz && frequency_hz <= self.max_hz
    }
}

/// A single vibrotactile actuation
/// Field names match the output file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HapticEvent {
    /// Seconds from the start of the recording, millisecond precision
    pub timestamp: f64,

    /// 0 = left hand, 1 = right hand
    pub hand_id: u8,

    /// Finger actuator (0-4)
    pub finger_id: u8,

    /// Actuation strength within the configured min/max range
    pub strength: u8,

    /// Pulse length in seconds
    pub duration: f64,
}

impl HapticEvent {
    /// Create an event, rounding the onset time to milliseconds
    pub fn new(onset_time: f64, hand: Hand, finger_id: u8, strength: u8, duration: f64) -> Self {
        HapticEvent {
            timestamp: round_to_millis(onset_time),
            hand_id: hand.id(),
            finger_id,
            strength,
            duration,
        }
    }

    pub fn hand(&self) -> Option<Hand> {
        Hand::from_id(self.hand_id)
    }
}

/// Round seconds to 3 decimal places
pub fn round_to_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hand_ids() {
        assert_eq!(Hand::Left.id(), 0);
        assert_eq!(Hand::Right.id(), 1);
        assert_eq!(Hand::from_id(1), Some(Hand::Right));
        assert_eq!(Hand::from_id(2), None);
    }

    #[test]
    fn test_band_contains_is_inclusive() {
        let band = FrequencyBand::new("low_mid", 101.0, 400.0, 1);

        assert!(band.contains(101.0));
        assert!(band.contains(400.0));
        assert!(!band.contains(100.9));
        assert!(!band.contains(400.1));
    }

    #[test]
    fn test_event_timestamp_rounding() {
        let event = HapticEvent::new(1.23456, Hand::Right, 3, 120, 0.15);

        assert_eq!(event.timestamp, 1.235);
        assert_eq!(event.hand_id, 1);
        assert_eq!(event.hand(), Some(Hand::Right));
    }

    #[test]
    fn test_event_serialized_field_names() {
        let event = HapticEvent::new(0.5, Hand::Left, 0, 255, 0.15);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["timestamp"], 0.5);
        assert_eq!(json["hand_id"], 0);
        assert_eq!(json["finger_id"], 0);
        assert_eq!(json["strength"], 255);
        assert_eq!(json["duration"], 0.15);
        assert_eq!(json.as_object().unwrap().len(), 5);
    }
}
