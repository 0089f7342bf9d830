//! MIDI payload exchanged between capture, storage, and the renderers.
//!
//! The JSON shape is:
//!
//! ```text
//! { "events": [ {"time": 0.0, "type": "note_on", "note": 60, "velocity": 100, "channel": 0}, ... ],
//!   "total_time": 4.0, "tempo": 120.0, "time_signature": [4, 4] }
//! ```
//!
//! Reading is lenient. A payload that is not an object, or whose `events`
//! entry is not an array, reads as an empty payload and is logged instead of
//! returned as an error.

use super::{compile, EventKind, MidiEvent, NoteInterval, DEFAULT_TEMPO};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Events plus stream-level timing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiPayload {
    pub events: Vec<MidiEvent>,
    /// Length of the captured stream in seconds. Held notes are closed here.
    pub total_time: f64,
    /// Tempo in beats per minute.
    pub tempo: f64,
    /// Time signature as (numerator, denominator).
    pub time_signature: (u8, u8),
}

impl Default for MidiPayload {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            total_time: 0.0,
            tempo: DEFAULT_TEMPO,
            time_signature: (4, 4),
        }
    }
}

impl MidiPayload {
    /// Reads a payload from loosely structured JSON.
    ///
    /// Missing fields take defaults (`total_time` 0, `tempo` 120). Event
    /// entries that are not objects, or carry an unknown `type`, are skipped.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            tracing::warn!("MIDI payload is not an object; treating as empty");
            return Self::default();
        };

        let mut payload = Self {
            total_time: obj.get("total_time").and_then(Value::as_f64).unwrap_or(0.0),
            tempo: obj
                .get("tempo")
                .and_then(Value::as_f64)
                .unwrap_or(DEFAULT_TEMPO),
            ..Self::default()
        };

        if let Some(sig) = obj.get("time_signature").and_then(Value::as_array) {
            let num = sig.first().and_then(Value::as_u64);
            let den = sig.get(1).and_then(Value::as_u64);
            if let (Some(num), Some(den)) = (num, den) {
                payload.time_signature = (num.min(255) as u8, den.min(255) as u8);
            }
        }

        match obj.get("events").and_then(Value::as_array) {
            Some(events) => {
                payload.events = events.iter().filter_map(event_from_value).collect();
            }
            None => {
                tracing::warn!("MIDI payload has no event array; treating as empty");
            }
        }

        payload
    }

    /// Parses a JSON string, treating unparseable text as an empty payload.
    pub fn from_json_str(json: &str) -> Self {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                tracing::warn!("MIDI payload is not valid JSON ({}); treating as empty", e);
                Self::default()
            }
        }
    }

    /// Builds the JSON form of this payload.
    pub fn to_value(&self) -> Value {
        let events: Vec<Value> = self
            .events
            .iter()
            .map(|e| {
                json!({
                    "time": e.time_seconds,
                    "type": e.kind.as_str(),
                    "note": e.pitch,
                    "velocity": e.velocity,
                    "channel": e.channel,
                })
            })
            .collect();

        json!({
            "total_time": self.total_time,
            "events": events,
            "time_signature": [self.time_signature.0, self.time_signature.1],
            "tempo": self.tempo,
        })
    }

    /// Compiles the events into note intervals, closing held notes at `total_time`.
    pub fn compile(&self) -> Vec<NoteInterval> {
        compile(&self.events, self.total_time)
    }

    /// Whether the payload carries no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn event_from_value(value: &Value) -> Option<MidiEvent> {
    let obj = value.as_object()?;
    let type_name = obj.get("type").and_then(Value::as_str).unwrap_or("");
    let Some(kind) = EventKind::from_wire(type_name) else {
        tracing::debug!("Skipping MIDI event with type {:?}", type_name);
        return None;
    };

    let int_field = |name: &str| {
        obj.get(name)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
            .unwrap_or(0)
    };

    Some(MidiEvent {
        time_seconds: obj.get("time").and_then(Value::as_f64).unwrap_or(0.0),
        kind,
        pitch: int_field("note"),
        velocity: int_field("velocity"),
        channel: int_field("channel"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_well_formed_payload() {
        let value = json!({
            "events": [
                {"time": 0.0, "type": "note_on", "note": 60, "velocity": 100, "channel": 0},
                {"time": 0.5, "type": "note_off", "note": 60, "velocity": 0, "channel": 0}
            ],
            "total_time": 1.0,
            "tempo": 96.0,
            "time_signature": [3, 4]
        });
        let payload = MidiPayload::from_value(&value);
        assert_eq!(payload.events.len(), 2);
        assert_eq!(payload.total_time, 1.0);
        assert_eq!(payload.tempo, 96.0);
        assert_eq!(payload.time_signature, (3, 4));

        let notes = payload.compile();
        assert_eq!(notes, vec![NoteInterval::new(0.0, 0.5, 60, 100, 0)]);
    }

    #[test]
    fn test_non_object_is_empty() {
        for value in [json!(null), json!([1, 2, 3]), json!("events"), json!(42)] {
            let payload = MidiPayload::from_value(&value);
            assert!(payload.is_empty());
            assert_eq!(payload.tempo, DEFAULT_TEMPO);
        }
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let payload = MidiPayload::from_value(&json!({
            "events": [{"type": "note_on", "note": 62}]
        }));
        assert_eq!(payload.total_time, 0.0);
        assert_eq!(payload.tempo, 120.0);
        assert_eq!(payload.events[0], MidiEvent::note_on(0.0, 62, 0, 0));
    }

    #[test]
    fn test_float_fields_truncate_to_int() {
        let payload = MidiPayload::from_value(&json!({
            "events": [{"time": 0.0, "type": "note_on", "note": 60.0, "velocity": 99.7, "channel": 2.0}]
        }));
        assert_eq!(payload.events, vec![MidiEvent::note_on(0.0, 60, 99, 2)]);
    }

    #[test]
    fn test_skips_malformed_entries() {
        let payload = MidiPayload::from_value(&json!({
            "events": [
                "garbage",
                {"time": 0.1, "type": "pitch_bend", "note": 60},
                {"time": 0.2, "type": "note_on", "note": 61, "velocity": 90, "channel": 3}
            ],
            "total_time": "long"
        }));
        assert_eq!(payload.events, vec![MidiEvent::note_on(0.2, 61, 90, 3)]);
        assert_eq!(payload.total_time, 0.0);
    }

    #[test]
    fn test_invalid_json_text_is_empty() {
        assert!(MidiPayload::from_json_str("{not json").is_empty());
    }

    #[test]
    fn test_json_shape_survives_reload() {
        let payload = MidiPayload {
            events: vec![
                MidiEvent::note_on(0.0, 60, 100, 0),
                MidiEvent::note_off(0.5, 60, 0),
            ],
            total_time: 0.5,
            tempo: 128.0,
            time_signature: (6, 8),
        };
        let value = payload.to_value();
        assert_eq!(value["time_signature"], json!([6, 8]));
        assert_eq!(value["events"][1]["type"], "note_off");
        assert_eq!(MidiPayload::from_value(&value), payload);
    }
}
