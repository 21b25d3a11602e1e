//! Two-frame wire format: `[topic, payload]`, payload MessagePack with
//! named fields.

use serde::de::DeserializeOwned;
use serde::Serialize;
use zeromq::ZmqMessage;

use crate::error::BusError;

pub fn encode<T: Serialize>(topic: &str, payload: &T) -> Result<ZmqMessage, BusError> {
    let body = rmp_serde::to_vec_named(payload)?;
    let mut frames = ZmqMessage::from(topic);
    frames.push_back(body.into());
    Ok(frames)
}

/// Split a received message into its topic and decoded payload.
pub fn decode<T: DeserializeOwned>(message: &ZmqMessage) -> Result<(String, T), BusError> {
    let frames: Vec<_> = message.iter().collect();
    let [topic, body] = frames.as_slice() else {
        return Err(BusError::Frame(format!(
            "expected 2 frames, got {}",
            frames.len()
        )));
    };
    let topic = std::str::from_utf8(topic.as_ref())
        .map_err(|_| BusError::Frame("topic is not UTF-8".into()))?
        .to_string();
    let payload = rmp_serde::from_slice(body.as_ref())?;
    Ok((topic, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MeasurementBatch;
    use rulewatch_core::Measurement;

    #[test]
    fn batch_survives_the_wire() {
        let batch = MeasurementBatch {
            project_id: "p-1".into(),
            measurements: vec![Measurement::new("temp", 21.5), Measurement::new("", 0.0)],
        };
        let message = encode("projects.p-1.measurements", &batch).unwrap();
        assert_eq!(message.len(), 2);

        let (topic, decoded): (String, MeasurementBatch) = decode(&message).unwrap();
        assert_eq!(topic, "projects.p-1.measurements");
        assert_eq!(decoded, batch);
    }

    #[test]
    fn single_frame_is_malformed() {
        let message = ZmqMessage::from("projects.p-1.measurements");
        let err = decode::<MeasurementBatch>(&message).unwrap_err();
        assert!(matches!(err, BusError::Frame(_)));
    }

    #[test]
    fn foreign_payload_fails_to_decode() {
        let message = encode("projects.p-1.measurements", &"not a batch").unwrap();
        assert!(matches!(
            decode::<MeasurementBatch>(&message),
            Err(BusError::Decode(_))
        ));
    }
}
