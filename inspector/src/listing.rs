use remo_collector::model::{Device, SensorEvent};
use std::fmt::Write;

/// Human-readable block for one device: name, then one line per sensor.
pub fn describe(device: &Device) -> String {
    let mut out = format!("Device: {}\n", device.name);

    if let Some(events) = &device.newest_events {
        let sensors: [(&str, &Option<SensorEvent>, &str); 4] = [
            ("Temperature", &events.te, "°C"),
            ("Humidity", &events.hu, "%"),
            ("Illuminance", &events.il, " lx"),
            ("Motion", &events.mo, ""),
        ];

        for (label, event, unit) in sensors {
            if let Some(event) = event {
                let _ = writeln!(out, "  {}: {}{}", label, event.val, unit);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_lists_present_sensors_only() {
        let device: Device = serde_json::from_str(
            r#"{"name": "living", "newest_events": {"te": {"val": 24.5}, "il": {"val": 120}}}"#,
        )
        .unwrap();

        let text = describe(&device);

        assert_eq!(text, "Device: living\n  Temperature: 24.5°C\n  Illuminance: 120 lx\n");
    }

    #[test]
    fn test_describe_without_events() {
        let device: Device = serde_json::from_str(r#"{"name": "hall"}"#).unwrap();

        assert_eq!(describe(&device), "Device: hall\n");
    }
}
