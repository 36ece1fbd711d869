use crate::app::models::Device;

const MODEL_PREFIX: &str = "model:";
const DEVICE_PREFIX: &str = "device:";

/// Parses one line of `adb devices -l` output. Never fails; missing fields stay empty.
pub fn parse_device_line(line: &str) -> Device {
    let mut tokens = line.split_whitespace();
    let id = tokens.next().unwrap_or_default().to_string();
    let mut model = String::new();
    let mut name = String::new();
    for token in tokens {
        if token.contains(MODEL_PREFIX) {
            model = second_segment(token);
        }
        if token.contains(DEVICE_PREFIX) {
            name = second_segment(token);
        }
    }
    Device { id, model, name }
}

fn second_segment(token: &str) -> String {
    token.split(':').nth(1).unwrap_or_default().to_string()
}

/// Parses a full `adb devices -l` response, skipping the header line.
pub fn parse_devices_output(output: &str) -> Vec<Device> {
    output
        .split('\n')
        .map(|line| line.replace('\r', ""))
        .filter(|line| !line.is_empty())
        .skip(1)
        .map(|line| parse_device_line(&line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_emulator_line() {
        let line = "emulator-5554          device product:sdk_gphone_x86 model:Android_SDK_built_for_x86 device:generic_x86 transport_id:1";
        assert_eq!(
            parse_device_line(line),
            Device::new("emulator-5554", "Android_SDK_built_for_x86", "generic_x86")
        );
    }

    #[test]
    fn tolerates_short_and_empty_lines() {
        assert_eq!(parse_device_line(""), Device::default());
        assert_eq!(parse_device_line("   "), Device::default());
        assert_eq!(parse_device_line("ABC"), Device::new("ABC", "", ""));
        assert_eq!(
            parse_device_line("ABC unauthorized transport_id:3"),
            Device::new("ABC", "", "")
        );
    }

    #[test]
    fn tolerates_prefix_without_value() {
        assert_eq!(
            parse_device_line("ABC device model: device:"),
            Device::new("ABC", "", "")
        );
    }

    #[test]
    fn skips_header_and_blank_lines() {
        let output = "List of devices attached\r\n\
                      0123456789ABCDEF device usb:1-1 product:panther model:Pixel_7 device:panther transport_id:2\r\n\
                      emulator-5554 device product:sdk model:sdk_x86 device:generic_x86 transport_id:1\r\n\
                      \r\n";
        let devices = parse_devices_output(output);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0], Device::new("0123456789ABCDEF", "Pixel_7", "panther"));
        assert_eq!(devices[1].id, "emulator-5554");
    }

    #[test]
    fn header_only_yields_no_devices() {
        assert!(parse_devices_output("List of devices attached\n\n").is_empty());
        assert!(parse_devices_output("").is_empty());
    }
}
