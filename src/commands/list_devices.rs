//! List available audio input devices.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::capture::audio::{named_input_devices, suppress_alsa_warnings};

/// Lists the input devices the recorder can use.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> anyhow::Result<()> {
    let (host, devices) = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let devices = named_input_devices(&host)?;
        Ok((host, devices))
    })?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!();
    println!("Available audio input devices:");
    println!();

    let default_device = host.default_input_device().and_then(|d| d.name().ok());

    for (index, (name, device)) in devices.iter().enumerate() {
        let default_indicator = if default_device.as_ref() == Some(name) {
            " [DEFAULT]"
        } else {
            ""
        };

        let config_info = match device.default_input_config() {
            Ok(config) => format!(
                " ({}Hz, {} channels)",
                config.sample_rate().0,
                config.channels()
            ),
            Err(_) => " (configuration unavailable)".to_string(),
        };

        println!("  ID: {index}");
        println!("    Name: {name}{default_indicator}");
        println!("    Config:{config_info}");
        println!();
    }

    println!("Set [audio] device in vmsg.toml to an ID or name.");
    Ok(())
}
