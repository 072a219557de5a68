//! Compute device selection.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target compute device for inference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
    Vpu,
}

impl Device {
    pub const ALL: [Device; 3] = [Device::Cpu, Device::Gpu, Device::Vpu];

    /// Map a menu index to a device. Unknown indices select the CPU.
    pub fn from_index(index: i64) -> Self {
        match index {
            1 => Device::Gpu,
            2 => Device::Vpu,
            _ => Device::Cpu,
        }
    }

    /// Menu index shown in the device prompt.
    pub fn index(&self) -> u8 {
        match self {
            Device::Cpu => 0,
            Device::Gpu => 1,
            Device::Vpu => 2,
        }
    }

    /// Runtime identifier for the device.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "CPU",
            Device::Gpu => "GPU",
            Device::Vpu => "VPUX",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" | "0" => Ok(Device::Cpu),
            "gpu" | "1" => Ok(Device::Gpu),
            "vpu" | "vpux" | "2" => Ok(Device::Vpu),
            other => Err(anyhow!(
                "unknown device '{}'; expected cpu, gpu or vpu",
                other
            )),
        }
    }
}

/// Pick the device a backend will actually run on.
///
/// Returns `requested` when the backend supports it, otherwise falls back to
/// the CPU. Fails only when the backend cannot run on the CPU either.
pub fn resolve_device(requested: Device, supported: &[Device], backend: &str) -> Result<Device> {
    if supported.contains(&requested) {
        return Ok(requested);
    }
    if supported.contains(&Device::Cpu) {
        log::warn!(
            "{} backend cannot target {}; falling back to CPU",
            backend,
            requested
        );
        return Ok(Device::Cpu);
    }
    Err(anyhow!(
        "{} backend supports none of the requested devices ({})",
        backend,
        requested
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_indices_map_to_devices() {
        assert_eq!(Device::from_index(0), Device::Cpu);
        assert_eq!(Device::from_index(1), Device::Gpu);
        assert_eq!(Device::from_index(2), Device::Vpu);
        assert_eq!(Device::from_index(7), Device::Cpu);
        assert_eq!(Device::from_index(-1), Device::Cpu);
        for device in Device::ALL {
            assert_eq!(Device::from_index(device.index() as i64), device);
        }
    }

    #[test]
    fn parses_runtime_names() {
        assert_eq!("GPU".parse::<Device>().unwrap(), Device::Gpu);
        assert_eq!("vpux".parse::<Device>().unwrap(), Device::Vpu);
        assert_eq!(" cpu ".parse::<Device>().unwrap(), Device::Cpu);
        assert!("tpu".parse::<Device>().is_err());
        assert_eq!(Device::Vpu.to_string(), "VPUX");
    }

    #[test]
    fn unsupported_device_falls_back_to_cpu() {
        let cpu_only = [Device::Cpu];
        assert_eq!(
            resolve_device(Device::Gpu, &cpu_only, "tract").unwrap(),
            Device::Cpu
        );
        assert_eq!(
            resolve_device(Device::Gpu, &Device::ALL, "stub").unwrap(),
            Device::Gpu
        );
        assert!(resolve_device(Device::Cpu, &[Device::Gpu], "odd").is_err());
    }
}
