//! Compute-device selection with an ordered fallback list.

use burn::backend::wgpu::{Wgpu, WgpuDevice};

/// Backend the device probe allocates on.
pub type InferBackend = Wgpu<f32, i32>;

/// Kind of compute device, in rough order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    DiscreteGpu,
    IntegratedGpu,
    Cpu,
}

impl DeviceKind {
    pub fn to_wgpu(self) -> WgpuDevice {
        match self {
            DeviceKind::DiscreteGpu => WgpuDevice::DiscreteGpu(0),
            DeviceKind::IntegratedGpu => WgpuDevice::IntegratedGpu(0),
            DeviceKind::Cpu => WgpuDevice::Cpu,
        }
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceKind::DiscreteGpu => "discrete_gpu",
            DeviceKind::IntegratedGpu => "integrated_gpu",
            DeviceKind::Cpu => "cpu",
        };
        f.write_str(name)
    }
}

/// Device preferences, loadable from TOML.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub preferences: Vec<DeviceKind>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            preferences: vec![
                DeviceKind::DiscreteGpu,
                DeviceKind::IntegratedGpu,
                DeviceKind::Cpu,
            ],
        }
    }
}

/// First preference the probe reports available.
///
/// Skipped preferences are logged. CPU is always usable and is returned
/// when nothing listed is available.
pub fn select_device<F>(preferences: &[DeviceKind], mut probe: F) -> DeviceKind
where
    F: FnMut(DeviceKind) -> bool,
{
    for &kind in preferences {
        if kind == DeviceKind::Cpu || probe(kind) {
            tracing::info!(device = %kind, "selected compute device");
            return kind;
        }
        tracing::warn!(device = %kind, "compute device unavailable, trying next");
    }
    tracing::warn!("no preferred compute device available, falling back to cpu");
    DeviceKind::Cpu
}

/// Probe a wgpu device by allocating a small tensor on it.
///
/// wgpu panics when no matching adapter exists; the panic is caught and
/// reported as unavailable.
pub fn wgpu_probe(kind: DeviceKind) -> bool {
    use burn::tensor::Tensor;
    let device = kind.to_wgpu();
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let t = Tensor::<InferBackend, 1>::zeros([1], &device);
        t.into_data().num_elements() == 1
    }))
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_available_preference_wins() {
        let prefs = DeviceConfig::default().preferences;
        let picked = select_device(&prefs, |k| k == DeviceKind::IntegratedGpu);
        assert_eq!(picked, DeviceKind::IntegratedGpu);
    }

    #[test]
    fn test_falls_back_to_cpu() {
        let prefs = [DeviceKind::DiscreteGpu, DeviceKind::IntegratedGpu];
        let mut probed = Vec::new();
        let picked = select_device(&prefs, |k| {
            probed.push(k);
            false
        });
        assert_eq!(picked, DeviceKind::Cpu);
        assert_eq!(probed, prefs);
    }

    #[test]
    fn test_cpu_is_not_probed() {
        let picked = select_device(&[DeviceKind::Cpu, DeviceKind::DiscreteGpu], |_| {
            panic!("cpu needs no probe")
        });
        assert_eq!(picked, DeviceKind::Cpu);
    }

    #[test]
    fn test_device_kind_toml_names() {
        let config: DeviceConfig =
            toml::from_str(r#"preferences = ["integrated_gpu", "cpu"]"#).unwrap();
        assert_eq!(
            config.preferences,
            vec![DeviceKind::IntegratedGpu, DeviceKind::Cpu]
        );
        assert_eq!(DeviceKind::IntegratedGpu.to_wgpu(), WgpuDevice::IntegratedGpu(0));
    }
}
