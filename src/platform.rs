//! Emulator / virtual machine detection.
//!
//! The vendor library needs a physical USB host. On non-physical platforms
//! it is never initialised and capture stays disabled.

use std::env;

use serde::Serialize;
use tracing::debug;

/// Overrides detection when set to `1`/`true` or `0`/`false`.
pub const FORCE_EMULATOR_ENV: &str = "SLAP_CAPTURE_FORCE_EMULATOR";

const HYPERVISOR_MARKERS: [&str; 4] = ["qemu", "virtualbox", "vmware", "kvm"];

/// Platform identifier strings the heuristics look at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlatformIdentity {
    pub fingerprint: String,
    pub model: String,
    pub manufacturer: String,
    pub brand: String,
    pub device: String,
    pub product: String,
}

impl PlatformIdentity {
    /// Read identifiers from the host firmware tables.
    pub fn detect() -> Self {
        let identity = read_identity();
        debug!(?identity, "platform identity");
        identity
    }

    pub fn is_emulator(&self) -> bool {
        let model = self.model.to_lowercase();
        let manufacturer = self.manufacturer.to_lowercase();

        self.fingerprint.starts_with("generic")
            || self.fingerprint.starts_with("unknown")
            || model.contains("google_sdk")
            || model.contains("emulator")
            || model.contains("android sdk built for x86")
            || manufacturer.contains("genymotion")
            || (self.brand.starts_with("generic") && self.device.starts_with("generic"))
            || self.product == "google_sdk"
            || HYPERVISOR_MARKERS
                .iter()
                .any(|m| model.contains(m) || manufacturer.contains(m))
    }
}

/// Detection result with the environment override applied.
pub fn running_on_emulator(identity: &PlatformIdentity) -> bool {
    match env::var(FORCE_EMULATOR_ENV).ok().as_deref().map(str::trim) {
        Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        _ => identity.is_emulator(),
    }
}

#[cfg(target_os = "linux")]
fn read_identity() -> PlatformIdentity {
    use std::fs;
    use std::path::Path;

    let dmi = Path::new("/sys/class/dmi/id");
    let read = |name: &str| {
        fs::read_to_string(dmi.join(name))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let product = read("product_name");
    PlatformIdentity {
        fingerprint: read("product_uuid"),
        model: product.clone(),
        manufacturer: read("sys_vendor"),
        brand: read("board_vendor"),
        device: read("board_name"),
        product,
    }
}

#[cfg(windows)]
fn read_identity() -> PlatformIdentity {
    let product = bios_value("SystemProductName");
    PlatformIdentity {
        fingerprint: bios_value("SystemSKU"),
        model: product.clone(),
        manufacturer: bios_value("SystemManufacturer"),
        brand: bios_value("BaseBoardManufacturer"),
        device: bios_value("BaseBoardProduct"),
        product,
    }
}

/// Read a string value from `HKLM\HARDWARE\DESCRIPTION\System\BIOS`.
#[cfg(windows)]
fn bios_value(name: &str) -> String {
    use windows::core::{w, HSTRING};
    use windows::Win32::Foundation::ERROR_SUCCESS;
    use windows::Win32::System::Registry::{RegGetValueW, HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ};

    let mut buf = [0u16; 256];
    let mut size = std::mem::size_of_val(&buf) as u32;
    let result = unsafe {
        RegGetValueW(
            HKEY_LOCAL_MACHINE,
            w!("HARDWARE\\DESCRIPTION\\System\\BIOS"),
            &HSTRING::from(name),
            RRF_RT_REG_SZ,
            None,
            Some(buf.as_mut_ptr() as *mut _),
            Some(&mut size as *mut u32),
        )
    };
    if result != ERROR_SUCCESS {
        return String::new();
    }
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

#[cfg(not(any(target_os = "linux", windows)))]
fn read_identity() -> PlatformIdentity {
    PlatformIdentity::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn physical() -> PlatformIdentity {
        PlatformIdentity {
            fingerprint: "4c4c4544-0042".into(),
            model: "Latitude 7440".into(),
            manufacturer: "Dell Inc.".into(),
            brand: "Dell Inc.".into(),
            device: "0X4KFT".into(),
            product: "Latitude 7440".into(),
        }
    }

    #[test]
    fn physical_hardware_is_not_emulator() {
        assert!(!physical().is_emulator());
    }

    fn physical_with(edit: impl FnOnce(&mut PlatformIdentity)) -> PlatformIdentity {
        let mut id = physical();
        edit(&mut id);
        id
    }

    #[test]
    fn android_emulator_markers() {
        let cases = [
            physical_with(|id| id.fingerprint = "generic/sdk".into()),
            physical_with(|id| id.fingerprint = "unknown".into()),
            physical_with(|id| id.model = "Android SDK built for x86".into()),
            physical_with(|id| id.model = "my EMULATOR".into()),
            physical_with(|id| id.manufacturer = "Genymotion".into()),
            physical_with(|id| id.product = "google_sdk".into()),
            physical_with(|id| {
                id.brand = "generic_x86".into();
                id.device = "generic_x86".into();
            }),
        ];
        for case in cases {
            assert!(case.is_emulator(), "{case:?}");
        }
    }

    #[test]
    fn generic_brand_alone_is_not_enough() {
        let id = physical_with(|id| id.brand = "generic".into());
        assert!(!id.is_emulator());
    }

    #[test]
    fn hypervisors_are_detected() {
        let id = PlatformIdentity {
            manufacturer: "QEMU".into(),
            model: "Standard PC (Q35 + ICH9, 2009)".into(),
            ..physical()
        };
        assert!(id.is_emulator());
        let id = physical_with(|id| id.model = "VirtualBox".into());
        assert!(id.is_emulator());
    }
}
