use anyhow::{anyhow, Context};
use libdrm_amdgpu_sys::{AMDGPU::DeviceHandle, PCI};
use std::path::PathBuf;
use std::fs;
use std::fmt;
use crate::chip::ChipProperties;

const DRM_RENDER: u32 = 128;

#[derive(Clone)]
pub struct DevicePath {
    pub render: PathBuf,
    pub pci: Option<PCI::BUS_INFO>,
}

impl DevicePath {
    pub fn new(instance: u32) -> Self {
        Self {
            render: PathBuf::from(format!("/dev/dri/renderD{}", DRM_RENDER + instance)),
            pci: None,
        }
    }

    pub fn init(&self) -> anyhow::Result<DeviceHandle> {
        let (amdgpu_dev, _major, _minor) = {
            use std::os::unix::io::IntoRawFd;

            let f = fs::OpenOptions::new().read(true).write(true).open(&self.render)
                .with_context(|| format!("Failed to open {:?}", self.render))?;

            DeviceHandle::init(f.into_raw_fd())
                .map_err(|v| anyhow!(v))
                .context("Failed to DeviceHandle::init")?
        };

        Ok(amdgpu_dev)
    }

    /// Chip topology as the kernel driver reports it.
    pub fn chip_properties(&self) -> anyhow::Result<ChipProperties> {
        let amdgpu_dev = self.init()?;
        let ext_info = amdgpu_dev.device_info()
            .map_err(|v| anyhow!(v))
            .context("Failed to query AMDGPU_INFO_DEV_INFO")?;

        Ok(ChipProperties::from_device_info(&ext_info)?)
    }

    pub fn get_device_path_list() -> Vec<Self> {
        let Ok(amdgpu_devices) = fs::read_dir("/sys/bus/pci/drivers/amdgpu") else {
            return Vec::new();
        };

        amdgpu_devices.flat_map(|v| {
            let name = v.ok()?.file_name();
            let pci = name.into_string().ok()?.parse::<PCI::BUS_INFO>().ok()?;

            Self::try_from(pci).ok()
        }).collect()
    }
}

impl TryFrom<PCI::BUS_INFO> for DevicePath {
    type Error = std::io::Error;

    fn try_from(pci: PCI::BUS_INFO) -> Result<Self, Self::Error> {
        let base = PathBuf::from("/dev/dri/by-path");
        let link = fs::read_link(base.join(format!("pci-{pci}-render")))?;

        Ok(Self {
            render: fs::canonicalize(base.join(link))?,
            pci: Some(pci),
        })
    }
}

impl fmt::Debug for DevicePath {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("DevicePath")
            .field("render", &self.render)
            .field("pci", &self.pci.map(|pci| pci.to_string()))
            .finish()
    }
}
