pub mod debug_name;
pub mod device;
pub mod features;
pub mod instance;
pub mod physical_device;
