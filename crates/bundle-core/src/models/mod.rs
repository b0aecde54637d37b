pub mod gvk;
pub mod instance;
pub mod plan;
pub mod status;
pub mod value;
