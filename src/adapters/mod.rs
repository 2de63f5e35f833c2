// Adapters layer: concrete implementations for external systems (filesystem, camera).

pub mod storage;

#[cfg(feature = "v4l2")]
pub mod v4l2;
