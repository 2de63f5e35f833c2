// Domain layer: camera models and ports. Nothing here touches hardware or the filesystem.

pub mod model;
pub mod ports;
