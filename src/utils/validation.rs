use crate::domain::model::{FourCc, FrameInterval, Resolution};
use crate::utils::error::{PicamError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// V4L2 capture nodes live under /dev
pub fn validate_device_path(field_name: &str, path: &str) -> Result<()> {
    validate_path(field_name, path)?;
    if !path.starts_with("/dev/") {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Camera device must be a /dev node such as /dev/video0".to_string(),
        });
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_resolution(field_name: &str, resolution: Resolution) -> Result<()> {
    validate_range(field_name, resolution.width, 16, 8192)?;
    validate_range(field_name, resolution.height, 16, 8192)
}

pub fn validate_interval(field_name: &str, interval: FrameInterval) -> Result<()> {
    if interval.numerator == 0 || interval.denominator == 0 {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: interval.to_string(),
            reason: "Frame interval numerator and denominator must be non-zero".to_string(),
        });
    }
    Ok(())
}

pub fn validate_fourcc(field_name: &str, fourcc: FourCc) -> Result<()> {
    if fourcc.as_bytes().iter().all(|b| *b == b' ') {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: fourcc.to_string(),
            reason: "Pixel format cannot be blank".to_string(),
        });
    }
    Ok(())
}

/// Frame names must differ per frame or later frames overwrite earlier ones.
pub fn validate_file_pattern(field_name: &str, pattern: &str) -> Result<()> {
    validate_non_empty_string(field_name, pattern)?;
    if !pattern.contains("{index}") {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: pattern.to_string(),
            reason: "Pattern must contain the {index} placeholder".to_string(),
        });
    }
    if pattern.contains('/') || pattern.contains('\\') {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: pattern.to_string(),
            reason: "Pattern must be a file name, not a path".to_string(),
        });
    }
    Ok(())
}

/// Overlay names are plain device-tree identifiers like `ov5647` or `imx219`.
pub fn validate_overlay_name(field_name: &str, name: &str) -> Result<()> {
    validate_non_empty_string(field_name, name)?;
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(PicamError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: name.to_string(),
            reason: "Overlay name may only contain letters, digits, '-' and '_'".to_string(),
        });
    }
    Ok(())
}
