use anyhow::Result;
use picam::core::boot_config::{OverlayChange, OverlayStatus};
use picam::{BootConfig, PicamError};
use tempfile::TempDir;

const BOOKWORM_CONFIG: &str = "\
# For more options and information see
# http://rptl.io/configtxt
# Some settings may impact device functionality. See link above for details

# Uncomment some or all of these to enable the optional hardware interfaces
#dtparam=i2c_arm=on
#dtparam=i2s=on
#dtparam=spi=on

# Enable audio (loads snd_bcm2835)
dtparam=audio=on

# Automatically load overlays for detected cameras
camera_auto_detect=1

# Automatically load overlays for detected DSI displays
display_auto_detect=1

# Enable DRM VC4 V3D driver
dtoverlay=vc4-kms-v3d
max_framebuffers=2

[cm4]
# Enable host mode on the 2711 built-in XHCI USB controller.
otg_mode=1

[pi4]
# Run as fast as firmware / board allows
arm_boost=1

[all]
";

#[test]
fn test_enable_overlay_on_disk_keeps_backup() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("config.txt");
    std::fs::write(&path, BOOKWORM_CONFIG)?;

    let mut config = BootConfig::load(&path)?;
    assert_eq!(config.overlay_status("ov5647"), OverlayStatus::Absent);
    assert_eq!(config.ensure_overlay("ov5647"), OverlayChange::Appended);
    assert!(config.set_camera_auto_detect(false));

    let backup = config.write_with_backup(&path)?;
    let backup = backup.expect("existing file must be backed up");
    assert_eq!(std::fs::read_to_string(&backup)?, BOOKWORM_CONFIG);

    let written = std::fs::read_to_string(&path)?;
    assert!(written.ends_with("[all]\ndtoverlay=ov5647\n"));
    assert!(written.contains("\ncamera_auto_detect=0\n"));
    assert!(!written.contains("camera_auto_detect=1"));
    // untouched lines survive
    assert!(written.contains("dtoverlay=vc4-kms-v3d\n"));
    assert!(written.contains("[pi4]\n# Run as fast as firmware / board allows\narm_boost=1\n"));

    let reloaded = BootConfig::load(&path)?;
    assert_eq!(reloaded.overlay_status("ov5647"), OverlayStatus::Present);
    assert_eq!(reloaded.camera_auto_detect(), Some(false));

    Ok(())
}

#[test]
fn test_second_enable_changes_nothing() -> Result<()> {
    let mut config = BootConfig::parse(BOOKWORM_CONFIG);
    config.ensure_overlay("ov5647");
    config.set_camera_auto_detect(false);
    let first = config.render();

    let mut again = BootConfig::parse(&first);
    assert_eq!(again.ensure_overlay("ov5647"), OverlayChange::AlreadyPresent);
    assert!(!again.set_camera_auto_detect(false));
    assert_eq!(again.render(), first);

    Ok(())
}

#[test]
fn test_disable_then_enable_round() -> Result<()> {
    let mut config = BootConfig::parse(BOOKWORM_CONFIG);
    config.ensure_overlay("ov5647");
    assert_eq!(config.remove_overlay("ov5647"), OverlayChange::Removed);
    assert!(config.render().contains("#dtoverlay=ov5647\n"));
    assert_eq!(config.overlay_status("ov5647"), OverlayStatus::Absent);

    assert_eq!(config.ensure_overlay("ov5647"), OverlayChange::Appended);
    assert_eq!(config.overlay_status("ov5647"), OverlayStatus::Present);

    Ok(())
}

#[test]
fn test_write_new_file_has_no_backup() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("config.txt");

    let mut config = BootConfig::parse("");
    config.ensure_overlay("imx219");
    assert!(config.write_with_backup(&path)?.is_none());
    assert_eq!(std::fs::read_to_string(&path)?, "dtoverlay=imx219\n");

    Ok(())
}

#[test]
fn test_missing_file_is_boot_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = BootConfig::load(temp_dir.path().join("absent.txt"));
    assert!(matches!(result, Err(PicamError::BootConfigError { .. })));
}
