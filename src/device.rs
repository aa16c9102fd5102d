//! Device control over adb

use crate::config::{DeviceConfig, TapPoint};
use arena_cv::Frame;
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("failed to run {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("adb {command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("screen capture failed: {0}")]
    CaptureFailure(String),
}

/// Capture and input on the controlled device. Both calls block.
pub trait Device {
    fn capture(&mut self) -> Result<Frame, DeviceError>;

    fn tap(&mut self, point: TapPoint) -> Result<(), DeviceError>;

    /// Tap twice with `gap` in between. Either tap failing fails the action.
    fn double_tap(&mut self, point: TapPoint, gap: Duration) -> Result<(), DeviceError> {
        self.tap(point)?;
        thread::sleep(gap);
        self.tap(point)
    }
}

/// `adb` subprocess transport
pub struct AdbDevice {
    adb_path: PathBuf,
    serial: Option<String>,
}

impl AdbDevice {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            adb_path: config.adb_path.clone(),
            serial: config.serial.clone(),
        }
    }

    /// `adb connect` to the configured serial, if any.
    pub fn connect(&self) -> Result<(), DeviceError> {
        let Some(serial) = &self.serial else {
            return Ok(());
        };

        let output = self.raw(&["connect", serial])?;
        info!("adb connect {}: {}", serial, String::from_utf8_lossy(&output).trim());
        Ok(())
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        cmd
    }

    /// Run without the `-s` selector.
    fn raw(&self, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
        let mut cmd = Command::new(&self.adb_path);
        cmd.args(args);
        self.run(cmd, args)
    }

    fn run(&self, mut cmd: Command, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
        let output = cmd.output().map_err(|source| DeviceError::Spawn {
            program: self.adb_path.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(DeviceError::CommandFailed {
                command: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl Device for AdbDevice {
    fn capture(&mut self) -> Result<Frame, DeviceError> {
        let args = ["exec-out", "screencap", "-p"];
        let png = self.run(self.command(&args), &args)?;
        if png.is_empty() {
            return Err(DeviceError::CaptureFailure("empty screencap output".to_string()));
        }

        let image = image::load_from_memory(&png)
            .map_err(|e| DeviceError::CaptureFailure(e.to_string()))?
            .to_rgb8();
        debug!("Captured {}x{} frame", image.width(), image.height());
        Ok(Frame::new(image))
    }

    fn tap(&mut self, point: TapPoint) -> Result<(), DeviceError> {
        let (x, y) = (point.x.to_string(), point.y.to_string());
        let args = ["shell", "input", "tap", x.as_str(), y.as_str()];
        self.run(self.command(&args), &args).map(|_| ()).inspect_err(|e| {
            warn!("Tap at {} failed: {}", point, e);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_adb_is_a_spawn_error() {
        let mut device = AdbDevice::new(&DeviceConfig {
            adb_path: "/nonexistent/adb-binary".into(),
            serial: None,
        });

        let err = device.capture().unwrap_err();
        assert!(matches!(err, DeviceError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/adb-binary"));
    }

    #[test]
    fn test_connect_without_serial_is_a_no_op() {
        let device = AdbDevice::new(&DeviceConfig {
            adb_path: "/nonexistent/adb-binary".into(),
            serial: None,
        });
        assert!(device.connect().is_ok());
    }

    struct Recorder(Vec<TapPoint>);

    impl Device for Recorder {
        fn capture(&mut self) -> Result<Frame, DeviceError> {
            Err(DeviceError::CaptureFailure("none".to_string()))
        }

        fn tap(&mut self, point: TapPoint) -> Result<(), DeviceError> {
            self.0.push(point);
            Ok(())
        }
    }

    #[test]
    fn test_double_tap_taps_twice() {
        let mut device = Recorder(Vec::new());
        device.double_tap(TapPoint::new(3, 4), Duration::ZERO).unwrap();
        assert_eq!(device.0, vec![TapPoint::new(3, 4); 2]);
    }
}
