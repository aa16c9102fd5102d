//! Arena agent: drives the device from screen perception, records round
//! outcomes and keeps an outcome predictor up to date.

pub mod clean;
pub mod config;
pub mod device;
pub mod driver;
pub mod logging;
pub mod persistence;
pub mod predict;

pub use clean::{CleanConfig, CleanReport, DatasetCleaner, DropReason};
pub use config::AgentConfig;
pub use device::{AdbDevice, Device, DeviceError};
pub use driver::{AgentError, Driver};
pub use persistence::DatasetStore;
pub use predict::{LinearModel, LogisticTrainer, Model, Prediction, Trainer};
