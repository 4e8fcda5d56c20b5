/// Sensor/actuator driver interface and the simulated development driver
pub mod sensor;

pub use sensor::{display_lines, SensorDriver, SimulatedSensor};
