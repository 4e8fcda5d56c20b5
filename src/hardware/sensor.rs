use crate::error::SensorError;
use log::{debug, info};

/// Temperature/humidity sensor plus the local indicator LED and display
#[cfg_attr(test, mockall::automock)]
pub trait SensorDriver: Send {
    /// Read one `(temperature, humidity)` sample
    fn read_sample(&mut self) -> Result<(f64, f64), SensorError>;

    fn set_indicator(&mut self, on: bool) -> Result<(), SensorError>;

    fn render_display(&mut self, temperature: f64, humidity: f64) -> Result<(), SensorError>;

    /// Release the hardware. Called once when the monitor loop exits.
    fn shutdown(&mut self);
}

/// The two lines shown on the 16x2 character display
pub fn display_lines(temperature: f64, humidity: f64) -> [String; 2] {
    [
        format!("Temp: {:.1}C", temperature),
        format!("Hum : {:.1}%", humidity),
    ]
}

/// Stand-in driver for machines without the sensor attached
///
/// Always reports the configured reading; indicator and display changes
/// are written to the log instead of GPIO and I2C.
#[derive(Debug)]
pub struct SimulatedSensor {
    temperature: f64,
    humidity: f64,
    indicator: bool,
    shut_down: bool,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(24.0, 50.0)
    }
}

impl SimulatedSensor {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        info!(
            "Running with simulated sensor ({:.1}C, {:.1}%)",
            temperature, humidity
        );
        Self {
            temperature,
            humidity,
            indicator: false,
            shut_down: false,
        }
    }

    pub fn indicator(&self) -> bool {
        self.indicator
    }
}

impl SensorDriver for SimulatedSensor {
    fn read_sample(&mut self) -> Result<(f64, f64), SensorError> {
        if self.shut_down {
            return Err(SensorError::Unavailable("sensor has been shut down".to_string()));
        }
        Ok((self.temperature, self.humidity))
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), SensorError> {
        if on != self.indicator {
            info!("Indicator {}", if on { "on" } else { "off" });
        }
        self.indicator = on;
        Ok(())
    }

    fn render_display(&mut self, temperature: f64, humidity: f64) -> Result<(), SensorError> {
        let [line1, line2] = display_lines(temperature, humidity);
        debug!("Display: {} | {}", line1, line2);
        Ok(())
    }

    fn shutdown(&mut self) {
        if !self.shut_down {
            info!("Simulated sensor shut down");
        }
        self.indicator = false;
        self.shut_down = true;
    }
}
