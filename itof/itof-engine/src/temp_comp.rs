//! Temperature compensation: laser-thermistor and VLDA ADC samples reduced
//! over a ring buffer into a range offset via Steinhart-Hart.

use std::collections::VecDeque;

use itof_metadata::RangeCal;

const DEFAULT_RING_CAPACITY: usize = 100;
const VLDA_RANGE_V: std::ops::RangeInclusive<f64> = 10.0..=25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorVariant {
    /// The oldest sensor variant; temperature compensation always reports 0.
    M20,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteinhartHartCoeffs {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempCompConfig {
    pub variant: SensorVariant,
    pub reference_resistance_ohms: f64,
    pub vref_volts: f64,
    pub vlda_scale: f64,
    pub steinhart_hart: SteinhartHartCoeffs,
}

pub struct TemperatureCompensator {
    capacity: usize,
    config: Option<TempCompConfig>,
    thermistor_ring: VecDeque<u16>,
    vlda_ring: VecDeque<u16>,
    disabled_for_fov: bool,
}

impl Default for TemperatureCompensator {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

impl TemperatureCompensator {
    pub fn new(capacity: usize) -> Self {
        TemperatureCompensator {
            capacity,
            config: None,
            thermistor_ring: VecDeque::with_capacity(capacity),
            vlda_ring: VecDeque::with_capacity(capacity),
            disabled_for_fov: false,
        }
    }

    /// Called on the first ROI of an FOV: captures the sensor variant and
    /// calibration in effect for this frame and clears the ring.
    pub fn start_frame(&mut self, config: TempCompConfig) {
        self.config = Some(config);
        self.thermistor_ring.clear();
        self.vlda_ring.clear();
        self.disabled_for_fov = false;
    }

    /// Feed one ROI's worth of ADC samples. If `config` differs from the
    /// one captured at `start_frame`, the compensator disables itself for
    /// the remainder of this FOV.
    pub fn push_samples(&mut self, thermistor_adc: u16, vlda_adc: u16, config: TempCompConfig) {
        match self.config {
            Some(c) if c == config => {}
            _ => {
                self.disabled_for_fov = true;
                return;
            }
        }
        if self.thermistor_ring.len() == self.capacity {
            self.thermistor_ring.pop_front();
        }
        self.thermistor_ring.push_back(thermistor_adc);
        if self.vlda_ring.len() == self.capacity {
            self.vlda_ring.pop_front();
        }
        self.vlda_ring.push_back(vlda_adc);
    }

    /// Called on the last ROI of an FOV: reduce the ring (median) and
    /// compute the range offset in millimeters. Returns 0 if disabled, if
    /// the sensor is the M20 variant, or if VLDA is out of range.
    pub fn complete(&self, range_cal: RangeCal, adc_cal_gain: f32, adc_cal_offset: f32) -> f32 {
        let Some(config) = self.config else {
            return 0.0;
        };
        if self.disabled_for_fov || config.variant == SensorVariant::M20 {
            return 0.0;
        }
        if self.thermistor_ring.is_empty() || self.vlda_ring.is_empty() {
            return 0.0;
        }

        let thermistor_adc = median_u16(&self.thermistor_ring);
        let vlda_adc = median_u16(&self.vlda_ring);

        let v_therm = adc_to_volts(thermistor_adc, adc_cal_gain, adc_cal_offset);
        let resistance = divider_resistance(v_therm, config.vref_volts, config.reference_resistance_ohms);
        let temp_c = steinhart_hart_celsius(resistance, config.steinhart_hart);

        let vlda_v = adc_to_volts(vlda_adc, adc_cal_gain, adc_cal_offset) * config.vlda_scale;
        if !VLDA_RANGE_V.contains(&vlda_v) {
            return 0.0;
        }

        (range_cal.offset_mm as f64 + range_cal.mm_per_degc as f64 * temp_c
            - range_cal.mm_per_volt as f64 * vlda_v) as f32
    }
}

fn adc_to_volts(adc: u16, gain: f32, offset: f32) -> f64 {
    adc as f64 * gain as f64 + offset as f64
}

/// NTC-in-series-with-reference voltage divider: `v_therm` is the voltage
/// measured across the thermistor, `vref` the excitation voltage, `r_ref`
/// the fixed series resistor.
fn divider_resistance(v_therm: f64, vref: f64, r_ref: f64) -> f64 {
    r_ref * v_therm / (vref - v_therm).max(1e-9)
}

fn steinhart_hart_celsius(resistance_ohms: f64, c: SteinhartHartCoeffs) -> f64 {
    let ln_r = resistance_ohms.max(1e-9).ln();
    let inv_t = c.a + c.b * ln_r + c.c * ln_r.powi(3);
    1.0 / inv_t - 273.15
}

fn median_u16(ring: &VecDeque<u16>) -> u16 {
    let mut v: Vec<u16> = ring.iter().copied().collect();
    v.sort_unstable();
    v[v.len() / 2]
}
