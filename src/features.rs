//! Feature vector for crop recommendation inference.
//!
//! The column order here is a contract with the scaler and classifier
//! artifacts: it must match the order they were fit on.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Number of model input features.
pub const FEATURE_COUNT: usize = 7;

/// Feature names in model input order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["N", "P", "K", "temperature", "humidity", "ph", "rainfall"];

/// Accepted range for one form field.
///
/// Used for UI guidance and informational flags only. The pipeline never
/// rejects or clamps a value for falling outside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRange {
    pub name: &'static str,
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Guidance ranges, in model input order.
pub const FEATURE_RANGES: [FeatureRange; FEATURE_COUNT] = [
    FeatureRange { name: "N", label: "Nitrogen (N)", min: 0.0, max: 140.0 },
    FeatureRange { name: "P", label: "Phosphorus (P)", min: 5.0, max: 145.0 },
    FeatureRange { name: "K", label: "Potassium (K)", min: 5.0, max: 205.0 },
    FeatureRange { name: "temperature", label: "Temperature (°C)", min: 8.0, max: 43.0 },
    FeatureRange { name: "humidity", label: "Humidity (%)", min: 14.0, max: 100.0 },
    FeatureRange { name: "ph", label: "pH value", min: 3.5, max: 9.5 },
    FeatureRange { name: "rainfall", label: "Rainfall (mm)", min: 20.0, max: 300.0 },
];

/// Soil and weather readings for one prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Soil nitrogen
    #[serde(rename = "N", alias = "nitrogen")]
    pub nitrogen: f64,

    /// Soil phosphorus
    #[serde(rename = "P", alias = "phosphorus")]
    pub phosphorus: f64,

    /// Soil potassium
    #[serde(rename = "K", alias = "potassium")]
    pub potassium: f64,

    /// Air temperature in °C
    pub temperature: f64,

    /// Relative humidity in %
    pub humidity: f64,

    /// Soil pH
    #[serde(alias = "pH")]
    pub ph: f64,

    /// Rainfall in mm
    pub rainfall: f64,
}

impl FeatureVector {
    pub fn new(
        nitrogen: f64,
        phosphorus: f64,
        potassium: f64,
        temperature: f64,
        humidity: f64,
        ph: f64,
        rainfall: f64,
    ) -> Self {
        Self {
            nitrogen,
            phosphorus,
            potassium,
            temperature,
            humidity,
            ph,
            rainfall,
        }
    }

    /// Build from an ordered slice, rejecting wrong lengths and non-finite values.
    pub fn from_slice(values: &[f64]) -> PipelineResult<Self> {
        if values.len() != FEATURE_COUNT {
            return Err(PipelineError::InvalidInput(format!(
                "expected {} features ({}), got {}",
                FEATURE_COUNT,
                FEATURE_NAMES.join(", "),
                values.len()
            )));
        }

        let fv = Self::new(
            values[0], values[1], values[2], values[3], values[4], values[5], values[6],
        );
        fv.validate()?;
        Ok(fv)
    }

    /// Values in model input order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.temperature,
            self.humidity,
            self.ph,
            self.rainfall,
        ]
    }

    /// Reject NaN and infinite entries.
    pub fn validate(&self) -> PipelineResult<()> {
        for (name, value) in FEATURE_NAMES.iter().zip(self.to_array()) {
            if !value.is_finite() {
                return Err(PipelineError::InvalidInput(format!(
                    "feature '{}' is not a finite number ({})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Names of fields outside their guidance range.
    pub fn out_of_range(&self) -> Vec<&'static str> {
        FEATURE_RANGES
            .iter()
            .zip(self.to_array())
            .filter(|(range, value)| !range.contains(*value))
            .map(|(range, _)| range.name)
            .collect()
    }

    /// The canonical rice row from the training data, also the form defaults.
    pub fn rice_exemplar() -> Self {
        Self::new(90.0, 42.0, 43.0, 20.8, 82.0, 6.5, 202.9)
    }
}

/// Feature payload as it arrives on the wire: named fields or an ordered array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureInput {
    Named(FeatureVector),
    Ordered(Vec<f64>),
}

impl FeatureInput {
    pub fn into_vector(self) -> PipelineResult<FeatureVector> {
        match self {
            FeatureInput::Named(fv) => {
                fv.validate()?;
                Ok(fv)
            }
            FeatureInput::Ordered(values) => FeatureVector::from_slice(&values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_matches_names() {
        let fv = FeatureVector::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0);
        assert_eq!(fv.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        for (range, name) in FEATURE_RANGES.iter().zip(FEATURE_NAMES) {
            assert_eq!(range.name, name);
        }
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let err = FeatureVector::from_slice(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));

        let err = FeatureVector::from_slice(&[0.0; 8]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn test_from_slice_rejects_nan() {
        let err = FeatureVector::from_slice(&[90.0, 42.0, 43.0, f64::NAN, 82.0, 6.5, 202.9])
            .unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_out_of_range_is_informational() {
        assert!(FeatureVector::rice_exemplar().out_of_range().is_empty());

        let mut fv = FeatureVector::rice_exemplar();
        fv.ph = 20.0;
        assert_eq!(fv.out_of_range(), vec!["ph"]);
        assert!(fv.validate().is_ok());
    }

    #[test]
    fn test_wire_forms() {
        let named: FeatureInput = serde_json::from_str(
            r#"{"N": 90, "P": 42, "K": 43, "temperature": 20.8, "humidity": 82.0, "ph": 6.5, "rainfall": 202.9}"#,
        )
        .unwrap();
        assert_eq!(named.into_vector().unwrap(), FeatureVector::rice_exemplar());

        let long_names: FeatureInput = serde_json::from_str(
            r#"{"nitrogen": 90, "phosphorus": 42, "potassium": 43, "temperature": 20.8, "humidity": 82.0, "pH": 6.5, "rainfall": 202.9}"#,
        )
        .unwrap();
        assert_eq!(long_names.into_vector().unwrap(), FeatureVector::rice_exemplar());

        let ordered: FeatureInput =
            serde_json::from_str("[90, 42, 43, 20.8, 82.0, 6.5, 202.9]").unwrap();
        assert_eq!(ordered.into_vector().unwrap(), FeatureVector::rice_exemplar());

        let short: FeatureInput = serde_json::from_str("[90, 42]").unwrap();
        assert!(short.into_vector().is_err());

        assert!(serde_json::from_str::<FeatureInput>(r#"["ninety", 42]"#).is_err());
    }
}
