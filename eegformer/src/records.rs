// Copyright (c) Soma Contributors
// SPDX-License-Identifier: Apache-2.0

//! Acquisition records and the shapes downstream persistence accepts.
//!
//! The device side delivers timestamped raw EEG sample sets (one value per
//! electrode) and three-axis accelerometer readings. Persistence accepts
//! either tagged time-series points or flat tabular rows. This module only
//! describes those records and converts between them; writing them anywhere is
//! the job of a [`PointSink`] / [`RowSink`] implementation supplied by the
//! caller.
//!
//! [`EegWindow`] packs consecutive sample sets into the `[channel, time]`
//! layout the model consumes, and [`EegWindow::batch`] stacks windows into a
//! `[batch, channel, time]` tensor.

use std::collections::BTreeMap;

use burn::{
    prelude::Backend,
    tensor::{Tensor, TensorData},
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

use crate::error::{ModelError, ModelResult};

pub const EEG_MEASUREMENT: &str = "EEG";
pub const ACCELEROMETER_MEASUREMENT: &str = "Accelerometer";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    /// Electrode names, in the order values appear in an [`EegSample`].
    pub channel_names: Vec<String>,
}

/// One reading from every electrode at the same instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EegSample {
    pub timestamp_ns: i64,
    pub values: Vec<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccelerometerSample {
    pub timestamp_ns: i64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AccelerometerSample {
    pub fn to_vector(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// `[batch, 3]` regression targets matching the decoder's default output.
    pub fn batch<B: Backend>(samples: &[Self], device: &B::Device) -> ModelResult<Tensor<B, 2>> {
        if samples.is_empty() {
            return Err(ModelError::EmptyData("no accelerometer samples".into()));
        }
        let values = samples.iter().flat_map(|s| s.to_vector()).collect::<Vec<_>>();
        Ok(Tensor::from_data(TensorData::new(values, [samples.len(), 3]), device))
    }
}

/// Tagged, timestamped numeric record for a time-series store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub timestamp_ns: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
pub enum DataType {
    #[strum(serialize = "EEG")]
    #[serde(rename = "EEG")]
    Eeg,
    Accelerometer,
}

/// One row of the flat dataset file. EEG rows carry `channel`/`value`,
/// accelerometer rows carry `x`/`y`/`z`; the other columns stay empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    pub timestamp_ns: i64,
    pub device_id: String,
    pub data_type: DataType,
    pub channel: Option<String>,
    pub value: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

pub trait PointSink {
    type Error;
    fn write_point(&mut self, point: TimeSeriesPoint) -> Result<(), Self::Error>;
}

pub trait RowSink {
    type Error;
    fn append_row(&mut self, row: FlatRow) -> Result<(), Self::Error>;
}

impl DeviceInfo {
    fn check_sample(&self, sample: &EegSample) -> ModelResult<()> {
        if sample.values.len() != self.channel_names.len() {
            return Err(ModelError::ShapeMismatch {
                stage: "records",
                expected: format!("[{}]", self.channel_names.len()),
                actual: vec![sample.values.len()],
            });
        }
        Ok(())
    }

    fn tags(&self) -> BTreeMap<String, String> {
        BTreeMap::from([("device".to_string(), self.device_id.clone())])
    }

    /// One point per electrode, tagged with device and channel name.
    pub fn eeg_points(&self, sample: &EegSample) -> ModelResult<Vec<TimeSeriesPoint>> {
        self.check_sample(sample)?;
        Ok(self
            .channel_names
            .iter()
            .zip(sample.values.iter())
            .map(|(channel, value)| {
                let mut tags = self.tags();
                tags.insert("channel".to_string(), channel.clone());
                TimeSeriesPoint {
                    measurement: EEG_MEASUREMENT.to_string(),
                    tags,
                    fields: BTreeMap::from([("value".to_string(), f64::from(*value))]),
                    timestamp_ns: sample.timestamp_ns,
                }
            })
            .collect())
    }

    pub fn eeg_rows(&self, sample: &EegSample) -> ModelResult<Vec<FlatRow>> {
        self.check_sample(sample)?;
        Ok(self
            .channel_names
            .iter()
            .zip(sample.values.iter())
            .map(|(channel, value)| FlatRow {
                timestamp_ns: sample.timestamp_ns,
                device_id: self.device_id.clone(),
                data_type: DataType::Eeg,
                channel: Some(channel.clone()),
                value: Some(f64::from(*value)),
                x: None,
                y: None,
                z: None,
            })
            .collect())
    }

    pub fn accelerometer_point(&self, sample: &AccelerometerSample) -> TimeSeriesPoint {
        TimeSeriesPoint {
            measurement: ACCELEROMETER_MEASUREMENT.to_string(),
            tags: self.tags(),
            fields: BTreeMap::from([
                ("x".to_string(), f64::from(sample.x)),
                ("y".to_string(), f64::from(sample.y)),
                ("z".to_string(), f64::from(sample.z)),
            ]),
            timestamp_ns: sample.timestamp_ns,
        }
    }

    pub fn accelerometer_row(&self, sample: &AccelerometerSample) -> FlatRow {
        FlatRow {
            timestamp_ns: sample.timestamp_ns,
            device_id: self.device_id.clone(),
            data_type: DataType::Accelerometer,
            channel: None,
            value: None,
            x: Some(f64::from(sample.x)),
            y: Some(f64::from(sample.y)),
            z: Some(f64::from(sample.z)),
        }
    }

    /// Fans one EEG sample set out to both sinks, points first.
    pub fn dispatch_eeg<P, R, E>(
        &self,
        sample: &EegSample,
        points: &mut P,
        rows: &mut R,
    ) -> Result<(), E>
    where
        P: PointSink<Error = E>,
        R: RowSink<Error = E>,
        E: From<ModelError>,
    {
        for point in self.eeg_points(sample)? {
            points.write_point(point)?;
        }
        for row in self.eeg_rows(sample)? {
            rows.append_row(row)?;
        }
        Ok(())
    }

    pub fn dispatch_accelerometer<P, R, E>(
        &self,
        sample: &AccelerometerSample,
        points: &mut P,
        rows: &mut R,
    ) -> Result<(), E>
    where
        P: PointSink<Error = E>,
        R: RowSink<Error = E>,
    {
        points.write_point(self.accelerometer_point(sample))?;
        rows.append_row(self.accelerometer_row(sample))
    }
}

/// Consecutive sample sets laid out channel-major: `values[c * len + t]`.
#[derive(Clone, Debug, PartialEq)]
pub struct EegWindow {
    n_channels: usize,
    len: usize,
    values: Vec<f32>,
}

impl EegWindow {
    pub fn from_samples(n_channels: usize, samples: &[EegSample]) -> ModelResult<Self> {
        if samples.is_empty() {
            return Err(ModelError::EmptyData("window has no samples".into()));
        }
        if let Some(bad) = samples.iter().find(|s| s.values.len() != n_channels) {
            return Err(ModelError::ShapeMismatch {
                stage: "records",
                expected: format!("[{n_channels}]"),
                actual: vec![bad.values.len()],
            });
        }

        let len = samples.len();
        let mut values = vec![0.0; n_channels * len];
        for (t, sample) in samples.iter().enumerate() {
            for (c, value) in sample.values.iter().enumerate() {
                values[c * len + t] = *value;
            }
        }
        Ok(Self { n_channels, len, values })
    }

    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        (index < self.n_channels).then(|| &self.values[index * self.len..(index + 1) * self.len])
    }

    /// Stacks equally sized windows into `[batch, channel, time]`.
    pub fn batch<B: Backend>(windows: &[Self], device: &B::Device) -> ModelResult<Tensor<B, 3>> {
        let first = windows
            .first()
            .ok_or_else(|| ModelError::EmptyData("no windows to batch".into()))?;
        if let Some(bad) =
            windows.iter().find(|w| w.n_channels != first.n_channels || w.len != first.len)
        {
            return Err(ModelError::ShapeMismatch {
                stage: "records",
                expected: format!("[{}, {}]", first.n_channels, first.len),
                actual: vec![bad.n_channels, bad.len],
            });
        }

        let values = windows.iter().flat_map(|w| w.values.iter().copied()).collect::<Vec<_>>();
        let data = TensorData::new(values, [windows.len(), first.n_channels, first.len]);
        Ok(Tensor::from_data(data, device))
    }
}
