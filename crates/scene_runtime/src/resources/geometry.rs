//! Morph geometry source data
//!
//! A morph resource is an ordered list of targets, each a keyframe's worth of
//! vertex attributes, plus one key per target placing it on the blend axis.

use serde::{Deserialize, Serialize};

use crate::gpu::{AttributeChannel, ChannelMask, GpuBuffer};
use crate::resources::StreamSource;
use crate::ValidationError;

/// Attribute data for one keyframe; every channel is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetData {
    /// Vertex positions, 3 floats per vertex
    #[serde(default)]
    pub positions: Option<Vec<f32>>,
    /// Vertex normals, 3 floats per vertex
    #[serde(default)]
    pub normals: Option<Vec<f32>>,
    /// First texture coordinate set, 2 floats per vertex
    #[serde(default)]
    pub uv: Option<Vec<f32>>,
    /// Second texture coordinate set, 2 floats per vertex
    #[serde(default)]
    pub uv2: Option<Vec<f32>>,
}

impl TargetData {
    /// Target carrying only positions
    pub fn from_positions(positions: Vec<f32>) -> Self {
        Self {
            positions: Some(positions),
            ..Default::default()
        }
    }

    /// Add normals (builder pattern)
    pub fn with_normals(mut self, normals: Vec<f32>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Add the first uv set (builder pattern)
    pub fn with_uv(mut self, uv: Vec<f32>) -> Self {
        self.uv = Some(uv);
        self
    }

    /// Add the second uv set (builder pattern)
    pub fn with_uv2(mut self, uv2: Vec<f32>) -> Self {
        self.uv2 = Some(uv2);
        self
    }

    /// Data for one channel, if present
    pub fn channel(&self, channel: AttributeChannel) -> Option<&[f32]> {
        match channel {
            AttributeChannel::Position => self.positions.as_deref(),
            AttributeChannel::Normal => self.normals.as_deref(),
            AttributeChannel::Uv => self.uv.as_deref(),
            AttributeChannel::Uv2 => self.uv2.as_deref(),
        }
    }

    /// Channels present on this target
    pub fn channels(&self) -> ChannelMask {
        AttributeChannel::ALL
            .into_iter()
            .filter(|channel| self.channel(*channel).is_some())
            .fold(ChannelMask::empty(), |mask, channel| mask | channel.mask())
    }
}

/// Inline morph geometry: keys and targets in matching order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphGeometryData {
    /// Blend-axis position of each target, non-decreasing
    pub keys: Vec<f32>,
    /// Keyframe attribute data
    pub targets: Vec<TargetData>,
}

impl MorphGeometryData {
    /// Build and validate morph geometry
    pub fn new(keys: Vec<f32>, targets: Vec<TargetData>) -> Result<Self, ValidationError> {
        let data = Self { keys, targets };
        data.validate()?;
        Ok(data)
    }

    /// Check target count, key count, key order and channel lengths
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.targets.len() < 2 {
            return Err(ValidationError::TooFewTargets(self.targets.len()));
        }
        if self.keys.len() != self.targets.len() {
            return Err(ValidationError::KeyCountMismatch {
                targets: self.targets.len(),
                keys: self.keys.len(),
            });
        }

        let mut previous = f32::NEG_INFINITY;
        for (index, &value) in self.keys.iter().enumerate() {
            if !value.is_finite() || value < previous {
                return Err(ValidationError::KeyOrder { index, value });
            }
            previous = value;
        }

        for (target, data) in self.targets.iter().enumerate() {
            for channel in AttributeChannel::ALL {
                if let Some(values) = data.channel(channel) {
                    if values.len() % channel.components() != 0 {
                        return Err(ValidationError::ChannelLength {
                            target,
                            channel: channel.name(),
                            len: values.len(),
                            components: channel.components(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Where a morph resource's data comes from
#[derive(Debug, Clone, PartialEq)]
pub enum GeometrySource {
    /// Data supplied directly; allocated synchronously
    Inline(MorphGeometryData),
    /// Data fetched by a [`crate::resources::GeometryLoader`]
    Stream(StreamSource),
}

/// GPU-side buffers of one morph target
#[derive(Debug, Default)]
pub struct MorphTarget {
    buffers: [Option<Box<dyn GpuBuffer>>; 4],
}

impl MorphTarget {
    const fn slot(channel: AttributeChannel) -> usize {
        match channel {
            AttributeChannel::Position => 0,
            AttributeChannel::Normal => 1,
            AttributeChannel::Uv => 2,
            AttributeChannel::Uv2 => 3,
        }
    }

    pub(crate) fn set(&mut self, channel: AttributeChannel, buffer: Box<dyn GpuBuffer>) {
        self.buffers[Self::slot(channel)] = Some(buffer);
    }

    /// Buffer for one channel, if the target carries it
    pub fn buffer(&self, channel: AttributeChannel) -> Option<&dyn GpuBuffer> {
        self.buffers[Self::slot(channel)].as_deref()
    }

    /// Channels backed by a buffer
    pub fn channels(&self) -> ChannelMask {
        AttributeChannel::ALL
            .into_iter()
            .filter(|channel| self.buffer(*channel).is_some())
            .fold(ChannelMask::empty(), |mask, channel| mask | channel.mask())
    }

    /// Destroy every buffer, last channel first
    pub(crate) fn release(self) {
        for buffer in self.buffers.into_iter().rev().flatten() {
            buffer.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(offset: f32) -> TargetData {
        TargetData::from_positions(vec![offset; 12])
    }

    #[test]
    fn test_valid_geometry() {
        let data = MorphGeometryData::new(vec![0.0, 0.5, 1.0], vec![quad(0.0), quad(1.0), quad(2.0)]);
        assert!(data.is_ok());
    }

    #[test]
    fn test_rejects_single_target() {
        let result = MorphGeometryData::new(vec![0.0], vec![quad(0.0)]);
        assert_eq!(result, Err(ValidationError::TooFewTargets(1)));
    }

    #[test]
    fn test_rejects_key_count_mismatch() {
        let result = MorphGeometryData::new(vec![0.0, 1.0, 2.0], vec![quad(0.0), quad(1.0)]);
        assert_eq!(result, Err(ValidationError::KeyCountMismatch { targets: 2, keys: 3 }));
    }

    #[test]
    fn test_keys_may_repeat_but_not_decrease() {
        assert!(MorphGeometryData::new(vec![0.0, 0.5, 0.5], vec![quad(0.0), quad(1.0), quad(2.0)]).is_ok());

        let result = MorphGeometryData::new(vec![0.0, 1.0, 0.5], vec![quad(0.0), quad(1.0), quad(2.0)]);
        assert_eq!(result, Err(ValidationError::KeyOrder { index: 2, value: 0.5 }));
    }

    #[test]
    fn test_rejects_non_finite_keys() {
        let result = MorphGeometryData::new(vec![0.0, f32::NAN], vec![quad(0.0), quad(1.0)]);
        assert!(matches!(result, Err(ValidationError::KeyOrder { index: 1, .. })));
    }

    #[test]
    fn test_rejects_partial_items() {
        let bad = TargetData::from_positions(vec![0.0; 12]).with_uv(vec![0.0; 5]);
        let result = MorphGeometryData::new(vec![0.0, 1.0], vec![quad(0.0), bad]);
        assert!(matches!(
            result,
            Err(ValidationError::ChannelLength { target: 1, channel: "uv", len: 5, components: 2 })
        ));
    }

    #[test]
    fn test_target_channels() {
        let target = TargetData::from_positions(vec![0.0; 3]).with_uv2(vec![0.0; 2]);
        assert_eq!(target.channels(), ChannelMask::POSITION | ChannelMask::UV2);
        assert!(target.channel(AttributeChannel::Normal).is_none());
    }

    #[test]
    fn test_geometry_deserializes_with_missing_channels() {
        let text = "(keys: [0.0, 1.0], targets: [(positions: Some([0.0, 0.0, 0.0])), (positions: Some([1.0, 1.0, 1.0]))])";
        let data: MorphGeometryData = ron::from_str(text).expect("parse");
        assert!(data.validate().is_ok());
        assert_eq!(data.targets[1].channels(), ChannelMask::POSITION);
    }
}
