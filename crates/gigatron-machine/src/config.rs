//! Composition-root configuration.

use gigatron_audio::AudioConfig;
use gigatron_cpu::CpuConfig;

/// Configuration for constructing a [`crate::Gigatron`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GigatronConfig {
    pub cpu: CpuConfig,
    pub audio: AudioConfig,
}
