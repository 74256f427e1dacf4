//! CPU construction configuration.

/// Configuration for constructing a [`crate::Cpu`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuConfig {
    /// Master clock rate in Hz.
    pub hz: u64,
    /// `log2` of the ROM size in 16-bit words.
    pub rom_addr_width: u32,
    /// `log2` of the RAM size in bytes. Values above 16 enable the
    /// extended-memory CTRL/bank/MISO side channel (see [`crate::Cpu`]).
    pub ram_addr_width: u32,
}

impl Default for CpuConfig {
    /// Stock Gigatron: 6.25 MHz, 64 Ki ROM words, 128 KiB RAM (extended).
    fn default() -> Self {
        Self {
            hz: 6_250_000,
            rom_addr_width: 16,
            ram_addr_width: 17,
        }
    }
}
