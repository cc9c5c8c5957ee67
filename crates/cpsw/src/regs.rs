//! Register offsets within the 16 KiB CPSW subsystem window.

pub const REGION_SIZE: u32 = 0x4000;

// Switch control block.
pub const CPSW_ID_VER: u32 = 0x000;
pub const CPSW_CONTROL: u32 = 0x004;
pub const CPSW_SOFT_RESET: u32 = 0x008;
pub const CPSW_STAT_PORT_EN: u32 = 0x00C;
pub const CPSW_VLAN_LTYPE: u32 = 0x028;
pub const CPSW_TS_LTYPE: u32 = 0x02C;

// CPDMA.
pub const CPDMA_TX_CONTROL: u32 = 0x804;
pub const CPDMA_RX_CONTROL: u32 = 0x814;
pub const CPDMA_SOFT_RESET: u32 = 0x81C;
pub const CPDMA_DMASTATUS: u32 = 0x824;
pub const CPDMA_EOI_VECTOR: u32 = 0x894;
pub const CPDMA_RX_FREEBUFFER: u32 = 0x8E0;

pub const CPDMA_CONTROL_EN: u32 = 1 << 0;

pub const DMASTATUS_RX_ERR_CH_SHIFT: u32 = 8;
pub const DMASTATUS_RX_ERR_CODE_SHIFT: u32 = 12;
/// "Ownership bit not set in SOP buffer".
pub const RX_ERR_CODE_NOT_OWNED: u32 = 2;
/// "Zero buffer pointer / no descriptor".
pub const RX_ERR_CODE_NO_DESCRIPTOR: u32 = 4;

// STATE_RAM: per-channel head descriptor and completion pointers.
pub const TX_HDP: u32 = 0xA00;
pub const RX_HDP: u32 = 0xA20;
pub const TX_CP: u32 = 0xA40;
pub const RX_CP: u32 = 0xA60;
pub const STATE_RAM_END: u32 = 0xA80;

// CPTS.
pub const CPTS_CONTROL: u32 = 0xC04;
pub const CPTS_INTSTAT_RAW: u32 = 0xC20;
pub const CPTS_INTSTAT_MASKED: u32 = 0xC24;
pub const CPTS_INT_ENABLE: u32 = 0xC28;
pub const CPTS_EVENT_POP: u32 = 0xC30;
pub const CPTS_EVENT_LOW: u32 = 0xC34;
pub const CPTS_EVENT_HIGH: u32 = 0xC38;

pub const CPTS_TS_PEND: u32 = 1 << 0;
pub const CPTS_EVENT_POP_BIT: u32 = 1 << 0;

// ALE.
pub const ALE_CONTROL: u32 = 0xD08;
pub const ALE_TBLCTL: u32 = 0xD20;
pub const ALE_TBLW2: u32 = 0xD34;
pub const ALE_TBLW1: u32 = 0xD38;
pub const ALE_TBLW0: u32 = 0xD3C;

pub const ALE_CONTROL_CLEAR_TABLE: u32 = 1 << 30;
pub const ALE_CONTROL_ENABLE: u32 = 1 << 31;
pub const ALE_TBLCTL_WRITE_RDZ: u32 = 1 << 31;

// Sliver MACs.
pub const SL1_SOFT_RESET: u32 = 0xD8C;
pub const SL2_SOFT_RESET: u32 = 0xDCC;

// MDIO.
pub const MDIO_CONTROL: u32 = 0x1004;
pub const MDIO_USERACCESS0: u32 = 0x1080;
pub const MDIO_USERACCESS1: u32 = 0x1088;

pub const MDIO_USERACCESS_GO: u32 = 1 << 31;
pub const MDIO_USERACCESS_DATA_MASK: u32 = 0xFFFF;

// Subsystem wrapper.
pub const WR_SOFT_RESET: u32 = 0x1204;
pub const WR_C0_MISC_EN: u32 = 0x121C;
pub const WR_C0_MISC_STAT: u32 = 0x124C;

/// Value latched into `WR_C0_MISC_STAT` when a timestamp event is queued.
pub const WR_MISC_EVNT_PEND: u32 = 0x10;

pub const SOFT_RESET_BIT: u32 = 1 << 0;

/// CPPI descriptor RAM, the second half of the window.
pub const CPPI_RAM_OFFSET: u32 = 0x2000;
pub const CPPI_RAM_SIZE: u32 = 0x2000;

/// Default bus address of the CPPI RAM, as seen from descriptor pointers.
pub const CPPI_RAM_BUS_BASE: u32 = 0x4848_6000;

pub(crate) fn is_soft_reset(offset: u32) -> bool {
    matches!(
        offset,
        CPSW_SOFT_RESET | CPDMA_SOFT_RESET | SL1_SOFT_RESET | SL2_SOFT_RESET | WR_SOFT_RESET
    )
}
