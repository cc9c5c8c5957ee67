/// Number of Tx channels and of Rx channels.
pub const CHANNEL_COUNT: usize = 8;

/// Head/completion pointer pair of one Tx channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxChannel {
    /// Head descriptor pointer. 0 = idle.
    pub head: u32,
    /// Buffer pointer of the last descriptor the engine finished with.
    pub completion: u32,
}

/// Head/completion pointer pair of one Rx channel, plus where the next fill starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxChannel {
    pub head: u32,
    pub completion: u32,
    /// Descriptor the next fill starts at. Carried across fills so software does not have to
    /// rewrite the head pointer after every frame.
    pub current: Option<u32>,
}

/// Channel state for all sixteen DMA channels.
#[derive(Debug, Clone, Default)]
pub struct ChannelTable {
    tx: [TxChannel; CHANNEL_COUNT],
    rx: [RxChannel; CHANNEL_COUNT],
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn tx(&self, channel: usize) -> &TxChannel {
        &self.tx[channel]
    }

    pub fn tx_mut(&mut self, channel: usize) -> &mut TxChannel {
        &mut self.tx[channel]
    }

    pub fn rx(&self, channel: usize) -> &RxChannel {
        &self.rx[channel]
    }

    pub fn rx_mut(&mut self, channel: usize) -> &mut RxChannel {
        &mut self.rx[channel]
    }

    pub fn set_tx_head(&mut self, channel: usize, value: u32) {
        self.tx[channel].head = value;
    }

    /// Arms (or idles, for 0) an Rx channel; the next fill starts at `value`.
    pub fn set_rx_head(&mut self, channel: usize, value: u32) {
        let rx = &mut self.rx[channel];
        rx.head = value;
        rx.current = (value != 0).then_some(value);
    }

    pub fn tx_completion(&self, channel: usize) -> u32 {
        self.tx[channel].completion
    }

    pub fn rx_completion(&self, channel: usize) -> u32 {
        self.rx[channel].completion
    }
}
