use memory::GuestMemory;
use tracing::{trace, warn};

use crate::cpts::{EventMetadata, EventType};
use crate::descriptor::TxFlags;
use crate::device::CpswDevice;
use crate::error::Result;
use crate::frame::{append_fcs, classify, ptp_message_type, ptp_sequence_id, FrameClass};
use crate::ring::{gather_tx_frame, TxGather};

impl CpswDevice {
    /// Sends the frame queued on `channel`, if any, and idles the channel.
    ///
    /// Exactly one frame is taken per trigger. On failure nothing is emitted and no descriptor is
    /// touched; the head pointer is cleared either way so software can re-arm the channel.
    pub(crate) fn transmit(&mut self, channel: usize, mem: &mut dyn GuestMemory) -> Result<()> {
        let head = self.channels.tx(channel).head;
        if head == 0 {
            return Ok(());
        }

        let result = gather_tx_frame(
            &self.cppi_ram,
            mem,
            channel,
            head,
            self.config.max_descriptor_walk,
        )
        .and_then(|gathered| self.complete_tx(channel, gathered));
        self.channels.set_tx_head(channel, 0);

        if let Err(err) = &result {
            self.stats.tx_errors += 1;
            warn!(channel, head = format_args!("{head:#010x}"), %err, "tx chain rejected");
        }
        result
    }

    fn complete_tx(&mut self, channel: usize, gathered: TxGather) -> Result<()> {
        let TxGather {
            descriptors,
            mut frame,
        } = gathered;
        let Some(first) = descriptors.first().copied() else {
            return Ok(());
        };

        let last = descriptors.len() - 1;
        for (i, descriptor) in descriptors.iter().enumerate() {
            let mut descriptor = *descriptor;
            if i == 0 {
                // Ownership is returned on the start descriptor only.
                descriptor.flags.remove(TxFlags::OWNER);
            }
            if i == last {
                descriptor.flags.insert(TxFlags::EOQ);
            }
            descriptor.encode_partial(&mut self.cppi_ram)?;
        }
        self.channels.tx_mut(channel).completion = first.buffer_pointer;

        let class = classify(&frame, self.config.ptp_ethertype, self.ts_ltypes());
        if class == FrameClass::Ptp && self.timestamps_enabled() {
            self.push_timestamp(EventMetadata {
                port: first.to_port,
                event_type: EventType::EthernetTransmit,
                message_type: ptp_message_type(&frame),
                sequence_id: ptp_sequence_id(&frame),
            });
        }

        if !first.pass_crc() {
            append_fcs(&mut frame);
        }
        trace!(channel, len = frame.len(), descriptors = descriptors.len(), "tx frame");
        self.stats.tx_frames += 1;
        if self.tx_out.len() >= self.config.max_tx_queue_frames {
            self.stats.tx_dropped += 1;
            warn!(channel, "egress queue full, dropping transmitted frame");
        } else {
            self.tx_out.push_back(frame);
        }
        Ok(())
    }
}
