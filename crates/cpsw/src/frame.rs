//! Ethernet frame helpers: classification, PTP header fields and the FCS.

/// EtherType of IEEE 1588 PTP over Ethernet.
pub const ETHERTYPE_PTP: u16 = 0x88F7;

/// Length of an Ethernet frame check sequence.
pub const FCS_LEN: usize = 4;

const ETHERTYPE_OFFSET: usize = 12;
const PTP_MESSAGE_TYPE_OFFSET: usize = 14;
const PTP_SEQUENCE_ID_OFFSET: usize = 44;

/// How the engine treats a frame for channel selection and timestamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    /// Precision time protocol frame: timestamped, routed to the PTP channel.
    Ptp,
    Normal,
}

/// A frame waiting to be written into a receive ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxFrame {
    pub data: Vec<u8>,
    /// The last four bytes of `data` are the frame's FCS.
    pub has_fcs: bool,
    /// Classification supplied by the producer. `None` lets the device classify the frame.
    pub class: Option<FrameClass>,
}

impl RxFrame {
    /// A frame without FCS, classified by the device.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            has_fcs: false,
            class: None,
        }
    }

    pub fn with_fcs(mut self) -> Self {
        self.has_fcs = true;
        self
    }

    pub fn classified(mut self, class: FrameClass) -> Self {
        self.class = Some(class);
        self
    }
}

impl From<Vec<u8>> for RxFrame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

pub fn ethertype(frame: &[u8]) -> Option<u16> {
    let bytes = frame.get(ETHERTYPE_OFFSET..ETHERTYPE_OFFSET + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Classifies by EtherType. `extra_ptp_types` holds the programmable timestamp EtherTypes; zero
/// entries are ignored.
pub fn classify(frame: &[u8], ptp_ethertype: u16, extra_ptp_types: [u16; 2]) -> FrameClass {
    match ethertype(frame) {
        Some(ty) if ty == ptp_ethertype => FrameClass::Ptp,
        Some(ty) if ty != 0 && extra_ptp_types.contains(&ty) => FrameClass::Ptp,
        _ => FrameClass::Normal,
    }
}

/// PTP `messageType` nibble. Bytes past the end of the frame read as zero.
pub fn ptp_message_type(frame: &[u8]) -> u8 {
    frame.get(PTP_MESSAGE_TYPE_OFFSET).copied().unwrap_or(0) & 0x0F
}

/// PTP `sequenceId`. Bytes past the end of the frame read as zero.
pub fn ptp_sequence_id(frame: &[u8]) -> u16 {
    let byte = |i: usize| frame.get(PTP_SEQUENCE_ID_OFFSET + i).copied().unwrap_or(0);
    u16::from_be_bytes([byte(0), byte(1)])
}

/// IEEE 802.3 CRC-32 over `frame`.
pub fn fcs(frame: &[u8]) -> u32 {
    crc32fast::hash(frame)
}

/// Appends the FCS in wire order.
pub fn append_fcs(frame: &mut Vec<u8>) {
    let crc = fcs(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_ethertype(ty: u16, len: usize) -> Vec<u8> {
        let mut frame = vec![0u8; len];
        frame[12..14].copy_from_slice(&ty.to_be_bytes());
        frame
    }

    #[test]
    fn ptp_ethertype_is_classified() {
        assert_eq!(
            classify(&frame_with_ethertype(0x88F7, 60), ETHERTYPE_PTP, [0, 0]),
            FrameClass::Ptp
        );
        assert_eq!(
            classify(&frame_with_ethertype(0x0800, 60), ETHERTYPE_PTP, [0, 0]),
            FrameClass::Normal
        );
        assert_eq!(classify(&[0u8; 10], ETHERTYPE_PTP, [0, 0]), FrameClass::Normal);
    }

    #[test]
    fn programmable_ethertypes_are_classified() {
        let frame = frame_with_ethertype(0x88B5, 60);
        assert_eq!(classify(&frame, ETHERTYPE_PTP, [0x88B5, 0]), FrameClass::Ptp);
        assert_eq!(classify(&frame, ETHERTYPE_PTP, [0, 0x88B5]), FrameClass::Ptp);
    }

    #[test]
    fn zero_ethertype_never_matches_an_unprogrammed_slot() {
        let frame = frame_with_ethertype(0, 60);
        assert_eq!(classify(&frame, ETHERTYPE_PTP, [0, 0]), FrameClass::Normal);
    }

    #[test]
    fn ptp_fields_are_extracted() {
        let mut frame = frame_with_ethertype(ETHERTYPE_PTP, 60);
        frame[14] = 0x12;
        frame[44] = 0xAB;
        frame[45] = 0xCD;
        assert_eq!(ptp_message_type(&frame), 0x2);
        assert_eq!(ptp_sequence_id(&frame), 0xABCD);
    }

    #[test]
    fn short_frames_read_missing_ptp_bytes_as_zero() {
        let mut frame = vec![0u8; 45];
        frame[44] = 0x01;
        assert_eq!(ptp_sequence_id(&frame), 0x0100);
        assert_eq!(ptp_message_type(&[0u8; 4]), 0);
    }

    #[test]
    fn appended_fcs_matches_known_vector() {
        // CRC-32/IEEE check value for "123456789".
        let mut data = b"123456789".to_vec();
        append_fcs(&mut data);
        assert_eq!(&data[9..], &0xCBF4_3926u32.to_le_bytes());
    }
}
