/// Status class of a Note Off message.
pub const NOTE_OFF: u8 = 0x80;
/// Status class of a Note On message.
pub const NOTE_ON: u8 = 0x90;

const STATUS_CLASS_MASK: u8 = 0xF0;
const CHANNEL_MASK: u8 = 0x0F;

/// A short MIDI message as delivered by the driver: status plus two data bytes.
///
/// Messages shorter than three bytes carry zero in the missing data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawMidiPacket {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl RawMidiPacket {
    pub const fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
        }
    }

    /// Unpack a driver data word laid out as `status | data1 << 8 | data2 << 16`.
    /// The top byte is ignored.
    pub const fn from_packed(word: u32) -> Self {
        Self {
            status: (word & 0xFF) as u8,
            data1: ((word >> 8) & 0xFF) as u8,
            data2: ((word >> 16) & 0xFF) as u8,
        }
    }

    /// Pack into the driver data word layout.
    pub const fn packed(self) -> u32 {
        self.status as u32 | (self.data1 as u32) << 8 | (self.data2 as u32) << 16
    }

    /// Build a packet from a short message of one to three bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [status] => Some(Self::new(status, 0, 0)),
            [status, data1] => Some(Self::new(status, data1, 0)),
            [status, data1, data2] => Some(Self::new(status, data1, data2)),
            _ => None,
        }
    }

    pub const fn status_class(self) -> u8 {
        self.status & STATUS_CLASS_MASK
    }

    /// Zero-based MIDI channel (0-15).
    pub const fn channel(self) -> u8 {
        self.status & CHANNEL_MASK
    }
}

/// A note event decoded from a [`RawMidiPacket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteEvent {
    NoteOn { note: u8 },
    NoteOff { note: u8 },
}

impl NoteEvent {
    pub fn note(self) -> u8 {
        match self {
            NoteEvent::NoteOn { note } | NoteEvent::NoteOff { note } => note,
        }
    }
}

/// Decode a raw packet into a note event.
///
/// A Note On with velocity zero is a Note Off (running status convention).
/// Every other status class yields `None`; control change, pitch bend and
/// system messages are filtered here.
pub fn decode(packet: RawMidiPacket) -> Option<NoteEvent> {
    let note = packet.data1;
    match (packet.status_class(), packet.data2) {
        (NOTE_OFF, _) | (NOTE_ON, 0) => Some(NoteEvent::NoteOff { note }),
        (NOTE_ON, _) => Some(NoteEvent::NoteOn { note }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on() {
        let event = decode(RawMidiPacket::new(0x90, 60, 100));
        assert_eq!(event, Some(NoteEvent::NoteOn { note: 60 }));
    }

    #[test]
    fn test_zero_velocity_note_on_is_note_off() {
        let event = decode(RawMidiPacket::new(0x90, 60, 0));
        assert_eq!(event, Some(NoteEvent::NoteOff { note: 60 }));
    }

    #[test]
    fn test_note_off() {
        assert_eq!(
            decode(RawMidiPacket::new(0x80, 60, 0)),
            Some(NoteEvent::NoteOff { note: 60 })
        );
        // Release velocity does not matter
        assert_eq!(
            decode(RawMidiPacket::new(0x8F, 61, 64)),
            Some(NoteEvent::NoteOff { note: 61 })
        );
    }

    #[test]
    fn test_control_change_ignored() {
        assert_eq!(decode(RawMidiPacket::new(0xB0, 7, 100)), None);
        assert_eq!(decode(RawMidiPacket::new(0xE0, 0, 64)), None);
        assert_eq!(decode(RawMidiPacket::new(0xF8, 0, 0)), None);
    }

    #[test]
    fn test_any_channel_decodes() {
        for status in 0x90..=0x9F {
            let packet = RawMidiPacket::new(status, 72, 1);
            assert_eq!(packet.channel(), status & 0x0F);
            assert_eq!(decode(packet), Some(NoteEvent::NoteOn { note: 72 }));
        }
    }

    #[test]
    fn test_packed_layout() {
        let packet = RawMidiPacket::new(0x90, 60, 100);
        assert_eq!(packet.packed(), 0x0064_3C90);
        assert_eq!(RawMidiPacket::from_packed(0x0064_3C90), packet);
        // High byte is not part of the message
        assert_eq!(RawMidiPacket::from_packed(0xFF64_3C90), packet);
    }

    #[test]
    fn test_from_bytes() {
        assert_eq!(
            RawMidiPacket::from_bytes(&[0xC0, 5]),
            Some(RawMidiPacket::new(0xC0, 5, 0))
        );
        assert_eq!(
            RawMidiPacket::from_bytes(&[0xF8]),
            Some(RawMidiPacket::new(0xF8, 0, 0))
        );
        assert_eq!(RawMidiPacket::from_bytes(&[]), None);
        assert_eq!(RawMidiPacket::from_bytes(&[0xF0, 1, 2, 3, 0xF7]), None);
    }
}
