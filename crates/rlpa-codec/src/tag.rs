//! Frame tags.

use std::fmt;

/// One-byte frame tag.
///
/// The first four values select a work mode; the `0xFB..=0xFF` range carries
/// control and APDU data. Bytes outside the known set decode to
/// [`Tag::Unknown`] so the session, not the codec, decides how to answer them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Text to display on the device (0x00)
    MessageBox,
    /// Enter interactive shell mode (0x01)
    Management,
    /// Download the profile named by the frame's activation code (0x02)
    DownloadProfile,
    /// Process pending profile notifications (0x03)
    ProcessNotification,
    /// Reboot the device (0xFB), reserved
    Reboot,
    /// Session is over (0xFC)
    Close,
    /// Device must stop driving the card (0xFD)
    ApduLock,
    /// Raw card APDU (0xFE)
    Apdu,
    /// Device may drive the card again (0xFF)
    ApduUnlock,
    /// Any other byte
    Unknown(u8),
}

impl Tag {
    /// Whether this tag selects a work mode.
    pub fn is_mode_select(self) -> bool {
        matches!(
            self,
            Tag::Management | Tag::DownloadProfile | Tag::ProcessNotification
        )
    }
}

impl From<u8> for Tag {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Tag::MessageBox,
            0x01 => Tag::Management,
            0x02 => Tag::DownloadProfile,
            0x03 => Tag::ProcessNotification,
            0xFB => Tag::Reboot,
            0xFC => Tag::Close,
            0xFD => Tag::ApduLock,
            0xFE => Tag::Apdu,
            0xFF => Tag::ApduUnlock,
            other => Tag::Unknown(other),
        }
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        match tag {
            Tag::MessageBox => 0x00,
            Tag::Management => 0x01,
            Tag::DownloadProfile => 0x02,
            Tag::ProcessNotification => 0x03,
            Tag::Reboot => 0xFB,
            Tag::Close => 0xFC,
            Tag::ApduLock => 0xFD,
            Tag::Apdu => 0xFE,
            Tag::ApduUnlock => 0xFF,
            Tag::Unknown(other) => other,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:02X})", self, u8::from(*self))
    }
}
