//! Mailbox for file-system requests handed to the storage task.
//!
//! Three 32-bit slots, one per request kind. The UI writes a packed
//! [`FileRequest`] into a slot; the storage task follows the register's
//! history, performs the request, then clears the slot. A cleared slot
//! (raw `0`) means "nothing pending", so the history also carries the
//! completion of each request.
//!
//! ```text
//!  offset  0        4        8        12
//!         ┌────────┬────────┬────────┐
//!         │ update │  load  │  save  │
//!         │  list  │        │        │
//!         └────────┴────────┴────────┘
//!
//!  FileRequest (u32, little-endian)
//!   bits  0..8   data_type   (0 reserved)
//!   bits  8..24  file_index  (i16, -1 = none)
//!   bits 24..32  mem_index
//! ```

use crate::dense::DenseRegister;
use crate::error::RegisterError;
use crate::history::{HistoryLog, HistoryRecord, Width};
use crate::notify::Notifier;
use crate::register::Register;
use crate::shared::SharedRegister;

/// Which slot a request lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FileCommandKind {
    /// Rescan the file list for a data type.
    UpdateList,
    /// Load a file into a memory slot.
    Load,
    /// Save a memory slot to a file.
    Save,
}

impl FileCommandKind {
    /// Every slot, in offset order.
    pub const ALL: [FileCommandKind; 3] = [
        FileCommandKind::UpdateList,
        FileCommandKind::Load,
        FileCommandKind::Save,
    ];

    /// Byte offset of the slot.
    pub const fn offset(self) -> u16 {
        match self {
            FileCommandKind::UpdateList => 0,
            FileCommandKind::Load => 4,
            FileCommandKind::Save => 8,
        }
    }

    /// Map a history record index back to its slot.
    pub fn from_index(index: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.offset() == index)
    }
}

/// A packed file request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FileRequest {
    /// Kind of data the file holds. `0` is reserved for "idle".
    pub data_type: u8,
    /// File within the data type's directory; `-1` when not applicable.
    pub file_index: i16,
    /// Memory slot the file is read into or written from.
    pub mem_index: u8,
}

impl FileRequest {
    /// Build a request from its fields.
    pub const fn new(data_type: u8, file_index: i16, mem_index: u8) -> Self {
        Self {
            data_type,
            file_index,
            mem_index,
        }
    }

    /// Pack into the slot representation.
    pub const fn to_raw(self) -> u32 {
        self.data_type as u32
            | ((self.file_index as u16 as u32) << 8)
            | ((self.mem_index as u32) << 24)
    }

    /// Unpack a slot value. `0` is the idle marker and yields `None`.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        if raw == 0 {
            return None;
        }
        Some(Self {
            data_type: raw as u8,
            file_index: (raw >> 8) as u16 as i16,
            mem_index: (raw >> 24) as u8,
        })
    }
}

/// The file request mailbox.
#[derive(Debug)]
pub struct FileCommand {
    reg: DenseRegister,
}

impl FileCommand {
    const SIZE: u16 = 12;

    /// Declare the mailbox, keeping `history_count` change records.
    pub const fn new(history_count: u16) -> Self {
        Self {
            reg: DenseRegister::new(Self::SIZE, history_count, Width::W32),
        }
    }

    /// Allocate storage. See [`DenseRegister::init`].
    pub fn init(&mut self, prefer_large: bool) -> Result<(), RegisterError> {
        self.reg.init(prefer_large)
    }

    /// Post a request. Re-posting the pending request is forced through
    /// so the storage task sees it again.
    ///
    /// Returns `false` if the request packs to the idle marker or the
    /// register is not ready.
    pub fn request(&mut self, kind: FileCommandKind, request: FileRequest) -> bool {
        let raw = request.to_raw();
        if raw == 0 {
            #[cfg(feature = "defmt")]
            defmt::error!("file request {} packs to idle", kind);
            return false;
        }
        self.reg.set32(kind.offset(), raw, true)
    }

    /// Mark the request in `kind` as done.
    pub fn clear(&mut self, kind: FileCommandKind) -> bool {
        self.reg.set32(kind.offset(), 0, false)
    }

    /// The request waiting in `kind`, if any.
    pub fn pending(&self, kind: FileCommandKind) -> Option<FileRequest> {
        FileRequest::from_raw(self.reg.get32(kind.offset()))
    }

    /// `true` once every slot is cleared.
    pub fn is_idle(&self) -> bool {
        FileCommandKind::ALL
            .into_iter()
            .all(|kind| self.pending(kind).is_none())
    }

    /// Decode a history record into the request it posted.
    ///
    /// Records that clear a slot decode to `None`.
    pub fn decode(record: &HistoryRecord) -> Option<(FileCommandKind, FileRequest)> {
        let kind = FileCommandKind::from_index(record.index)?;
        FileRequest::from_raw(record.value).map(|request| (kind, request))
    }
}

impl Register for FileCommand {
    fn history(&self) -> &HistoryLog {
        self.reg.history()
    }

    fn notifier(&self) -> &Notifier {
        self.reg.notifier()
    }

    fn notifier_mut(&mut self) -> &mut Notifier {
        self.reg.notifier_mut()
    }

    fn crc32(&self, seed: u32) -> u32 {
        self.reg.crc32(seed)
    }
}

impl SharedRegister<FileCommand> {
    /// See [`FileCommand::init`].
    pub fn init(&self, prefer_large: bool) -> Result<(), RegisterError> {
        self.lock(|f| f.init(prefer_large))
    }

    /// See [`FileCommand::request`].
    pub fn request(&self, kind: FileCommandKind, request: FileRequest) -> bool {
        self.lock(|f| f.request(kind, request))
    }

    /// See [`FileCommand::clear`].
    pub fn clear(&self, kind: FileCommandKind) -> bool {
        self.lock(|f| f.clear(kind))
    }

    /// See [`FileCommand::pending`].
    pub fn pending(&self, kind: FileCommandKind) -> Option<FileRequest> {
        self.lock(|f| f.pending(kind))
    }

    /// See [`FileCommand::is_idle`].
    pub fn is_idle(&self) -> bool {
        self.lock(|f| f.is_idle())
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryEvent;
    use crate::notify::WakeSignal;

    const DATA_SONG: u8 = 2;
    const DATA_SETTING: u8 = 4;

    fn mailbox() -> FileCommand {
        let mut f = FileCommand::new(16);
        f.init(false).unwrap();
        f
    }

    // ── Packing ──────────────────────────────────────────────────────────

    #[test]
    fn request_packing_layout() {
        let req = FileRequest::new(DATA_SONG, 0x0123, 7);
        assert_eq!(req.to_raw(), 0x0701_2302);
        assert_eq!(FileRequest::from_raw(0x0701_2302), Some(req));
    }

    #[test]
    fn negative_file_index_survives() {
        let req = FileRequest::new(DATA_SETTING, -1, 3);
        assert_eq!(FileRequest::from_raw(req.to_raw()), Some(req));
    }

    #[test]
    fn zero_is_idle() {
        assert_eq!(FileRequest::from_raw(0), None);
    }

    #[test]
    fn kind_from_index() {
        assert_eq!(FileCommandKind::from_index(0), Some(FileCommandKind::UpdateList));
        assert_eq!(FileCommandKind::from_index(4), Some(FileCommandKind::Load));
        assert_eq!(FileCommandKind::from_index(8), Some(FileCommandKind::Save));
        assert_eq!(FileCommandKind::from_index(2), None);
        assert_eq!(FileCommandKind::from_index(12), None);
    }

    // ── Mailbox ──────────────────────────────────────────────────────────

    #[test]
    fn request_and_clear() {
        let mut f = mailbox();
        assert!(f.is_idle());

        let req = FileRequest::new(DATA_SONG, 5, 1);
        assert!(f.request(FileCommandKind::Load, req));
        assert_eq!(f.pending(FileCommandKind::Load), Some(req));
        assert_eq!(f.pending(FileCommandKind::Save), None);
        assert!(!f.is_idle());

        assert!(f.clear(FileCommandKind::Load));
        assert!(!f.clear(FileCommandKind::Load));
        assert!(f.is_idle());
    }

    #[test]
    fn idle_request_rejected() {
        let mut f = mailbox();
        let mut cursor = f.history_code();
        assert!(!f.request(FileCommandKind::Save, FileRequest::new(0, 0, 0)));
        assert!(!f.changed_since(cursor));
        assert_eq!(f.poll_history(&mut cursor), None);
    }

    #[test]
    fn repeated_request_is_logged_again() {
        let mut f = mailbox();
        let mut cursor = f.history_code();
        let req = FileRequest::new(DATA_SONG, -1, 0);
        assert!(f.request(FileCommandKind::UpdateList, req));
        assert!(f.request(FileCommandKind::UpdateList, req));
        assert_eq!(f.drain_history::<4>(&mut cursor).len(), 2);
    }

    #[test]
    fn uninitialised_mailbox_is_inert() {
        let mut f = FileCommand::new(4);
        assert!(!f.request(FileCommandKind::Load, FileRequest::new(1, 1, 1)));
        assert!(f.is_idle());
    }

    // ── Storage task flow ────────────────────────────────────────────────

    #[test]
    fn storage_task_drain_flow() {
        static WAKE: WakeSignal = WakeSignal::new();
        static FILES: SharedRegister<FileCommand> = SharedRegister::new(FileCommand::new(8));
        FILES.init(true).unwrap();
        FILES.set_notify(&WAKE).unwrap();

        let mut cursor = FILES.history_code();

        // UI side.
        let load = FileRequest::new(DATA_SONG, 12, 2);
        let save = FileRequest::new(DATA_SETTING, -1, 0);
        FILES.request(FileCommandKind::Load, load);
        FILES.request(FileCommandKind::Save, save);
        assert_eq!(WAKE.try_take(), Some(()));

        // Storage side: drain everything after one wake.
        let mut handled = heapless::Vec::<(FileCommandKind, FileRequest), 4>::new();
        while let Some(event) = FILES.poll_history(&mut cursor) {
            let HistoryEvent::Record(record) = event else {
                continue;
            };
            let Some((kind, req)) = FileCommand::decode(&record) else {
                continue;
            };
            handled.push((kind, req)).unwrap();
            FILES.clear(kind);
        }

        assert_eq!(
            handled.as_slice(),
            &[(FileCommandKind::Load, load), (FileCommandKind::Save, save)]
        );
        // The clears were committed while draining and decode to nothing.
        let rest = FILES.drain_history::<4>(&mut cursor);
        assert!(rest.is_empty());
        assert!(FILES.is_idle());
    }
}
