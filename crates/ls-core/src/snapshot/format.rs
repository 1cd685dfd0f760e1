//! LSC Snapshot Format v1 Constants
//!
//! All values are little-endian.

/// Magic bytes: "LSC1"
pub const LSC_MAGIC: [u8; 4] = [0x4C, 0x53, 0x43, 0x31];

/// Current format version
pub const LSC_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 64;

/// Section directory entry size
pub const SECTION_ENTRY_SIZE: usize = 24;

// =============================================================================
// Header Field Offsets
// =============================================================================

/// Header field byte offsets.
pub mod header {
    /// u8[4] magic = "LSC1"
    pub const MAGIC: usize = 0;
    /// u16 version
    pub const VERSION: usize = 4;
    /// u16 flags
    pub const FLAGS: usize = 6;
    /// u32 headerBytes (always 64)
    pub const HEADER_BYTES: usize = 8;
    /// u32 sectionCount
    pub const SECTION_COUNT: usize = 12;
    /// u32 sectionDirOffset
    pub const SECTION_DIR_OFFSET: usize = 16;
    /// u32 sectionDirBytes
    pub const SECTION_DIR_BYTES: usize = 20;
    /// u32 buildId (murmur3 of the rule document version)
    pub const BUILD_ID: usize = 24;
    /// u32 snapshotCrc32
    pub const SNAPSHOT_CRC32: usize = 28;
    /// u32 string pool offset of the rule document version
    pub const RULES_VERSION_OFF: usize = 32;
    /// u32 byte length of the rule document version
    pub const RULES_VERSION_LEN: usize = 36;
}

/// Header flags.
pub mod header_flags {
    /// Snapshot includes CRC32 checksum
    pub const HAS_CRC32: u16 = 1 << 0;
}

// =============================================================================
// Section Directory Entry Offsets
// =============================================================================

pub mod section_entry {
    /// u16 section id
    pub const ID: usize = 0;
    /// u16 flags
    pub const FLAGS: usize = 2;
    /// u32 file offset
    pub const OFFSET: usize = 4;
    /// u32 byte length
    pub const LENGTH: usize = 8;
    /// u32 item count
    pub const COUNT: usize = 12;
    /// u32 CRC32 (0 if unused)
    pub const CRC32: usize = 16;
}

// =============================================================================
// Section IDs
// =============================================================================

/// Section type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SectionId {
    /// String pool for all interned strings
    StrPool = 0x0001,
    /// Provider table
    Providers = 0x0002,
    /// Rule string references, grouped per provider list
    RuleRefs = 0x0003,
}

impl TryFrom<u16> for SectionId {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(Self::StrPool),
            0x0002 => Ok(Self::Providers),
            0x0003 => Ok(Self::RuleRefs),
            _ => Err(()),
        }
    }
}

// =============================================================================
// Provider Table Layout
// =============================================================================

/// Provider entry size
pub const PROVIDER_ENTRY_SIZE: usize = 68;

pub mod provider_entry {
    pub const NAME_OFF: usize = 0;
    pub const NAME_LEN: usize = 4;
    pub const PATTERN_OFF: usize = 8;
    pub const PATTERN_LEN: usize = 12;
    /// u16 ProviderFlags
    pub const FLAGS: usize = 16;
    pub const RESERVED: usize = 18;
    /// RULE_LIST_COUNT x (u32 first rule ref, u32 count)
    pub const LISTS: usize = 20;
}

/// Bytes per rule list slot in a provider entry
pub const RULE_LIST_SLOT_SIZE: usize = 8;

/// Rule lists stored per provider, in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RuleList {
    Rules = 0,
    RawRules = 1,
    ReferralMarketing = 2,
    Exceptions = 3,
    Redirections = 4,
    Methods = 5,
}

pub const RULE_LIST_COUNT: usize = 6;

impl RuleList {
    pub const ALL: [RuleList; RULE_LIST_COUNT] = [
        RuleList::Rules,
        RuleList::RawRules,
        RuleList::ReferralMarketing,
        RuleList::Exceptions,
        RuleList::Redirections,
        RuleList::Methods,
    ];

    /// Byte offset of this list's slot inside a provider entry.
    pub const fn slot_offset(self) -> usize {
        provider_entry::LISTS + self as usize * RULE_LIST_SLOT_SIZE
    }
}

/// Rule reference entry size (u32 string offset, u32 string length)
pub const RULE_REF_ENTRY_SIZE: usize = 8;

// =============================================================================
// Helpers
// =============================================================================

/// Validate magic bytes.
#[inline]
pub fn validate_magic(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == LSC_MAGIC
}

/// Read u16 little-endian. `None` past the end of `data`.
#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read u32 little-endian. `None` past the end of `data`.
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Write u16 little-endian at `offset`.
#[inline]
pub fn write_u16_le(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Write u32 little-endian at `offset`.
#[inline]
pub fn write_u32_le(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
