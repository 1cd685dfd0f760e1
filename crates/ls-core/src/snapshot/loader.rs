//! Zero-copy LSC Snapshot Loader

use std::collections::HashMap;

use crate::hash::{build_id, crc32};
use crate::types::{ProviderFlags, ProviderSpec};
use super::format::*;

/// Error type for snapshot loading.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Invalid magic bytes")]
    InvalidMagic,
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u16),
    #[error("CRC32 mismatch: stored={stored}, computed={computed}")]
    Crc32Mismatch { stored: u32, computed: u32 },
    #[error("Build id mismatch: stored={stored:#010x}, expected={expected:#010x}")]
    BuildIdMismatch { stored: u32, expected: u32 },
    #[error("Invalid section: {0}")]
    InvalidSection(String),
    #[error("Data too short")]
    DataTooShort,
    #[error("Invalid UTF-8 in string pool at offset {0}")]
    InvalidUtf8(usize),
}

/// Section metadata.
#[derive(Debug, Clone)]
pub struct SectionInfo {
    pub id: SectionId,
    pub flags: u16,
    pub offset: usize,
    pub length: usize,
    pub count: usize,
    pub crc32: u32,
}

/// Zero-copy snapshot view.
#[derive(Debug)]
pub struct CacheSnapshot<'a> {
    data: &'a [u8],
    pub version: u16,
    pub flags: u16,
    pub build_id: u32,
    rules_version: &'a str,
    sections: HashMap<SectionId, SectionInfo>,
}

/// One provider table entry, strings still in the pool.
#[derive(Debug, Clone, Copy)]
pub struct ProviderView<'s, 'a> {
    snapshot: &'s CacheSnapshot<'a>,
    offset: usize,
}

fn u16_at(data: &[u8], offset: usize) -> Result<u16, SnapshotError> {
    read_u16_le(data, offset).ok_or(SnapshotError::DataTooShort)
}

fn u32_at(data: &[u8], offset: usize) -> Result<usize, SnapshotError> {
    read_u32_le(data, offset)
        .map(|v| v as usize)
        .ok_or(SnapshotError::DataTooShort)
}

impl<'a> CacheSnapshot<'a> {
    /// Load a snapshot from bytes.
    pub fn load(data: &'a [u8]) -> Result<Self, SnapshotError> {
        if data.len() < HEADER_SIZE {
            return Err(SnapshotError::DataTooShort);
        }

        if !validate_magic(data) {
            return Err(SnapshotError::InvalidMagic);
        }

        let version = u16_at(data, header::VERSION)?;
        if version != LSC_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let flags = u16_at(data, header::FLAGS)?;
        let section_count = u32_at(data, header::SECTION_COUNT)?;
        let section_dir_offset = u32_at(data, header::SECTION_DIR_OFFSET)?;
        let build_id_stored = u32_at(data, header::BUILD_ID)? as u32;

        // Validate CRC32 if present
        if flags & header_flags::HAS_CRC32 != 0 {
            let stored_crc = u32_at(data, header::SNAPSHOT_CRC32)? as u32;

            // Compute CRC over everything except the CRC field
            let mut crc_data = Vec::with_capacity(data.len() - 4);
            crc_data.extend_from_slice(&data[..header::SNAPSHOT_CRC32]);
            crc_data.extend_from_slice(&data[header::SNAPSHOT_CRC32 + 4..]);
            let computed_crc = crc32(&crc_data);

            if stored_crc != computed_crc {
                return Err(SnapshotError::Crc32Mismatch {
                    stored: stored_crc,
                    computed: computed_crc,
                });
            }
        }

        // Parse section directory
        let mut sections = HashMap::new();
        for i in 0..section_count {
            let entry_offset = section_dir_offset + i * SECTION_ENTRY_SIZE;
            if entry_offset + SECTION_ENTRY_SIZE > data.len() {
                return Err(SnapshotError::DataTooShort);
            }

            let id_raw = u16_at(data, entry_offset + section_entry::ID)?;
            let id = match SectionId::try_from(id_raw) {
                Ok(id) => id,
                Err(_) => continue, // Skip unknown sections
            };

            let info = SectionInfo {
                id,
                flags: u16_at(data, entry_offset + section_entry::FLAGS)?,
                offset: u32_at(data, entry_offset + section_entry::OFFSET)?,
                length: u32_at(data, entry_offset + section_entry::LENGTH)?,
                count: u32_at(data, entry_offset + section_entry::COUNT)?,
                crc32: u32_at(data, entry_offset + section_entry::CRC32)? as u32,
            };
            if info.offset.checked_add(info.length).map_or(true, |end| end > data.len()) {
                return Err(SnapshotError::InvalidSection(format!("{:?} out of bounds", id)));
            }

            sections.insert(id, info);
        }

        for required in [SectionId::StrPool, SectionId::Providers, SectionId::RuleRefs] {
            if !sections.contains_key(&required) {
                return Err(SnapshotError::InvalidSection(format!("missing {:?}", required)));
            }
        }

        let mut snapshot = Self {
            data,
            version,
            flags,
            build_id: build_id_stored,
            rules_version: "",
            sections,
        };

        let rules_version = snapshot.get_string(
            u32_at(data, header::RULES_VERSION_OFF)?,
            u32_at(data, header::RULES_VERSION_LEN)?,
        )?;
        let expected = build_id(rules_version);
        if expected != build_id_stored {
            return Err(SnapshotError::BuildIdMismatch {
                stored: build_id_stored,
                expected,
            });
        }
        snapshot.rules_version = rules_version;

        Ok(snapshot)
    }

    /// Version string of the rule document this snapshot was built from.
    pub fn rules_version(&self) -> &'a str {
        self.rules_version
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn get_section(&self, id: SectionId) -> Option<&'a [u8]> {
        let info = self.sections.get(&id)?;
        self.data.get(info.offset..info.offset + info.length)
    }

    /// Get section info.
    pub fn get_section_info(&self, id: SectionId) -> Option<&SectionInfo> {
        self.sections.get(&id)
    }

    /// Get string from string pool.
    pub fn get_string(&self, offset: usize, length: usize) -> Result<&'a str, SnapshotError> {
        let section = self
            .get_section(SectionId::StrPool)
            .ok_or_else(|| SnapshotError::InvalidSection("missing StrPool".to_string()))?;

        // First 4 bytes are the pool length
        let pool_len = u32_at(section, 0)?;
        let pool_data = section.get(4..4 + pool_len).ok_or(SnapshotError::DataTooShort)?;
        let bytes = offset
            .checked_add(length)
            .and_then(|end| pool_data.get(offset..end))
            .ok_or(SnapshotError::DataTooShort)?;

        std::str::from_utf8(bytes).map_err(|_| SnapshotError::InvalidUtf8(offset))
    }

    /// Bytes used by the string pool.
    pub fn string_pool_len(&self) -> usize {
        self.get_section(SectionId::StrPool)
            .and_then(|section| read_u32_le(section, 0))
            .unwrap_or(0) as usize
    }

    pub fn provider_count(&self) -> usize {
        self.get_section(SectionId::Providers)
            .and_then(|section| read_u32_le(section, 0))
            .unwrap_or(0) as usize
    }

    pub fn rule_ref_count(&self) -> usize {
        self.get_section(SectionId::RuleRefs)
            .and_then(|section| read_u32_le(section, 0))
            .unwrap_or(0) as usize
    }

    /// Provider entry `index`, in document order.
    pub fn provider(&self, index: usize) -> Result<ProviderView<'_, 'a>, SnapshotError> {
        let section = self
            .get_section(SectionId::Providers)
            .ok_or_else(|| SnapshotError::InvalidSection("missing Providers".to_string()))?;
        let count = u32_at(section, 0)?;
        if index >= count {
            return Err(SnapshotError::InvalidSection(format!(
                "provider {} of {}",
                index, count
            )));
        }
        let offset = 4 + index * PROVIDER_ENTRY_SIZE;
        if offset + PROVIDER_ENTRY_SIZE > section.len() {
            return Err(SnapshotError::DataTooShort);
        }
        Ok(ProviderView {
            snapshot: self,
            offset,
        })
    }

    /// Rule string behind one rule reference.
    pub fn rule_ref(&self, index: usize) -> Result<&'a str, SnapshotError> {
        let section = self
            .get_section(SectionId::RuleRefs)
            .ok_or_else(|| SnapshotError::InvalidSection("missing RuleRefs".to_string()))?;
        let entry = 4 + index * RULE_REF_ENTRY_SIZE;
        self.get_string(u32_at(section, entry)?, u32_at(section, entry + 4)?)
    }

    /// Rebuild the provider specs stored in this snapshot.
    pub fn to_specs(&self) -> Result<Vec<ProviderSpec>, SnapshotError> {
        (0..self.provider_count())
            .map(|i| self.provider(i)?.to_spec())
            .collect()
    }
}

impl<'s, 'a> ProviderView<'s, 'a> {
    fn field(&self, at: usize) -> Result<usize, SnapshotError> {
        let section = self
            .snapshot
            .get_section(SectionId::Providers)
            .ok_or(SnapshotError::DataTooShort)?;
        u32_at(section, self.offset + at)
    }

    pub fn name(&self) -> Result<&'a str, SnapshotError> {
        self.snapshot
            .get_string(self.field(provider_entry::NAME_OFF)?, self.field(provider_entry::NAME_LEN)?)
    }

    pub fn url_pattern(&self) -> Result<&'a str, SnapshotError> {
        self.snapshot.get_string(
            self.field(provider_entry::PATTERN_OFF)?,
            self.field(provider_entry::PATTERN_LEN)?,
        )
    }

    pub fn flags(&self) -> Result<ProviderFlags, SnapshotError> {
        let section = self
            .snapshot
            .get_section(SectionId::Providers)
            .ok_or(SnapshotError::DataTooShort)?;
        let raw = u16_at(section, self.offset + provider_entry::FLAGS)?;
        Ok(ProviderFlags::from_bits_truncate(raw))
    }

    /// Strings of one rule list.
    pub fn rules(&self, list: RuleList) -> Result<Vec<String>, SnapshotError> {
        let first = self.field(list.slot_offset())?;
        let count = self.field(list.slot_offset() + 4)?;
        if first.checked_add(count).map_or(true, |end| end > self.snapshot.rule_ref_count()) {
            return Err(SnapshotError::InvalidSection(format!(
                "rule refs {}+{} out of range",
                first, count
            )));
        }
        (first..first + count)
            .map(|i| self.snapshot.rule_ref(i).map(str::to_string))
            .collect()
    }

    pub fn to_spec(&self) -> Result<ProviderSpec, SnapshotError> {
        Ok(ProviderSpec {
            name: self.name()?.to_string(),
            url_pattern: self.url_pattern()?.to_string(),
            complete_provider: self.flags()?.contains(ProviderFlags::COMPLETE),
            rules: self.rules(RuleList::Rules)?,
            raw_rules: self.rules(RuleList::RawRules)?,
            referral_marketing: self.rules(RuleList::ReferralMarketing)?,
            exceptions: self.rules(RuleList::Exceptions)?,
            redirections: self.rules(RuleList::Redirections)?,
            methods: self.rules(RuleList::Methods)?,
        })
    }
}
