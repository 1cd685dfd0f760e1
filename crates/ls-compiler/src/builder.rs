use std::collections::HashMap;

use ls_core::hash::{build_id, crc32};
use ls_core::snapshot::{
    header, header_flags, provider_entry, section_entry, write_u16_le, write_u32_le, RuleList,
    SectionId, HEADER_SIZE, LSC_MAGIC, LSC_VERSION, PROVIDER_ENTRY_SIZE, RULE_LIST_COUNT,
    RULE_REF_ENTRY_SIZE, SECTION_ENTRY_SIZE,
};
use ls_core::types::ProviderSpec;

/// Serialize a rule set into an LSC snapshot. `version` is the rule document
/// version the cache is keyed on.
pub fn build_snapshot(version: &str, providers: &[ProviderSpec]) -> Vec<u8> {
    let mut str_pool = StringPool::new();
    let (version_off, version_len) = str_pool.intern(version);

    let (rule_refs, list_slots) = build_rule_refs_section(providers, &mut str_pool);
    let providers_section = build_providers_section(providers, &list_slots, &mut str_pool);
    let str_pool_section = str_pool.build();

    let mut sections = vec![
        SectionData::new(SectionId::StrPool, str_pool_section),
        SectionData::new(SectionId::Providers, providers_section),
        SectionData::new(SectionId::RuleRefs, rule_refs),
    ];

    let section_count = sections.len();
    let section_dir_offset = HEADER_SIZE;
    let section_dir_bytes = section_count * SECTION_ENTRY_SIZE;
    let mut data_offset = align_offset(section_dir_offset + section_dir_bytes, 4);

    for section in &mut sections {
        section.offset = data_offset;
        data_offset = align_offset(data_offset + section.data.len(), 4);
    }

    let total_size = data_offset;
    let mut buffer = vec![0u8; total_size];

    buffer[0..4].copy_from_slice(&LSC_MAGIC);
    write_u16_le(&mut buffer, header::VERSION, LSC_VERSION);
    write_u16_le(&mut buffer, header::FLAGS, header_flags::HAS_CRC32);
    write_u32_le(&mut buffer, header::HEADER_BYTES, HEADER_SIZE as u32);
    write_u32_le(&mut buffer, header::SECTION_COUNT, section_count as u32);
    write_u32_le(&mut buffer, header::SECTION_DIR_OFFSET, section_dir_offset as u32);
    write_u32_le(&mut buffer, header::SECTION_DIR_BYTES, section_dir_bytes as u32);
    write_u32_le(&mut buffer, header::BUILD_ID, build_id(version));
    write_u32_le(&mut buffer, header::RULES_VERSION_OFF, version_off);
    write_u32_le(&mut buffer, header::RULES_VERSION_LEN, version_len);

    for (index, section) in sections.iter().enumerate() {
        let entry_offset = section_dir_offset + index * SECTION_ENTRY_SIZE;
        write_u16_le(&mut buffer, entry_offset + section_entry::ID, section.id as u16);
        write_u16_le(&mut buffer, entry_offset + section_entry::FLAGS, 0);
        write_u32_le(&mut buffer, entry_offset + section_entry::OFFSET, section.offset as u32);
        write_u32_le(&mut buffer, entry_offset + section_entry::LENGTH, section.data.len() as u32);
        write_u32_le(&mut buffer, entry_offset + section_entry::COUNT, section.count());
        write_u32_le(&mut buffer, entry_offset + section_entry::CRC32, crc32(&section.data));

        let end = section.offset + section.data.len();
        buffer[section.offset..end].copy_from_slice(&section.data);
    }

    // CRC over everything except the CRC field itself
    let mut crc_data = Vec::with_capacity(buffer.len() - 4);
    crc_data.extend_from_slice(&buffer[..header::SNAPSHOT_CRC32]);
    crc_data.extend_from_slice(&buffer[header::SNAPSHOT_CRC32 + 4..]);
    let crc = crc32(&crc_data);
    write_u32_le(&mut buffer, header::SNAPSHOT_CRC32, crc);

    buffer
}

struct SectionData {
    id: SectionId,
    data: Vec<u8>,
    offset: usize,
}

impl SectionData {
    fn new(id: SectionId, data: Vec<u8>) -> Self {
        Self { id, data, offset: 0 }
    }

    /// Leading u32 of every section is its item (or byte) count.
    fn count(&self) -> u32 {
        match self.data.get(..4) {
            Some(bytes) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            None => 0,
        }
    }
}

struct StringPool {
    data: Vec<u8>,
    index: HashMap<String, u32>,
}

impl StringPool {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn intern(&mut self, s: &str) -> (u32, u32) {
        if let Some(&offset) = self.index.get(s) {
            return (offset, s.len() as u32);
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.index.insert(s.to_string(), offset);
        (offset, s.len() as u32)
    }

    fn build(self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.data.len());
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }
}

/// (first rule ref, count) for each rule list of each provider
type ListSlots = Vec<[(u32, u32); RULE_LIST_COUNT]>;

fn rule_list(provider: &ProviderSpec, list: RuleList) -> &[String] {
    match list {
        RuleList::Rules => &provider.rules,
        RuleList::RawRules => &provider.raw_rules,
        RuleList::ReferralMarketing => &provider.referral_marketing,
        RuleList::Exceptions => &provider.exceptions,
        RuleList::Redirections => &provider.redirections,
        RuleList::Methods => &provider.methods,
    }
}

fn build_rule_refs_section(providers: &[ProviderSpec], str_pool: &mut StringPool) -> (Vec<u8>, ListSlots) {
    let mut refs: Vec<(u32, u32)> = Vec::new();
    let mut slots = Vec::with_capacity(providers.len());

    for provider in providers {
        let mut provider_slots = [(0u32, 0u32); RULE_LIST_COUNT];
        for list in RuleList::ALL {
            let rules = rule_list(provider, list);
            provider_slots[list as usize] = (refs.len() as u32, rules.len() as u32);
            refs.extend(rules.iter().map(|rule| str_pool.intern(rule)));
        }
        slots.push(provider_slots);
    }

    let mut buf = Vec::with_capacity(4 + refs.len() * RULE_REF_ENTRY_SIZE);
    buf.extend_from_slice(&(refs.len() as u32).to_le_bytes());
    for (offset, len) in refs {
        buf.extend_from_slice(&offset.to_le_bytes());
        buf.extend_from_slice(&len.to_le_bytes());
    }
    (buf, slots)
}

fn build_providers_section(providers: &[ProviderSpec], slots: &ListSlots, str_pool: &mut StringPool) -> Vec<u8> {
    let mut buf = vec![0u8; 4 + providers.len() * PROVIDER_ENTRY_SIZE];
    write_u32_le(&mut buf, 0, providers.len() as u32);

    for (index, (provider, provider_slots)) in providers.iter().zip(slots).enumerate() {
        let entry = 4 + index * PROVIDER_ENTRY_SIZE;
        let (name_off, name_len) = str_pool.intern(&provider.name);
        let (pattern_off, pattern_len) = str_pool.intern(&provider.url_pattern);

        write_u32_le(&mut buf, entry + provider_entry::NAME_OFF, name_off);
        write_u32_le(&mut buf, entry + provider_entry::NAME_LEN, name_len);
        write_u32_le(&mut buf, entry + provider_entry::PATTERN_OFF, pattern_off);
        write_u32_le(&mut buf, entry + provider_entry::PATTERN_LEN, pattern_len);
        write_u16_le(&mut buf, entry + provider_entry::FLAGS, provider.flags().bits());
        write_u16_le(&mut buf, entry + provider_entry::RESERVED, 0);

        for list in RuleList::ALL {
            let (first, count) = provider_slots[list as usize];
            write_u32_le(&mut buf, entry + list.slot_offset(), first);
            write_u32_le(&mut buf, entry + list.slot_offset() + 4, count);
        }
    }

    buf
}

/// Align offset to boundary.
#[inline]
const fn align_offset(offset: usize, alignment: usize) -> usize {
    (offset + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use ls_core::snapshot::{CacheSnapshot, SnapshotError};

    use crate::optimizer::optimize_providers;
    use crate::parser::parse_rule_document;

    use super::build_snapshot;

    const DOC: &str = r#"{
        "version": "7",
        "providers": {
            "shop": {
                "urlPattern": "^https?://shop\\.example",
                "rules": ["tag", "psc", "tag"],
                "rawRules": ["/ref=[^/?]*"],
                "referralMarketing": ["tag"],
                "methods": ["GET"]
            },
            "ads": { "urlPattern": "ads\\.example", "completeProvider": true },
            "wrap": {
                "urlPattern": "wrap\\.example",
                "exceptions": ["wrap\\.example/keep"],
                "redirections": ["wrap\\.example/out\\?to=([^&]+)"]
            }
        }
    }"#;

    #[test]
    fn builds_snapshot_that_reloads() {
        let mut doc = parse_rule_document(DOC).unwrap();
        optimize_providers(&mut doc.providers);
        let bytes = build_snapshot(&doc.version, &doc.providers);

        let snapshot = CacheSnapshot::load(&bytes).expect("snapshot should load");
        assert_eq!(snapshot.rules_version(), "7");
        assert_eq!(snapshot.provider_count(), 3);
        assert_eq!(snapshot.to_specs().unwrap(), doc.providers);
    }

    #[test]
    fn interns_repeated_strings() {
        let doc = parse_rule_document(DOC).unwrap();
        let bytes = build_snapshot(&doc.version, &doc.providers);
        let snapshot = CacheSnapshot::load(&bytes).unwrap();
        // "tag" appears three times but is stored once
        let tag_count = bytes.windows(3).filter(|w| w == b"tag").count();
        assert_eq!(tag_count, 1);
        assert_eq!(snapshot.rule_ref_count(), 8);
    }

    #[test]
    fn empty_rule_set_snapshot() {
        let bytes = build_snapshot("empty", &[]);
        let snapshot = CacheSnapshot::load(&bytes).unwrap();
        assert_eq!(snapshot.provider_count(), 0);
        assert!(snapshot.to_specs().unwrap().is_empty());
    }

    #[test]
    fn detects_corruption() {
        let doc = parse_rule_document(DOC).unwrap();
        let mut bytes = build_snapshot(&doc.version, &doc.providers);
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x5A;
        assert!(matches!(
            CacheSnapshot::load(&bytes),
            Err(SnapshotError::Crc32Mismatch { .. })
        ));
    }
}
