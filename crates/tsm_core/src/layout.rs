use crate::core_api::{CoreError, CoreErrorCode};

/// Half-open byte span into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionId {
    Prelude,
    Entry(usize),
    Trailer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionLayout {
    pub id: SectionId,
    pub range: ByteRange,
}

/// How a profile file splits into the text before the profile body, one span
/// per profile entry, and the text after the last entry.
#[derive(Debug, Clone)]
pub struct FileLayout {
    pub file_len: usize,
    pub sections: Vec<SectionLayout>,
}

impl FileLayout {
    /// Check that the spans tile the whole file in order.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.sections.is_empty() {
            return Err(malformed("profile layout has no spans"));
        }

        let mut cursor = 0usize;
        for section in &self.sections {
            let ByteRange { start, end } = section.range;
            if start != cursor {
                return Err(malformed(format!(
                    "{:?} starts at byte {start}, previous span ended at {cursor}",
                    section.id
                )));
            }
            if end < start {
                return Err(malformed(format!(
                    "{:?} ends before it starts ({start}..{end})",
                    section.id
                )));
            }
            cursor = end;
        }

        if cursor != self.file_len {
            return Err(malformed(format!(
                "spans end at byte {cursor} but the file has {} bytes",
                self.file_len
            )));
        }
        Ok(())
    }
}

fn malformed(message: impl Into<String>) -> CoreError {
    CoreError::new(CoreErrorCode::MalformedProfile, message)
}
