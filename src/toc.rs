use crate::io::ByteCountWriter;
use crate::types::{BackupError, Section};
use serde::{Deserialize, Serialize};
use std::io;
use std::io::prelude::*;
use std::io::SeekFrom;

/// A single table of contents entry.
///
/// Offsets are byte positions in the stream of the section that owns the
/// entry. The range is half-open: `start_byte` is the first byte of the
/// object's statements, `end_byte` is one past the last.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub schema: String,
    pub name: String,
    #[serde(rename = "objecttype")]
    pub object_type: String,
    #[serde(rename = "startbyte")]
    pub start_byte: u64,
    #[serde(rename = "endbyte")]
    pub end_byte: u64,
}

impl TocEntry {
    pub fn len(&self) -> u64 {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte == self.end_byte
    }
}

/// Table of contents for one backup run.
///
/// Holds an append-only ledger per [`Section`]. The ledgers are independent:
/// offsets in one section say nothing about any other section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toc {
    #[serde(rename = "globalentries", default)]
    global_entries: Vec<TocEntry>,
    #[serde(rename = "predataentries", default)]
    predata_entries: Vec<TocEntry>,
    #[serde(rename = "postdataentries", default)]
    postdata_entries: Vec<TocEntry>,
    #[serde(rename = "statisticsentries", default)]
    statistics_entries: Vec<TocEntry>,
}

impl Toc {
    pub fn new() -> Toc {
        Toc::default()
    }

    fn ledger_mut(&mut self, section: Section) -> &mut Vec<TocEntry> {
        match section {
            Section::Global => &mut self.global_entries,
            Section::Predata => &mut self.predata_entries,
            Section::Postdata => &mut self.postdata_entries,
            Section::Statistics => &mut self.statistics_entries,
        }
    }

    /// All entries of a section, in the order they were recorded.
    pub fn entries(&self, section: Section) -> &[TocEntry] {
        match section {
            Section::Global => &self.global_entries,
            Section::Predata => &self.predata_entries,
            Section::Postdata => &self.postdata_entries,
            Section::Statistics => &self.statistics_entries,
        }
    }

    pub fn add_entry(
        &mut self,
        section: Section,
        schema: &str,
        name: &str,
        object_type: &str,
        start_byte: u64,
        end_byte: u64,
    ) {
        self.ledger_mut(section).push(TocEntry {
            schema: schema.to_string(),
            name: name.to_string(),
            object_type: object_type.to_string(),
            start_byte,
            end_byte,
        });
    }

    /// Run `emit` against `out` and record whatever it wrote as one entry.
    ///
    /// Nothing is recorded if `emit` did not write any bytes, so there are
    /// never empty ranges in the table of contents.
    pub fn emit<W, F>(
        &mut self,
        out: &mut ByteCountWriter<W>,
        section: Section,
        schema: &str,
        name: &str,
        object_type: &str,
        emit: F,
    ) -> Result<(), BackupError>
    where
        W: Write,
        F: FnOnce(&mut ByteCountWriter<W>) -> Result<(), BackupError>,
    {
        let start = out.byte_count();
        emit(out)?;
        let end = out.byte_count();
        if end > start {
            self.add_entry(section, schema, name, object_type, start, end);
        }
        Ok(())
    }

    /// Append all entries of `other`, section by section.
    ///
    /// Used to combine tables of contents from sections that were written
    /// by separate workers. Each section must have been written by exactly
    /// one of the two.
    pub fn merge(&mut self, other: Toc) {
        self.global_entries.extend(other.global_entries);
        self.predata_entries.extend(other.predata_entries);
        self.postdata_entries.extend(other.postdata_entries);
        self.statistics_entries.extend(other.statistics_entries);
    }

    pub fn find_entry(&self, section: Section, object_type: &str, name: &str) -> Option<&TocEntry> {
        self.entries(section)
            .iter()
            .find(|e| e.object_type == object_type && e.name == name)
    }

    /// Select the entries a restore should replay.
    ///
    /// An empty `object_types` or `names` list does not filter on that field.
    pub fn filter_entries<'a>(
        &'a self,
        section: Section,
        object_types: &'a [&'a str],
        names: &'a [&'a str],
    ) -> impl Iterator<Item = &'a TocEntry> + 'a {
        self.entries(section).iter().filter(move |e| {
            (object_types.is_empty() || object_types.contains(&e.object_type.as_str()))
                && (names.is_empty() || names.contains(&e.name.as_str()))
        })
    }

    /// Check that every ledger is well formed: no inverted or empty ranges,
    /// and offsets never move backwards within a section.
    pub fn validate(&self) -> Result<(), BackupError> {
        for section in Section::ALL {
            let mut previous_end = 0;
            for entry in self.entries(section) {
                if entry.start_byte >= entry.end_byte {
                    return Err(BackupError::TocFormat(format!(
                        "{} entry {} {} has an empty or inverted range {}..{}",
                        section, entry.object_type, entry.name, entry.start_byte, entry.end_byte
                    )));
                }
                if entry.start_byte < previous_end {
                    return Err(BackupError::TocFormat(format!(
                        "{} entry {} {} starts at {} before the previous entry ends at {}",
                        section, entry.object_type, entry.name, entry.start_byte, previous_end
                    )));
                }
                previous_end = entry.end_byte;
            }
        }
        Ok(())
    }

    pub fn write_to(&self, f: &mut (impl Write + ?Sized)) -> Result<(), BackupError> {
        serde_json::to_writer_pretty(&mut *f, self)?;
        f.write_all(b"\n")?;
        Ok(())
    }

    pub fn read_from(f: &mut (impl Read + ?Sized)) -> Result<Toc, BackupError> {
        let toc: Toc = serde_json::from_reader(f)?;
        toc.validate()?;
        Ok(toc)
    }

    /// Read the statements for `entry` from its section stream.
    pub fn read_entry(
        f: &mut (impl Read + Seek + ?Sized),
        entry: &TocEntry,
    ) -> Result<String, BackupError> {
        f.seek(SeekFrom::Start(entry.start_byte))?;
        let mut buffer = vec![0; entry.len() as usize];
        f.read_exact(buffer.as_mut_slice())?;
        String::from_utf8(buffer).map_err(|e| {
            BackupError::IOError(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
        })
    }
}
