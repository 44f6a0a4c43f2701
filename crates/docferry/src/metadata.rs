//! Metadata source
//!
//! Reads the CSV that describes the corpus: a header row naming the fields,
//! then one row per item. The header is captured once in a [`Schema`] and
//! every row is mapped through it, so nothing depends on shared header state.

use crate::error::{Result, UploadError};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Names of the two columns the pipeline needs to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataColumns {
    pub identifier: String,
    pub title: String,
}

impl MetadataColumns {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
        }
    }
}

/// Field layout of the metadata file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<String>,
    id_index: usize,
    title_index: usize,
}

impl Schema {
    /// Locate the identifier and title columns in a header row
    pub fn from_header<'a, I>(header: I, columns: &MetadataColumns) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fields: Vec<String> = header.into_iter().map(|f| f.trim().to_string()).collect();
        let position = |name: &str| {
            fields.iter().position(|f| f == name).ok_or_else(|| {
                UploadError::parse(format!(
                    "header has no '{}' column (found: {})",
                    name,
                    fields.join(", ")
                ))
            })
        };

        let id_index = position(&columns.identifier)?;
        let title_index = position(&columns.title)?;

        Ok(Self {
            fields,
            id_index,
            title_index,
        })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn identifier_column(&self) -> &str {
        &self.fields[self.id_index]
    }

    pub fn title_column(&self) -> &str {
        &self.fields[self.title_index]
    }

    /// Identifier cell of a raw row, if the row is long enough
    fn identifier_of<'r>(&self, row: &'r csv::StringRecord) -> Option<&'r str> {
        row.get(self.id_index)
    }

    /// Map one data row to an item record
    pub fn to_record(&self, row: &csv::StringRecord) -> Result<ItemRecord> {
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        if row.len() != self.fields.len() {
            return Err(UploadError::parse(format!(
                "line {} has {} fields, header has {}",
                line,
                row.len(),
                self.fields.len()
            )));
        }

        let identifier = row[self.id_index].trim();
        if identifier.is_empty() {
            return Err(UploadError::parse(format!(
                "line {} has an empty '{}'",
                line,
                self.identifier_column()
            )));
        }

        let fields = self
            .fields
            .iter()
            .zip(row.iter())
            .enumerate()
            .filter(|(i, _)| *i != self.title_index)
            .map(|(_, (name, value))| (name.clone(), value.to_string()))
            .collect();

        Ok(ItemRecord {
            identifier: identifier.to_string(),
            title: row[self.title_index].to_string(),
            fields,
        })
    }
}

/// One item to upload, as read from the metadata file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub identifier: String,
    pub title: String,
    /// Every column except the title, in file order
    pub fields: Vec<(String, String)>,
}

impl ItemRecord {
    /// Fields as a JSON object for the remote `data` attribute
    pub fn metadata(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }
}

/// Lazy reader over the metadata CSV
#[derive(Debug, Clone)]
pub struct MetadataSource {
    path: PathBuf,
    schema: Schema,
}

impl MetadataSource {
    /// Open the file and read its header
    pub fn open(path: impl AsRef<Path>, columns: &MetadataColumns) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = reader_for(&path)?;
        let header = reader.headers()?;
        let schema = Schema::from_header(header.iter(), columns)?;

        tracing::debug!(
            path = %path.display(),
            fields = schema.fields().len(),
            identifier = %schema.identifier_column(),
            "Opened metadata file"
        );

        Ok(Self { path, schema })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records whose identifier is not in `completed`, in file order
    ///
    /// Every call starts again from the first data row.
    pub fn records(&self, completed: HashSet<String>) -> Result<Records> {
        let reader = reader_for(&self.path)?;
        Ok(Records {
            rows: reader.into_records(),
            schema: self.schema.clone(),
            exclude: completed,
        })
    }

    /// Records for a specific set of identifiers, in file order
    pub fn records_for(&self, identifiers: &HashSet<String>) -> Result<Vec<ItemRecord>> {
        let mut found = Vec::new();
        let mut reader = reader_for(&self.path)?;

        for row in reader.records() {
            let row = row?;
            let wanted = self
                .schema
                .identifier_of(&row)
                .map(|id| identifiers.contains(id.trim()))
                .unwrap_or(false);
            if wanted {
                found.push(self.schema.to_record(&row)?);
            }
        }

        Ok(found)
    }
}

fn reader_for(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path)?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

/// Iterator returned by [`MetadataSource::records`]
pub struct Records {
    rows: csv::StringRecordsIntoIter<File>,
    schema: Schema,
    exclude: HashSet<String>,
}

impl Iterator for Records {
    type Item = Result<ItemRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e.into())),
            };

            let done = self
                .schema
                .identifier_of(&row)
                .map(|id| self.exclude.contains(id.trim()))
                .unwrap_or(false);
            if done {
                continue;
            }

            return Some(self.schema.to_record(&row));
        }
    }
}
