use std::path::Path;

/// File name of the descriptor written into every archive folder.
pub const DESCRIPTOR_FILE: &str = "info.csv";

/// Field separator used by the authoring tool.
pub const DELIMITER: char = ';';

pub const CONTRACT_FIELD: &str = "Номер договора";
pub const ADDRESS_FIELD: &str = "Адрес";
pub const PHONE_FIELD: &str = "Телефон";
pub const CLIENT_FIELD: &str = "ФИО клиента";
pub const MARGIN_FIELD: &str = "Маржа";

/// Parsed contents of a folder's descriptor file.
///
/// Fields keep the order of the header row. When the file holds more than
/// one value row, later rows overwrite earlier ones field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    fields: Vec<(String, String)>,
}

impl Descriptor {
    /// Read and parse the descriptor inside `folder`.
    ///
    /// Returns `None` when the folder is missing or empty, when it holds no
    /// descriptor, or when the descriptor is unreadable or not UTF-8.
    pub fn read_from_dir(folder: &Path) -> Option<Self> {
        let mut entries = std::fs::read_dir(folder).ok()?;
        if entries.next().is_none() {
            return None;
        }

        let path = folder.join(DESCRIPTOR_FILE);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "unreadable descriptor: {e}"
                );
                return None;
            }
        };

        let Ok(text) = String::from_utf8(bytes) else {
            tracing::warn!(path = %path.display(), "descriptor is not UTF-8");
            return None;
        };

        Some(Self::parse(&text))
    }

    /// Parse descriptor text: a header row followed by value rows.
    ///
    /// Parsing is lenient. A quoted field still open at the end of the text
    /// keeps what was read so far, and empty text gives an empty
    /// descriptor.
    ///
    /// # Examples
    ///
    /// ```
    /// use archdex::descriptor::Descriptor;
    ///
    /// let d = Descriptor::parse("Номер договора;Телефон\nA-17;0991234567\n");
    /// assert_eq!(d.contract(), Some("A-17"));
    /// assert_eq!(d.phone(), Some("0991234567"));
    /// ```
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut rows = parse_records(text).into_iter();

        let mut descriptor = Self::default();
        let Some(header) = rows.next() else {
            return descriptor;
        };

        for row in rows {
            for (key, value) in header.iter().zip(row) {
                descriptor.set(key, value);
            }
        }
        descriptor
    }

    fn set(&mut self, key: &str, value: String) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`Descriptor::get`] but treats blank values as absent.
    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn contract(&self) -> Option<&str> {
        self.non_empty(CONTRACT_FIELD)
    }

    pub fn phone(&self) -> Option<&str> {
        self.non_empty(PHONE_FIELD)
    }

    pub fn address(&self) -> Option<&str> {
        self.non_empty(ADDRESS_FIELD)
    }

    pub fn client_name(&self) -> Option<&str> {
        self.non_empty(CLIENT_FIELD)
    }

    pub fn margin(&self) -> Option<&str> {
        self.non_empty(MARGIN_FIELD)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Split delimited text into records, honoring double-quoted fields with
/// `""` escapes and quoted line breaks. Blank lines are skipped.
fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                c => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            DELIMITER => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                finish_record(&mut records, &mut record, &mut field);
            }
            c => field.push(c),
        }
    }

    finish_record(&mut records, &mut record, &mut field);
    records
}

fn finish_record(
    records: &mut Vec<Vec<String>>,
    record: &mut Vec<String>,
    field: &mut String,
) {
    if record.is_empty() && field.is_empty() {
        return;
    }
    record.push(std::mem::take(field));
    records.push(std::mem::take(record));
}
