//! Selectable entry list shown by the menus
//!
//! A catalog is rebuilt wholesale on every refresh. Only the cursor and the
//! value of `Boolean`/`Choice` rows change in between.

use crate::options::OptionKey;
use cf_vfs::SourceKind;

/// Longest title, in bytes
pub const MAX_TITLE_LEN: usize = 255;

/// Most entries one catalog holds
pub const MAX_ENTRIES: usize = 64;

/// Most choices on a `Choice` row
pub const MAX_CHOICES: usize = 8;

/// Title of the synthetic back row
pub const BOOT_TO_BIOS: &str = "Boot to BIOS";

/// What activating an entry does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Return to the firmware with no program loaded
    Back,
    /// Load a program image
    SelectableFile,
    /// On/off setting
    Boolean,
    /// One-of-N setting
    Choice,
}

/// One row of a catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub title: String,
    /// File name on the source, for `SelectableFile` rows
    pub path: String,
    pub kind: EntryKind,
    pub source: SourceKind,
    pub value: usize,
    pub choices: Vec<String>,
    pub key: Option<OptionKey>,
}

impl CatalogEntry {
    /// The "Boot to BIOS" row
    pub fn back() -> Self {
        Self {
            title: BOOT_TO_BIOS.to_string(),
            path: String::new(),
            kind: EntryKind::Back,
            source: SourceKind::Bundled,
            value: 0,
            choices: Vec::new(),
            key: None,
        }
    }

    /// A program image found on `source`
    pub fn file(name: &str, source: SourceKind) -> Self {
        Self {
            title: truncate_title(name),
            path: name.to_string(),
            kind: EntryKind::SelectableFile,
            source,
            value: 0,
            choices: Vec::new(),
            key: None,
        }
    }

    /// An on/off setting
    pub fn boolean(title: &str, key: OptionKey, on: bool) -> Self {
        Self {
            title: truncate_title(title),
            path: String::new(),
            kind: EntryKind::Boolean,
            source: SourceKind::Bundled,
            value: on as usize,
            choices: Vec::new(),
            key: Some(key),
        }
    }

    /// A one-of-N setting; extra choices are dropped and `value` is clamped
    pub fn choice(title: &str, key: OptionKey, choices: &[&str], value: usize) -> Self {
        let choices: Vec<String> = choices
            .iter()
            .take(MAX_CHOICES)
            .map(|c| truncate_title(c))
            .collect();
        let value = value.min(choices.len().saturating_sub(1));

        Self {
            title: truncate_title(title),
            path: String::new(),
            kind: EntryKind::Choice,
            source: SourceKind::Bundled,
            value,
            choices,
            key: Some(key),
        }
    }

    /// Largest value this row accepts
    pub fn max_value(&self) -> usize {
        match self.kind {
            EntryKind::Boolean => 1,
            EntryKind::Choice => self.choices.len().saturating_sub(1),
            EntryKind::Back | EntryKind::SelectableFile => 0,
        }
    }

    /// Label of the current value, for `Boolean` and `Choice` rows
    pub fn value_label(&self) -> Option<&str> {
        match self.kind {
            EntryKind::Boolean => Some(if self.value != 0 { "On" } else { "Off" }),
            EntryKind::Choice => self.choices.get(self.value).map(String::as_str),
            EntryKind::Back | EntryKind::SelectableFile => None,
        }
    }
}

/// Cut a title to [`MAX_TITLE_LEN`] bytes on a char boundary
pub fn truncate_title(title: &str) -> String {
    if title.len() <= MAX_TITLE_LEN {
        return title.to_string();
    }
    let mut end = MAX_TITLE_LEN;
    while !title.is_char_boundary(end) {
        end -= 1;
    }
    title[..end].to_string()
}

/// Ordered entries, a cursor and a title pair
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    title: String,
    subtitle: String,
    entries: Vec<CatalogEntry>,
    cursor: usize,
}

impl Catalog {
    pub fn new(title: &str, subtitle: &str) -> Self {
        Self {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            entries: Vec::new(),
            cursor: 0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Entry under the cursor
    pub fn selected(&self) -> Option<&CatalogEntry> {
        self.entries.get(self.cursor)
    }

    /// Append an entry; returns false when the catalog is full
    pub fn push(&mut self, entry: CatalogEntry) -> bool {
        if self.entries.len() >= MAX_ENTRIES {
            tracing::warn!("Catalog full, skipping {}", entry.title);
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Place the cursor, clamped to the last entry
    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.entries.len().saturating_sub(1));
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        self.set_cursor(self.cursor + 1);
    }

    /// Step the selected row's value by `delta`, clamped to its range
    ///
    /// Returns the key and new value when a setting actually changed.
    pub fn adjust(&mut self, delta: isize) -> Option<(OptionKey, usize)> {
        let entry = self.entries.get_mut(self.cursor)?;
        let key = entry.key?;

        let max = entry.max_value() as isize;
        let value = (entry.value as isize + delta).clamp(0, max) as usize;
        if value == entry.value {
            return None;
        }
        entry.value = value;
        Some((key, value))
    }

    /// Advance the selected row's value, wrapping past the end
    pub fn cycle(&mut self) -> Option<(OptionKey, usize)> {
        let entry = self.entries.get_mut(self.cursor)?;
        let key = entry.key?;

        let value = if entry.value >= entry.max_value() { 0 } else { entry.value + 1 };
        if value == entry.value {
            return None;
        }
        entry.value = value;
        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        let mut catalog = Catalog::new("Press F Ultra - ROMs", "Select a ROM to load.");
        catalog.push(CatalogEntry::back());
        catalog.push(CatalogEntry::file("Foo (USA).bin", SourceKind::RemovableCard));
        catalog.push(CatalogEntry::choice(
            "Font",
            OptionKey::Font,
            &["Original", "Alternate"],
            0,
        ));
        catalog
    }

    #[test]
    fn test_cursor_is_clamped() {
        let mut catalog = sample();
        catalog.move_up();
        assert_eq!(catalog.cursor(), 0);

        for _ in 0..10 {
            catalog.move_down();
        }
        assert_eq!(catalog.cursor(), 2);

        catalog.set_cursor(99);
        assert_eq!(catalog.cursor(), 2);
    }

    #[test]
    fn test_empty_catalog_cursor() {
        let mut catalog = Catalog::new("t", "s");
        catalog.move_down();
        assert_eq!(catalog.cursor(), 0);
        assert!(catalog.selected().is_none());
        assert!(catalog.adjust(1).is_none());
    }

    #[test]
    fn test_adjust_clamps_and_reports_changes() {
        let mut catalog = sample();
        catalog.set_cursor(2);

        assert_eq!(catalog.adjust(-1), None);
        assert_eq!(catalog.adjust(1), Some((OptionKey::Font, 1)));
        assert_eq!(catalog.adjust(1), None);
        assert_eq!(catalog.selected().unwrap().value_label(), Some("Alternate"));

        assert_eq!(catalog.cycle(), Some((OptionKey::Font, 0)));

        // File rows carry no value
        catalog.set_cursor(1);
        assert_eq!(catalog.adjust(1), None);
    }

    #[test]
    fn test_bounds() {
        let long = "é".repeat(200);
        let title = truncate_title(&long);
        assert!(title.len() <= MAX_TITLE_LEN);
        assert_eq!(title.len(), 254);

        let mut catalog = Catalog::new("t", "s");
        for i in 0..MAX_ENTRIES {
            assert!(catalog.push(CatalogEntry::file(&format!("{}.bin", i), SourceKind::Bundled)));
        }
        assert!(!catalog.push(CatalogEntry::file("extra.bin", SourceKind::Bundled)));
        assert_eq!(catalog.len(), MAX_ENTRIES);

        let choices = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let row = CatalogEntry::choice("Many", OptionKey::SystemModel, &choices, 9);
        assert_eq!(row.choices.len(), MAX_CHOICES);
        assert_eq!(row.value, MAX_CHOICES - 1);
    }
}
