//! Vocabulary registry
//!
//! Collects the words objects declare through vocabulary properties, the
//! inheritance records the run-time parser uses to find objects by class
//! and location, and the game-wide word tables (compound words, format
//! strings, special words).

use indexmap::IndexMap;

use crate::tads_compiler::object_store::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordEntry {
    pub text: String,
    /// Vocabulary property the word was declared under (noun, verb, ...)
    pub prop: u16,
    pub object: ObjectId,
    pub flags: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InheritanceRecord {
    pub object: ObjectId,
    /// Object named by a constant `location` property
    pub location: Option<ObjectId>,
    pub superclasses: Vec<ObjectId>,
    pub flags: u8,
}

pub trait Vocabulary {
    fn add_word(&mut self, prop: u16, object: ObjectId, flags: u8, text: &str);

    /// Add or replace the inheritance record for an object
    fn add_inheritance(&mut self, record: InheritanceRecord);

    fn inheritance(&self, object: ObjectId) -> Option<&InheritanceRecord>;

    fn has_inheritance(&self, object: ObjectId) -> bool {
        self.inheritance(object).is_some()
    }

    /// Move an object's words and inheritance record to another id
    fn rename_inheritance(&mut self, old: ObjectId, new: ObjectId);

    fn delete_inheritance(&mut self, object: ObjectId);

    /// Forget every word defined for an object
    fn delete_words(&mut self, object: ObjectId);

    fn words_for(&self, object: ObjectId) -> Vec<&WordEntry>;
}

#[derive(Debug, Default)]
pub struct MemoryVocabulary {
    words: Vec<WordEntry>,
    inheritance: IndexMap<ObjectId, InheritanceRecord>,
}

impl MemoryVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

impl Vocabulary for MemoryVocabulary {
    fn add_word(&mut self, prop: u16, object: ObjectId, flags: u8, text: &str) {
        log::debug!("vocabulary: '{}' prop {} -> object {}", text, prop, object.0);
        self.words.push(WordEntry {
            text: text.to_string(),
            prop,
            object,
            flags,
        });
    }

    fn add_inheritance(&mut self, record: InheritanceRecord) {
        self.inheritance.insert(record.object, record);
    }

    fn inheritance(&self, object: ObjectId) -> Option<&InheritanceRecord> {
        self.inheritance.get(&object)
    }

    fn rename_inheritance(&mut self, old: ObjectId, new: ObjectId) {
        for word in self.words.iter_mut().filter(|w| w.object == old) {
            word.object = new;
        }
        if let Some(mut record) = self.inheritance.shift_remove(&old) {
            record.object = new;
            self.inheritance.insert(new, record);
        }
        for record in self.inheritance.values_mut() {
            if record.location == Some(old) {
                record.location = Some(new);
            }
            for superclass in record.superclasses.iter_mut() {
                if *superclass == old {
                    *superclass = new;
                }
            }
        }
    }

    fn delete_inheritance(&mut self, object: ObjectId) {
        self.inheritance.shift_remove(&object);
    }

    fn delete_words(&mut self, object: ObjectId) {
        self.words.retain(|w| w.object != object);
    }

    fn words_for(&self, object: ObjectId) -> Vec<&WordEntry> {
        self.words.iter().filter(|w| w.object == object).collect()
    }
}

/// Number of special-word slots
pub const SPECIAL_WORD_SLOTS: usize = 13;

/// Special-word slot names, in slot order
pub const SPECIAL_WORD_NAMES: [&str; SPECIAL_WORD_SLOTS] = [
    "of", "and", "then", "all", "both", "but", "one", "ones", "it", "them", "him", "her", "any",
];

/// Game-wide word tables written alongside the objects
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WordTables {
    /// (first, second, combined)
    pub compound_words: Vec<(String, String, String)>,
    /// (format string, property)
    pub format_strings: Vec<(String, u16)>,
    /// (slot, word); empty until a specialWords declaration
    pub special_words: Vec<(u8, String)>,
}

impl WordTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Words currently assigned to one special-word slot
    pub fn special_slot(&self, slot: u8) -> Vec<&str> {
        self.special_words
            .iter()
            .filter(|(s, _)| *s == slot)
            .map(|(_, w)| w.as_str())
            .collect()
    }
}
