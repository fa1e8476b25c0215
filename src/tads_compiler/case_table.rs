// Switch case collection
//
// Case values accumulate in fixed-size pages while a switch body is being
// compiled; the dispatch table is written in one pass when the switch
// closes.

use crate::tads_compiler::lexer::Token;
use crate::tads_compiler::opcodes::limits;

#[derive(Debug, Clone)]
pub struct CaseEntry {
    /// Constant value the case matches
    pub value: Token,
    /// Code offset of the case label
    pub offset: usize,
}

#[derive(Debug, Default)]
pub struct CaseTable {
    pages: Vec<Vec<CaseEntry>>,
    count: usize,
    /// Code offset of the `default:` label
    pub default: Option<usize>,
}

impl CaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: Token, offset: usize) {
        let needs_page = self
            .pages
            .last()
            .map_or(true, |page| page.len() >= limits::CASE_PAGE_SIZE);
        if needs_page {
            self.pages.push(Vec::with_capacity(limits::CASE_PAGE_SIZE));
        }
        if let Some(page) = self.pages.last_mut() {
            page.push(CaseEntry { value, offset });
        }
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Entries in the order the cases appeared
    pub fn entries(&self) -> impl Iterator<Item = &CaseEntry> {
        self.pages.iter().flatten()
    }
}
