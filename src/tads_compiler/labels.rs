// Label table for jump backpatching
//
// A fixed pool of slots threaded on a free list. A slot is either free, a
// label (bound to a code offset or not, with a chain of pending forward
// references), or one forward reference holding the offset of a jump
// displacement field that still needs patching.

use crate::tads_compiler::error::CompilerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u16);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Free {
        next: Option<u16>,
    },
    Label {
        target: Option<usize>,
        chain: Option<u16>,
    },
    ForwardRef {
        field: usize,
        next: Option<u16>,
    },
}

pub struct LabelTable {
    slots: Vec<Slot>,
    free: Option<u16>,
}

impl LabelTable {
    pub fn new(size: usize) -> Self {
        let size = size.min(u16::MAX as usize);
        let slots = (0..size)
            .map(|i| Slot::Free {
                next: if i + 1 < size {
                    Some((i + 1) as u16)
                } else {
                    None
                },
            })
            .collect();

        LabelTable {
            slots,
            free: if size > 0 { Some(0) } else { None },
        }
    }

    fn take_slot(&mut self, slot: Slot) -> Result<u16, CompilerError> {
        let index = self
            .free
            .ok_or(CompilerError::LabelTableFull(self.slots.len()))?;
        self.free = match self.slots[index as usize] {
            Slot::Free { next } => next,
            _ => {
                return Err(CompilerError::InternalError(format!(
                    "label slot {} on the free list is in use",
                    index
                )))
            }
        };
        self.slots[index as usize] = slot;
        Ok(index)
    }

    fn free_slot(&mut self, index: u16) {
        self.slots[index as usize] = Slot::Free { next: self.free };
        self.free = Some(index);
    }

    /// Allocates an unbound label
    pub fn new_label(&mut self) -> Result<Label, CompilerError> {
        let index = self.take_slot(Slot::Label {
            target: None,
            chain: None,
        })?;
        Ok(Label(index))
    }

    /// Allocates a label already bound to `offset`
    pub fn new_label_at(&mut self, offset: usize) -> Result<Label, CompilerError> {
        let index = self.take_slot(Slot::Label {
            target: Some(offset),
            chain: None,
        })?;
        Ok(Label(index))
    }

    fn label_slot(&self, label: Label) -> Result<(Option<usize>, Option<u16>), CompilerError> {
        match self.slots.get(label.0 as usize) {
            Some(Slot::Label { target, chain }) => Ok((*target, *chain)),
            _ => Err(CompilerError::InternalError(format!(
                "label {} is not allocated",
                label.0
            ))),
        }
    }

    /// Records a jump through `label` whose displacement field is at
    /// `field`. Returns the target when the label is already bound;
    /// otherwise links a forward reference and returns None.
    pub fn reference(&mut self, label: Label, field: usize) -> Result<Option<usize>, CompilerError> {
        let (target, chain) = self.label_slot(label)?;
        if target.is_some() {
            return Ok(target);
        }

        let reference = self.take_slot(Slot::ForwardRef { field, next: chain })?;
        self.slots[label.0 as usize] = Slot::Label {
            target: None,
            chain: Some(reference),
        };
        Ok(None)
    }

    /// Binds `label` to `offset` and returns the displacement fields that
    /// were waiting on it. Their slots go back on the free list.
    pub fn bind(&mut self, label: Label, offset: usize) -> Result<Vec<usize>, CompilerError> {
        let (_, chain) = self.label_slot(label)?;
        let fields = self.drain_chain(chain);
        self.slots[label.0 as usize] = Slot::Label {
            target: Some(offset),
            chain: None,
        };
        Ok(fields)
    }

    fn drain_chain(&mut self, mut chain: Option<u16>) -> Vec<usize> {
        let mut fields = Vec::new();
        while let Some(index) = chain {
            match self.slots[index as usize] {
                Slot::ForwardRef { field, next } => {
                    fields.push(field);
                    chain = next;
                }
                _ => chain = None,
            }
            self.free_slot(index);
        }
        fields
    }

    /// Returns a label to the pool. Pending forward references at this
    /// point mean a jump was emitted that can never be patched.
    pub fn release(&mut self, label: Label) -> Result<(), CompilerError> {
        let (_, chain) = self.label_slot(label)?;
        if chain.is_some() {
            return Err(CompilerError::UnresolvedLabel(label.0));
        }
        self.free_slot(label.0);
        Ok(())
    }

    /// Drops a label and any pending references without patching them
    pub fn clear(&mut self, label: Label) {
        if let Ok((_, chain)) = self.label_slot(label) {
            self.drain_chain(chain);
            self.free_slot(label.0);
        }
    }

    pub fn is_bound(&self, label: Label) -> bool {
        matches!(
            self.slots.get(label.0 as usize),
            Some(Slot::Label {
                target: Some(_),
                ..
            })
        )
    }

    /// Labels currently allocated, bound or not
    pub fn allocated_labels(&self) -> Vec<Label> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Label { .. }))
            .map(|(index, _)| Label(index as u16))
            .collect()
    }

    /// Slots not on the free list (labels plus forward references)
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| !matches!(slot, Slot::Free { .. }))
            .count()
    }

    /// Forgets every label; used when a whole declaration is abandoned
    pub fn abandon_all(&mut self) {
        let size = self.slots.len();
        *self = LabelTable::new(size);
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
