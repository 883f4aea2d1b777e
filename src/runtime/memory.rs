use std::collections::HashMap;

use crate::bytecode::{Op, Program};

/// Where one string literal lives inside the static segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub offset: usize,
    pub len: usize,
}

impl Slot {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Static segment layout of one program.
///
/// Every distinct literal content gets the next free offset, in instruction
/// order. The interpreter and the code generator both read offsets from here,
/// so a literal has the same address relative to the memory base in either
/// engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticLayout {
    slots: HashMap<Vec<u8>, Slot>,
    /// Literal contents in offset order.
    order: Vec<Vec<u8>>,
    size: usize,
}

impl StaticLayout {
    pub fn from_program(program: &Program) -> Self {
        let mut layout = StaticLayout::default();
        for instr in &program.instrs {
            if let Op::PushStr(text) = &instr.op {
                layout.intern(text.as_bytes());
            }
        }
        layout
    }

    fn intern(&mut self, bytes: &[u8]) -> Slot {
        if let Some(slot) = self.slots.get(bytes) {
            return *slot;
        }
        let slot = Slot {
            offset: self.size,
            len: bytes.len(),
        };
        self.size += bytes.len();
        self.slots.insert(bytes.to_vec(), slot);
        self.order.push(bytes.to_vec());
        slot
    }

    pub fn slot(&self, bytes: &[u8]) -> Option<Slot> {
        self.slots.get(bytes).copied()
    }

    /// Total bytes occupied by all literals.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Literals with their slots, in offset order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], Slot)> + '_ {
        self.order
            .iter()
            .map(|bytes| (bytes.as_slice(), self.slots[bytes.as_slice()]))
    }

    /// The static segment contents, `size()` bytes long.
    pub fn image(&self) -> Vec<u8> {
        self.order.concat()
    }
}

/// The interpreter's flat byte memory: static segment first, then the
/// zero-initialized dynamic segment.
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn load(&self, addr: u64) -> Option<u8> {
        self.bytes.get(usize::try_from(addr).ok()?).copied()
    }

    pub fn store(&mut self, addr: u64, value: u8) -> Option<()> {
        let cell = self.bytes.get_mut(usize::try_from(addr).ok()?)?;
        *cell = value;
        Some(())
    }

    /// `len` bytes starting at `addr`, or `None` if any of them is out of range.
    pub fn slice(&self, addr: u64, len: u64) -> Option<&[u8]> {
        let start = usize::try_from(addr).ok()?;
        let end = start.checked_add(usize::try_from(len).ok()?)?;
        self.bytes.get(start..end)
    }

    pub fn write(&mut self, offset: usize, data: &[u8]) -> Option<()> {
        let end = offset.checked_add(data.len())?;
        self.bytes.get_mut(offset..end)?.copy_from_slice(data);
        Some(())
    }
}
