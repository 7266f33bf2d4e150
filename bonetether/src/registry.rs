use crate::Attachment;

/// Handle to a registered attachment. Stale handles (deregistered, slot
/// reused) never resolve.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct AttachableId {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct RegistrySlot {
    generation: u32,
    attachment: Option<Attachment>,
}

/// Explicit registry of live attachments for batch enable/disable and
/// iteration.
#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<RegistrySlot>,
    free_list: Vec<usize>,
    len: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, attachment: Attachment) -> AttachableId {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index];
            slot.attachment = Some(attachment);
            return AttachableId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(RegistrySlot {
            generation: 0,
            attachment: Some(attachment),
        });
        AttachableId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    pub fn deregister(&mut self, id: AttachableId) -> Option<Attachment> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        let attachment = slot.attachment.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.len -= 1;
        Some(attachment)
    }

    pub fn get(&self, id: AttachableId) -> Option<&Attachment> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.attachment.as_ref()
    }

    pub fn get_mut(&mut self, id: AttachableId) -> Option<&mut Attachment> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.attachment.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AttachableId, &Attachment)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let id = AttachableId {
                index,
                generation: slot.generation,
            };
            slot.attachment.as_ref().map(|a| (id, a))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AttachableId, &mut Attachment)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let id = AttachableId {
                index,
                generation: slot.generation,
            };
            slot.attachment.as_mut().map(|a| (id, a))
        })
    }

    pub fn set_enabled_all(&mut self, enabled: bool) {
        for (_, attachment) in self.iter_mut() {
            attachment.set_enabled(enabled);
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
