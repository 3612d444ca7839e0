//! Per-state zone queues
//!
//! Zones in the implicitly-open, explicitly-open, closed and full states sit
//! on one FIFO queue per state so bulk operations can walk exactly the zones
//! they affect. The queues are intrusive doubly linked lists threaded through
//! an arena of links indexed by zone index: removal is O(1) and a zone can be
//! on at most one queue at a time.

use super::zone::ZoneState;

/// Queues kept for the resource-holding and full states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    ImplicitlyOpen,
    ExplicitlyOpen,
    Closed,
    Full,
}

impl QueueKind {
    const COUNT: usize = 4;

    fn slot(self) -> usize {
        match self {
            QueueKind::ImplicitlyOpen => 0,
            QueueKind::ExplicitlyOpen => 1,
            QueueKind::Closed => 2,
            QueueKind::Full => 3,
        }
    }

    /// Queue a zone in `state` belongs on, if any.
    pub fn for_state(state: ZoneState) -> Option<Self> {
        match state {
            ZoneState::ImplicitlyOpen => Some(QueueKind::ImplicitlyOpen),
            ZoneState::ExplicitlyOpen => Some(QueueKind::ExplicitlyOpen),
            ZoneState::Closed => Some(QueueKind::Closed),
            ZoneState::Full => Some(QueueKind::Full),
            ZoneState::Empty | ZoneState::ReadOnly | ZoneState::Offline => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<u32>,
    next: Option<u32>,
    queue: Option<QueueKind>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Ends {
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

/// The four state queues over one zone arena.
#[derive(Debug, Clone)]
pub struct ZoneQueues {
    links: Vec<Link>,
    ends: [Ends; QueueKind::COUNT],
}

impl ZoneQueues {
    /// Create empty queues for `num_zones` zones.
    pub fn new(num_zones: u32) -> Self {
        Self {
            links: vec![Link::default(); num_zones as usize],
            ends: [Ends::default(); QueueKind::COUNT],
        }
    }

    /// Queue zone `index` is currently on.
    pub fn queue_of(&self, index: u32) -> Option<QueueKind> {
        self.links[index as usize].queue
    }

    /// Append zone `index` to the tail of `kind`.
    ///
    /// The zone must not be on any queue.
    pub fn push_back(&mut self, kind: QueueKind, index: u32) {
        debug_assert!(self.queue_of(index).is_none(), "zone {} already queued", index);

        let ends = &mut self.ends[kind.slot()];
        let old_tail = ends.tail;
        ends.tail = Some(index);
        if ends.head.is_none() {
            ends.head = Some(index);
        }
        ends.len += 1;

        if let Some(tail) = old_tail {
            self.links[tail as usize].next = Some(index);
        }
        self.links[index as usize] = Link {
            prev: old_tail,
            next: None,
            queue: Some(kind),
        };
    }

    /// Unlink zone `index` from whatever queue it is on.
    ///
    /// Returns the queue it was removed from.
    pub fn remove(&mut self, index: u32) -> Option<QueueKind> {
        let link = self.links[index as usize];
        let kind = link.queue?;

        match link.prev {
            Some(prev) => self.links[prev as usize].next = link.next,
            None => self.ends[kind.slot()].head = link.next,
        }
        match link.next {
            Some(next) => self.links[next as usize].prev = link.prev,
            None => self.ends[kind.slot()].tail = link.prev,
        }
        self.ends[kind.slot()].len -= 1;
        self.links[index as usize] = Link::default();

        Some(kind)
    }

    /// Oldest zone on `kind`.
    pub fn front(&self, kind: QueueKind) -> Option<u32> {
        self.ends[kind.slot()].head
    }

    /// Number of zones on `kind`.
    pub fn len(&self, kind: QueueKind) -> usize {
        self.ends[kind.slot()].len
    }

    /// Whether `kind` is empty.
    pub fn is_empty(&self, kind: QueueKind) -> bool {
        self.len(kind) == 0
    }

    /// Zone indices on `kind`, head to tail.
    pub fn iter(&self, kind: QueueKind) -> QueueIter<'_> {
        QueueIter {
            links: &self.links,
            cursor: self.front(kind),
        }
    }

    /// Copy of the zone indices on `kind`, head to tail.
    ///
    /// Bulk operations walk a snapshot because the handler they apply moves
    /// zones between queues.
    pub fn snapshot(&self, kind: QueueKind) -> Vec<u32> {
        self.iter(kind).collect()
    }
}

/// Head-to-tail iterator over one queue.
pub struct QueueIter<'a> {
    links: &'a [Link],
    cursor: Option<u32>,
}

impl Iterator for QueueIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let current = self.cursor?;
        self.cursor = self.links[current as usize].next;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_fifo_order() {
        let mut q = ZoneQueues::new(8);
        q.push_back(QueueKind::Closed, 5);
        q.push_back(QueueKind::Closed, 1);
        q.push_back(QueueKind::Closed, 3);

        assert_eq!(q.snapshot(QueueKind::Closed), vec![5, 1, 3]);
        assert_eq!(q.front(QueueKind::Closed), Some(5));
        assert_eq!(q.len(QueueKind::Closed), 3);
        assert!(q.is_empty(QueueKind::Full));
    }

    #[test]
    fn test_queue_remove_head_middle_tail() {
        let mut q = ZoneQueues::new(8);
        for i in 0..5 {
            q.push_back(QueueKind::ImplicitlyOpen, i);
        }

        assert_eq!(q.remove(2), Some(QueueKind::ImplicitlyOpen));
        assert_eq!(q.snapshot(QueueKind::ImplicitlyOpen), vec![0, 1, 3, 4]);

        q.remove(0);
        assert_eq!(q.front(QueueKind::ImplicitlyOpen), Some(1));

        q.remove(4);
        assert_eq!(q.snapshot(QueueKind::ImplicitlyOpen), vec![1, 3]);
        assert_eq!(q.len(QueueKind::ImplicitlyOpen), 2);

        // Not queued any more
        assert_eq!(q.remove(4), None);
        assert_eq!(q.queue_of(4), None);
    }

    #[test]
    fn test_queue_move_between_queues() {
        let mut q = ZoneQueues::new(4);
        q.push_back(QueueKind::ImplicitlyOpen, 0);
        q.push_back(QueueKind::ImplicitlyOpen, 1);

        q.remove(0);
        q.push_back(QueueKind::Closed, 0);

        assert_eq!(q.queue_of(0), Some(QueueKind::Closed));
        assert_eq!(q.snapshot(QueueKind::ImplicitlyOpen), vec![1]);
        assert_eq!(q.snapshot(QueueKind::Closed), vec![0]);
    }

    #[test]
    fn test_queue_drain_to_empty_and_refill() {
        let mut q = ZoneQueues::new(2);
        q.push_back(QueueKind::Full, 0);
        q.remove(0);
        assert!(q.is_empty(QueueKind::Full));
        assert_eq!(q.front(QueueKind::Full), None);

        q.push_back(QueueKind::Full, 1);
        q.push_back(QueueKind::Full, 0);
        assert_eq!(q.snapshot(QueueKind::Full), vec![1, 0]);
    }

    #[test]
    fn test_queue_for_state() {
        assert_eq!(QueueKind::for_state(ZoneState::Empty), None);
        assert_eq!(QueueKind::for_state(ZoneState::ReadOnly), None);
        assert_eq!(
            QueueKind::for_state(ZoneState::Full),
            Some(QueueKind::Full)
        );
    }
}
