//! Grouping the mirror into board columns.

use taskboard_proto::document::DocId;
use taskboard_proto::task::{TaskRecord, TaskStatus};

use crate::sync::Mirror;

/// A task placed on the board with its display number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// 1-based number shown on the board and used by commands.
    pub number: usize,
    /// The mirrored task.
    pub record: TaskRecord,
}

/// One status column, in mirror order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// The column's status.
    pub status: TaskStatus,
    /// Cards in this column.
    pub cards: Vec<Card>,
}

/// The mirror split into the three status columns.
///
/// Every column is present, even when empty. Cards are numbered from 1
/// left to right, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    columns: [Column; 3],
}

impl Board {
    /// Columns in `To Do`, `In Progress`, `Done` order.
    #[must_use]
    pub const fn columns(&self) -> &[Column; 3] {
        &self.columns
    }

    /// The column for `status`.
    #[must_use]
    pub const fn column(&self, status: TaskStatus) -> &Column {
        &self.columns[status.index()]
    }

    /// Finds a card by its display number.
    #[must_use]
    pub fn card(&self, number: usize) -> Option<&Card> {
        self.cards().find(|c| c.number == number)
    }

    /// The column holding `id`, if any.
    #[must_use]
    pub fn status_of(&self, id: &DocId) -> Option<TaskStatus> {
        self.cards()
            .find(|c| &c.record.id == id)
            .map(|c| c.record.status)
    }

    /// Total number of cards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }

    /// Whether the board has no cards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cards(&self) -> impl Iterator<Item = &Card> {
        self.columns.iter().flat_map(|c| c.cards.iter())
    }
}

/// Pure mapping from a [`Mirror`] to a [`Board`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BoardPartitioner;

impl BoardPartitioner {
    /// Groups mirror records by status, keeping mirror order within each
    /// column.
    #[must_use]
    pub fn partition(mirror: &Mirror) -> Board {
        let mut columns = TaskStatus::ALL.map(|status| Column {
            status,
            cards: Vec::new(),
        });
        for record in mirror.records() {
            columns[record.status.index()].cards.push(Card {
                number: 0,
                record: record.clone(),
            });
        }
        let mut number = 0;
        for card in columns.iter_mut().flat_map(|c| c.cards.iter_mut()) {
            number += 1;
            card.number = number;
        }
        Board { columns }
    }
}
