use std::iter::Rev;
use std::ops::Deref;
use std::vec::Drain;

use crate::gourd_assert_simple;

/// A chronological record of reversible changes, segmented into frames.
///
/// Each frame corresponds to one depth level of the branch-and-bound path (or one probing node
/// while probing is active). Backtracking drains the entries of the abandoned frames in reverse
/// order so the caller can undo them.
#[derive(Clone, Debug)]
pub(crate) struct Trail<T> {
    current_frame: usize,
    /// At index i is the position where the i-th frame ends (exclusive) on the trail
    frame_delimiter: Vec<usize>,
    trail: Vec<T>,
}

// We explicitly implement Default instead of deriving it to avoid imposing Default on the
// generic type T.
impl<T> Default for Trail<T> {
    fn default() -> Self {
        Trail {
            current_frame: Default::default(),
            frame_delimiter: Default::default(),
            trail: Default::default(),
        }
    }
}

impl<T> Trail<T> {
    pub(crate) fn push_frame(&mut self) {
        self.current_frame += 1;
        self.frame_delimiter.push(self.trail.len());
    }

    pub(crate) fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// The entries recorded within the given frame.
    pub(crate) fn entries_at_frame(&self, frame: usize) -> &[T] {
        assert!(frame <= self.current_frame);

        let start = if frame == 0 {
            0
        } else {
            self.frame_delimiter[frame - 1]
        };

        let end = if frame == self.current_frame {
            self.trail.len()
        } else {
            self.frame_delimiter[frame]
        };

        &self.trail[start..end]
    }

    /// Abandons all frames above `frame` and yields their entries newest-first, so the caller
    /// can undo them in reverse chronological order.
    pub(crate) fn backtrack_to(&mut self, frame: usize) -> Rev<Drain<'_, T>> {
        gourd_assert_simple!(frame < self.current_frame);

        let new_trail_len = self.frame_delimiter[frame];

        self.current_frame = frame;
        self.frame_delimiter.truncate(frame);
        self.trail.drain(new_trail_len..).rev()
    }

    pub(crate) fn push(&mut self, entry: T) {
        self.trail.push(entry)
    }
}

impl<T> Deref for Trail<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.trail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushed_entries_are_observed_through_indexing() {
        let mut trail = Trail::default();

        let expected = [1, 2, 3, 4];
        for &entry in expected.iter() {
            trail.push(entry);
        }

        assert_eq!(&expected, trail.deref());
    }

    #[test]
    fn backtracking_removes_entries_beyond_frame() {
        let mut trail = Trail::default();

        trail.push_frame();
        trail.push(1);
        let _ = trail.backtrack_to(0);

        assert!(trail.is_empty());
    }

    #[test]
    fn backtracking_skips_several_frames_at_once() {
        let mut trail = Trail::default();
        trail.push(1);

        trail.push_frame();
        trail.push(2);
        trail.push_frame();
        trail.push(3);
        trail.push_frame();
        trail.push(4);

        let _ = trail.backtrack_to(1);

        assert_eq!(&[1, 2], trail.deref());
    }

    #[test]
    fn abandoned_entries_are_yielded_newest_first() {
        let mut trail = Trail::default();
        trail.push(1);

        trail.push_frame();
        trail.push(2);
        trail.push_frame();
        trail.push(3);
        trail.push(4);

        let undone = trail.backtrack_to(0).collect::<Vec<_>>();
        assert_eq!(vec![4, 3, 2], undone);
    }

    #[test]
    fn entries_are_attributed_to_their_frame() {
        let mut trail = Trail::default();
        trail.push(1);
        trail.push(2);

        trail.push_frame();
        trail.push(3);
        trail.push_frame();
        trail.push(4);
        trail.push(5);

        assert_eq!(&[1, 2], trail.entries_at_frame(0));
        assert_eq!(&[3], trail.entries_at_frame(1));
        assert_eq!(&[4, 5], trail.entries_at_frame(2));
    }
}
