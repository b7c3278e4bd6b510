use std::ops;

/// A half-open byte range `[start, start + length)` within one version of a document.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub length: usize,
}

impl Span {
    pub const fn new(start: usize, length: usize) -> Span {
        Span { start, length }
    }

    /// Creates a span covering `[start, end)`. Returns None if `end` comes before `start`.
    pub fn between(start: usize, end: usize) -> Option<Span> {
        Some(Span {
            start,
            length: end.checked_sub(start)?,
        })
    }

    pub const fn empty_at(position: usize) -> Span {
        Span { start: position, length: 0 }
    }

    pub const fn end(&self) -> usize {
        self.start + self.length
    }

    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn range(&self) -> ops::Range<usize> {
        self.start..self.end()
    }

    /// Whether the two spans share a position, or the end of one
    /// coincides with the start of the other. Touching spans count as
    /// intersecting.
    pub fn intersects(&self, other: &Span) -> bool {
        other.start <= self.end() && other.end() >= self.start
    }

    /// Whether the two spans share at least one position.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start.max(other.start) < self.end().min(other.end())
    }

    pub fn contains(&self, other: &Span) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    pub fn includes(&self, position: usize) -> bool {
        position >= self.start && position < self.end()
    }

    pub fn shifted(&self, delta: isize) -> Option<Span> {
        Some(Span {
            start: self.start.checked_add_signed(delta)?,
            length: self.length,
        })
    }
}

impl From<ops::Range<usize>> for Span {
    fn from(range: ops::Range<usize>) -> Span {
        Span {
            start: range.start,
            length: range.end.saturating_sub(range.start),
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between() {
        assert_eq!(Span::between(3, 7), Some(Span::new(3, 4)));
        assert_eq!(Span::between(3, 3), Some(Span::empty_at(3)));
        assert_eq!(Span::between(7, 3), None);
    }

    #[test]
    fn intersects_counts_touching() {
        let span = Span::new(4, 2);

        assert!(span.intersects(&Span::new(6, 1)));
        assert!(span.intersects(&Span::new(0, 4)));
        assert!(span.intersects(&Span::empty_at(4)));
        assert!(span.intersects(&Span::empty_at(6)));
        assert!(span.intersects(&Span::new(5, 0)));
        assert!(!span.intersects(&Span::new(7, 1)));
        assert!(!span.intersects(&Span::new(0, 3)));
    }

    #[test]
    fn overlaps_excludes_touching() {
        let span = Span::new(4, 2);

        assert!(span.overlaps(&Span::new(5, 3)));
        assert!(span.overlaps(&Span::new(0, 5)));
        assert!(!span.overlaps(&Span::new(6, 1)));
        assert!(!span.overlaps(&Span::new(0, 4)));
        assert!(!span.overlaps(&Span::empty_at(5)));
    }

    #[test]
    fn shifted() {
        assert_eq!(Span::new(4, 2).shifted(3), Some(Span::new(7, 2)));
        assert_eq!(Span::new(4, 2).shifted(-4), Some(Span::new(0, 2)));
        assert_eq!(Span::new(4, 2).shifted(-5), None);
    }
}
