use std::collections::HashMap;
use std::collections::hash_map::{Values, ValuesMut};

use verdure_common::Cell2D;

/// Anything that lives at a fixed cell of a [`Grid2D`].
pub trait GridCell {
    fn cell(&self) -> Cell2D;
}

/// Sparse 2D container addressed by cell coordinates.
///
/// Elements are keyed by their own [`GridCell::cell`]. Storage grows as
/// needed, negative coordinates are fine, and lookups never scan. Iteration
/// order is unspecified but visits every element exactly once.
#[derive(Debug)]
pub struct Grid2D<T> {
    cells: HashMap<Cell2D, T>,
}

impl<T> Default for Grid2D<T> {
    fn default() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }
}

impl<T: GridCell> Grid2D<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a grid pre-sized for a `width x height` window.
    pub fn with_capacity(width: usize, height: usize) -> Self {
        Self {
            cells: HashMap::with_capacity(width * height),
        }
    }

    /// Insert `elem` at its own cell. Returns the previous occupant, if any.
    pub fn add(&mut self, elem: T) -> Option<T> {
        self.cells.insert(elem.cell(), elem)
    }

    pub fn get_cell(&self, cell: Cell2D) -> Option<&T> {
        self.cells.get(&cell)
    }

    pub fn contains(&self, cell: Cell2D) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Take the element at `cell` out and put `elem` in at its own cell.
    ///
    /// Returns whatever occupied `cell`. `elem` may address a different cell
    /// than the one it displaces; that is how the grid window scrolls. If
    /// `elem`'s own cell was occupied too, that occupant is replaced and
    /// dropped.
    pub fn set_cell(&mut self, cell: Cell2D, elem: T) -> Option<T> {
        let previous = self.cells.remove(&cell);
        self.cells.insert(elem.cell(), elem);
        previous
    }

    pub fn remove(&mut self, cell: Cell2D) -> Option<T> {
        self.cells.remove(&cell)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Remove and return every element.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.cells.drain().map(|(_, elem)| elem)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> Values<'_, Cell2D, T> {
        self.cells.values()
    }

    pub fn iter_mut(&mut self) -> ValuesMut<'_, Cell2D, T> {
        self.cells.values_mut()
    }

    /// Cells currently occupied, in unspecified order.
    pub fn cells(&self) -> impl Iterator<Item = Cell2D> + '_ {
        self.cells.keys().copied()
    }
}

impl<'a, T: GridCell> IntoIterator for &'a Grid2D<T> {
    type Item = &'a T;
    type IntoIter = Values<'a, Cell2D, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, PartialEq)]
    struct Marker {
        cell: Cell2D,
        tag: &'static str,
    }

    impl Marker {
        fn at(x: i32, z: i32, tag: &'static str) -> Self {
            Self {
                cell: Cell2D::new(x, z),
                tag,
            }
        }
    }

    impl GridCell for Marker {
        fn cell(&self) -> Cell2D {
            self.cell
        }
    }

    #[test]
    fn add_and_lookup_with_negative_coordinates() {
        let mut grid = Grid2D::new();
        assert!(grid.add(Marker::at(-3, 7, "a")).is_none());
        assert!(grid.add(Marker::at(0, 0, "b")).is_none());

        assert_eq!(grid.len(), 2);
        assert_eq!(grid.get_cell(Cell2D::new(-3, 7)).map(|m| m.tag), Some("a"));
        assert!(grid.get_cell(Cell2D::new(7, -3)).is_none());
    }

    #[test]
    fn add_overwrites_same_cell() {
        let mut grid = Grid2D::new();
        grid.add(Marker::at(1, 1, "old"));
        let previous = grid.add(Marker::at(1, 1, "new"));
        assert_eq!(previous.map(|m| m.tag), Some("old"));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut grid = Grid2D::with_capacity(2, 2);
        for x in -10..10 {
            for z in -10..10 {
                grid.add(Marker::at(x, z, "m"));
            }
        }
        assert_eq!(grid.len(), 400);
        assert!(grid.contains(Cell2D::new(-10, 9)));
    }

    #[test]
    fn set_cell_swaps_across_cells() {
        let mut grid = Grid2D::new();
        grid.add(Marker::at(0, 0, "left"));
        let displaced = grid.set_cell(Cell2D::new(0, 0), Marker::at(3, 0, "right"));

        assert_eq!(displaced.map(|m| m.tag), Some("left"));
        assert!(!grid.contains(Cell2D::new(0, 0)));
        assert!(grid.contains(Cell2D::new(3, 0)));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn set_cell_on_empty_slot_returns_none() {
        let mut grid = Grid2D::new();
        assert!(grid.set_cell(Cell2D::new(5, 5), Marker::at(5, 6, "x")).is_none());
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn remove_clear_and_drain() {
        let mut grid = Grid2D::new();
        grid.add(Marker::at(0, 0, "a"));
        grid.add(Marker::at(0, 1, "b"));
        grid.add(Marker::at(0, 2, "c"));

        assert_eq!(grid.remove(Cell2D::new(0, 1)).map(|m| m.tag), Some("b"));
        assert!(grid.remove(Cell2D::new(0, 1)).is_none());

        let drained: Vec<_> = grid.drain().collect();
        assert_eq!(drained.len(), 2);
        assert!(grid.is_empty());

        grid.add(Marker::at(9, 9, "d"));
        grid.clear();
        assert!(grid.is_empty());
    }

    #[test]
    fn iteration_visits_every_element_once() {
        let mut grid = Grid2D::new();
        for x in -2..=2 {
            for z in -2..=2 {
                grid.add(Marker::at(x, z, "m"));
            }
        }
        let seen: HashSet<Cell2D> = grid.iter().map(|m| m.cell).collect();
        assert_eq!(seen.len(), 25);
        assert_eq!(grid.iter().count(), 25);
        assert_eq!((&grid).into_iter().count(), 25);

        for m in grid.iter_mut() {
            m.tag = "touched";
        }
        assert!(grid.iter().all(|m| m.tag == "touched"));
        assert_eq!(grid.cells().count(), 25);
    }
}
