use crate::error::GenError;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Клетка сетки. Внутри одной карты координаты неотрицательны, в потоковом мире
/// (чанки) клетки могут уходить в минус.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    #[must_use]
    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Октильное расстояние: диагональный шаг стоит √2
    #[must_use]
    pub fn octile(self, other: Cell) -> f32 {
        let dx = self.x.abs_diff(other.x) as f32;
        let dy = self.y.abs_diff(other.y) as f32;
        (dx + dy) + (std::f32::consts::SQRT_2 - 2.0) * dx.min(dy)
    }

    #[must_use]
    pub fn euclid_sq(self, other: Cell) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }

    /// Мировая точка привязки: центр клетки
    #[must_use]
    pub fn center(self) -> (f32, f32) {
        (self.x as f32 + 0.5, self.y as f32 + 0.5)
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Связность поиска и обходов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    Four,
    Eight,
}

pub(crate) const DIRECTIONS_4: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

pub(crate) const DIRECTIONS_8: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

impl Connectivity {
    #[must_use]
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Connectivity::Four => &DIRECTIONS_4,
            Connectivity::Eight => &DIRECTIONS_8,
        }
    }
}

/// Плоская сетка `width × height`, индекс `y * width + x`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    pub width: u32,
    pub height: u32,
    pub data: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn new(width: u32, height: u32, fill: T) -> Self {
        Self {
            width,
            height,
            data: vec![fill; (width as usize) * (height as usize)],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Grid<T> {
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Проверка границ для публичных операций: клетки вне карты не обрезаются
    pub fn check(&self, cell: Cell) -> Result<(), GenError> {
        if self.contains(cell) {
            Ok(())
        } else {
            Err(GenError::OutOfBounds {
                x: cell.x,
                y: cell.y,
                width: self.width,
                height: self.height,
            })
        }
    }

    #[must_use]
    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        self.contains(cell)
            .then(|| cell.y as usize * self.width as usize + cell.x as usize)
    }

    #[must_use]
    pub fn cell_at(&self, index: usize) -> Cell {
        let w = self.width as usize;
        Cell::new((index % w) as i32, (index / w) as i32)
    }

    #[must_use]
    pub fn get(&self, cell: Cell) -> Option<&T> {
        self.index_of(cell).map(|i| &self.data[i])
    }

    pub fn get_mut(&mut self, cell: Cell) -> Option<&mut T> {
        self.index_of(cell).map(move |i| &mut self.data[i])
    }

    /// Записывает значение, если клетка внутри; возвращает `false` для клеток снаружи
    pub fn set(&mut self, cell: Cell, value: T) -> bool {
        match self.get_mut(cell) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + use<T> {
        let (w, h) = (self.width as i32, self.height as i32);
        (0..h).flat_map(move |y| (0..w).map(move |x| Cell::new(x, y)))
    }

    pub fn neighbors(
        &self,
        cell: Cell,
        connectivity: Connectivity,
    ) -> impl Iterator<Item = Cell> + '_ {
        connectivity
            .offsets()
            .iter()
            .map(move |&(dx, dy)| cell.offset(dx, dy))
            .filter(|n| self.contains(*n))
    }
}

impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    fn index(&self, cell: Cell) -> &T {
        let i = self
            .index_of(cell)
            .unwrap_or_else(|| panic!("cell {cell:?} outside {}x{} grid", self.width, self.height));
        &self.data[i]
    }
}

impl<T> IndexMut<Cell> for Grid<T> {
    fn index_mut(&mut self, cell: Cell) -> &mut T {
        let (w, h) = (self.width, self.height);
        let i = self
            .index_of(cell)
            .unwrap_or_else(|| panic!("cell {cell:?} outside {w}x{h} grid"));
        &mut self.data[i]
    }
}
