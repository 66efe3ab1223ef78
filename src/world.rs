use crate::biome::{Tile, TileClass};
use crate::error::GenError;
use crate::grid::{Cell, DIRECTIONS_4, Grid};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Значение поля расстояний для клеток, до которых дорога не дотягивается
pub const UNREACHABLE: u32 = u32::MAX;

/// Слой, доступный для внешних изменений
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    /// Трава или грязь
    Ground,
    /// Вода или скала поверх земли
    Foreground,
}

impl Layer {
    #[must_use]
    pub fn accepts(self, class: TileClass) -> bool {
        match self {
            Layer::Ground => matches!(class, TileClass::Grass | TileClass::Dirt),
            Layer::Foreground => matches!(class, TileClass::Water | TileClass::Cliff),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementKind {
    Settlement,
    Prop,
    WaterProp,
}

/// Абстрактная запись о размещении для внешнего слоя инстанцирования
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub kind: PlacementKind,
    /// Идентификатор точки привязки или объекта
    pub id: String,
    pub cell: Cell,
    /// Мировая позиция привязки (центр клетки)
    pub position: (f32, f32),
}

impl PlacementRecord {
    #[must_use]
    pub fn new(kind: PlacementKind, id: impl Into<String>, cell: Cell) -> Self {
        Self {
            kind,
            id: id.into(),
            cell,
            position: cell.center(),
        }
    }
}

/// Прямоугольный мост. `horizontal` выводится из пропорций кластера дороги.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectangleBridge {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
    pub horizontal: bool,
}

impl RectangleBridge {
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        (self.min_x..=self.max_x).contains(&cell.x) && (self.min_y..=self.max_y).contains(&cell.y)
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + use<> {
        let (x0, x1) = (self.min_x, self.max_x);
        (self.min_y..=self.max_y).flat_map(move |y| (x0..=x1).map(move |x| Cell::new(x, y)))
    }
}

/// Все сетки одной карты.
///
/// Этапы генерации получают `&mut WorldGrids` по очереди и ничего не копируют.
#[derive(Debug, Clone)]
pub struct WorldGrids {
    pub width: u32,
    pub height: u32,
    /// Трава/грязь
    pub ground: Grid<Option<Tile>>,
    /// Вариант декора поверх земли
    pub overlay: Grid<Option<u16>>,
    /// Вода/скала
    pub foreground: Grid<Option<Tile>>,
    pub roads: Grid<Option<Tile>>,
    pub bridges: Grid<Option<Tile>>,
    /// Клетки, где когда-либо лежала дорога или мост
    pub road_mask: Grid<bool>,
    pub road_distance: Grid<u32>,
    pub occupied: Grid<bool>,
    pub placements: Vec<PlacementRecord>,
    pub bridge_rects: Vec<RectangleBridge>,
}

impl WorldGrids {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ground: Grid::new(width, height, None),
            overlay: Grid::new(width, height, None),
            foreground: Grid::new(width, height, None),
            roads: Grid::new(width, height, None),
            bridges: Grid::new(width, height, None),
            road_mask: Grid::new(width, height, false),
            road_distance: Grid::new(width, height, UNREACHABLE),
            occupied: Grid::new(width, height, false),
            placements: Vec::new(),
            bridge_rects: Vec::new(),
        }
    }

    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        self.road_mask.contains(cell)
    }

    /// Клетка внутри рамки в одну клетку: `[1, w-2] × [1, h-2]`
    #[must_use]
    pub fn is_interior(&self, cell: Cell) -> bool {
        cell.x >= 1 && cell.y >= 1 && cell.x <= self.width as i32 - 2 && cell.y <= self.height as i32 - 2
    }

    fn foreground_class(&self, cell: Cell) -> Option<TileClass> {
        self.foreground.get(cell).copied().flatten().map(|t| t.class)
    }

    #[must_use]
    pub fn ground_class(&self, cell: Cell) -> Option<TileClass> {
        self.ground.get(cell).copied().flatten().map(|t| t.class)
    }

    #[must_use]
    pub fn is_water(&self, cell: Cell) -> bool {
        self.foreground_class(cell) == Some(TileClass::Water)
    }

    #[must_use]
    pub fn is_cliff(&self, cell: Cell) -> bool {
        self.foreground_class(cell) == Some(TileClass::Cliff)
    }

    #[must_use]
    pub fn is_road(&self, cell: Cell) -> bool {
        self.road_mask.get(cell).copied().unwrap_or(false)
    }

    /// Дорога, не залитая водой
    #[must_use]
    pub fn is_dry_road(&self, cell: Cell) -> bool {
        self.is_road(cell) && !self.is_water(cell)
    }

    #[must_use]
    pub fn has_bridge(&self, cell: Cell) -> bool {
        self.bridges.get(cell).is_some_and(Option::is_some)
    }

    #[must_use]
    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.occupied.get(cell).copied().unwrap_or(false)
    }

    /// Итоговый класс клетки: мост > вода > дорога > скала > земля > пусто
    #[must_use]
    pub fn tile_class(&self, cell: Cell) -> TileClass {
        if !self.contains(cell) {
            return TileClass::Empty;
        }
        if self.has_bridge(cell) {
            return TileClass::Bridge;
        }
        let fg = self.foreground_class(cell);
        if fg == Some(TileClass::Water) {
            return TileClass::Water;
        }
        if self.roads[cell].is_some() {
            return TileClass::Road;
        }
        if let Some(class) = fg {
            return class;
        }
        self.ground_class(cell).unwrap_or(TileClass::Empty)
    }

    #[must_use]
    pub fn class_grid(&self) -> Grid<TileClass> {
        let mut grid = Grid::new(self.width, self.height, TileClass::Empty);
        for (i, cell) in self.road_mask.cells().enumerate() {
            grid.data[i] = self.tile_class(cell);
        }
        grid
    }

    /// Сетка проходимости: стоять можно на траве, грязи, дороге и мосту
    #[must_use]
    pub fn walkability(&self) -> Grid<bool> {
        let mut grid = Grid::new(self.width, self.height, false);
        for (i, cell) in self.road_mask.cells().enumerate() {
            grid.data[i] = is_walkable_class(self.tile_class(cell));
        }
        grid
    }

    /// Пересчитывает поле расстояний до дороги по текущей маске
    pub fn refresh_road_distance(&mut self) {
        self.road_distance = road_distance_field(&self.road_mask);
    }

    #[must_use]
    pub fn distance_to_road(&self, cell: Cell) -> u32 {
        self.road_distance.get(cell).copied().unwrap_or(UNREACHABLE)
    }

    /// Записывает тайл в слой с проверкой границ и класса
    pub fn write_layer(&mut self, cell: Cell, layer: Layer, tile: Option<Tile>) -> Result<(), GenError> {
        self.road_mask.check(cell)?;
        if let Some(tile) = tile {
            if !layer.accepts(tile.class) {
                return Err(GenError::InvalidTile {
                    class: tile.class,
                    layer,
                });
            }
        }
        match layer {
            Layer::Ground => self.ground[cell] = tile,
            Layer::Foreground => self.foreground[cell] = tile,
        }
        Ok(())
    }

    /// Запись о размещении по идентификатору привязки
    #[must_use]
    pub fn placement(&self, id: &str) -> Option<&PlacementRecord> {
        self.placements.iter().find(|p| p.id == id)
    }

    pub fn placements_of(&self, kind: PlacementKind) -> impl Iterator<Item = &PlacementRecord> {
        self.placements.iter().filter(move |p| p.kind == kind)
    }

    /// Ближайшая к центру проходимая клетка земли или дороги, поиск кольцами
    #[must_use]
    pub fn find_spawn_cell(&self) -> Option<Cell> {
        let center = Cell::new(self.width as i32 / 2, self.height as i32 / 2);
        let walkable = |c: Cell| {
            matches!(
                self.tile_class(c),
                TileClass::Grass | TileClass::Dirt | TileClass::Road
            )
        };
        if walkable(center) {
            return Some(center);
        }
        let max_r = self.width.max(self.height) as i32;
        for r in 1..=max_r {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx.abs() != r && dy.abs() != r {
                        continue;
                    }
                    let c = center.offset(dx, dy);
                    if self.contains(c) && walkable(c) {
                        return Some(c);
                    }
                }
            }
        }
        None
    }
}

#[must_use]
pub fn is_walkable_class(class: TileClass) -> bool {
    matches!(
        class,
        TileClass::Grass | TileClass::Dirt | TileClass::Road | TileClass::Bridge
    )
}

/// Многоисточниковый BFS от всех клеток маски (4 соседа).
/// 0 на дороге, [`UNREACHABLE`] там, куда дойти нельзя.
#[must_use]
pub fn road_distance_field(mask: &Grid<bool>) -> Grid<u32> {
    let mut dist = Grid::new(mask.width, mask.height, UNREACHABLE);
    let mut queue = VecDeque::new();

    for (i, &is_road) in mask.data.iter().enumerate() {
        if is_road {
            dist.data[i] = 0;
            queue.push_back(mask.cell_at(i));
        }
    }

    while let Some(cell) = queue.pop_front() {
        let next = dist[cell] + 1;
        for &(dx, dy) in &DIRECTIONS_4 {
            let n = cell.offset(dx, dy);
            if let Some(d) = dist.get_mut(n) {
                if *d == UNREACHABLE {
                    *d = next;
                    queue.push_back(n);
                }
            }
        }
    }
    dist
}
