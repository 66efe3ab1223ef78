//! Дорожная сеть: главная дорога, рекурсивные ответвления, починка диагоналей
//!
//! Дороги прокладываются поиском A* по 4 соседям внутри рамки в одну клетку.
//! Стоимость шага зависит от клетки, в которую шагаем: вода очень дорогая, скала
//! дорогая, существующая дорога почти бесплатная (так ответвления переиспользуют
//! уже проложенные участки вместо параллельных дублей).

use crate::biome::{BiomeConfig, TileClass};
use crate::config::RoadSettings;
use crate::grid::{Cell, Connectivity};
use crate::pathfinding::{PathResult, astar};
use crate::world::WorldGrids;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;

/// Ширина главной дороги
pub const MAIN_ROAD_WIDTH: u32 = 3;
/// Родитель короче этого не получает ответвлений
const MIN_PARENT_LEN: usize = 8;
const BRANCH_PICK_TRIES: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    fn flipped(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

/// Направление роста ответвления. `Up`: в сторону больших y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchDir {
    Up,
    Down,
    Left,
    Right,
}

impl BranchDir {
    fn step(self) -> (i32, i32) {
        match self {
            BranchDir::Up => (0, 1),
            BranchDir::Down => (0, -1),
            BranchDir::Left => (-1, 0),
            BranchDir::Right => (1, 0),
        }
    }
}

/// Итог построения сети
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoadNetwork {
    pub main: Vec<Cell>,
    pub branches: Vec<Vec<Cell>>,
    /// Главная дорога проложена прямой линией, поиск не удался
    pub main_fallback: bool,
    /// Ответвления, проложенные прямо к краю
    pub branch_fallbacks: usize,
    /// Клетки, добавленные починкой диагоналей
    pub diagonal_fixes: usize,
}

/// Стоимость шага дороги в клетку `to`
#[must_use]
pub fn road_step_cost(grids: &WorldGrids, to: Cell) -> f32 {
    if grids.is_water(to) {
        20.0
    } else if grids.is_cliff(to) {
        12.0
    } else if grids.is_road(to) {
        0.4
    } else {
        match grids.ground_class(to) {
            Some(TileClass::Dirt) => 1.0,
            Some(TileClass::Grass) => 1.2,
            _ => 2.0,
        }
    }
}

/// Поиск дороги по 4 соседям внутри рамки
#[must_use]
pub fn search_road(grids: &WorldGrids, start: Cell, goal: Cell) -> PathResult {
    astar(
        start,
        goal,
        Connectivity::Four,
        None,
        |_, to| grids.is_interior(to).then(|| road_step_cost(grids, to)),
        |a, b| a.manhattan(b) as f32,
    )
}

/// Прямая по оси от `from`, пока не упрёмся в рамку
fn straight_to_edge(grids: &WorldGrids, from: Cell, dir: BranchDir) -> Vec<Cell> {
    let (dx, dy) = dir.step();
    let mut path = vec![from];
    let mut cell = from;
    loop {
        let next = cell.offset(dx, dy);
        if !grids.is_interior(next) {
            break;
        }
        path.push(next);
        cell = next;
    }
    path
}

fn straight_horizontal(from: Cell, to_x: i32) -> Vec<Cell> {
    let step = if to_x >= from.x { 1 } else { -1 };
    let mut path = Vec::new();
    let mut x = from.x;
    loop {
        path.push(Cell::new(x, from.y));
        if x == to_x {
            break;
        }
        x += step;
    }
    path
}

/// Кладёт дорожный тайл: маска, вариант из пула грязи, вода/скала/декор снимаются
pub fn paint_road_cell<R: Rng + ?Sized>(grids: &mut WorldGrids, cell: Cell, biome: &BiomeConfig, rng: &mut R) {
    if !grids.contains(cell) {
        return;
    }
    if grids.roads[cell].is_none() {
        grids.roads[cell] = biome.pick_tile(TileClass::Road, rng);
    }
    grids.road_mask[cell] = true;
    grids.foreground[cell] = None;
    grids.overlay[cell] = None;
}

/// Расширяет путь до полосы шириной `width` (квадрат вокруг каждой клетки),
/// обрезанной по карте
pub fn paint_road<R: Rng + ?Sized>(
    grids: &mut WorldGrids,
    path: &[Cell],
    width: u32,
    biome: &BiomeConfig,
    rng: &mut R,
) {
    let half = (width / 2) as i32;
    for &center in path {
        for dy in -half..=half {
            for dx in -half..=half {
                paint_road_cell(grids, center.offset(dx, dy), biome, rng);
            }
        }
    }
}

struct RoadBuilder<'a, R: Rng + ?Sized> {
    grids: &'a mut WorldGrids,
    settings: &'a RoadSettings,
    biome: &'a BiomeConfig,
    rng: &'a mut R,
    network: RoadNetwork,
}

impl<R: Rng + ?Sized> RoadBuilder<'_, R> {
    fn build_main(&mut self) {
        let (w, h) = (self.grids.width as i32, self.grids.height as i32);
        let start = Cell::new(1, h / 2);
        let goal = Cell::new(w - 2, h / 2);

        let path = match search_road(self.grids, start, goal) {
            PathResult::Found(path) => path,
            other => {
                tracing::debug!(?other, "main road search failed, using straight line");
                self.network.main_fallback = true;
                straight_horizontal(start, goal.x)
            }
        };
        paint_road(self.grids, &path, MAIN_ROAD_WIDTH, self.biome, self.rng);
        self.grids.refresh_road_distance();
        self.network.main = path;
    }

    /// Индексы точек ответвления в средних 70% пути родителя
    fn pick_branch_points(&mut self, len: usize, count: u32) -> Vec<usize> {
        let lo = (len as f32 * 0.15).round() as usize;
        let hi = ((len as f32 * 0.85).round() as usize).max(lo + 1);
        let spacing = self.settings.branch_spacing_min as usize;

        let mut picks: Vec<usize> = Vec::new();
        let mut tries = 0;
        while picks.len() < count as usize && tries < BRANCH_PICK_TRIES {
            tries += 1;
            let i = self.rng.gen_range(lo..hi).min(len - 1);
            if picks.iter().all(|&p| p.abs_diff(i) >= spacing) {
                picks.push(i);
            }
        }
        picks.sort_unstable();
        picks
    }

    fn branch_goal(&self, from: Cell, dir: BranchDir) -> Cell {
        let (w, h) = (self.grids.width as i32, self.grids.height as i32);
        let (left, right, bottom, top) = (1, w - 2, 1, h - 2);
        if self.settings.branch_ends_at_corner {
            let side_x = if from.x < w / 2 { left } else { right };
            let side_y = if from.y < h / 2 { bottom } else { top };
            match dir {
                BranchDir::Up => Cell::new(side_x, top),
                BranchDir::Down => Cell::new(side_x, bottom),
                BranchDir::Left => Cell::new(left, side_y),
                BranchDir::Right => Cell::new(right, side_y),
            }
        } else {
            match dir {
                BranchDir::Up => Cell::new(from.x, top),
                BranchDir::Down => Cell::new(from.x, bottom),
                BranchDir::Left => Cell::new(left, from.y),
                BranchDir::Right => Cell::new(right, from.y),
            }
        }
    }

    fn grow(&mut self, parent: &[Cell], orientation: Orientation, depth_left: u32, first_level: bool) {
        if parent.len() < MIN_PARENT_LEN {
            return;
        }
        let count = match orientation {
            Orientation::Horizontal => self.settings.first_level_branches,
            Orientation::Vertical => self.settings.first_level_branches.saturating_sub(1).max(1),
        };
        if self.settings.first_level_branches == 0 {
            return;
        }

        let points = self.pick_branch_points(parent.len(), count);
        for (k, &index) in points.iter().enumerate() {
            let from = parent[index];
            let dir = match orientation {
                Orientation::Horizontal if first_level && self.settings.alternate_first_level => {
                    if k % 2 == 0 { BranchDir::Up } else { BranchDir::Down }
                }
                Orientation::Horizontal => {
                    if self.rng.gen_bool(0.5) { BranchDir::Up } else { BranchDir::Down }
                }
                Orientation::Vertical => {
                    if self.rng.gen_bool(0.5) { BranchDir::Left } else { BranchDir::Right }
                }
            };

            let goal = self.branch_goal(from, dir);
            let path = match search_road(self.grids, from, goal) {
                PathResult::Found(path) if path.len() > 1 => path,
                _ => {
                    self.network.branch_fallbacks += 1;
                    straight_to_edge(self.grids, from, dir)
                }
            };
            if path.len() < 2 {
                continue;
            }

            paint_road(self.grids, &path, self.settings.branch_width, self.biome, self.rng);
            self.grids.refresh_road_distance();
            tracing::debug!(?dir, from = ?from, len = path.len(), "branch road");

            if depth_left > 0 {
                self.grow(&path, orientation.flipped(), depth_left - 1, false);
            }
            self.network.branches.push(path);
        }
    }
}

/// Строит всю дорожную сеть и чинит диагонали. Поле расстояний актуально на выходе.
pub fn build_road_network<R: Rng + ?Sized>(
    grids: &mut WorldGrids,
    settings: &RoadSettings,
    biome: &BiomeConfig,
    rng: &mut R,
) -> RoadNetwork {
    let mut builder = RoadBuilder {
        grids,
        settings,
        biome,
        rng,
        network: RoadNetwork::default(),
    };
    builder.build_main();
    if settings.max_branch_depth > 0 {
        let main = builder.network.main.clone();
        builder.grow(&main, Orientation::Horizontal, settings.max_branch_depth - 1, true);
    }

    let mut network = builder.network;
    network.diagonal_fixes = fix_diagonals(grids, biome, rng);
    grids.refresh_road_distance();

    tracing::info!(
        main_len = network.main.len(),
        branches = network.branches.len(),
        fallbacks = network.branch_fallbacks,
        diagonal_fixes = network.diagonal_fixes,
        "road network built"
    );
    network
}

/// Заполняет ортогональные клетки у пар дорог, касающихся только углом.
/// Клетки с водой не трогаются. Возвращает число добавленных клеток.
pub fn fix_diagonals<R: Rng + ?Sized>(grids: &mut WorldGrids, biome: &BiomeConfig, rng: &mut R) -> usize {
    let (w, h) = (grids.width as i32, grids.height as i32);
    let mut filled = 0;
    for y in 0..h - 1 {
        for x in 0..w - 1 {
            let a = Cell::new(x, y);
            let b = Cell::new(x + 1, y + 1);
            let c = Cell::new(x + 1, y);
            let d = Cell::new(x, y + 1);
            let gaps = if grids.is_road(a) && grids.is_road(b) && !grids.is_road(c) && !grids.is_road(d) {
                [c, d]
            } else if grids.is_road(c) && grids.is_road(d) && !grids.is_road(a) && !grids.is_road(b) {
                [a, b]
            } else {
                continue;
            };
            for gap in gaps {
                if !grids.is_water(gap) {
                    paint_road_cell(grids, gap, biome, rng);
                    filled += 1;
                }
            }
        }
    }
    filled
}

/// Число компонент 4-связности проходимых дорожных клеток (дорога без воды)
#[must_use]
pub fn road_components(grids: &WorldGrids) -> usize {
    let mut graph: UnGraph<Cell, ()> = UnGraph::new_undirected();
    let mut nodes: HashMap<Cell, NodeIndex> = HashMap::new();

    for cell in grids.road_mask.cells() {
        if grids.is_dry_road(cell) {
            nodes.insert(cell, graph.add_node(cell));
        }
    }
    for (&cell, &node) in &nodes {
        for (dx, dy) in [(1, 0), (0, 1)] {
            if let Some(&other) = nodes.get(&cell.offset(dx, dy)) {
                graph.add_edge(node, other, ());
            }
        }
    }
    connected_components(&graph)
}
