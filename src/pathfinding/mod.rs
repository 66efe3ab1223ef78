//! Поиск пути A* по целочисленной сетке
//!
//! Один и тот же поиск используется при генерации (дороги по стоимости местности,
//! река по шумовой стоимости) и во время игры (маршруты агентов по сетке
//! проходимости).

mod heap;

pub use heap::PriorityQueue;

use crate::error::GenError;
use crate::grid::{Cell, Connectivity, Grid};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Результат поиска: полный путь от старта до цели включительно или явный отказ.
/// Частичных путей не бывает.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PathResult {
    Found(Vec<Cell>),
    NoPath,
    /// Исчерпан лимит итераций
    BudgetExhausted,
}

impl PathResult {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, PathResult::Found(_))
    }

    #[must_use]
    pub fn path(&self) -> Option<&[Cell]> {
        match self {
            PathResult::Found(path) => Some(path),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_path(self) -> Option<Vec<Cell>> {
        match self {
            PathResult::Found(path) => Some(path),
            _ => None,
        }
    }
}

/// Ключ фронтира: сначала f, при равенстве f выигрывает меньшая h (ближе к цели)
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FrontierKey {
    f: f32,
    h: f32,
}

impl PartialOrd for FrontierKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.f.partial_cmp(&other.f)? {
            Ordering::Equal => self.h.partial_cmp(&other.h),
            ord => Some(ord),
        }
    }
}

/// A* с подключаемыми стоимостью шага и эвристикой.
///
/// `cost(from, to)` возвращает `None` для непроходимого соседа (в том числе вне
/// области поиска). Допустимость эвристики остаётся на совести вызывающего.
/// `max_iterations` ограничивает число раскрытых клеток; для открытых областей
/// поиска (река) лимит обязателен.
pub fn astar<C, H>(
    start: Cell,
    goal: Cell,
    connectivity: Connectivity,
    max_iterations: Option<usize>,
    mut cost: C,
    heuristic: H,
) -> PathResult
where
    C: FnMut(Cell, Cell) -> Option<f32>,
    H: Fn(Cell, Cell) -> f32,
{
    let mut open: PriorityQueue<(Cell, f32), FrontierKey> = PriorityQueue::new();
    let mut g_score: HashMap<Cell, f32> = HashMap::new();
    let mut came_from: HashMap<Cell, Cell> = HashMap::new();

    let h0 = heuristic(start, goal);
    g_score.insert(start, 0.0);
    open.push((start, 0.0), FrontierKey { f: h0, h: h0 });

    let mut iterations = 0usize;
    while let Some(((current, g), _)) = open.pop_min() {
        // Устаревший дубликат
        if g_score.get(&current).is_some_and(|&best| g > best) {
            continue;
        }
        if current == goal {
            return PathResult::Found(reconstruct(&came_from, start, goal));
        }
        if max_iterations.is_some_and(|limit| iterations >= limit) {
            return PathResult::BudgetExhausted;
        }
        iterations += 1;

        for &(dx, dy) in connectivity.offsets() {
            let next = current.offset(dx, dy);
            let Some(step) = cost(current, next).filter(|c| c.is_finite()) else {
                continue;
            };
            let tentative = g + step.max(0.0);
            if g_score.get(&next).is_none_or(|&old| tentative < old) {
                g_score.insert(next, tentative);
                came_from.insert(next, current);
                let h = heuristic(next, goal);
                open.push(
                    (next, tentative),
                    FrontierKey {
                        f: tentative + h,
                        h,
                    },
                );
            }
        }
    }

    PathResult::NoPath
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, start: Cell, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Запрос маршрута по сетке проходимости (`true` = можно стоять).
///
/// Шаг по прямой стоит 1, по диагонали √2; диагональ не срезает заблокированный
/// угол. Заблокированный старт или цель дают `NoPath`, клетки вне сетки дают ошибку.
pub fn find_path(
    walkable: &Grid<bool>,
    start: Cell,
    goal: Cell,
    connectivity: Connectivity,
) -> Result<PathResult, GenError> {
    walkable.check(start)?;
    walkable.check(goal)?;
    if !walkable[start] || !walkable[goal] {
        return Ok(PathResult::NoPath);
    }

    let open = |c: Cell| walkable.get(c).copied().unwrap_or(false);
    let cost = |from: Cell, to: Cell| {
        if !open(to) {
            return None;
        }
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        if dx != 0 && dy != 0 {
            if !open(from.offset(dx, 0)) || !open(from.offset(0, dy)) {
                return None;
            }
            Some(std::f32::consts::SQRT_2)
        } else {
            Some(1.0)
        }
    };

    let result = match connectivity {
        Connectivity::Four => astar(start, goal, connectivity, None, cost, |a, b| {
            a.manhattan(b) as f32
        }),
        Connectivity::Eight => astar(start, goal, connectivity, None, cost, Cell::octile),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_contiguous(path: &[Cell], connectivity: Connectivity) -> bool {
        path.windows(2).all(|w| {
            let (dx, dy) = (w[1].x - w[0].x, w[1].y - w[0].y);
            connectivity.offsets().contains(&(dx, dy))
        })
    }

    #[test]
    fn open_grid_path_has_manhattan_length() {
        for n in [2, 5, 12] {
            let grid = Grid::new(n, n, true);
            let goal = Cell::new(n as i32 - 1, n as i32 - 1);
            let result = find_path(&grid, Cell::new(0, 0), goal, Connectivity::Four).unwrap();
            let path = result.into_path().expect("open grid must have a path");
            assert_eq!(path.len() - 1, 2 * (n as usize - 1));
            assert_eq!(path.first(), Some(&Cell::new(0, 0)));
            assert_eq!(path.last(), Some(&goal));
            let mut seen = path.clone();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), path.len(), "path repeats a cell");
            assert!(is_contiguous(&path, Connectivity::Four));
        }
    }

    #[test]
    fn path_to_itself_is_single_cell() {
        let grid = Grid::new(4, 4, true);
        let c = Cell::new(2, 1);
        let result = find_path(&grid, c, c, Connectivity::Four).unwrap();
        assert_eq!(result, PathResult::Found(vec![c]));
    }

    #[test]
    fn enclosed_goal_has_no_path() {
        let mut grid = Grid::new(7, 7, true);
        for &(dx, dy) in &crate::grid::DIRECTIONS_8 {
            grid.set(Cell::new(3 + dx, 3 + dy), false);
        }
        for connectivity in [Connectivity::Four, Connectivity::Eight] {
            let result = find_path(&grid, Cell::new(0, 0), Cell::new(3, 3), connectivity).unwrap();
            assert_eq!(result, PathResult::NoPath);
        }
    }

    #[test]
    fn out_of_bounds_endpoints_are_errors() {
        let grid = Grid::new(4, 4, true);
        let err = find_path(&grid, Cell::new(0, 0), Cell::new(4, 0), Connectivity::Four);
        assert!(matches!(err, Err(GenError::OutOfBounds { x: 4, .. })));
    }

    #[test]
    fn diagonal_moves_do_not_cut_corners() {
        let mut grid = Grid::new(2, 2, true);
        grid.set(Cell::new(1, 0), false);
        grid.set(Cell::new(0, 1), false);
        let result = find_path(&grid, Cell::new(0, 0), Cell::new(1, 1), Connectivity::Eight).unwrap();
        assert_eq!(result, PathResult::NoPath);
    }

    #[test]
    fn eight_connected_search_walks_diagonals() {
        let grid = Grid::new(6, 6, true);
        let path = find_path(&grid, Cell::new(0, 0), Cell::new(5, 5), Connectivity::Eight)
            .unwrap()
            .into_path()
            .unwrap();
        assert_eq!(path.len(), 6);
        assert!(is_contiguous(&path, Connectivity::Eight));
    }

    #[test]
    fn budget_stops_search() {
        let result = astar(
            Cell::new(0, 0),
            Cell::new(1000, 0),
            Connectivity::Four,
            Some(10),
            |_, _| Some(1.0),
            |a, b| a.manhattan(b) as f32,
        );
        assert_eq!(result, PathResult::BudgetExhausted);
    }

    #[test]
    fn equal_f_prefers_lower_h() {
        let near = FrontierKey { f: 5.0, h: 1.0 };
        let far = FrontierKey { f: 5.0, h: 4.0 };
        assert!(near < far);
        assert!(FrontierKey { f: 4.0, h: 9.0 } < near);
    }

    #[test]
    fn search_prefers_cheap_cells() {
        // Дорогая полоса посередине обходится по нижнему краю
        let result = astar(
            Cell::new(0, 1),
            Cell::new(4, 1),
            Connectivity::Four,
            None,
            |_, to| {
                if !(0..5).contains(&to.x) || !(0..3).contains(&to.y) {
                    return None;
                }
                Some(if to.y == 1 && (1..4).contains(&to.x) { 50.0 } else { 1.0 })
            },
            |a, b| a.manhattan(b) as f32,
        );
        let path = result.into_path().unwrap();
        assert!(path[1..path.len() - 1].iter().all(|c| c.y != 1 || c.x == 0 || c.x == 4));
        assert_eq!(path.len(), 7);
    }
}
