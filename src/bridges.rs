//! Мосты там, где река разрезала дорогу
//!
//! Кандидат: клетка дороги (сухая или затопленная) с водой по соседству, для
//! которой зонд через воду находит дорогу на другом берегу, а обойти воду по
//! суше в небольшом радиусе нельзя. Кандидаты собираются в кластеры вдоль
//! главной оси дороги, кластер превращается в прямоугольник фиксированной
//! ширины, близкие прямоугольники сливаются.

use crate::biome::BiomeConfig;
use crate::config::BridgeSettings;
use crate::grid::{Cell, DIRECTIONS_4, Grid};
use crate::world::{RectangleBridge, WorldGrids};
use serde::Serialize;
use std::collections::VecDeque;

/// Минимальное перекрытие поперёк оси (в клетках), при котором мосты сливаются
const MIN_MERGE_OVERLAP: i32 = 3;
/// Минимум подряд идущих клеток воды, чтобы считать дорогу перерезанной
const MIN_WATER_RUN: i32 = 2;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BridgeOutcome {
    pub rectangles: Vec<RectangleBridge>,
    /// Одноклеточные мосты на оставшихся затопленных клетках
    pub legacy_cells: usize,
}

/// Кладёт мост в клетку: всё под ним снимается, клетка входит в маску дорог
pub(crate) fn place_bridge_cell(grids: &mut WorldGrids, cell: Cell, horizontal: bool) {
    if !grids.contains(cell) {
        return;
    }
    grids.ground[cell] = None;
    grids.foreground[cell] = None;
    grids.overlay[cell] = None;
    grids.roads[cell] = None;
    grids.bridges[cell] = Some(BiomeConfig::bridge_tile(horizontal));
    grids.road_mask[cell] = true;
}

fn has_water_neighbor(grids: &WorldGrids, cell: Cell) -> bool {
    DIRECTIONS_4
        .iter()
        .any(|&(dx, dy)| grids.is_water(cell.offset(dx, dy)))
}

/// Сухая дорога за ≥2 клетками воды подряд; поиск по расстоянию, затем по направлениям
fn probe_across(grids: &WorldGrids, from: Cell, max_distance: i32) -> Option<Cell> {
    for d in (MIN_WATER_RUN + 1)..=max_distance {
        for &(dx, dy) in &DIRECTIONS_4 {
            let far = from.offset(dx * d, dy * d);
            if !grids.is_dry_road(far) {
                continue;
            }
            if (1..d).all(|i| grids.is_water(from.offset(dx * i, dy * i))) {
                return Some(far);
            }
        }
    }
    None
}

/// Достижима ли `target` из `from` по сухой дороге, не отходя дальше `radius`
fn reachable_on_land(grids: &WorldGrids, from: Cell, target: Cell, radius: i32) -> bool {
    let r2 = i64::from(radius) * i64::from(radius);
    let mut seen = vec![from];
    let mut queue = VecDeque::from([from]);
    while let Some(cell) = queue.pop_front() {
        for &(dx, dy) in &DIRECTIONS_4 {
            let n = cell.offset(dx, dy);
            if n.euclid_sq(from) > r2 || !grids.is_dry_road(n) || seen.contains(&n) {
                continue;
            }
            if n == target {
                return true;
            }
            seen.push(n);
            queue.push_back(n);
        }
    }
    false
}

/// Ось с большим числом дорожных клеток в окне `±window`; при равенстве: горизонталь
fn dominant_axis_horizontal(grids: &WorldGrids, cell: Cell, window: i32) -> bool {
    let count = |dx: i32, dy: i32| {
        (1..=window)
            .flat_map(|i| [cell.offset(dx * i, dy * i), cell.offset(-dx * i, -dy * i)])
            .filter(|&c| grids.is_road(c))
            .count()
    };
    count(1, 0) >= count(0, 1)
}

/// Клетки дороги, задетые водой, вдоль оси через `seed`
fn collect_cluster(grids: &WorldGrids, visited: &Grid<bool>, seed: Cell, horizontal: bool) -> Vec<Cell> {
    let affected = |c: Cell| {
        grids.is_road(c)
            && !visited.get(c).copied().unwrap_or(true)
            && (grids.is_water(c) || has_water_neighbor(grids, c))
    };
    let (dx, dy) = if horizontal { (1, 0) } else { (0, 1) };
    let mut cluster = vec![seed];
    for sign in [1, -1] {
        let mut c = seed.offset(dx * sign, dy * sign);
        while affected(c) {
            cluster.push(c);
            c = c.offset(dx * sign, dy * sign);
        }
    }
    cluster
}

fn clamp_rect(grids: &WorldGrids, rect: RectangleBridge) -> Option<RectangleBridge> {
    let (w, h) = (grids.width as i32, grids.height as i32);
    let clamped = RectangleBridge {
        min_x: rect.min_x.max(1),
        max_x: rect.max_x.min(w - 2),
        min_y: rect.min_y.max(1),
        max_y: rect.max_y.min(h - 2),
        horizontal: rect.horizontal,
    };
    (clamped.min_x <= clamped.max_x && clamped.min_y <= clamped.max_y).then_some(clamped)
}

/// Прямоугольник из рамки кластера: +1 вдоль длины, фиксированная ширина поперёк
fn rectangle_for(grids: &WorldGrids, cluster: &[Cell], width: u32) -> Option<RectangleBridge> {
    let min_x = cluster.iter().map(|c| c.x).min()?;
    let max_x = cluster.iter().map(|c| c.x).max()?;
    let min_y = cluster.iter().map(|c| c.y).min()?;
    let max_y = cluster.iter().map(|c| c.y).max()?;
    let horizontal = (max_x - min_x) >= (max_y - min_y);
    let half = (width / 2) as i32;

    let rect = if horizontal {
        let cy = (min_y + max_y) / 2;
        RectangleBridge {
            min_x: min_x - 1,
            max_x: max_x + 1,
            min_y: cy - half,
            max_y: cy + half,
            horizontal,
        }
    } else {
        let cx = (min_x + max_x) / 2;
        RectangleBridge {
            min_x: cx - half,
            max_x: cx + half,
            min_y: min_y - 1,
            max_y: max_y + 1,
            horizontal,
        }
    };
    clamp_rect(grids, rect)
}

/// Зазор вдоль оси и перекрытие поперёк неё
fn gap_and_overlap(a: &RectangleBridge, b: &RectangleBridge) -> (i32, i32) {
    if a.horizontal {
        let gap = a.min_x.max(b.min_x) - a.max_x.min(b.max_x) - 1;
        let overlap = a.max_y.min(b.max_y) - a.min_y.max(b.min_y) + 1;
        (gap.max(0), overlap)
    } else {
        let gap = a.min_y.max(b.min_y) - a.max_y.min(b.max_y) - 1;
        let overlap = a.max_x.min(b.max_x) - a.min_x.max(b.min_x) + 1;
        (gap.max(0), overlap)
    }
}

/// Сливает однонаправленные мосты с малым зазором и заметным перекрытием.
/// Результат: общая рамка, заново отцентрованная до ширины моста.
pub fn merge_rectangles(grids: &WorldGrids, mut rects: Vec<RectangleBridge>, settings: &BridgeSettings) -> Vec<RectangleBridge> {
    let half = (settings.width / 2) as i32;
    let max_gap = settings.merge_gap as i32;
    'restart: loop {
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                let (a, b) = (rects[i], rects[j]);
                if a.horizontal != b.horizontal {
                    continue;
                }
                let (gap, overlap) = gap_and_overlap(&a, &b);
                if gap > max_gap || overlap < MIN_MERGE_OVERLAP {
                    continue;
                }
                let mut merged = RectangleBridge {
                    min_x: a.min_x.min(b.min_x),
                    max_x: a.max_x.max(b.max_x),
                    min_y: a.min_y.min(b.min_y),
                    max_y: a.max_y.max(b.max_y),
                    horizontal: a.horizontal,
                };
                if merged.horizontal {
                    let cy = (merged.min_y + merged.max_y) / 2;
                    merged.min_y = cy - half;
                    merged.max_y = cy + half;
                } else {
                    let cx = (merged.min_x + merged.max_x) / 2;
                    merged.min_x = cx - half;
                    merged.max_x = cx + half;
                }
                rects.swap_remove(j);
                match clamp_rect(grids, merged) {
                    Some(merged) => rects[i] = merged,
                    None => {
                        rects.swap_remove(i);
                    }
                }
                continue 'restart;
            }
        }
        return rects;
    }
}

fn road_runs_horizontally(grids: &WorldGrids, cell: Cell) -> bool {
    let along = |dx: i32, dy: i32| usize::from(grids.is_road(cell.offset(dx, dy))) + usize::from(grids.is_road(cell.offset(-dx, -dy)));
    along(1, 0) >= along(0, 1)
}

/// Ищет перерезанные рекой дороги и строит мосты. Вызывается после гидрологии.
pub fn synthesize_bridges(grids: &mut WorldGrids, settings: &BridgeSettings) -> BridgeOutcome {
    let (w, h) = (grids.width as i32, grids.height as i32);
    let mut visited = Grid::new(grids.width, grids.height, false);
    let mut rects = Vec::new();

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let cell = Cell::new(x, y);
            if visited[cell] || !grids.is_road(cell) || !has_water_neighbor(grids, cell) {
                continue;
            }
            let Some(far) = probe_across(grids, cell, settings.probe_distance as i32) else {
                continue;
            };
            if reachable_on_land(grids, cell, far, settings.connect_radius as i32) {
                continue;
            }

            let horizontal = dominant_axis_horizontal(grids, cell, settings.axis_window as i32);
            let cluster = collect_cluster(grids, &visited, cell, horizontal);
            let Some(rect) = rectangle_for(grids, &cluster, settings.width) else {
                continue;
            };
            for c in rect.cells().chain(cluster.iter().copied()) {
                visited.set(c, true);
            }
            tracing::debug!(?rect, cluster = cluster.len(), "bridge candidate");
            rects.push(rect);
        }
    }

    let rects = merge_rectangles(grids, rects, settings);
    for rect in &rects {
        for cell in rect.cells() {
            place_bridge_cell(grids, cell, rect.horizontal);
        }
    }

    let mut legacy_cells = 0;
    if settings.legacy_fallback {
        let submerged: Vec<Cell> = grids
            .road_mask
            .cells()
            .filter(|&c| grids.is_road(c) && grids.is_water(c))
            .collect();
        for cell in submerged {
            let horizontal = road_runs_horizontally(grids, cell);
            place_bridge_cell(grids, cell, horizontal);
            legacy_cells += 1;
        }
    }

    grids.bridge_rects.extend(rects.iter().copied());
    tracing::info!(rectangles = rects.len(), legacy_cells, "bridges synthesized");
    BridgeOutcome {
        rectangles: rects,
        legacy_cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::{Tile, TileClass};
    use crate::roads::road_components;

    fn grids_with_road(width: u32, height: u32, rows: std::ops::RangeInclusive<i32>) -> WorldGrids {
        let mut grids = WorldGrids::new(width, height);
        grids.ground.fill(Some(Tile::new(TileClass::Grass, 0)));
        for y in rows {
            for x in 0..width as i32 {
                grids.road_mask[Cell::new(x, y)] = true;
                grids.roads[Cell::new(x, y)] = Some(Tile::new(TileClass::Road, 0));
            }
        }
        grids
    }

    fn flood(grids: &mut WorldGrids, cells: impl IntoIterator<Item = Cell>) {
        for c in cells {
            grids.foreground[c] = Some(Tile::new(TileClass::Water, 0));
        }
    }

    #[test]
    fn river_across_road_gets_one_rectangle() {
        let mut grids = grids_with_road(30, 20, 9..=11);
        flood(&mut grids, (0..20).flat_map(|y| (14..=17).map(move |x| Cell::new(x, y))));
        assert_eq!(road_components(&grids), 2);

        let outcome = synthesize_bridges(&mut grids, &BridgeSettings::default());
        assert_eq!(
            outcome.rectangles,
            [RectangleBridge {
                min_x: 12,
                max_x: 19,
                min_y: 6,
                max_y: 12,
                horizontal: true,
            }]
        );
        assert_eq!(outcome.legacy_cells, 0);
        assert_eq!(grids.bridge_rects.len(), 1);
        assert_eq!(grids.tile_class(Cell::new(15, 10)), TileClass::Bridge);
        assert_eq!(road_components(&grids), 1);
    }

    #[test]
    fn water_next_to_road_without_far_bank_is_ignored() {
        let mut grids = grids_with_road(20, 12, 5..=5);
        flood(&mut grids, [Cell::new(8, 4), Cell::new(8, 3), Cell::new(9, 4)]);
        let outcome = synthesize_bridges(&mut grids, &BridgeSettings::default());
        assert!(outcome.rectangles.is_empty());
        assert_eq!(outcome.legacy_cells, 0);
    }

    #[test]
    fn puddle_with_land_detour_falls_back_to_single_cells() {
        let mut grids = grids_with_road(30, 20, 9..=11);
        for x in 13..=16 {
            grids.road_mask[Cell::new(x, 8)] = true;
        }
        flood(&mut grids, (9..=11).flat_map(|y| [Cell::new(14, y), Cell::new(15, y)]));

        let outcome = synthesize_bridges(&mut grids, &BridgeSettings::default());
        assert!(outcome.rectangles.is_empty());
        assert_eq!(outcome.legacy_cells, 6);
        assert_eq!(grids.tile_class(Cell::new(14, 10)), TileClass::Bridge);
        assert_eq!(road_components(&grids), 1);
    }

    #[test]
    fn close_parallel_rectangles_merge() {
        let grids = WorldGrids::new(40, 20);
        let a = RectangleBridge { min_x: 5, max_x: 10, min_y: 4, max_y: 10, horizontal: true };
        let b = RectangleBridge { min_x: 14, max_x: 18, min_y: 6, max_y: 12, horizontal: true };
        let far = RectangleBridge { min_x: 30, max_x: 34, min_y: 6, max_y: 12, horizontal: true };
        let merged = merge_rectangles(&grids, vec![a, b, far], &BridgeSettings::default());
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&RectangleBridge { min_x: 5, max_x: 18, min_y: 5, max_y: 11, horizontal: true }));
        assert!(merged.contains(&far));
    }

    #[test]
    fn different_orientations_never_merge() {
        let grids = WorldGrids::new(40, 20);
        let a = RectangleBridge { min_x: 5, max_x: 10, min_y: 4, max_y: 10, horizontal: true };
        let b = RectangleBridge { min_x: 8, max_x: 14, min_y: 4, max_y: 10, horizontal: false };
        assert_eq!(merge_rectangles(&grids, vec![a, b], &BridgeSettings::default()).len(), 2);
    }
}
