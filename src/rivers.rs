use crate::biome::{BiomeConfig, TileClass};
use crate::bridges::place_bridge_cell;
use crate::config::RiverSettings;
use crate::grid::{Cell, Connectivity, DIRECTIONS_4, Grid};
use crate::pathfinding::{PathResult, astar};
use crate::terrain::TerrainNoise;
use crate::world::WorldGrids;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;

/// Частота шума, которым «дрожит» граница болота
const SWAMP_JITTER_SCALE: f32 = 0.11;
/// Множитель для эллипса в дополнение к диску
const OVAL_FACTOR: f32 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Border {
    Left,
    Right,
    Top,
    Bottom,
}

const BORDERS: [Border; 4] = [Border::Left, Border::Right, Border::Top, Border::Bottom];

/// Итог гидрологии
#[derive(Debug, Clone, Default, Serialize)]
pub struct RiverOutcome {
    pub path: Vec<Cell>,
    /// Поиск не удался, река проведена прямой
    pub used_fallback: bool,
    /// Клетки дороги, затопленные рекой (ждут мостов)
    pub submerged_road_cells: usize,
    /// Клетки мостов, поставленных прямо при рисовании реки
    pub inline_bridge_cells: usize,
    pub swamp_patches: usize,
}

fn random_border_cell<R: Rng + ?Sized>(border: Border, w: i32, h: i32, rng: &mut R) -> Cell {
    match border {
        Border::Left => Cell::new(1, rng.gen_range(2..=h - 3)),
        Border::Right => Cell::new(w - 2, rng.gen_range(2..=h - 3)),
        Border::Top => Cell::new(rng.gen_range(2..=w - 3), h - 2),
        Border::Bottom => Cell::new(rng.gen_range(2..=w - 3), 1),
    }
}

/// Стоимость шага реки: шум, надбавка за скалу и штраф за диагональный «зигзаг»
fn river_step_cost(
    grids: &WorldGrids,
    noise: &TerrainNoise,
    settings: &RiverSettings,
    from: Cell,
    to: Cell,
) -> Option<f32> {
    if !grids.is_interior(to) {
        return None;
    }
    let mut cost = 1.0 + settings.noise_weight * noise.sample_cell(to);
    if grids.is_cliff(to) {
        cost += settings.cliff_surcharge;
    }
    let (dx, dy) = ((to.x - from.x) as f32, (to.y - from.y) as f32);
    let len = (dx * dx + dy * dy).sqrt();
    if len > 0.0 {
        cost += settings.turn_penalty * (1.0 + ((dx / len) * (dy / len)).abs());
    }
    Some(cost)
}

/// Прямая «ходом короля» от `from` до `to`
fn king_line(from: Cell, to: Cell) -> Vec<Cell> {
    let mut path = vec![from];
    let mut cell = from;
    while cell != to {
        cell = cell.offset((to.x - cell.x).signum(), (to.y - cell.y).signum());
        path.push(cell);
    }
    path
}

struct Painter<'a, R: Rng + ?Sized> {
    grids: &'a mut WorldGrids,
    biome: &'a BiomeConfig,
    rng: &'a mut R,
    inline_bridges: bool,
    submerged: usize,
    bridged: usize,
}

impl<R: Rng + ?Sized> Painter<'_, R> {
    /// Вода поверх травы. Мосты не затапливаются.
    fn flood(&mut self, cell: Cell) {
        if !self.grids.is_interior(cell) || self.grids.has_bridge(cell) {
            return;
        }
        if self.grids.is_water(cell) {
            return;
        }
        if self.grids.is_road(cell) {
            self.submerged += 1;
        }
        self.grids.foreground[cell] = self.biome.pick_tile(TileClass::Water, self.rng);
        if self.grids.ground_class(cell) != Some(TileClass::Grass) {
            self.grids.ground[cell] = self.biome.pick_tile(TileClass::Grass, self.rng);
        }
        self.grids.overlay[cell] = None;
    }

    /// Небольшой мост поперёк реки там, где она впервые задела дорогу
    fn inline_bridge(&mut self, at: Cell) {
        let horizontal_road = [(-1, 0), (1, 0)].iter().filter(|(dx, dy)| self.grids.is_road(at.offset(*dx, *dy))).count()
            >= [(0, -1), (0, 1)].iter().filter(|(dx, dy)| self.grids.is_road(at.offset(*dx, *dy))).count();
        let (half_x, half_y) = if horizontal_road { (2, 1) } else { (1, 2) };
        for dy in -half_y..=half_y {
            for dx in -half_x..=half_x {
                let c = at.offset(dx, dy);
                if self.grids.is_road(c) && !self.grids.has_bridge(c) {
                    place_bridge_cell(self.grids, c, horizontal_road);
                    self.bridged += 1;
                }
            }
        }
    }

    fn paint_step(&mut self, center: Cell, width: i32) {
        let r = width / 2;
        let mut disk_hit_road = false;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let c = center.offset(dx, dy);
                if self.inline_bridges && self.grids.is_dry_road(c) && !self.grids.has_bridge(c) {
                    self.inline_bridge(c);
                    disk_hit_road = true;
                    break;
                }
            }
            if disk_hit_road {
                break;
            }
        }
        if !disk_hit_road {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx * dx + dy * dy <= r * r {
                        self.flood(center.offset(dx, dy));
                    }
                }
            }
        }

        let limit = OVAL_FACTOR * (width * width) as f32;
        let reach = limit.sqrt().ceil() as i32;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if ((dx * dx + dy * dy) as f32) <= limit {
                    self.flood(center.offset(dx, dy));
                }
            }
        }
    }
}

/// Река от края до края, вода вдоль неё и болота у берегов.
///
/// Дорога под рекой не стирается: клетка остаётся в маске дорог, но сверху
/// лежит вода, пока мосты её не восстановят.
pub fn generate_hydrology<R: Rng + ?Sized>(
    grids: &mut WorldGrids,
    noise: &TerrainNoise,
    biome: &BiomeConfig,
    settings: &RiverSettings,
    rng: &mut R,
) -> Option<RiverOutcome> {
    if !settings.enabled {
        return None;
    }
    let (w, h) = (grids.width as i32, grids.height as i32);

    let b0 = BORDERS[rng.gen_range(0..BORDERS.len())];
    let b1 = loop {
        let b = BORDERS[rng.gen_range(0..BORDERS.len())];
        if b != b0 {
            break b;
        }
    };
    let start = random_border_cell(b0, w, h, rng);
    let goal = random_border_cell(b1, w, h, rng);

    let budget = (grids.width as usize) * (grids.height as usize) * 8;
    let search = astar(
        start,
        goal,
        Connectivity::Eight,
        Some(budget),
        |from, to| river_step_cost(grids, noise, settings, from, to),
        Cell::octile,
    );
    let mut outcome = RiverOutcome::default();
    outcome.path = match search {
        PathResult::Found(path) => path,
        other => {
            tracing::debug!(?other, "river search failed, using straight line");
            outcome.used_fallback = true;
            king_line(start, goal)
        }
    };

    let mean = settings.mean_width as i32;
    let var = settings.width_variation as i32;
    let mut painter = Painter {
        grids,
        biome,
        rng,
        inline_bridges: settings.inline_bridges,
        submerged: 0,
        bridged: 0,
    };
    for &cell in &outcome.path {
        let width = (mean + painter.rng.gen_range(-var..=var)).max(2);
        painter.paint_step(cell, width);
    }
    outcome.submerged_road_cells = painter.submerged;
    outcome.inline_bridge_cells = painter.bridged;

    outcome.swamp_patches = grow_swamps(grids, noise, biome, settings, &outcome.path, rng);

    tracing::info!(
        ?b0,
        ?b1,
        len = outcome.path.len(),
        fallback = outcome.used_fallback,
        submerged = outcome.submerged_road_cells,
        swamps = outcome.swamp_patches,
        "river generated"
    );
    Some(outcome)
}

/// Семена болот вдоль реки; возвращает число проросших пятен
fn grow_swamps<R: Rng + ?Sized>(
    grids: &mut WorldGrids,
    noise: &TerrainNoise,
    biome: &BiomeConfig,
    settings: &RiverSettings,
    path: &[Cell],
    rng: &mut R,
) -> usize {
    if path.is_empty() {
        return 0;
    }
    let (w, h) = (grids.width as i32, grids.height as i32);
    let seeds = (path.len() as f32 / 100.0 * settings.swamp_seeds_per_100).round() as usize;
    let chance = f64::from(settings.swamp_chance.clamp(0.0, 1.0));
    let mean = settings.mean_width as i32;
    let lo = (mean / 2).max(2);
    let hi = mean.max(3).max(lo + 1);

    let mut patches = 0;
    for _ in 0..seeds {
        if !rng.gen_bool(chance) {
            continue;
        }
        let anchor = path[rng.gen_range(0..path.len())];
        let side = if rng.gen_bool(0.5) { 1 } else { -1 };
        let off_y = side * rng.gen_range(lo..hi);
        let seed = Cell::new(
            (anchor.x + rng.gen_range(-2..=2)).clamp(2, w - 3),
            (anchor.y + off_y).clamp(2, h - 3),
        );
        let radius = rng.gen_range(2..=settings.swamp_max_radius);
        if grow_swamp(grids, noise, biome, seed, radius as f32, rng) > 0 {
            patches += 1;
        }
    }
    patches
}

/// Случайная заливка от семени; вероятность продолжения падает с расстоянием
/// от ~0.95 у семени к ~0.15 у края радиуса, плюс шумовая рябь
fn grow_swamp<R: Rng + ?Sized>(
    grids: &mut WorldGrids,
    noise: &TerrainNoise,
    biome: &BiomeConfig,
    seed: Cell,
    radius: f32,
    rng: &mut R,
) -> usize {
    let mut visited = Grid::new(grids.width, grids.height, false);
    let mut queue = VecDeque::new();
    visited.set(seed, true);
    queue.push_back(seed);

    let dist = |c: Cell| (c.euclid_sq(seed) as f32).sqrt();
    let mut painted = 0;
    while let Some(cell) = queue.pop_front() {
        if dist(cell) > radius {
            continue;
        }
        if grids.is_cliff(cell) || grids.is_occupied(cell) || grids.is_road(cell) {
            continue;
        }
        if !grids.is_water(cell) {
            grids.foreground[cell] = biome.pick_tile(TileClass::Water, rng);
            if grids.ground_class(cell) != Some(TileClass::Grass) {
                grids.ground[cell] = biome.pick_tile(TileClass::Grass, rng);
            }
            grids.overlay[cell] = None;
            painted += 1;
        }

        for &(dx, dy) in &DIRECTIONS_4 {
            let n = cell.offset(dx, dy);
            if !grids.is_interior(n) || visited[n] {
                continue;
            }
            let t = (dist(n) / (radius + 1e-4)).clamp(0.0, 1.0);
            let jitter = noise.sample_scaled(n.x as f32, n.y as f32, SWAMP_JITTER_SCALE);
            let keep = (0.95 + (0.15 - 0.95) * t + jitter * 0.25 - 0.1).clamp(0.0, 1.0);
            if rng.gen_range(0.0..1.0) < keep {
                visited[n] = true;
                queue.push_back(n);
            }
        }
    }
    painted
}

/// Декоративное озеро-эллипс в центре карты
pub fn carve_cosmetic_lake<R: Rng + ?Sized>(grids: &mut WorldGrids, biome: &BiomeConfig, rng: &mut R) -> usize {
    let (w, h) = (grids.width as f32, grids.height as f32);
    let center = Cell::new(grids.width as i32 / 2, grids.height as i32 / 2);
    let rx = (w * 0.3).max(6.0);
    let ry = (h * 0.2).max(4.0);

    let mut carved = 0;
    for dy in -(ry.ceil() as i32)..=ry.ceil() as i32 {
        for dx in -(rx.ceil() as i32)..=rx.ceil() as i32 {
            let (ex, ey) = (dx as f32 / rx, dy as f32 / ry);
            let cell = center.offset(dx, dy);
            if ex * ex + ey * ey > 1.0 || !grids.is_interior(cell) {
                continue;
            }
            grids.foreground[cell] = biome.pick_tile(TileClass::Water, rng);
            grids.ground[cell] = biome.pick_tile(TileClass::Grass, rng);
            grids.overlay[cell] = None;
            carved += 1;
        }
    }
    tracing::debug!(carved, "cosmetic lake");
    carved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::Tile;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn meadow(width: u32, height: u32) -> WorldGrids {
        let mut grids = WorldGrids::new(width, height);
        grids.ground.fill(Some(Tile::new(TileClass::Grass, 0)));
        grids
    }

    #[test]
    fn river_connects_two_different_borders() {
        let mut grids = meadow(60, 40);
        let noise = TerrainNoise::for_seed(8, 0.08);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let outcome = generate_hydrology(
            &mut grids,
            &noise,
            &BiomeConfig::default(),
            &RiverSettings::default(),
            &mut rng,
        )
        .unwrap();

        let path = &outcome.path;
        assert!(path.len() >= 2);
        assert!(path.windows(2).all(|w| (w[0].x - w[1].x).abs() <= 1 && (w[0].y - w[1].y).abs() <= 1));
        let on_border = |c: &Cell| c.x == 1 || c.x == 58 || c.y == 1 || c.y == 38;
        assert!(on_border(&path[0]) && on_border(path.last().unwrap()));
        assert!(path.iter().all(|&c| grids.is_water(c)));
        // Рамка карты остаётся сухой
        assert!((0..60).all(|x| !grids.is_water(Cell::new(x, 0))));
    }

    #[test]
    fn disabled_river_leaves_grids_untouched() {
        let mut grids = meadow(20, 20);
        let noise = TerrainNoise::for_seed(1, 0.08);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let settings = RiverSettings {
            enabled: false,
            ..RiverSettings::default()
        };
        assert!(generate_hydrology(&mut grids, &noise, &BiomeConfig::default(), &settings, &mut rng).is_none());
        assert!(grids.foreground.data.iter().all(Option::is_none));
    }

    #[test]
    fn river_submerges_roads_without_erasing_them() {
        let mut grids = meadow(40, 30);
        for x in 0..40 {
            for y in 14..=16 {
                grids.road_mask[Cell::new(x, y)] = true;
                grids.roads[Cell::new(x, y)] = Some(Tile::new(TileClass::Road, 0));
            }
        }
        let noise = TerrainNoise::for_seed(5, 0.08);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let settings = RiverSettings {
            swamp_chance: 1.0,
            ..RiverSettings::default()
        };
        let outcome =
            generate_hydrology(&mut grids, &noise, &BiomeConfig::default(), &settings, &mut rng).unwrap();
        let submerged = grids
            .road_mask
            .cells()
            .filter(|&c| grids.is_road(c) && grids.is_water(c))
            .count();
        assert_eq!(submerged, outcome.submerged_road_cells);
        assert!((0..40).all(|x| grids.is_road(Cell::new(x, 15))));
    }

    #[test]
    fn inline_bridges_replace_flooding_on_first_contact() {
        let mut grids = meadow(40, 30);
        for y in 0..30 {
            for x in 19..=21 {
                grids.road_mask[Cell::new(x, y)] = true;
                grids.roads[Cell::new(x, y)] = Some(Tile::new(TileClass::Road, 0));
            }
        }
        let noise = TerrainNoise::for_seed(6, 0.08);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let settings = RiverSettings {
            inline_bridges: true,
            ..RiverSettings::default()
        };
        let outcome =
            generate_hydrology(&mut grids, &noise, &BiomeConfig::default(), &settings, &mut rng).unwrap();
        let bridge_cells: Vec<Cell> = grids
            .road_mask
            .cells()
            .filter(|&c| grids.has_bridge(c))
            .collect();
        assert_eq!(bridge_cells.len(), outcome.inline_bridge_cells);
        for cell in bridge_cells {
            assert!(grids.is_road(cell));
            assert!(!grids.is_water(cell));
        }
    }

    #[test]
    fn swamp_never_floods_roads_or_cliffs() {
        let mut grids = meadow(30, 30);
        grids.road_mask[Cell::new(15, 16)] = true;
        grids.foreground[Cell::new(14, 15)] = Some(Tile::new(TileClass::Cliff, 0));
        let noise = TerrainNoise::for_seed(9, 0.08);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let painted = grow_swamp(&mut grids, &noise, &BiomeConfig::default(), Cell::new(15, 15), 5.0, &mut rng);
        assert!(painted >= 1);
        assert!(grids.is_water(Cell::new(15, 15)));
        assert!(!grids.is_water(Cell::new(15, 16)));
        assert!(grids.is_cliff(Cell::new(14, 15)));
        for cell in grids.road_mask.cells() {
            if grids.is_water(cell) {
                assert!(cell.euclid_sq(Cell::new(15, 15)) <= 25);
            }
        }
    }

    #[test]
    fn lake_is_centred_and_inside_the_frame() {
        let mut grids = meadow(40, 30);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let carved = carve_cosmetic_lake(&mut grids, &BiomeConfig::default(), &mut rng);
        assert!(carved > 0);
        assert!(grids.is_water(Cell::new(20, 15)));
        assert!(!grids.is_water(Cell::new(0, 15)));
    }
}
