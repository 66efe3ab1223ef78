use crate::biome::{BiomeConfig, TileClass};
use crate::config::SettlementSettings;
use crate::grid::Cell;
use crate::world::{PlacementKind, PlacementRecord, WorldGrids};
use rand::Rng;
use serde::Serialize;

/// Итог размещения поселения
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SettlementOutcome {
    Placed(PlacementRecord),
    /// Ни одна попытка (включая запасную в центре) не прошла проверки
    NotPlaced,
}

impl SettlementOutcome {
    #[must_use]
    pub fn record(&self) -> Option<&PlacementRecord> {
        match self {
            SettlementOutcome::Placed(record) => Some(record),
            SettlementOutcome::NotPlaced => None,
        }
    }
}

/// Ядро и рамка с отступом вокруг центра
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub center: Cell,
    pub core_min: Cell,
    pub core_max: Cell,
    pub padding: i32,
}

impl Footprint {
    #[must_use]
    pub fn new(center: Cell, size: (u32, u32), padding: u32) -> Self {
        let (sx, sy) = (size.0 as i32, size.1 as i32);
        Self {
            center,
            core_min: center.offset(-sx / 2, -sy / 2),
            core_max: center.offset((sx - 1) / 2, (sy - 1) / 2),
            padding: padding as i32,
        }
    }

    pub fn core_cells(&self) -> impl Iterator<Item = Cell> + use<> {
        rect_cells(self.core_min, self.core_max)
    }

    pub fn padded_cells(&self) -> impl Iterator<Item = Cell> + use<> {
        let p = self.padding;
        rect_cells(self.core_min.offset(-p, -p), self.core_max.offset(p, p))
    }
}

fn rect_cells(min: Cell, max: Cell) -> impl Iterator<Item = Cell> {
    (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| Cell::new(x, y)))
}

/// Проверка кандидата: вся рамка с отступом внутри карты, свободна, не дорога,
/// без воды и скал, на траве или грязи и не ближе `min_road_distance` к дороге
#[must_use]
pub fn footprint_fits(grids: &WorldGrids, footprint: &Footprint, min_road_distance: u32) -> bool {
    footprint.padded_cells().all(|c| {
        grids.is_interior(c)
            && !grids.is_occupied(c)
            && !grids.is_road(c)
            && !grids.is_water(c)
            && !grids.is_cliff(c)
            && matches!(grids.ground_class(c), Some(TileClass::Grass | TileClass::Dirt))
            && grids.distance_to_road(c) >= min_road_distance
    })
}

fn commit<R: Rng + ?Sized>(
    grids: &mut WorldGrids,
    footprint: &Footprint,
    settings: &SettlementSettings,
    biome: &BiomeConfig,
    rng: &mut R,
) -> PlacementRecord {
    for cell in footprint.core_cells() {
        if grids.ground_class(cell) != Some(TileClass::Grass) {
            grids.ground[cell] = biome.pick_tile(TileClass::Grass, rng);
        }
        grids.overlay[cell] = None;
        grids.foreground[cell] = None;
    }
    for cell in footprint.padded_cells() {
        if grids.is_interior(cell) {
            grids.occupied[cell] = true;
        }
    }
    let record = PlacementRecord::new(PlacementKind::Settlement, settings.anchor_id.clone(), footprint.center);
    grids.placements.push(record.clone());
    grids.refresh_road_distance();
    record
}

/// Выборка с отклонением: до `tries` случайных центров, затем одна попытка в
/// центре карты. При неудаче сетки не меняются.
pub fn place_settlement<R: Rng + ?Sized>(
    grids: &mut WorldGrids,
    settings: &SettlementSettings,
    biome: &BiomeConfig,
    rng: &mut R,
) -> SettlementOutcome {
    if !settings.enabled {
        return SettlementOutcome::NotPlaced;
    }
    let (w, h) = (grids.width as i32, grids.height as i32);
    let (sx, sy) = (settings.footprint.0 as i32, settings.footprint.1 as i32);
    let margin = 3.max(settings.padding as i32 + 1);
    let x_range = (margin + sx / 2)..(w - margin - sx / 2);
    let y_range = (margin + sy / 2)..(h - margin - sy / 2);

    if !x_range.is_empty() && !y_range.is_empty() {
        for attempt in 0..settings.tries {
            let center = Cell::new(rng.gen_range(x_range.clone()), rng.gen_range(y_range.clone()));
            let footprint = Footprint::new(center, settings.footprint, settings.padding);
            if footprint_fits(grids, &footprint, settings.min_road_distance) {
                tracing::info!(?center, attempt, "settlement placed");
                return SettlementOutcome::Placed(commit(grids, &footprint, settings, biome, rng));
            }
        }
    }

    let center = Cell::new(w / 2, h / 2);
    let footprint = Footprint::new(center, settings.footprint, settings.padding);
    if footprint_fits(grids, &footprint, settings.min_road_distance) {
        tracing::info!(?center, "settlement placed at map center");
        return SettlementOutcome::Placed(commit(grids, &footprint, settings, biome, rng));
    }

    tracing::warn!(tries = settings.tries, "settlement not placed");
    SettlementOutcome::NotPlaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::Tile;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn meadow_with_road(width: u32, height: u32, road_y: i32) -> WorldGrids {
        let mut grids = WorldGrids::new(width, height);
        grids.ground.fill(Some(Tile::new(TileClass::Grass, 0)));
        for x in 0..width as i32 {
            grids.road_mask[Cell::new(x, road_y)] = true;
        }
        grids.refresh_road_distance();
        grids
    }

    fn small_settings() -> SettlementSettings {
        SettlementSettings {
            footprint: (6, 4),
            ..SettlementSettings::default()
        }
    }

    #[test]
    fn footprint_bounds_follow_center() {
        let fp = Footprint::new(Cell::new(10, 10), (6, 4), 2);
        assert_eq!(fp.core_min, Cell::new(7, 8));
        assert_eq!(fp.core_max, Cell::new(12, 11));
        assert_eq!(fp.core_cells().count(), 24);
        assert_eq!(fp.padded_cells().count(), 10 * 8);
    }

    #[test]
    fn placed_settlement_avoids_roads_and_water_and_occupies_padding() {
        let mut grids = meadow_with_road(40, 30, 5);
        grids.foreground[Cell::new(30, 20)] = Some(Tile::new(TileClass::Water, 0));
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let settings = small_settings();
        let outcome = place_settlement(&mut grids, &settings, &BiomeConfig::default(), &mut rng);
        let record = outcome.record().expect("open meadow has room").clone();
        assert_eq!(record.kind, PlacementKind::Settlement);
        assert_eq!(record.id, "Camp");
        assert_eq!(record.position, (record.cell.x as f32 + 0.5, record.cell.y as f32 + 0.5));

        let fp = Footprint::new(record.cell, settings.footprint, settings.padding);
        for cell in fp.padded_cells() {
            assert!(grids.is_occupied(cell));
            assert!(!grids.is_road(cell));
            assert!(!grids.is_water(cell));
            assert!(grids.distance_to_road(cell) >= 3);
        }
        assert_eq!(grids.occupied.data.iter().filter(|&&o| o).count(), 80);
        assert_eq!(grids.placement("Camp"), Some(&record));
    }

    #[test]
    fn blocked_map_reports_not_placed_and_keeps_grids() {
        let mut grids = meadow_with_road(30, 20, 10);
        for cell in grids.road_mask.cells().collect::<Vec<_>>() {
            if cell.x % 4 == 0 {
                grids.foreground[cell] = Some(Tile::new(TileClass::Cliff, 0));
            }
        }
        let before = grids.road_distance.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let outcome = place_settlement(&mut grids, &small_settings(), &BiomeConfig::default(), &mut rng);
        assert_eq!(outcome, SettlementOutcome::NotPlaced);
        assert!(grids.occupied.data.iter().all(|&o| !o));
        assert!(grids.placements.is_empty());
        assert_eq!(grids.road_distance, before);
    }

    #[test]
    fn occupied_cells_are_never_reused() {
        let mut grids = meadow_with_road(40, 30, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let settings = small_settings();
        let biome = BiomeConfig::default();
        let first = place_settlement(&mut grids, &settings, &biome, &mut rng);
        let second = place_settlement(&mut grids, &settings, &biome, &mut rng);
        if let (Some(a), Some(b)) = (first.record(), second.record()) {
            let fa = Footprint::new(a.cell, settings.footprint, settings.padding);
            let fb = Footprint::new(b.cell, settings.footprint, settings.padding);
            let cells: Vec<_> = fa.padded_cells().collect();
            assert!(fb.padded_cells().all(|c| !cells.contains(&c)));
        }
    }
}
