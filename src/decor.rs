use crate::biome::{BiomeConfig, TileClass};
use crate::config::DecorSettings;
use crate::grid::{Cell, Grid};
use crate::world::{PlacementKind, PlacementRecord, WorldGrids};
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DecorOutcome {
    pub decor_tiles: usize,
    pub props: usize,
    pub water_props: usize,
}

/// Есть ли уже объект ближе `spacing`
fn too_close(props: &Grid<bool>, cell: Cell, spacing: f32) -> bool {
    let reach = spacing.ceil() as i32;
    let limit = spacing * spacing;
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            if ((dx * dx + dy * dy) as f32) < limit && props.get(cell.offset(dx, dy)).copied().unwrap_or(false) {
                return true;
            }
        }
    }
    false
}

/// Вся окрестность Чебышёва радиуса `depth`: вода внутри карты
fn is_deep_water(grids: &WorldGrids, cell: Cell, depth: i32) -> bool {
    (-depth..=depth).all(|dy| {
        (-depth..=depth).all(|dx| {
            let c = cell.offset(dx, dy);
            grids.contains(c) && grids.is_water(c)
        })
    })
}

fn roll<R: Rng + ?Sized>(rng: &mut R, chance: f32) -> bool {
    rng.gen_range(0.0..1.0) < chance
}

/// Финальный проход: декор на траве, наземные и водные объекты.
///
/// Читает только маски (дороги, занятость, вода) и ничего структурного не
/// меняет, кроме занятости клеток под водными объектами.
pub fn scatter_decor<R: Rng + ?Sized>(
    grids: &mut WorldGrids,
    biome: &BiomeConfig,
    settings: &DecorSettings,
    rng: &mut R,
) -> DecorOutcome {
    let mut outcome = DecorOutcome::default();
    if !settings.enabled {
        return outcome;
    }
    let mut props = Grid::new(grids.width, grids.height, false);
    let cells: Vec<Cell> = grids.road_mask.cells().filter(|&c| grids.is_interior(c)).collect();

    for &cell in &cells {
        let free = !grids.is_road(cell) && !grids.is_occupied(cell) && grids.foreground[cell].is_none();
        if free && grids.ground_class(cell) == Some(TileClass::Grass) && roll(rng, biome.decor_chance) {
            if let Some(variant) = biome.pick_decor(rng) {
                grids.overlay[cell] = Some(variant);
                outcome.decor_tiles += 1;
            }
        }
    }

    for &cell in &cells {
        let free = !grids.is_road(cell) && !grids.is_occupied(cell) && grids.foreground[cell].is_none();
        if !free || !matches!(grids.ground_class(cell), Some(TileClass::Grass | TileClass::Dirt)) {
            continue;
        }
        let Some(spec) = biome.props.iter().find(|spec| roll(rng, spec.density)) else {
            continue;
        };
        if too_close(&props, cell, settings.prop_spacing) {
            continue;
        }
        props[cell] = true;
        grids.placements.push(PlacementRecord::new(PlacementKind::Prop, spec.id.clone(), cell));
        outcome.props += 1;
    }

    let depth = settings.water_prop_min_depth as i32;
    for &cell in &cells {
        if !grids.is_water(cell)
            || grids.is_road(cell)
            || grids.is_occupied(cell)
            || grids.distance_to_road(cell) <= settings.water_prop_min_road_distance
            || !is_deep_water(grids, cell, depth)
        {
            continue;
        }
        let Some(spec) = biome.water_props.iter().find(|spec| roll(rng, spec.density)) else {
            continue;
        };
        if too_close(&props, cell, settings.prop_spacing) {
            continue;
        }
        props[cell] = true;
        grids.occupied[cell] = true;
        grids.placements.push(PlacementRecord::new(PlacementKind::WaterProp, spec.id.clone(), cell));
        outcome.water_props += 1;
    }

    tracing::info!(
        decor = outcome.decor_tiles,
        props = outcome.props,
        water_props = outcome.water_props,
        "decor scattered"
    );
    outcome
}
