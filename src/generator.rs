//! Точка входа генерации и рабочий интерфейс готового мира
//!
//! Этапы выполняются строго по очереди над одним `WorldGrids`:
//!
//! 1. рельеф (шум, пороги, пулы биома) и, по желанию, декоративное озеро
//! 2. дорожная сеть: главная дорога, ветви, починка диагоналей
//! 3. река и болота
//! 4. мосты (прямоугольники, затем одиночные клетки)
//! 5. поселение
//! 6. декор и объекты
//!
//! Все случайные решения берутся из одного `ChaCha8Rng`, засеянного сидом, так что
//! одинаковые параметры дают одинаковый мир.

use crate::biome::{Tile, TileClass};
use crate::bridges::{BridgeOutcome, synthesize_bridges};
use crate::config::WorldGenerationParams;
use crate::decor::{DecorOutcome, scatter_decor};
use crate::error::GenError;
use crate::grid::{Cell, Connectivity, Grid};
use crate::pathfinding::{self, PathResult};
use crate::rivers::{RiverOutcome, carve_cosmetic_lake, generate_hydrology};
use crate::roads::{RoadNetwork, build_road_network, road_components};
use crate::seed::cell_rng;
use crate::settlement::{SettlementOutcome, place_settlement};
use crate::terrain::{TerrainNoise, synthesize_terrain};
use crate::world::{Layer, PlacementRecord, WorldGrids};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// Соль сида клетки для внешних изменений тайлов
const MUTATION_SALT: u64 = 0x6d75_7461_7465;

/// Сводка прогона генерации
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub lake_cells: usize,
    pub roads: RoadNetwork,
    pub river: Option<RiverOutcome>,
    /// Хотя бы одна клетка главной дороги оказалась под водой после гидрологии
    pub main_road_crossed_by_river: bool,
    pub bridges: BridgeOutcome,
    pub settlement: SettlementOutcome,
    pub decor: DecorOutcome,
    /// Число компонент связности дорог по итогам всех этапов
    pub road_components: usize,
}

/// Сгенерированный мир: параметры, сетки и сводка
#[derive(Debug, Clone)]
pub struct World {
    pub params: WorldGenerationParams,
    pub grids: WorldGrids,
    pub report: GenerationReport,
}

/// Генерирует мир целиком.
///
/// Конфигурация проверяется до того, как создаётся хоть одна сетка. Неудачи
/// поиска внутри этапов ошибками не считаются: они заменяются запасными
/// вариантами и отражаются в [`GenerationReport`].
pub fn generate_world(params: &WorldGenerationParams) -> Result<World, GenError> {
    params.validate()?;
    tracing::info!(seed = params.seed, width = params.width, height = params.height, "generating world");

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let noise = TerrainNoise::from_rng(params.seed, &mut rng, params.terrain.noise_scale);
    let mut grids = WorldGrids::new(params.width, params.height);

    synthesize_terrain(&mut grids, &noise, &params.biome, &params.terrain, &mut rng);
    let lake_cells = if params.terrain.cosmetic_lake {
        carve_cosmetic_lake(&mut grids, &params.biome, &mut rng)
    } else {
        0
    };

    let roads = build_road_network(&mut grids, &params.roads, &params.biome, &mut rng);

    let river = generate_hydrology(&mut grids, &noise, &params.biome, &params.river, &mut rng);
    let main_road_crossed_by_river = roads.main.iter().any(|&c| grids.is_water(c));
    grids.refresh_road_distance();

    let bridges = synthesize_bridges(&mut grids, &params.bridges);
    grids.refresh_road_distance();
    if main_road_crossed_by_river && bridges.rectangles.is_empty() {
        tracing::debug!("river crossed the main road but no bridge rectangle was found");
    }

    let settlement = place_settlement(&mut grids, &params.settlement, &params.biome, &mut rng);
    let decor = scatter_decor(&mut grids, &params.biome, &params.decor, &mut rng);

    let components = road_components(&grids);
    tracing::info!(
        road_components = components,
        bridges = bridges.rectangles.len(),
        legacy_bridges = bridges.legacy_cells,
        placements = grids.placements.len(),
        "world generated"
    );

    let report = GenerationReport {
        seed: params.seed,
        width: params.width,
        height: params.height,
        lake_cells,
        roads,
        river,
        main_road_crossed_by_river,
        bridges,
        settlement,
        decor,
        road_components: components,
    };
    Ok(World {
        params: params.clone(),
        grids,
        report,
    })
}

impl World {
    /// Итоговый класс клетки; клетки вне карты отвергаются
    pub fn tile_class(&self, cell: Cell) -> Result<TileClass, GenError> {
        self.grids.road_mask.check(cell)?;
        Ok(self.grids.tile_class(cell))
    }

    #[must_use]
    pub fn class_grid(&self) -> Grid<TileClass> {
        self.grids.class_grid()
    }

    #[must_use]
    pub fn walkability(&self) -> Grid<bool> {
        self.grids.walkability()
    }

    /// Поиск пути по текущей проходимости мира
    pub fn find_path(&self, start: Cell, goal: Cell, connectivity: Connectivity) -> Result<PathResult, GenError> {
        pathfinding::find_path(&self.walkability(), start, goal, connectivity)
    }

    /// Записывает тайл класса `class` в слой (или очищает его при `None`).
    ///
    /// Вариант выбирается генератором, засеянным от сида мира и клетки, поэтому
    /// повторная запись того же класса даёт тот же тайл.
    pub fn mutate_tile(&mut self, cell: Cell, layer: Layer, class: Option<TileClass>) -> Result<Option<Tile>, GenError> {
        self.grids.road_mask.check(cell)?;
        let tile = match class {
            Some(class) => {
                if !layer.accepts(class) {
                    return Err(GenError::InvalidTile { class, layer });
                }
                let mut rng = cell_rng(self.params.seed, cell, MUTATION_SALT);
                let tile = self.params.biome.pick_tile(class, &mut rng).ok_or_else(|| {
                    GenError::invalid_config(format!("biome '{}' has no {class:?} tiles", self.params.biome.name))
                })?;
                Some(tile)
            }
            None => None,
        };
        self.grids.write_layer(cell, layer, tile)?;
        tracing::debug!(?cell, ?layer, ?tile, "tile mutated");
        Ok(tile)
    }

    /// Запись о размещении по идентификатору привязки (например, `"Camp"`)
    #[must_use]
    pub fn placement(&self, anchor_id: &str) -> Option<&PlacementRecord> {
        self.grids.placement(anchor_id)
    }

    #[must_use]
    pub fn find_spawn_cell(&self) -> Option<Cell> {
        self.grids.find_spawn_cell()
    }
}

/// Разделяемый мир: поиски пути читают параллельно, изменения тайлов пишут
/// монопольно
#[derive(Debug, Clone)]
pub struct SharedWorld {
    inner: Arc<RwLock<World>>,
}

impl SharedWorld {
    #[must_use]
    pub fn new(world: World) -> Self {
        Self {
            inner: Arc::new(RwLock::new(world)),
        }
    }

    /// Доступ на чтение. Отравленная блокировка не мешает читать: запись тайла
    /// атомарна относительно сеток.
    pub fn read(&self) -> RwLockReadGuard<'_, World> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn find_path(&self, start: Cell, goal: Cell, connectivity: Connectivity) -> Result<PathResult, GenError> {
        self.read().find_path(start, goal, connectivity)
    }

    pub fn tile_class(&self, cell: Cell) -> Result<TileClass, GenError> {
        self.read().tile_class(cell)
    }

    pub fn mutate_tile(&self, cell: Cell, layer: Layer, class: Option<TileClass>) -> Result<Option<Tile>, GenError> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mutate_tile(cell, layer, class)
    }
}
