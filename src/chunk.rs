//! Потоковый мир из чанков
//!
//! Базовое содержимое чанка каждый раз заново строится из сида мира: рельеф
//! берётся из общего мирового шума (границы между чанками совпадают), а выбор
//! вариантов и объектов из подсида чанка. Поверх базы накладывается разреженная
//! дельта `ChunkSaveData`, которая живёт всю сессию, в том числе пока чанк
//! выгружен.

use crate::biome::{BiomeConfig, Tile, TileClass};
use crate::config::{ChunkSettings, TerrainSettings, WorldGenerationParams};
use crate::error::GenError;
use crate::grid::{Cell, Grid};
use crate::seed::{cell_rng, chunk_rng};
use crate::terrain::{TerrainNoise, paint_region};
use crate::world::{Layer, PlacementKind, PlacementRecord};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const MUTATION_SALT: u64 = 0x6368_756e_6b;

/// Координата чанка; может быть отрицательной
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Объект, размещённый в чанке
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropRecord {
    /// Индекс вида объекта в `BiomeConfig::props`
    pub prop_index: usize,
    /// Клетка внутри чанка
    pub cell: Cell,
    pub collected: bool,
}

/// Дельта чанка относительно детерминированной базы
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkSaveData {
    /// `None` означает, что тайл слоя очищен
    pub ground_overrides: BTreeMap<Cell, Option<Tile>>,
    pub foreground_overrides: BTreeMap<Cell, Option<Tile>>,
    pub props: Vec<PropRecord>,
    pub props_generated: bool,
}

/// Живые слои загруженного чанка
#[derive(Debug, Clone)]
pub struct ChunkLayers {
    pub ground: Grid<Option<Tile>>,
    pub foreground: Grid<Option<Tile>>,
    /// Несобранные объекты
    pub props: Vec<PropRecord>,
}

impl ChunkLayers {
    fn new(width: u32, height: u32) -> Self {
        Self {
            ground: Grid::new(width, height, None),
            foreground: Grid::new(width, height, None),
            props: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.ground.fill(None);
        self.foreground.fill(None);
        self.props.clear();
    }

    /// Класс клетки: передний слой поверх земли
    #[must_use]
    pub fn class_at(&self, local: Cell) -> Option<TileClass> {
        self.foreground
            .get(local)
            .copied()
            .flatten()
            .or_else(|| self.ground.get(local).copied().flatten())
            .map(|t| t.class)
    }
}

/// Итог `update_view`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewChange {
    pub loaded: Vec<ChunkCoord>,
    pub unloaded: Vec<ChunkCoord>,
}

pub struct ChunkStore {
    seed: u64,
    biome: BiomeConfig,
    terrain: TerrainSettings,
    settings: ChunkSettings,
    noise: TerrainNoise,
    loaded: HashMap<ChunkCoord, ChunkLayers>,
    saves: HashMap<ChunkCoord, ChunkSaveData>,
    pool: Vec<ChunkLayers>,
}

impl ChunkStore {
    /// Хранилище для мира с параметрами `params`. Шум тот же, что у обычной
    /// генерации с этим сидом.
    pub fn new(params: &WorldGenerationParams) -> Result<Self, GenError> {
        params.validate()?;
        let settings = params.chunks.clone();
        let pool = if settings.use_pooling {
            (0..settings.pool_initial)
                .map(|_| ChunkLayers::new(settings.chunk_width, settings.chunk_height))
                .collect()
        } else {
            Vec::new()
        };
        Ok(Self {
            seed: params.seed,
            biome: params.biome.clone(),
            terrain: params.terrain.clone(),
            noise: TerrainNoise::for_seed(params.seed, params.terrain.noise_scale),
            settings,
            loaded: HashMap::new(),
            saves: HashMap::new(),
            pool,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &ChunkSettings {
        &self.settings
    }

    /// Чанк и локальная клетка для мировой клетки
    #[must_use]
    pub fn world_to_chunk(&self, cell: Cell) -> (ChunkCoord, Cell) {
        let (w, h) = (self.settings.chunk_width as i32, self.settings.chunk_height as i32);
        (
            ChunkCoord::new(cell.x.div_euclid(w), cell.y.div_euclid(h)),
            Cell::new(cell.x.rem_euclid(w), cell.y.rem_euclid(h)),
        )
    }

    #[must_use]
    pub fn chunk_origin(&self, coord: ChunkCoord) -> Cell {
        Cell::new(
            coord.x * self.settings.chunk_width as i32,
            coord.y * self.settings.chunk_height as i32,
        )
    }

    #[must_use]
    pub fn is_loaded(&self, coord: ChunkCoord) -> bool {
        self.loaded.contains_key(&coord)
    }

    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&ChunkLayers> {
        self.loaded.get(&coord)
    }

    /// Загруженные чанки в порядке координат
    #[must_use]
    pub fn loaded_chunks(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<_> = self.loaded.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    #[must_use]
    pub fn save(&self, coord: ChunkCoord) -> Option<&ChunkSaveData> {
        self.saves.get(&coord)
    }

    #[must_use]
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    /// Загружает чанк. Возвращает `false`, если он уже загружен.
    pub fn load_chunk(&mut self, coord: ChunkCoord) -> bool {
        if self.loaded.contains_key(&coord) {
            return false;
        }
        let (w, h) = (self.settings.chunk_width, self.settings.chunk_height);
        let mut layers = self.pool.pop().unwrap_or_else(|| ChunkLayers::new(w, h));
        let origin = self.chunk_origin(coord);
        let mut rng = chunk_rng(self.seed, coord.x, coord.y);
        paint_region(
            &mut layers.ground,
            &mut layers.foreground,
            origin,
            &self.noise,
            &self.biome,
            &self.terrain,
            &mut rng,
        );

        let save = self.saves.entry(coord).or_default();
        for (&cell, &tile) in &save.ground_overrides {
            layers.ground.set(cell, tile);
        }
        for (&cell, &tile) in &save.foreground_overrides {
            layers.foreground.set(cell, tile);
        }
        if !save.props_generated {
            save.props = generate_props(&layers, &self.biome, self.settings.prop_spacing, &mut rng);
            save.props_generated = true;
        }
        layers.props = save.props.iter().filter(|p| !p.collected).copied().collect();

        tracing::debug!(?coord, props = layers.props.len(), "chunk loaded");
        self.loaded.insert(coord, layers);
        true
    }

    /// Выгружает чанк, дельта остаётся. Возвращает `false`, если он не был загружен.
    pub fn unload_chunk(&mut self, coord: ChunkCoord) -> bool {
        let Some(mut layers) = self.loaded.remove(&coord) else {
            return false;
        };
        if self.settings.use_pooling {
            layers.clear();
            self.pool.push(layers);
        }
        tracing::debug!(?coord, "chunk unloaded");
        true
    }

    /// Загружает все чанки в квадрате радиуса `view_radius` вокруг чанка центра и
    /// выгружает остальные
    pub fn update_view(&mut self, center: Cell) -> ViewChange {
        let (center_chunk, _) = self.world_to_chunk(center);
        let r = self.settings.view_radius as i32;
        let wanted: Vec<ChunkCoord> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| ChunkCoord::new(center_chunk.x + dx, center_chunk.y + dy)))
            .collect();

        let mut change = ViewChange::default();
        for coord in self.loaded_chunks() {
            if !wanted.contains(&coord) && self.unload_chunk(coord) {
                change.unloaded.push(coord);
            }
        }
        for coord in wanted {
            if self.load_chunk(coord) {
                change.loaded.push(coord);
            }
        }
        change
    }

    /// Меняет тайл мировой клетки: всегда в дельте, в живом слое, если чанк загружен
    pub fn mutate_tile(&mut self, cell: Cell, layer: Layer, class: Option<TileClass>) -> Result<Option<Tile>, GenError> {
        let tile = match class {
            Some(class) => {
                if !layer.accepts(class) {
                    return Err(GenError::InvalidTile { class, layer });
                }
                let mut rng = cell_rng(self.seed, cell, MUTATION_SALT);
                Some(self.biome.pick_tile(class, &mut rng).ok_or_else(|| {
                    GenError::invalid_config(format!("biome '{}' has no {class:?} tiles", self.biome.name))
                })?)
            }
            None => None,
        };
        let (coord, local) = self.world_to_chunk(cell);
        let save = self.saves.entry(coord).or_default();
        match layer {
            Layer::Ground => save.ground_overrides.insert(local, tile),
            Layer::Foreground => save.foreground_overrides.insert(local, tile),
        };
        if let Some(layers) = self.loaded.get_mut(&coord) {
            match layer {
                Layer::Ground => layers.ground.set(local, tile),
                Layer::Foreground => layers.foreground.set(local, tile),
            };
        }
        Ok(tile)
    }

    /// Помечает объект в мировой клетке собранным. Возвращает `false`, если
    /// несобранного объекта там нет.
    pub fn collect_prop(&mut self, cell: Cell) -> bool {
        let (coord, local) = self.world_to_chunk(cell);
        let Some(record) = self
            .saves
            .get_mut(&coord)
            .and_then(|save| save.props.iter_mut().find(|p| p.cell == local && !p.collected))
        else {
            return false;
        };
        record.collected = true;
        if let Some(layers) = self.loaded.get_mut(&coord) {
            layers.props.retain(|p| p.cell != local);
        }
        tracing::debug!(?cell, "prop collected");
        true
    }

    /// Класс мировой клетки, если её чанк загружен
    #[must_use]
    pub fn tile_at(&self, cell: Cell) -> Option<TileClass> {
        let (coord, local) = self.world_to_chunk(cell);
        self.loaded.get(&coord).and_then(|layers| layers.class_at(local))
    }

    /// Живые объекты чанка как записи о размещении в мировых координатах
    #[must_use]
    pub fn placements(&self, coord: ChunkCoord) -> Vec<PlacementRecord> {
        let origin = self.chunk_origin(coord);
        self.loaded
            .get(&coord)
            .map(|layers| {
                layers
                    .props
                    .iter()
                    .filter_map(|p| {
                        let spec = self.biome.props.get(p.prop_index)?;
                        Some(PlacementRecord::new(
                            PlacementKind::Prop,
                            spec.id.clone(),
                            origin.offset(p.cell.x, p.cell.y),
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Объекты при первой загрузке: внутренние клетки с травой без переднего слоя,
/// не больше одного на клетку, не ближе `spacing` друг к другу. Каждый вид
/// бросает свою плотность по порядку; первый прошедший и бросок, и проверку
/// расстояния занимает клетку.
pub(crate) fn generate_props<R: Rng + ?Sized>(layers: &ChunkLayers, biome: &BiomeConfig, spacing: f32, rng: &mut R) -> Vec<PropRecord> {
    let (w, h) = (layers.ground.width as i32, layers.ground.height as i32);
    let limit = spacing * spacing;
    let mut props: Vec<PropRecord> = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let cell = Cell::new(x, y);
            let grass = layers.ground[cell].is_some_and(|t| t.class == TileClass::Grass);
            if !grass || layers.foreground[cell].is_some() {
                continue;
            }
            // Отказ по расстоянию переходит к следующему виду объекта
            for (prop_index, spec) in biome.props.iter().enumerate() {
                if rng.gen_range(0.0..1.0) >= spec.density {
                    continue;
                }
                if props.iter().any(|p| (p.cell.euclid_sq(cell) as f32) < limit) {
                    continue;
                }
                props.push(PropRecord {
                    prop_index,
                    cell,
                    collected: false,
                });
                break;
            }
        }
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::PropSpec;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn store(seed: u64) -> ChunkStore {
        let mut params = WorldGenerationParams::new(seed, 80, 48);
        params.chunks.chunk_width = 16;
        params.chunks.chunk_height = 12;
        ChunkStore::new(&params).expect("valid params")
    }

    #[test]
    fn world_to_chunk_handles_negative_cells() {
        let s = store(1);
        assert_eq!(s.world_to_chunk(Cell::new(-1, -1)), (ChunkCoord::new(-1, -1), Cell::new(15, 11)));
        assert_eq!(s.world_to_chunk(Cell::new(16, 11)), (ChunkCoord::new(1, 0), Cell::new(0, 11)));
    }

    #[test]
    fn reload_restores_identical_layers() {
        let mut s = store(4);
        let coord = ChunkCoord::new(2, -1);
        assert!(s.load_chunk(coord));
        assert!(!s.load_chunk(coord));
        let before = s.chunk(coord).cloned().expect("loaded");
        assert!(s.unload_chunk(coord));
        assert!(s.load_chunk(coord));
        let after = s.chunk(coord).expect("loaded");
        assert_eq!(before.ground, after.ground);
        assert_eq!(before.foreground, after.foreground);
        assert_eq!(before.props, after.props);
    }

    #[test]
    fn load_order_does_not_change_content() {
        let mut a = store(8);
        let mut b = store(8);
        let target = ChunkCoord::new(0, 0);
        a.load_chunk(target);
        b.load_chunk(ChunkCoord::new(5, 5));
        b.load_chunk(ChunkCoord::new(-3, 1));
        b.load_chunk(target);
        assert_eq!(a.chunk(target).map(|c| &c.ground), b.chunk(target).map(|c| &c.ground));
    }

    #[test]
    fn pooling_reuses_containers() {
        let mut s = store(2);
        let initial = s.pooled();
        s.load_chunk(ChunkCoord::new(0, 0));
        assert_eq!(s.pooled(), initial.saturating_sub(1));
        s.unload_chunk(ChunkCoord::new(0, 0));
        assert_eq!(s.pooled(), initial.max(1));
    }

    #[test]
    fn props_keep_spacing() {
        let mut s = store(13);
        let coord = ChunkCoord::new(0, 0);
        s.load_chunk(coord);
        let props = &s.save(coord).expect("touched").props;
        for (i, a) in props.iter().enumerate() {
            for b in &props[i + 1..] {
                assert!((a.cell.euclid_sq(b.cell) as f32).sqrt() >= 2.0);
            }
        }
    }

    /// Считает обращения к внутреннему генератору
    struct CountingRng<R> {
        inner: R,
        draws: usize,
    }

    impl<R: RngCore> RngCore for CountingRng<R> {
        fn next_u32(&mut self) -> u32 {
            self.draws += 1;
            self.inner.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.draws += 1;
            self.inner.next_u64()
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.draws += 1;
            self.inner.fill_bytes(dest);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.draws += 1;
            self.inner.try_fill_bytes(dest)
        }
    }

    #[test]
    fn spacing_rejection_falls_through_to_next_prop_kind() {
        let mut layers = ChunkLayers::new(4, 3);
        layers.ground.fill(Some(Tile::new(TileClass::Grass, 0)));
        let mut biome = BiomeConfig::default();
        biome.props = vec![
            PropSpec { id: "tree".into(), density: 1.0 },
            PropSpec { id: "bush".into(), density: 1.0 },
        ];
        let mut rng = CountingRng {
            inner: ChaCha8Rng::seed_from_u64(1),
            draws: 0,
        };

        let props = generate_props(&layers, &biome, 5.0, &mut rng);
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].cell, Cell::new(1, 1));
        assert_eq!(props[0].prop_index, 0);
        // Первая клетка: один бросок. Вторая: оба вида бросают и оба упираются в расстояние.
        assert_eq!(rng.draws, 3);
    }
}
