use crate::biome::{BiomeConfig, Tile, TileClass};
use crate::config::TerrainSettings;
use crate::grid::{Cell, Grid};
use crate::world::WorldGrids;
use fastnoise_lite::{FastNoiseLite, NoiseType};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Когерентный шум рельефа в мировых координатах, значения 0..1
pub struct TerrainNoise {
    noise: FastNoiseLite,
    offset: (f32, f32),
    scale: f32,
}

impl TerrainNoise {
    #[must_use]
    pub fn new(seed: u64, offset: (f32, f32), scale: f32) -> Self {
        let mut noise = FastNoiseLite::new();
        noise.set_seed(Some(seed as i32));
        noise.set_noise_type(Some(NoiseType::Perlin));
        // Масштаб применяется к координатам вручную
        noise.set_frequency(Some(1.0));
        Self {
            noise,
            offset,
            scale,
        }
    }

    /// Смещение берётся из генератора прогона (первые два числа)
    pub fn from_rng<R: Rng + ?Sized>(seed: u64, rng: &mut R, scale: f32) -> Self {
        let offset = (rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0));
        Self::new(seed, offset, scale)
    }

    /// Тот же шум, что получит прогон генерации с этим сидом
    #[must_use]
    pub fn for_seed(seed: u64, scale: f32) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self::from_rng(seed, &mut rng, scale)
    }

    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        self.sample_scaled(x, y, self.scale)
    }

    /// Выборка с собственным масштабом (мелкая рябь для болот и т.п.)
    #[must_use]
    pub fn sample_scaled(&self, x: f32, y: f32, scale: f32) -> f32 {
        let v = self
            .noise
            .get_noise_2d((self.offset.0 + x) * scale, (self.offset.1 + y) * scale);
        ((v + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn sample_cell(&self, cell: Cell) -> f32 {
        self.sample(cell.x as f32, cell.y as f32)
    }

    /// Среднее по блоку `block × block`, выровненному по началу мира
    #[must_use]
    pub fn block_average(&self, bx: i32, by: i32, block: u32) -> f32 {
        let b = block as i32;
        let mut sum = 0.0;
        for j in 0..b {
            for i in 0..b {
                sum += self.sample((bx * b + i) as f32, (by * b + j) as f32);
            }
        }
        sum / (b * b) as f32
    }
}

/// Усреднённый шум для каждой клетки области `origin .. origin + size`.
///
/// Блоки выровнены по мировым координатам (деление с округлением вниз), поэтому
/// соседние области и отрицательные координаты стыкуются без швов.
#[must_use]
pub fn averaged_noise(noise: &TerrainNoise, block: u32, origin: Cell, width: u32, height: u32) -> Grid<f32> {
    let b = block.max(1) as i32;
    let bx0 = origin.x.div_euclid(b);
    let by0 = origin.y.div_euclid(b);
    let bx1 = (origin.x + width as i32 - 1).div_euclid(b);
    let by1 = (origin.y + height as i32 - 1).div_euclid(b);
    let blocks_w = (bx1 - bx0 + 1) as usize;
    let blocks_h = (by1 - by0 + 1) as usize;

    let average = |i: usize| {
        let bx = bx0 + (i % blocks_w) as i32;
        let by = by0 + (i / blocks_w) as i32;
        noise.block_average(bx, by, b as u32)
    };

    #[cfg(feature = "parallel")]
    let blocks: Vec<f32> = (0..blocks_w * blocks_h).into_par_iter().map(average).collect();
    #[cfg(not(feature = "parallel"))]
    let blocks: Vec<f32> = (0..blocks_w * blocks_h).map(average).collect();

    let mut grid = Grid::new(width, height, 0.0);
    for (i, value) in grid.data.iter_mut().enumerate() {
        let x = origin.x + (i % width as usize) as i32;
        let y = origin.y + (i / width as usize) as i32;
        let bi = (y.div_euclid(b) - by0) as usize * blocks_w + (x.div_euclid(b) - bx0) as usize;
        *value = blocks[bi];
    }
    grid
}

/// Классы земли и переднего слоя для значения шума
#[must_use]
pub fn classify(value: f32, biome: &BiomeConfig, settings: &TerrainSettings) -> (TileClass, Option<TileClass>) {
    if value <= biome.water_threshold {
        return (TileClass::Grass, Some(TileClass::Water));
    }
    let ground = if settings.natural_dirt && value <= biome.dirt_threshold {
        TileClass::Dirt
    } else {
        TileClass::Grass
    };
    let foreground = (value > biome.cliff_threshold && biome.has_cliffs()).then_some(TileClass::Cliff);
    (ground, foreground)
}

/// Заполняет слои земли и переднего плана для области.
///
/// Варианты выбираются последовательно построчно, так что результат не зависит
/// от параллельного усреднения.
pub fn paint_region<R: Rng + ?Sized>(
    ground: &mut Grid<Option<Tile>>,
    foreground: &mut Grid<Option<Tile>>,
    origin: Cell,
    noise: &TerrainNoise,
    biome: &BiomeConfig,
    settings: &TerrainSettings,
    rng: &mut R,
) {
    let values = averaged_noise(noise, settings.block_size, origin, ground.width, ground.height);
    for (i, &value) in values.data.iter().enumerate() {
        let (ground_class, fg_class) = classify(value, biome, settings);
        ground.data[i] = biome.pick_tile(ground_class, rng);
        foreground.data[i] = fg_class.and_then(|class| biome.pick_tile(class, rng));
    }
}

/// Первый этап генерации: базовые слои всей карты
pub fn synthesize_terrain<R: Rng + ?Sized>(
    grids: &mut WorldGrids,
    noise: &TerrainNoise,
    biome: &BiomeConfig,
    settings: &TerrainSettings,
    rng: &mut R,
) {
    paint_region(
        &mut grids.ground,
        &mut grids.foreground,
        Cell::new(0, 0),
        noise,
        biome,
        settings,
        rng,
    );

    let water = grids.foreground.data.iter().filter(|t| t.is_some_and(|t| t.class == TileClass::Water)).count();
    let cliffs = grids.foreground.data.iter().filter(|t| t.is_some_and(|t| t.class == TileClass::Cliff)).count();
    tracing::debug!(water, cliffs, "terrain classified");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_deterministic_and_normalized() {
        let a = TerrainNoise::for_seed(42, 0.08);
        let b = TerrainNoise::for_seed(42, 0.08);
        for i in 0..50 {
            let (x, y) = (i as f32 * 1.7, i as f32 * -0.9);
            let v = a.sample(x, y);
            assert_eq!(v, b.sample(x, y));
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn block_averages_are_constant_inside_a_block() {
        let noise = TerrainNoise::for_seed(3, 0.08);
        let grid = averaged_noise(&noise, 4, Cell::new(0, 0), 8, 8);
        assert_eq!(grid[Cell::new(0, 0)], grid[Cell::new(3, 3)]);
        assert_eq!(grid[Cell::new(4, 4)], grid[Cell::new(7, 7)]);
    }

    #[test]
    fn regions_line_up_across_borders_and_negative_origins() {
        let noise = TerrainNoise::for_seed(11, 0.08);
        let whole = averaged_noise(&noise, 4, Cell::new(-6, -3), 12, 9);
        let part = averaged_noise(&noise, 4, Cell::new(-1, 1), 5, 4);
        for y in 0..4 {
            for x in 0..5 {
                assert_eq!(part[Cell::new(x, y)], whole[Cell::new(x + 5, y + 4)]);
            }
        }
    }

    #[test]
    fn classification_thresholds() {
        let biome = BiomeConfig::default();
        let mut settings = TerrainSettings::default();
        assert_eq!(classify(0.1, &biome, &settings), (TileClass::Grass, Some(TileClass::Water)));
        assert_eq!(classify(0.4, &biome, &settings), (TileClass::Grass, None));
        assert_eq!(classify(0.9, &biome, &settings), (TileClass::Grass, Some(TileClass::Cliff)));
        settings.natural_dirt = true;
        assert_eq!(classify(0.4, &biome, &settings), (TileClass::Dirt, None));

        let mut no_cliffs = biome.clone();
        no_cliffs.cliff_tiles.clear();
        assert_eq!(classify(0.9, &no_cliffs, &settings), (TileClass::Grass, None));
    }
}
