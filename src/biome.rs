use rand::Rng;
use serde::{Deserialize, Serialize};

/// Символический класс тайла клетки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileClass {
    Grass,
    Dirt,
    Water,
    Cliff,
    Road,
    Bridge,
    Empty,
}

impl TileClass {
    pub fn to_rgb(&self) -> [u8; 3] {
        match self {
            TileClass::Grass => [96, 160, 72],
            TileClass::Dirt => [150, 120, 80],
            TileClass::Water => [40, 90, 170],
            TileClass::Cliff => [120, 120, 128],
            TileClass::Road => [196, 170, 120],
            TileClass::Bridge => [120, 80, 40],
            TileClass::Empty => [0, 0, 0],
        }
    }
}

/// Конкретный тайл: класс плюс индекс варианта в пуле биома
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub class: TileClass,
    pub variant: u16,
}

impl Tile {
    #[must_use]
    pub const fn new(class: TileClass, variant: u16) -> Self {
        Self { class, variant }
    }
}

/// Вариант тайла с относительным весом
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTile {
    pub id: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

/// Спавнящийся объект с плотностью (вероятность на подходящую клетку)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropSpec {
    pub id: String,
    pub density: f32,
}

fn default_weight() -> f32 {
    1.0
}

impl WeightedTile {
    fn new(id: &str, weight: f32) -> Self {
        Self {
            id: id.to_owned(),
            weight,
        }
    }
}

impl PropSpec {
    fn new(id: &str, density: f32) -> Self {
        Self {
            id: id.to_owned(),
            density,
        }
    }
}

/// Взвешенный выбор индекса.
///
/// Пустой пул даёт `None`. Отрицательные и нечисловые веса считаются нулём; если
/// суммарный вес не положителен (или бесконечен), возвращается последний элемент.
pub fn pick_weighted<R: Rng + ?Sized>(weights: &[f32], rng: &mut R) -> Option<usize> {
    let last = weights.len().checked_sub(1)?;
    let sanitize = |w: f32| if w.is_finite() && w > 0.0 { w } else { 0.0 };
    let total: f32 = weights.iter().copied().map(sanitize).sum();
    if !(total.is_finite() && total > 0.0) {
        return Some(last);
    }

    let mut roll = rng.gen_range(0.0..total);
    for (i, &w) in weights.iter().enumerate() {
        let w = sanitize(w);
        if w > 0.0 && roll < w {
            return Some(i);
        }
        roll -= w;
    }
    // Погрешность округления может оставить остаток
    Some(last)
}

/// Описание биома: пулы вариантов тайлов, объекты и пороги шума
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeConfig {
    #[serde(default = "default_biome_name")]
    pub name: String,

    #[serde(default = "default_grass_tiles")]
    pub grass_tiles: Vec<WeightedTile>,
    #[serde(default = "default_dirt_tiles")]
    pub dirt_tiles: Vec<WeightedTile>,
    #[serde(default = "default_water_tiles")]
    pub water_tiles: Vec<WeightedTile>,
    /// Пустой пул скал отключает скалы
    #[serde(default = "default_cliff_tiles")]
    pub cliff_tiles: Vec<WeightedTile>,
    #[serde(default = "default_decor_tiles")]
    pub decor_tiles: Vec<WeightedTile>,

    #[serde(default = "default_bridge_horizontal")]
    pub bridge_horizontal: String,
    #[serde(default = "default_bridge_vertical")]
    pub bridge_vertical: String,

    #[serde(default = "default_props")]
    pub props: Vec<PropSpec>,
    #[serde(default = "default_water_props")]
    pub water_props: Vec<PropSpec>,

    /// Шум ≤ порога → вода
    #[serde(default = "default_water_threshold")]
    pub water_threshold: f32,
    /// Шум ≤ порога → естественная грязь (если включена)
    #[serde(default = "default_dirt_threshold")]
    pub dirt_threshold: f32,
    /// Шум > порога → скала на переднем слое
    #[serde(default = "default_cliff_threshold")]
    pub cliff_threshold: f32,
    /// Вероятность декора на траве
    #[serde(default = "default_decor_chance")]
    pub decor_chance: f32,
}

fn default_biome_name() -> String {
    "meadow".to_owned()
}
fn default_grass_tiles() -> Vec<WeightedTile> {
    vec![
        WeightedTile::new("grass_plain", 6.0),
        WeightedTile::new("grass_tall", 2.0),
        WeightedTile::new("grass_flowers", 1.0),
        WeightedTile::new("grass_clover", 1.0),
    ]
}
fn default_dirt_tiles() -> Vec<WeightedTile> {
    vec![
        WeightedTile::new("dirt_packed", 3.0),
        WeightedTile::new("dirt_pebbles", 1.0),
    ]
}
fn default_water_tiles() -> Vec<WeightedTile> {
    vec![
        WeightedTile::new("water_calm", 4.0),
        WeightedTile::new("water_ripple", 1.0),
    ]
}
fn default_cliff_tiles() -> Vec<WeightedTile> {
    vec![
        WeightedTile::new("cliff_rock", 3.0),
        WeightedTile::new("cliff_mossy", 1.0),
    ]
}
fn default_decor_tiles() -> Vec<WeightedTile> {
    vec![
        WeightedTile::new("decor_flowers", 2.0),
        WeightedTile::new("decor_stones", 1.0),
        WeightedTile::new("decor_mushrooms", 1.0),
    ]
}
fn default_bridge_horizontal() -> String {
    "bridge_horizontal".to_owned()
}
fn default_bridge_vertical() -> String {
    "bridge_vertical".to_owned()
}
fn default_props() -> Vec<PropSpec> {
    vec![
        PropSpec::new("tree", 0.04),
        PropSpec::new("bush", 0.03),
        PropSpec::new("rock", 0.02),
    ]
}
fn default_water_props() -> Vec<PropSpec> {
    vec![PropSpec::new("lily_pad", 0.05)]
}
fn default_water_threshold() -> f32 {
    0.28
}
fn default_dirt_threshold() -> f32 {
    0.45
}
fn default_cliff_threshold() -> f32 {
    0.8
}
fn default_decor_chance() -> f32 {
    0.08
}

impl Default for BiomeConfig {
    fn default() -> Self {
        Self {
            name: default_biome_name(),
            grass_tiles: default_grass_tiles(),
            dirt_tiles: default_dirt_tiles(),
            water_tiles: default_water_tiles(),
            cliff_tiles: default_cliff_tiles(),
            decor_tiles: default_decor_tiles(),
            bridge_horizontal: default_bridge_horizontal(),
            bridge_vertical: default_bridge_vertical(),
            props: default_props(),
            water_props: default_water_props(),
            water_threshold: 0.28,
            dirt_threshold: 0.45,
            cliff_threshold: 0.8,
            decor_chance: 0.08,
        }
    }
}

/// Индекс варианта горизонтального моста
pub const BRIDGE_HORIZONTAL: u16 = 0;
/// Индекс варианта вертикального моста
pub const BRIDGE_VERTICAL: u16 = 1;

impl BiomeConfig {
    /// Пул вариантов для класса. Дороги берут варианты из пула грязи.
    #[must_use]
    pub fn pool(&self, class: TileClass) -> &[WeightedTile] {
        match class {
            TileClass::Grass => &self.grass_tiles,
            TileClass::Dirt | TileClass::Road => &self.dirt_tiles,
            TileClass::Water => &self.water_tiles,
            TileClass::Cliff => &self.cliff_tiles,
            TileClass::Bridge | TileClass::Empty => &[],
        }
    }

    /// Взвешенный выбор варианта для класса; `None` только для пустого пула
    pub fn pick_tile<R: Rng + ?Sized>(&self, class: TileClass, rng: &mut R) -> Option<Tile> {
        let weights: Vec<f32> = self.pool(class).iter().map(|t| t.weight).collect();
        pick_weighted(&weights, rng).map(|i| Tile::new(class, i as u16))
    }

    /// Индекс варианта декора
    pub fn pick_decor<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<u16> {
        let weights: Vec<f32> = self.decor_tiles.iter().map(|t| t.weight).collect();
        pick_weighted(&weights, rng).map(|i| i as u16)
    }

    #[must_use]
    pub fn bridge_tile(horizontal: bool) -> Tile {
        Tile::new(
            TileClass::Bridge,
            if horizontal {
                BRIDGE_HORIZONTAL
            } else {
                BRIDGE_VERTICAL
            },
        )
    }

    /// Символический идентификатор тайла для внешнего рендера
    #[must_use]
    pub fn tile_id(&self, tile: Tile) -> Option<&str> {
        match tile.class {
            TileClass::Bridge => Some(if tile.variant == BRIDGE_HORIZONTAL {
                &self.bridge_horizontal
            } else {
                &self.bridge_vertical
            }),
            class => self
                .pool(class)
                .get(tile.variant as usize)
                .map(|t| t.id.as_str()),
        }
    }

    #[must_use]
    pub fn decor_id(&self, variant: u16) -> Option<&str> {
        self.decor_tiles.get(variant as usize).map(|t| t.id.as_str())
    }

    #[must_use]
    pub fn has_cliffs(&self) -> bool {
        !self.cliff_tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn zero_weights_fall_back_to_last_entry() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..16 {
            assert_eq!(pick_weighted(&[0.0, 0.0], &mut rng), Some(1));
        }
        assert_eq!(pick_weighted(&[-1.0, f32::NAN, 0.0], &mut rng), Some(2));
    }

    #[test]
    fn empty_pool_has_no_pick() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(pick_weighted(&[], &mut rng), None);
        assert_eq!(BiomeConfig::default().pick_tile(TileClass::Empty, &mut rng), None);
    }

    #[test]
    fn zero_weight_entries_are_never_picked() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let i = pick_weighted(&[0.0, 3.0, 0.0, 1.0], &mut rng);
            assert!(matches!(i, Some(1 | 3)));
        }
    }

    #[test]
    fn picks_are_roughly_proportional() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut counts = [0usize; 2];
        for _ in 0..4000 {
            counts[pick_weighted(&[3.0, 1.0], &mut rng).unwrap()] += 1;
        }
        let ratio = counts[0] as f32 / counts[1] as f32;
        assert!((2.3..3.9).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn tile_ids_resolve_through_pools() {
        let biome = BiomeConfig::default();
        assert_eq!(biome.tile_id(Tile::new(TileClass::Road, 0)), Some("dirt_packed"));
        assert_eq!(biome.tile_id(BiomeConfig::bridge_tile(false)), Some("bridge_vertical"));
        assert_eq!(biome.tile_id(Tile::new(TileClass::Grass, 99)), None);
    }
}
