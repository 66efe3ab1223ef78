// src/config.rs
//! Конфигурация генерации мира
//!
//! Этот модуль определяет все параметры, управляющие процедурной генерацией карты:
//! - Размеры карты и сид
//! - Биом (пулы тайлов, объекты, пороги шума)
//! - Параметры рельефа, дорог, реки, мостов, поселения и декора
//! - Параметры потокового мира (чанки)
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для удобной настройки через конфигурационные файлы.
//! Любое поле можно опустить, подставится значение по умолчанию.

use crate::biome::BiomeConfig;
use crate::error::GenError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Параметры рельефа
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerrainSettings {
    /// Масштаб шума: во сколько раз «сжимаются» координаты клеток перед выборкой
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f32,

    /// Размер блока усреднения шума (клетки блока получают одно значение)
    #[serde(default = "default_block_size")]
    pub block_size: u32,

    /// Естественная грязь:
    /// - `false`: грязь появляется только под дорогами,
    /// - `true`: низины ниже `dirt_threshold` тоже становятся грязью.
    #[serde(default)]
    pub natural_dirt: bool,

    /// Декоративное озеро-эллипс в центре карты (рисуется до дорог)
    #[serde(default)]
    pub cosmetic_lake: bool,
}

fn default_noise_scale() -> f32 {
    0.08
}
fn default_block_size() -> u32 {
    4
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            noise_scale: 0.08,
            block_size: 4,
            natural_dirt: false,
            cosmetic_lake: false,
        }
    }
}

/// Параметры дорожной сети
///
/// Главная дорога всегда шириной 3 клетки и идёт с запада на восток по середине
/// карты; от неё рекурсивно растут ответвления.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoadSettings {
    /// Ширина ответвлений (нечётная, ≥ 1)
    #[serde(default = "default_branch_width")]
    pub branch_width: u32,

    /// Количество ответвлений первого уровня от горизонтального родителя
    /// (от вертикального на одно меньше, но не меньше одного)
    #[serde(default = "default_first_level_branches")]
    pub first_level_branches: u32,

    /// Максимальная глубина ветвления:
    /// - `0`: только главная дорога,
    /// - `1`: ответвления от главной,
    /// - `2`: ответвления от ответвлений и т.д.
    #[serde(default = "default_max_branch_depth")]
    pub max_branch_depth: u32,

    /// Минимальное расстояние (в клетках пути) между точками ответвления
    #[serde(default = "default_branch_spacing_min")]
    pub branch_spacing_min: u32,

    /// Ответвление ведёт в угол карты (`true`) или прямо к краю (`false`)
    #[serde(default = "default_true")]
    pub branch_ends_at_corner: bool,

    /// Первый уровень чередует направления вверх/вниз вместо случайного выбора
    #[serde(default = "default_true")]
    pub alternate_first_level: bool,
}

fn default_branch_width() -> u32 {
    3
}
fn default_first_level_branches() -> u32 {
    3
}
fn default_max_branch_depth() -> u32 {
    2
}
fn default_branch_spacing_min() -> u32 {
    10
}
fn default_true() -> bool {
    true
}

impl Default for RoadSettings {
    fn default() -> Self {
        Self {
            branch_width: 3,
            first_level_branches: 3,
            max_branch_depth: 2,
            branch_spacing_min: 10,
            branch_ends_at_corner: true,
            alternate_first_level: true,
        }
    }
}

/// Параметры реки и болот
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiverSettings {
    /// Генерировать ли реку вообще
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Средняя ширина реки в клетках
    #[serde(default = "default_mean_width")]
    pub mean_width: u32,

    /// Разброс ширины (± от средней), итоговая ширина не меньше 2
    #[serde(default = "default_width_variation")]
    pub width_variation: u32,

    /// Вес шума в стоимости шага: `1 + noise_weight · noise`
    #[serde(default = "default_noise_weight")]
    pub noise_weight: f32,

    /// Надбавка за шаг на скалу
    #[serde(default = "default_cliff_surcharge")]
    pub cliff_surcharge: f32,

    /// Штраф за «зигзаг» (диагональные шаги стоят дороже)
    #[serde(default = "default_turn_penalty")]
    pub turn_penalty: f32,

    /// Семян болот на 100 клеток длины реки
    #[serde(default = "default_swamp_seeds_per_100")]
    pub swamp_seeds_per_100: f32,

    /// Вероятность того, что семя болота действительно прорастёт
    #[serde(default = "default_swamp_chance")]
    pub swamp_chance: f32,

    /// Максимальный радиус болота
    #[serde(default = "default_swamp_max_radius")]
    pub swamp_max_radius: u32,

    /// Старое поведение: дорога под рекой сразу получает небольшой мост
    /// вместо затопления (прямоугольные мосты строятся всё равно)
    #[serde(default)]
    pub inline_bridges: bool,
}

fn default_mean_width() -> u32 {
    4
}
fn default_width_variation() -> u32 {
    2
}
fn default_noise_weight() -> f32 {
    6.0
}
fn default_cliff_surcharge() -> f32 {
    8.0
}
fn default_turn_penalty() -> f32 {
    0.1
}
fn default_swamp_seeds_per_100() -> f32 {
    6.0
}
fn default_swamp_chance() -> f32 {
    0.25
}
fn default_swamp_max_radius() -> u32 {
    5
}

impl Default for RiverSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mean_width: 4,
            width_variation: 2,
            noise_weight: 6.0,
            cliff_surcharge: 8.0,
            turn_penalty: 0.1,
            swamp_seeds_per_100: 6.0,
            swamp_chance: 0.25,
            swamp_max_radius: 5,
            inline_bridges: false,
        }
    }
}

/// Параметры прямоугольных мостов
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSettings {
    /// Ширина моста поперёк дороги (нечётная)
    #[serde(default = "default_bridge_width")]
    pub width: u32,

    /// Максимальный зазор вдоль оси, при котором соседние мосты сливаются
    #[serde(default = "default_merge_gap")]
    pub merge_gap: u32,

    /// Дальность зондирования через воду (1..=probe_distance)
    #[serde(default = "default_probe_distance")]
    pub probe_distance: u32,

    /// Радиус проверки связности по суше: если дальний берег достижим в этом
    /// радиусе, вода считается косметической
    #[serde(default = "default_connect_radius")]
    pub connect_radius: u32,

    /// Окно подсчёта дорожных клеток для выбора главной оси кластера
    #[serde(default = "default_axis_window")]
    pub axis_window: u32,

    /// Оставшиеся затопленные клетки дороги получают одноклеточный мост
    #[serde(default = "default_true")]
    pub legacy_fallback: bool,
}

fn default_bridge_width() -> u32 {
    7
}
fn default_merge_gap() -> u32 {
    5
}
fn default_probe_distance() -> u32 {
    5
}
fn default_connect_radius() -> u32 {
    8
}
fn default_axis_window() -> u32 {
    3
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            width: 7,
            merge_gap: 5,
            probe_distance: 5,
            connect_radius: 8,
            axis_window: 3,
            legacy_fallback: true,
        }
    }
}

/// Параметры поселения
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Идентификатор точки привязки для внешнего слоя
    #[serde(default = "default_anchor_id")]
    pub anchor_id: String,

    /// Размер ядра поселения (ширина, высота), каждая сторона ≥ 2
    #[serde(default = "default_footprint")]
    pub footprint: (u32, u32),

    /// Отступ вокруг ядра, тоже занимаемый
    #[serde(default = "default_padding")]
    pub padding: u32,

    /// Минимальное манхэттенское расстояние до дороги для каждой клетки
    #[serde(default = "default_min_road_distance")]
    pub min_road_distance: u32,

    /// Число случайных попыток до запасной попытки в центре
    #[serde(default = "default_tries")]
    pub tries: u32,
}

fn default_anchor_id() -> String {
    "Camp".to_owned()
}
fn default_footprint() -> (u32, u32) {
    (18, 14)
}
fn default_padding() -> u32 {
    2
}
fn default_min_road_distance() -> u32 {
    3
}
fn default_tries() -> u32 {
    150
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            anchor_id: default_anchor_id(),
            footprint: (18, 14),
            padding: 2,
            min_road_distance: 3,
            tries: 150,
        }
    }
}

/// Параметры декора и объектов
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecorSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Минимальное евклидово расстояние между объектами
    #[serde(default = "default_prop_spacing")]
    pub prop_spacing: f32,

    /// Глубина воды (по Чебышёву) для водных объектов
    #[serde(default = "default_water_prop_min_depth")]
    pub water_prop_min_depth: u32,

    /// Водные объекты дальше этого расстояния от дороги
    #[serde(default = "default_water_prop_min_road_distance")]
    pub water_prop_min_road_distance: u32,
}

fn default_prop_spacing() -> f32 {
    1.6
}
fn default_water_prop_min_depth() -> u32 {
    1
}
fn default_water_prop_min_road_distance() -> u32 {
    2
}

impl Default for DecorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            prop_spacing: 1.6,
            water_prop_min_depth: 1,
            water_prop_min_road_distance: 2,
        }
    }
}

/// Параметры потокового мира
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkSettings {
    #[serde(default = "default_chunk_width")]
    pub chunk_width: u32,

    #[serde(default = "default_chunk_height")]
    pub chunk_height: u32,

    /// Радиус видимости в чанках вокруг чанка наблюдателя
    #[serde(default = "default_view_radius")]
    pub view_radius: u32,

    /// Переиспользовать контейнеры слоёв выгруженных чанков
    #[serde(default = "default_true")]
    pub use_pooling: bool,

    /// Сколько контейнеров создать заранее
    #[serde(default = "default_pool_initial")]
    pub pool_initial: u32,

    /// Минимальное расстояние между собираемыми объектами внутри чанка
    #[serde(default = "default_chunk_prop_spacing")]
    pub prop_spacing: f32,
}

fn default_chunk_width() -> u32 {
    80
}
fn default_chunk_height() -> u32 {
    48
}
fn default_view_radius() -> u32 {
    1
}
fn default_pool_initial() -> u32 {
    4
}
fn default_chunk_prop_spacing() -> f32 {
    2.0
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_width: 80,
            chunk_height: 48,
            view_radius: 1,
            use_pooling: true,
            pool_initial: 4,
            prop_spacing: 2.0,
        }
    }
}

/// Основные параметры генерации мира
///
/// Полная конфигурация для генерации одной карты. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldGenerationParams {
    /// Сид генератора случайных чисел (детерминированная генерация)
    #[serde(default)]
    pub seed: u64,

    /// Ширина карты в клетках (по умолчанию 80)
    #[serde(default = "default_width")]
    pub width: u32,

    /// Высота карты в клетках (по умолчанию 48)
    #[serde(default = "default_height")]
    pub height: u32,

    /// Биом (по умолчанию «луг»)
    #[serde(default)]
    pub biome: BiomeConfig,

    #[serde(default)]
    pub terrain: TerrainSettings,

    #[serde(default)]
    pub roads: RoadSettings,

    #[serde(default)]
    pub river: RiverSettings,

    #[serde(default)]
    pub bridges: BridgeSettings,

    #[serde(default)]
    pub settlement: SettlementSettings,

    #[serde(default)]
    pub decor: DecorSettings,

    #[serde(default)]
    pub chunks: ChunkSettings,
}

/// Наименьшая сторона карты, на которой помещаются дорога, река и рамка в 1 клетку
pub const MIN_MAP_SIDE: u32 = 8;

/// Наибольшая сторона карты и чанка; координаты клеток должны помещаться в `i32`
pub const MAX_MAP_SIDE: u32 = 4096;

/// Наибольшая глубина рекурсии ответвлений
pub const MAX_BRANCH_DEPTH: u32 = 4;

/// Вероятность из конфигурации: конечное число в `[0, 1]`
fn check_probability(name: &str, value: f32) -> Result<(), GenError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(GenError::invalid_config(format!("{name} must be within [0, 1], got {value}")))
    }
}

/// Конечное неотрицательное число не больше `max`
fn check_bounded(name: &str, value: f32, max: f32) -> Result<(), GenError> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(GenError::invalid_config(format!("{name} must be within [0, {max}], got {value}")))
    }
}

fn check_at_most(name: &str, value: u32, max: u32) -> Result<(), GenError> {
    if value <= max {
        Ok(())
    } else {
        Err(GenError::invalid_config(format!("{name} must be at most {max}, got {value}")))
    }
}

impl WorldGenerationParams {
    /// Параметры по умолчанию с заданными сидом и размерами
    #[must_use]
    pub fn new(seed: u64, width: u32, height: u32) -> Self {
        Self {
            seed,
            width,
            height,
            ..Self::default()
        }
    }

    /// Загружает параметры из TOML-файла и проверяет их
    ///
    /// # Аргументы
    /// * `path` - путь к файлу конфигурации в формате TOML
    ///
    /// # Ошибки
    /// Возвращает ошибку, если файл не найден, содержит недопустимый формат
    /// или не проходит [`WorldGenerationParams::validate`].
    ///
    /// # Пример
    /// ```toml
    /// # world.toml
    /// seed = 12345
    /// width = 80
    /// height = 48
    ///
    /// [biome]
    /// water_threshold = 0.3
    /// ```
    ///
    /// ```rust,no_run
    /// use tilegen::WorldGenerationParams;
    /// let params = WorldGenerationParams::from_toml_file("world.toml")?;
    /// # Ok::<(), tilegen::GenError>(())
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, GenError> {
        let contents = fs::read_to_string(path)?;
        let params: Self = toml::from_str(&contents)?;
        params.validate()?;
        Ok(params)
    }

    /// Проверка конфигурации до генерации.
    ///
    /// Пулы с нулевыми весами допустимы (выбор уходит на последний элемент).
    /// Пустые обязательные пулы, слишком маленькая карта и чётная ширина дорог
    /// отвергаются.
    pub fn validate(&self) -> Result<(), GenError> {
        if self.width < MIN_MAP_SIDE || self.height < MIN_MAP_SIDE {
            return Err(GenError::invalid_config(format!(
                "map must be at least {MIN_MAP_SIDE}x{MIN_MAP_SIDE}, got {}x{}",
                self.width, self.height
            )));
        }
        check_at_most("width", self.width, MAX_MAP_SIDE)?;
        check_at_most("height", self.height, MAX_MAP_SIDE)?;
        let biome = &self.biome;
        for (name, pool) in [
            ("grass_tiles", &biome.grass_tiles),
            ("dirt_tiles", &biome.dirt_tiles),
            ("water_tiles", &biome.water_tiles),
        ] {
            if pool.is_empty() {
                return Err(GenError::invalid_config(format!(
                    "biome '{}' has an empty {name} pool",
                    biome.name
                )));
            }
        }
        if !(biome.water_threshold <= biome.dirt_threshold
            && biome.dirt_threshold <= biome.cliff_threshold)
        {
            return Err(GenError::invalid_config(
                "noise thresholds must satisfy water <= dirt <= cliff",
            ));
        }
        if !(self.terrain.noise_scale.is_finite() && self.terrain.noise_scale > 0.0) {
            return Err(GenError::invalid_config("noise_scale must be positive"));
        }
        if self.terrain.block_size == 0 {
            return Err(GenError::invalid_config("block_size must be at least 1"));
        }
        if self.roads.branch_width % 2 == 0 {
            return Err(GenError::invalid_config("branch_width must be odd"));
        }
        if self.bridges.width % 2 == 0 {
            return Err(GenError::invalid_config("bridge width must be odd"));
        }
        let (sx, sy) = self.settlement.footprint;
        if sx < 2 || sy < 2 {
            return Err(GenError::invalid_config(
                "settlement footprint must be at least 2x2",
            ));
        }
        if self.river.swamp_max_radius < 2 {
            return Err(GenError::invalid_config("swamp_max_radius must be at least 2"));
        }
        if self.chunks.chunk_width == 0 || self.chunks.chunk_height == 0 {
            return Err(GenError::invalid_config("chunk size must be positive"));
        }
        self.validate_ranges()
    }

    /// Числовые границы: всё, что иначе уронило бы или подвесило генерацию
    fn validate_ranges(&self) -> Result<(), GenError> {
        let side = self.width.max(self.height);
        let biome = &self.biome;
        check_probability("decor_chance", biome.decor_chance)?;
        for spec in biome.props.iter().chain(&biome.water_props) {
            check_probability(&format!("density of prop '{}'", spec.id), spec.density)?;
        }

        check_at_most("block_size", self.terrain.block_size, side)?;
        check_at_most("branch_width", self.roads.branch_width, side)?;
        check_at_most("max_branch_depth", self.roads.max_branch_depth, MAX_BRANCH_DEPTH)?;

        let river = &self.river;
        check_at_most("mean_width", river.mean_width, side)?;
        check_at_most("width_variation", river.width_variation, river.mean_width)?;
        check_at_most("swamp_max_radius", river.swamp_max_radius, side)?;
        check_probability("swamp_chance", river.swamp_chance)?;
        check_bounded("swamp_seeds_per_100", river.swamp_seeds_per_100, 100.0)?;
        for (name, value) in [
            ("noise_weight", river.noise_weight),
            ("cliff_surcharge", river.cliff_surcharge),
            ("turn_penalty", river.turn_penalty),
        ] {
            check_bounded(name, value, f32::MAX)?;
        }

        let bridges = &self.bridges;
        for (name, value) in [
            ("bridge width", bridges.width),
            ("merge_gap", bridges.merge_gap),
            ("probe_distance", bridges.probe_distance),
            ("connect_radius", bridges.connect_radius),
            ("axis_window", bridges.axis_window),
        ] {
            check_at_most(name, value, side)?;
        }

        let (sx, sy) = self.settlement.footprint;
        check_at_most("footprint width", sx, MAX_MAP_SIDE)?;
        check_at_most("footprint height", sy, MAX_MAP_SIDE)?;
        check_at_most("settlement padding", self.settlement.padding, MAX_MAP_SIDE)?;

        check_bounded("decor prop_spacing", self.decor.prop_spacing, side as f32)?;
        check_at_most("water_prop_min_depth", self.decor.water_prop_min_depth, side)?;

        let chunks = &self.chunks;
        check_at_most("chunk_width", chunks.chunk_width, MAX_MAP_SIDE)?;
        check_at_most("chunk_height", chunks.chunk_height, MAX_MAP_SIDE)?;
        check_bounded(
            "chunk prop_spacing",
            chunks.prop_spacing,
            chunks.chunk_width.max(chunks.chunk_height) as f32,
        )?;
        Ok(())
    }
}

fn default_width() -> u32 {
    80
}
fn default_height() -> u32 {
    48
}

impl Default for WorldGenerationParams {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 80,
            height: 48,
            biome: BiomeConfig::default(),
            terrain: TerrainSettings::default(),
            roads: RoadSettings::default(),
            river: RiverSettings::default(),
            bridges: BridgeSettings::default(),
            settlement: SettlementSettings::default(),
            decor: DecorSettings::default(),
            chunks: ChunkSettings::default(),
        }
    }
}
