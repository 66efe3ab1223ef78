//! Ошибки генератора
//!
//! Внутри одного прогона генерации предпочитаются запасные варианты (прямая дорога,
//! «поселение не размещено»), поэтому ошибкой здесь считается только то, что
//! нельзя исправить без участия вызывающего кода: неверная конфигурация,
//! обращение за пределы карты, ввод-вывод.

use crate::biome::TileClass;
use crate::world::Layer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenError {
    /// Конфигурация отвергнута до того, как была затронута хоть одна сетка
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Клетка вне `[0, width) × [0, height)`
    #[error("cell ({x}, {y}) is outside the {width}x{height} map")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    /// Класс тайла не может лежать на указанном слое
    #[error("tile class {class:?} cannot be written to the {layer:?} layer")]
    InvalidTile { class: TileClass, layer: Layer },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl GenError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
