//! Отладочное PNG-превью мира: один цвет на класс клетки, контуры мостов и
//! поселения, точки объектов. Ось y перевёрнута, север сверху.

use crate::error::GenError;
use crate::generator::World;
use crate::grid::Cell;
use crate::settlement::Footprint;
use crate::world::PlacementKind;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::path::Path;

const BRIDGE_OUTLINE: Rgba<u8> = Rgba([200, 40, 40, 255]);
const SETTLEMENT_OUTLINE: Rgba<u8> = Rgba([240, 200, 40, 255]);
const PROP_COLOR: Rgba<u8> = Rgba([20, 80, 20, 255]);
const WATER_PROP_COLOR: Rgba<u8> = Rgba([120, 200, 120, 255]);

fn rgba([r, g, b]: [u8; 3]) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

/// Пиксельный прямоугольник для клеток `[min, max]` с учётом переворота оси y
fn cell_rect(min: Cell, max: Cell, height: u32, scale: u32) -> Rect {
    let top = (height as i32 - 1 - max.y) * scale as i32;
    let w = (max.x - min.x + 1) as u32 * scale;
    let h = (max.y - min.y + 1) as u32 * scale;
    Rect::at(min.x * scale as i32, top).of_size(w, h)
}

/// Рисует превью размером `width·scale × height·scale`. `scale` меньше 1
/// считается за 1.
#[must_use]
pub fn render_preview(world: &World, scale: u32) -> RgbaImage {
    let scale = scale.max(1);
    let grids = &world.grids;
    let mut img = RgbaImage::new(grids.width * scale, grids.height * scale);

    for cell in grids.road_mask.cells() {
        let color = rgba(grids.tile_class(cell).to_rgb());
        draw_filled_rect_mut(&mut img, cell_rect(cell, cell, grids.height, scale), color);
    }

    for rect in &grids.bridge_rects {
        let min = Cell::new(rect.min_x, rect.min_y);
        let max = Cell::new(rect.max_x, rect.max_y);
        draw_hollow_rect_mut(&mut img, cell_rect(min, max, grids.height, scale), BRIDGE_OUTLINE);
    }

    let settings = &world.params.settlement;
    for record in grids.placements_of(PlacementKind::Settlement) {
        let fp = Footprint::new(record.cell, settings.footprint, settings.padding);
        draw_hollow_rect_mut(&mut img, cell_rect(fp.core_min, fp.core_max, grids.height, scale), SETTLEMENT_OUTLINE);
    }

    let radius = (scale as i32 / 3).max(1);
    for record in &grids.placements {
        let color = match record.kind {
            PlacementKind::Prop => PROP_COLOR,
            PlacementKind::WaterProp => WATER_PROP_COLOR,
            PlacementKind::Settlement => continue,
        };
        let cx = record.cell.x * scale as i32 + scale as i32 / 2;
        let cy = (grids.height as i32 - 1 - record.cell.y) * scale as i32 + scale as i32 / 2;
        draw_filled_circle_mut(&mut img, (cx, cy), radius, color);
    }

    img
}

/// Сохраняет превью в PNG
pub fn save_preview_png(world: &World, scale: u32, path: impl AsRef<Path>) -> Result<(), GenError> {
    render_preview(world, scale).save(path.as_ref())?;
    tracing::info!(path = %path.as_ref().display(), "preview saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::TileClass;
    use crate::config::WorldGenerationParams;
    use crate::generator::generate_world;

    #[test]
    fn preview_size_follows_scale_and_north_is_up() {
        let params = WorldGenerationParams::new(12, 32, 24);
        let world = generate_world(&params).expect("valid params");
        let img = render_preview(&world, 3);
        assert_eq!(img.dimensions(), (96, 72));

        let grids = &world.grids;
        let corner = Cell::new(0, grids.height as i32 - 1);
        let class = grids.tile_class(corner);
        let expected = class.to_rgb();
        let px = img.get_pixel(1, 1);
        let on_overlay = grids.bridge_rects.iter().any(|r| r.contains(corner));
        if !on_overlay && class != TileClass::Empty {
            assert_eq!(&px.0[..3], &expected[..]);
        }
    }
}
